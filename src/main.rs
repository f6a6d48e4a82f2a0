use local_events_sync::config::AppConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,local_events_sync=debug")),
        )
        .init();

    let config = AppConfig::load().map_err(anyhow::Error::msg)?;
    local_events_sync::run(config).await
}
