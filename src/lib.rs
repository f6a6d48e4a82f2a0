pub mod config;
pub mod db;
pub mod models;
pub mod providers;
pub mod sync;
pub mod utils;

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use config::AppConfig;
use db::{CategoryStore, EventStore, Store, StoreError};
use sync::{SyncError, SyncRunner};

#[derive(Clone)]
pub struct AppState {
    runner: Arc<SyncRunner>,
    events: Arc<dyn EventStore>,
    categories: Arc<dyn CategoryStore>,
    city: String,
    cron_secret: Option<String>,
}

impl AppState {
    pub fn new(
        runner: Arc<SyncRunner>,
        events: Arc<dyn EventStore>,
        categories: Arc<dyn CategoryStore>,
        config: &AppConfig,
    ) -> Self {
        Self {
            runner,
            events,
            categories,
            city: config.sync_city.clone(),
            cron_secret: config.cron_secret.clone(),
        }
    }
}

/// Response envelope shared by every endpoint.
#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

fn success<T: Serialize>(data: T, message: Option<String>) -> Response {
    Json(ApiResponse {
        success: true,
        message,
        data: Some(data),
    })
    .into_response()
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn internal(err: impl std::fmt::Display) -> Self {
        error!(error = %err, "request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ApiResponse::<()> {
            success: false,
            message: Some(self.message),
            data: None,
        });
        (self.status, body).into_response()
    }
}

async fn blocking<T, F>(task: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(AppError::internal)?
        .map_err(AppError::internal)
}

async fn manual_sync(State(state): State<AppState>) -> Result<Response, AppError> {
    match state.runner.run(&state.city).await {
        Ok(report) => {
            let message = report.summary();
            Ok(success(report, Some(message)))
        }
        Err(err) => {
            error!(error = %err, "manual sync failed");
            Err(AppError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server error during sync",
            ))
        }
    }
}

async fn provider_sync(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> Result<Response, AppError> {
    match state.runner.run_provider(&provider, &state.city).await {
        Ok(report) => {
            let message = report.summary();
            Ok(success(report, Some(message)))
        }
        Err(SyncError::UnknownProvider(id)) => Err(AppError::new(
            StatusCode::NOT_FOUND,
            format!("unknown provider: {id}"),
        )),
        Err(err) => {
            error!(error = %err, provider = %provider, "provider sync failed");
            Err(AppError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server error during sync",
            ))
        }
    }
}

/// Scheduler entry point. Internal failures still answer 200 so the
/// scheduler does not keep retrying a pass that already ran partway.
async fn cron_sync(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    if !cron_authorized(&headers, state.cron_secret.as_deref()) {
        warn!("rejected scheduled sync with missing or invalid secret");
        return Err(AppError::new(StatusCode::UNAUTHORIZED, "Unauthorized"));
    }

    info!("starting scheduled event sync");
    match state.runner.run(&state.city).await {
        Ok(report) => {
            let message = format!(
                "Auto-sync complete: {} new events, {} updated",
                report.new_count, report.updated_count
            );
            Ok(success(report, Some(message)))
        }
        Err(err) => {
            error!(error = %err, "scheduled sync failed");
            Ok(success(
                json!({ "error": err.to_string() }),
                Some("Sync completed with errors".to_string()),
            ))
        }
    }
}

fn cron_authorized(headers: &HeaderMap, secret: Option<&str>) -> bool {
    let Some(secret) = secret.filter(|s| !s.is_empty()) else {
        return false;
    };
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim() == secret)
        .unwrap_or(false)
}

async fn list_providers(State(state): State<AppState>) -> Response {
    success(providers::list_providers(state.runner.providers()), None)
}

async fn list_categories(State(state): State<AppState>) -> Result<Response, AppError> {
    let categories = state.categories.clone();
    let list = blocking(move || categories.list_categories()).await?;
    Ok(success(list, None))
}

async fn seed_categories(State(state): State<AppState>) -> Result<Response, AppError> {
    let categories = state.categories.clone();
    let summary = blocking(move || db::seed_categories(categories.as_ref())).await?;
    let message = format!(
        "Seeded {} new categories. {} already existed.",
        summary.created.len(),
        summary.existing.len()
    );
    Ok(success(summary, Some(message)))
}

async fn list_events(State(state): State<AppState>) -> Result<Response, AppError> {
    let events = state.events.clone();
    let list = blocking(move || events.list_events()).await?;
    Ok(success(list, None))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/events", get(list_events))
        .route("/api/events/sync", post(manual_sync))
        .route("/api/events/sync/{provider}", post(provider_sync))
        .route("/api/cron/sync-events", get(cron_sync))
        .route("/api/providers", get(list_providers))
        .route("/api/categories", get(list_categories))
        .route("/api/seed/categories", post(seed_categories))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Opens the store, seeds the taxonomy and serves the trigger endpoints until Ctrl-C.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let db_path = config.database_path();
    let store = tokio::task::spawn_blocking(move || -> Result<Arc<Store>, StoreError> {
        let store = Store::open(&db_path)?;
        let seeded = db::seed_categories(&store)?;
        if !seeded.created.is_empty() {
            info!(created = seeded.created.len(), "seeded category taxonomy");
        }
        Ok(Arc::new(store))
    })
    .await??;

    let providers = providers::configured(&config);
    for info in providers::list_providers(&providers) {
        info!(provider = %info.id, configured = info.configured, "provider registered");
    }

    let runner = Arc::new(SyncRunner::new(providers, store.clone(), store.clone()));
    let state = AppState::new(runner, store.clone(), store, &config);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, city = %config.sync_city, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!(error = %err, "failed to listen for shutdown signal");
            }
        })
        .await?;

    Ok(())
}
