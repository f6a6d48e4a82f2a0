pub mod base;
pub mod eventbrite;
pub mod ticketmaster;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::AppConfig;
use crate::models::{EventSource, NormalizedExternalEvent};

/// One external event feed.
///
/// `fetch` never fails: upstream, auth and decode errors are logged inside the
/// adapter and surface as an empty list, so one broken provider cannot abort a
/// sync pass.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn id(&self) -> &'static str;
    fn name(&self) -> &'static str;
    fn source(&self) -> EventSource;
    fn is_configured(&self) -> bool;
    async fn fetch(&self, location_query: &str) -> Vec<NormalizedExternalEvent>;
}

#[derive(Clone, Debug, serde::Serialize, PartialEq, Eq)]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
    pub configured: bool,
}

pub fn configured(config: &AppConfig) -> Vec<Arc<dyn ProviderAdapter>> {
    let eventbrite: Arc<dyn ProviderAdapter> = Arc::new(eventbrite::Eventbrite::from_config(config));
    let ticketmaster: Arc<dyn ProviderAdapter> =
        Arc::new(ticketmaster::Ticketmaster::from_config(config));
    vec![eventbrite, ticketmaster]
}

pub fn list_providers(providers: &[Arc<dyn ProviderAdapter>]) -> Vec<ProviderInfo> {
    providers
        .iter()
        .map(|provider| ProviderInfo {
            id: provider.id().to_string(),
            name: provider.name().to_string(),
            configured: provider.is_configured(),
        })
        .collect()
}

pub fn find_provider(
    providers: &[Arc<dyn ProviderAdapter>],
    id: &str,
) -> Option<Arc<dyn ProviderAdapter>> {
    providers
        .iter()
        .find(|provider| provider.id() == id)
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_reports_configuration_state() {
        let config = AppConfig {
            ticketmaster_api_key: Some("tm-key".to_string()),
            ..AppConfig::default()
        };
        let providers = configured(&config);
        let info = list_providers(&providers);
        assert_eq!(
            info,
            vec![
                ProviderInfo {
                    id: "eventbrite".to_string(),
                    name: "Eventbrite".to_string(),
                    configured: false,
                },
                ProviderInfo {
                    id: "ticketmaster".to_string(),
                    name: "Ticketmaster".to_string(),
                    configured: true,
                },
            ]
        );
    }

    #[test]
    fn find_provider_matches_by_id() {
        let providers = configured(&AppConfig::default());
        let found = find_provider(&providers, "ticketmaster").expect("ticketmaster registered");
        assert_eq!(found.source(), EventSource::Ticketmaster);
        assert!(find_provider(&providers, "meetup").is_none());
    }
}
