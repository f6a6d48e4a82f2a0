use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{info, instrument};

use super::classifier::{ensure_default_category, resolve};
use super::{EventReconciler, SyncError};
use crate::db::{CategoryStore, EventStore, StoreError};
use crate::models::{Category, NormalizedExternalEvent, SkippedEvent, SyncReport, UpsertOutcome};
use crate::providers::{find_provider, ProviderAdapter};

pub struct SyncRunner {
    providers: Vec<Arc<dyn ProviderAdapter>>,
    events: Arc<dyn EventStore>,
    categories: Arc<dyn CategoryStore>,
}

impl SyncRunner {
    pub fn new(
        providers: Vec<Arc<dyn ProviderAdapter>>,
        events: Arc<dyn EventStore>,
        categories: Arc<dyn CategoryStore>,
    ) -> Self {
        Self {
            providers,
            events,
            categories,
        }
    }

    pub fn providers(&self) -> &[Arc<dyn ProviderAdapter>] {
        &self.providers
    }

    /// Runs one full sync pass over every configured provider.
    pub async fn run(&self, city_query: &str) -> Result<SyncReport, SyncError> {
        self.run_with(&self.providers, city_query).await
    }

    /// Runs a sync pass limited to the provider with the given id.
    pub async fn run_provider(
        &self,
        provider_id: &str,
        city_query: &str,
    ) -> Result<SyncReport, SyncError> {
        let provider = find_provider(&self.providers, provider_id)
            .ok_or_else(|| SyncError::UnknownProvider(provider_id.to_string()))?;
        self.run_with(&[provider], city_query).await
    }

    #[instrument(skip(self, providers), fields(providers = providers.len()))]
    async fn run_with(
        &self,
        providers: &[Arc<dyn ProviderAdapter>],
        city_query: &str,
    ) -> Result<SyncReport, SyncError> {
        info!("starting event sync");

        let categories = self.categories.clone();
        let (default, available) = tokio::task::spawn_blocking(move || {
            let default = ensure_default_category(categories.as_ref())?;
            let available = categories.list_categories()?;
            Ok::<_, StoreError>((default, available))
        })
        .await
        .map_err(|err| SyncError::Task(err.to_string()))??;

        // fetches are independent I/O and run together; failures are already absorbed
        let batches = join_all(providers.iter().map(|provider| provider.fetch(city_query))).await;
        let merged: Vec<NormalizedExternalEvent> = batches.into_iter().flatten().collect();
        info!(count = merged.len(), "external events fetched");

        let reconciler = EventReconciler::new(self.events.clone());
        let report = tokio::task::spawn_blocking(move || {
            reconcile_all(&reconciler, &merged, &available, &default)
        })
        .await
        .map_err(|err| SyncError::Task(err.to_string()))?;

        info!(
            new = report.new_count,
            updated = report.updated_count,
            skipped = report.skipped_count,
            total = report.total_processed,
            "sync complete"
        );
        Ok(report)
    }
}

/// Upserts one event at a time so the exists-or-create check never races within a pass.
fn reconcile_all(
    reconciler: &EventReconciler,
    events: &[NormalizedExternalEvent],
    available: &[Category],
    default: &Category,
) -> SyncReport {
    let mut new_count = 0;
    let mut updated_count = 0;
    let mut skipped = Vec::new();

    for event in events {
        let category = resolve(&event.category_hint, available, default);
        match reconciler.upsert(event, &category) {
            UpsertOutcome::Created => new_count += 1,
            UpsertOutcome::Updated => updated_count += 1,
            UpsertOutcome::Skipped(reason) => skipped.push(SkippedEvent {
                external_id: event.external_id.clone(),
                source: event.source,
                title: event.title.clone(),
                reason,
            }),
        }
    }

    SyncReport {
        new_count,
        updated_count,
        skipped_count: skipped.len(),
        total_processed: events.len(),
        timestamp: Utc::now(),
        skipped,
    }
}
