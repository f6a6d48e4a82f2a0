use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::db::{EventStore, StoreError};
use crate::models::{Category, EventStatus, NewEvent, NormalizedExternalEvent, UpsertOutcome};
use crate::utils::truncate_description;

/// Match-or-create keyed on `(external_id, source)`.
///
/// Store failures for a single event become [`UpsertOutcome::Skipped`]; they
/// never escape, so the rest of the batch keeps going.
pub struct EventReconciler {
    store: Arc<dyn EventStore>,
}

impl EventReconciler {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    pub fn upsert(&self, event: &NormalizedExternalEvent, category: &Category) -> UpsertOutcome {
        self.upsert_at(event, category, Utc::now())
    }

    pub fn upsert_at(
        &self,
        event: &NormalizedExternalEvent,
        category: &Category,
        now: DateTime<Utc>,
    ) -> UpsertOutcome {
        match self.try_upsert(event, category, now) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(
                    source = %event.source,
                    external_id = %event.external_id,
                    title = %event.title,
                    error = %err,
                    "skipping external event"
                );
                UpsertOutcome::Skipped(err.to_string())
            }
        }
    }

    fn try_upsert(
        &self,
        event: &NormalizedExternalEvent,
        category: &Category,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome, StoreError> {
        let description = truncate_description(&event.description);
        let existing = self
            .store
            .find_by_source_and_external_id(event.source, &event.external_id)?;

        match existing {
            Some(mut stored) => {
                // likes, likes_count, creator and status belong to users, not to sync
                stored.title = event.title.clone();
                stored.description = description;
                stored.date = event.date;
                stored.time = event.time.clone();
                stored.location = event.location.clone();
                stored.source_url = Some(event.source_url.clone());
                stored.image_url = event.image_url.clone();
                stored.category = category.clone();
                stored.last_synced_at = Some(now);
                self.store.save_event(&stored)?;
                debug!(id = %stored.id, external_id = %event.external_id, "updated synced event");
                Ok(UpsertOutcome::Updated)
            }
            None => {
                let created = self.store.create_event(NewEvent {
                    source: event.source,
                    external_id: Some(event.external_id.clone()),
                    title: event.title.clone(),
                    description,
                    date: event.date,
                    time: event.time.clone(),
                    location: event.location.clone(),
                    source_url: Some(event.source_url.clone()),
                    image_url: event.image_url.clone(),
                    category: category.clone(),
                    creator: None,
                    likes: BTreeSet::new(),
                    likes_count: 0,
                    status: EventStatus::Upcoming,
                    last_synced_at: Some(now),
                })?;
                debug!(id = %created.id, external_id = %event.external_id, "created synced event");
                Ok(UpsertOutcome::Created)
            }
        }
    }
}
