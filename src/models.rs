use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    User,
    Eventbrite,
    Ticketmaster,
}

impl EventSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSource::User => "user",
            EventSource::Eventbrite => "eventbrite",
            EventSource::Ticketmaster => "ticketmaster",
        }
    }

    pub fn is_external(&self) -> bool {
        !matches!(self, EventSource::User)
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Upcoming,
    Passed,
}

/// An upstream event mapped into the pipeline's canonical shape.
///
/// `(external_id, source)` is stable across fetches of the same upstream event
/// and is the key the reconciler matches on.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedExternalEvent {
    pub external_id: String,
    pub source: EventSource,
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub time: Option<String>,
    pub location: String,
    pub source_url: String,
    pub image_url: Option<String>,
    pub category_hint: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub color: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct NewCategory {
    pub name: String,
    pub slug: String,
    pub color: String,
}

impl NewCategory {
    pub fn new(name: &str, slug: &str, color: &str) -> Self {
        Self {
            name: name.to_string(),
            slug: slug.to_string(),
            color: color.to_string(),
        }
    }
}

/// Persistent event record as held by the event store.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredEvent {
    pub id: String,
    pub source: EventSource,
    pub external_id: Option<String>,
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub time: Option<String>,
    pub location: String,
    pub source_url: Option<String>,
    pub image_url: Option<String>,
    pub category: Category,
    pub creator: Option<String>,
    #[serde(default)]
    pub likes: BTreeSet<String>,
    #[serde(default)]
    pub likes_count: i64,
    #[serde(default)]
    pub status: EventStatus,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Field set handed to the store when inserting an event; the store assigns the id.
#[derive(Clone, Debug, PartialEq)]
pub struct NewEvent {
    pub source: EventSource,
    pub external_id: Option<String>,
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub time: Option<String>,
    pub location: String,
    pub source_url: Option<String>,
    pub image_url: Option<String>,
    pub category: Category,
    pub creator: Option<String>,
    pub likes: BTreeSet<String>,
    pub likes_count: i64,
    pub status: EventStatus,
    pub last_synced_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    Skipped(String),
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SkippedEvent {
    pub external_id: String,
    pub source: EventSource,
    pub title: String,
    pub reason: String,
}

/// Counts for one sync pass. Reported to operators, never persisted.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct SyncReport {
    #[serde(rename = "newEvents")]
    pub new_count: usize,
    #[serde(rename = "updatedEvents")]
    pub updated_count: usize,
    #[serde(rename = "skippedEvents")]
    pub skipped_count: usize,
    #[serde(rename = "totalProcessed")]
    pub total_processed: usize,
    pub timestamp: DateTime<Utc>,
    pub skipped: Vec<SkippedEvent>,
}

impl SyncReport {
    pub fn summary(&self) -> String {
        let mut message = format!(
            "Synced {} new events, updated {} events",
            self.new_count, self.updated_count
        );
        if self.skipped_count > 0 {
            message.push_str(&format!(", skipped {}", self.skipped_count));
        }
        message
    }
}
