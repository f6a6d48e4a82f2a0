use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::models::{Category, EventSource, NewCategory, NewEvent, StoredEvent};
use crate::utils::{self, DESCRIPTION_LIMIT};

const TITLE_LIMIT: usize = 200;
const LOCATION_LIMIT: usize = 200;
const CATEGORY_NAME_LIMIT: usize = 50;

static COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("valid color regex"));

/// The local category taxonomy: `(name, slug, color)`.
pub const TAXONOMY: [(&str, &str, &str); 17] = [
    ("Music", "music", "#FF6B6B"),
    ("Arts & Culture", "arts-culture", "#4ECDC4"),
    ("Architecture", "architecture", "#95E1D3"),
    ("Theater", "theater", "#9B59B6"),
    ("Comedy", "comedy", "#FFE66D"),
    ("Sports", "sports", "#FF6B9D"),
    ("Food & Drink", "food-drink", "#FFA07A"),
    ("Business", "business", "#6C5CE7"),
    ("Tech", "tech", "#0984E3"),
    ("Family & Kids", "family-kids", "#74B9FF"),
    ("Community", "community", "#55EFC4"),
    ("Fashion", "fashion", "#FD79A8"),
    ("Health & Wellness", "health-wellness", "#81ECEC"),
    ("Nightlife", "nightlife", "#A29BFE"),
    ("Festivals", "festivals", "#FFEAA7"),
    ("Education", "education", "#DFE6E9"),
    ("General", "general", "#B2BEC3"),
];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("duplicate record: {0}")]
    Duplicate(String),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store lock poisoned")]
    Poisoned,
}

pub trait EventStore: Send + Sync {
    fn find_by_source_and_external_id(
        &self,
        source: EventSource,
        external_id: &str,
    ) -> Result<Option<StoredEvent>, StoreError>;
    fn create_event(&self, fields: NewEvent) -> Result<StoredEvent, StoreError>;
    fn save_event(&self, event: &StoredEvent) -> Result<(), StoreError>;
    fn list_events(&self) -> Result<Vec<StoredEvent>, StoreError>;
}

pub trait CategoryStore: Send + Sync {
    fn find_by_name(&self, name: &str) -> Result<Option<Category>, StoreError>;
    fn find_by_slug(&self, slug: &str) -> Result<Option<Category>, StoreError>;
    fn create_category(&self, fields: NewCategory) -> Result<Category, StoreError>;
    fn list_categories(&self) -> Result<Vec<Category>, StoreError>;
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct SeedSummary {
    pub created: Vec<String>,
    pub existing: Vec<String>,
}

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        utils::ensure_parent(path);
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn()?.execute_batch(
            "CREATE TABLE IF NOT EXISTS events(
                id TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                external_id TEXT,
                event_date_utc TEXT NOT NULL,
                payload TEXT NOT NULL,
                first_seen_utc TEXT NOT NULL,
                last_seen_utc TEXT NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS events_source_external_id
                ON events(source, external_id) WHERE external_id IS NOT NULL;
            CREATE TABLE IF NOT EXISTS categories(
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                slug TEXT NOT NULL UNIQUE,
                color TEXT NOT NULL,
                created_at_utc TEXT NOT NULL
            );",
        )?;
        Ok(())
    }
}

impl EventStore for Store {
    fn find_by_source_and_external_id(
        &self,
        source: EventSource,
        external_id: &str,
    ) -> Result<Option<StoredEvent>, StoreError> {
        let payload: Option<String> = self
            .conn()?
            .query_row(
                "SELECT payload FROM events WHERE source = ?1 AND external_id = ?2",
                params![source.as_str(), external_id],
                |row| row.get(0),
            )
            .optional()?;
        payload
            .map(|text| serde_json::from_str(&text).map_err(StoreError::from))
            .transpose()
    }

    fn create_event(&self, fields: NewEvent) -> Result<StoredEvent, StoreError> {
        let event = StoredEvent {
            id: event_id(&fields),
            source: fields.source,
            external_id: trimmed_opt(fields.external_id),
            title: fields.title.trim().to_string(),
            description: fields.description,
            date: fields.date,
            time: trimmed_opt(fields.time),
            location: fields.location.trim().to_string(),
            source_url: trimmed_opt(fields.source_url),
            image_url: trimmed_opt(fields.image_url),
            category: fields.category,
            creator: fields.creator,
            likes: fields.likes,
            likes_count: fields.likes_count,
            status: fields.status,
            last_synced_at: fields.last_synced_at,
        };
        validate_event(&event)?;

        let now = Utc::now().to_rfc3339();
        let payload = serde_json::to_string(&event)?;
        let result = self.conn()?.execute(
            "INSERT INTO events (id, source, external_id, event_date_utc, payload, first_seen_utc, last_seen_utc)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                event.id,
                event.source.as_str(),
                event.external_id,
                event.date.to_rfc3339(),
                payload,
                now
            ],
        );
        match result {
            Ok(_) => Ok(event),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::Duplicate(format!(
                    "{}:{}",
                    event.source,
                    event.external_id.as_deref().unwrap_or_default()
                )))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn save_event(&self, event: &StoredEvent) -> Result<(), StoreError> {
        let mut event = event.clone();
        event.title = event.title.trim().to_string();
        event.location = event.location.trim().to_string();
        event.time = trimmed_opt(event.time);
        event.source_url = trimmed_opt(event.source_url);
        event.image_url = trimmed_opt(event.image_url);
        validate_event(&event)?;

        let payload = serde_json::to_string(&event)?;
        let changed = self.conn()?.execute(
            "UPDATE events SET payload = ?2, event_date_utc = ?3, last_seen_utc = ?4 WHERE id = ?1",
            params![event.id, payload, event.date.to_rfc3339(), Utc::now().to_rfc3339()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(event.id));
        }
        Ok(())
    }

    fn list_events(&self) -> Result<Vec<StoredEvent>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT payload FROM events ORDER BY event_date_utc, id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(serde_json::from_str(&row?)?);
        }
        Ok(out)
    }
}

impl CategoryStore for Store {
    fn find_by_name(&self, name: &str) -> Result<Option<Category>, StoreError> {
        self.find_category("SELECT id, name, slug, color FROM categories WHERE name = ?1", name)
    }

    fn find_by_slug(&self, slug: &str) -> Result<Option<Category>, StoreError> {
        self.find_category("SELECT id, name, slug, color FROM categories WHERE slug = ?1", slug)
    }

    fn create_category(&self, fields: NewCategory) -> Result<Category, StoreError> {
        let fields = validate_category(fields)?;
        let conn = self.conn()?;
        let result = conn.execute(
            "INSERT INTO categories (name, slug, color, created_at_utc) VALUES (?1, ?2, ?3, ?4)",
            params![fields.name, fields.slug, fields.color, Utc::now().to_rfc3339()],
        );
        match result {
            Ok(_) => Ok(Category {
                id: conn.last_insert_rowid(),
                name: fields.name,
                slug: fields.slug,
                color: fields.color,
            }),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::Duplicate(format!("category {}", fields.slug)))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, name, slug, color FROM categories ORDER BY name")?;
        let rows = stmt.query_map([], category_from_row)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

impl Store {
    fn find_category(&self, sql: &str, key: &str) -> Result<Option<Category>, StoreError> {
        Ok(self
            .conn()?
            .query_row(sql, params![key], category_from_row)
            .optional()?)
    }
}

/// Creates every taxonomy category whose slug is not yet present.
pub fn seed_categories(store: &dyn CategoryStore) -> Result<SeedSummary, StoreError> {
    let mut summary = SeedSummary::default();
    for (name, slug, color) in TAXONOMY {
        if store.find_by_slug(slug)?.is_some() {
            summary.existing.push(name.to_string());
            continue;
        }
        store.create_category(NewCategory::new(name, slug, color))?;
        tracing::debug!(category = name, "seeded category");
        summary.created.push(name.to_string());
    }
    Ok(summary)
}

fn category_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        color: row.get(3)?,
    })
}

/// External events hash their natural key so ids survive a rebuilt database.
fn event_id(fields: &NewEvent) -> String {
    let mut hasher = Sha256::new();
    hasher.update(fields.source.as_str().as_bytes());
    hasher.update(b"|");
    match fields.external_id.as_deref().map(str::trim) {
        Some(external_id) if fields.source.is_external() => {
            hasher.update(external_id.as_bytes());
        }
        _ => {
            hasher.update(fields.title.as_bytes());
            hasher.update(b"|");
            hasher.update(
                Utc::now()
                    .timestamp_nanos_opt()
                    .unwrap_or_default()
                    .to_string()
                    .as_bytes(),
            );
        }
    }
    format!("{:x}", hasher.finalize())
}

fn trimmed_opt(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_event(event: &StoredEvent) -> Result<(), StoreError> {
    if event.title.is_empty() {
        return Err(StoreError::Validation("Event title is required".into()));
    }
    if event.title.chars().count() > TITLE_LIMIT {
        return Err(StoreError::Validation(
            "Title cannot exceed 200 characters".into(),
        ));
    }
    if event.description.is_empty() {
        return Err(StoreError::Validation(
            "Event description is required".into(),
        ));
    }
    if event.description.chars().count() > DESCRIPTION_LIMIT {
        return Err(StoreError::Validation(
            "Description cannot exceed 2000 characters".into(),
        ));
    }
    if event.location.is_empty() {
        return Err(StoreError::Validation("Event location is required".into()));
    }
    if event.location.chars().count() > LOCATION_LIMIT {
        return Err(StoreError::Validation(
            "Location cannot exceed 200 characters".into(),
        ));
    }
    if event.source.is_external() && event.external_id.is_none() {
        return Err(StoreError::Validation(format!(
            "{} events require an external id",
            event.source
        )));
    }
    Ok(())
}

fn validate_category(fields: NewCategory) -> Result<NewCategory, StoreError> {
    let name = fields.name.trim().to_string();
    let slug = fields.slug.trim().to_lowercase();
    if name.is_empty() {
        return Err(StoreError::Validation("Category name is required".into()));
    }
    if name.chars().count() > CATEGORY_NAME_LIMIT {
        return Err(StoreError::Validation(
            "Category name cannot exceed 50 characters".into(),
        ));
    }
    if slug.is_empty() {
        return Err(StoreError::Validation("Category slug is required".into()));
    }
    if !COLOR_RE.is_match(&fields.color) {
        return Err(StoreError::Validation(
            "Please provide a valid hex color".into(),
        ));
    }
    Ok(NewCategory {
        name,
        slug,
        color: fields.color,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventStatus;
    use chrono::TimeZone;
    use std::collections::BTreeSet;

    fn general(store: &Store) -> Category {
        store
            .create_category(NewCategory::new("General", "general", "#6B7280"))
            .expect("create category")
    }

    fn new_event(external_id: &str, category: Category) -> NewEvent {
        NewEvent {
            source: EventSource::Ticketmaster,
            external_id: Some(external_id.to_string()),
            title: "  Jazz at the Maple Leaf ".to_string(),
            description: "Live brass band".to_string(),
            date: Utc.with_ymd_and_hms(2026, 11, 20, 0, 0, 0).unwrap(),
            time: Some("20:00:00".to_string()),
            location: "Maple Leaf Bar, New Orleans, LA".to_string(),
            source_url: Some("https://www.ticketmaster.com/event/1".to_string()),
            image_url: None,
            category,
            creator: None,
            likes: BTreeSet::new(),
            likes_count: 0,
            status: EventStatus::Upcoming,
            last_synced_at: Some(Utc::now()),
        }
    }

    #[test]
    fn created_event_is_found_by_natural_key() {
        let store = Store::open_in_memory().expect("open store");
        let category = general(&store);
        let created = store
            .create_event(new_event("tm1", category.clone()))
            .expect("create event");
        assert_eq!(created.title, "Jazz at the Maple Leaf");

        let found = store
            .find_by_source_and_external_id(EventSource::Ticketmaster, "tm1")
            .expect("lookup")
            .expect("event present");
        assert_eq!(found, created);
        assert_eq!(found.category, category);

        let other_source = store
            .find_by_source_and_external_id(EventSource::Eventbrite, "tm1")
            .expect("lookup");
        assert!(other_source.is_none());
    }

    #[test]
    fn external_ids_are_stable_hashes() {
        let store = Store::open_in_memory().expect("open store");
        let category = general(&store);
        let created = store
            .create_event(new_event("tm1", category.clone()))
            .expect("create event");
        assert_eq!(created.id, event_id(&new_event("tm1", category)));
        assert_eq!(created.id.len(), 64);
    }

    #[test]
    fn duplicate_natural_key_is_rejected() {
        let store = Store::open_in_memory().expect("open store");
        let category = general(&store);
        store
            .create_event(new_event("tm1", category.clone()))
            .expect("create event");
        let err = store
            .create_event(new_event("tm1", category))
            .expect_err("duplicate must fail");
        assert!(matches!(err, StoreError::Duplicate(_)));
        assert_eq!(store.list_events().expect("list").len(), 1);
    }

    #[test]
    fn validation_rejects_bad_fields() {
        let store = Store::open_in_memory().expect("open store");
        let category = general(&store);

        let mut missing_title = new_event("a", category.clone());
        missing_title.title = "   ".to_string();
        assert!(matches!(
            store.create_event(missing_title),
            Err(StoreError::Validation(_))
        ));

        let mut long_location = new_event("b", category.clone());
        long_location.location = "x".repeat(201);
        assert!(matches!(
            store.create_event(long_location),
            Err(StoreError::Validation(_))
        ));

        let mut long_description = new_event("c", category.clone());
        long_description.description = "d".repeat(2001);
        assert!(matches!(
            store.create_event(long_description),
            Err(StoreError::Validation(_))
        ));

        let mut empty_description = new_event("d", category);
        empty_description.description = String::new();
        assert!(matches!(
            store.create_event(empty_description),
            Err(StoreError::Validation(reason)) if reason == "Event description is required"
        ));
        assert!(store.list_events().expect("list").is_empty());
    }

    #[test]
    fn whitespace_description_is_stored_as_given() {
        let store = Store::open_in_memory().expect("open store");
        let mut event = new_event("tm1", general(&store));
        event.description = "   ".to_string();
        let created = store.create_event(event).expect("create event");
        assert_eq!(created.description, "   ");
    }

    #[test]
    fn save_overwrites_payload() {
        let store = Store::open_in_memory().expect("open store");
        let category = general(&store);
        let mut event = store
            .create_event(new_event("tm1", category))
            .expect("create event");
        event.title = "Renamed".to_string();
        event.likes_count = 3;
        store.save_event(&event).expect("save");

        let found = store
            .find_by_source_and_external_id(EventSource::Ticketmaster, "tm1")
            .expect("lookup")
            .expect("present");
        assert_eq!(found.title, "Renamed");
        assert_eq!(found.likes_count, 3);
    }

    #[test]
    fn save_of_unknown_event_fails() {
        let store = Store::open_in_memory().expect("open store");
        let category = general(&store);
        let mut event = store
            .create_event(new_event("tm1", category))
            .expect("create event");
        event.id = "missing".to_string();
        assert!(matches!(
            store.save_event(&event),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn category_lookup_and_validation() {
        let store = Store::open_in_memory().expect("open store");
        let created = store
            .create_category(NewCategory::new(" Music ", "MUSIC", "#FF6B6B"))
            .expect("create");
        assert_eq!(created.name, "Music");
        assert_eq!(created.slug, "music");
        assert_eq!(
            store.find_by_name("Music").expect("lookup"),
            Some(created.clone())
        );
        assert_eq!(store.find_by_slug("music").expect("lookup"), Some(created));
        assert!(store.find_by_name("music").expect("lookup").is_none());

        assert!(matches!(
            store.create_category(NewCategory::new("Bad", "bad", "red")),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            store.create_category(NewCategory::new("Music", "music-2", "#000000")),
            Err(StoreError::Duplicate(_))
        ));
    }

    #[test]
    fn seeding_is_idempotent() {
        let store = Store::open_in_memory().expect("open store");
        let first = seed_categories(&store).expect("seed");
        assert_eq!(first.created.len(), TAXONOMY.len());
        assert!(first.existing.is_empty());

        let second = seed_categories(&store).expect("seed again");
        assert!(second.created.is_empty());
        assert_eq!(second.existing.len(), TAXONOMY.len());
        assert_eq!(
            store.list_categories().expect("list").len(),
            TAXONOMY.len()
        );
    }

    #[test]
    fn categories_are_listed_by_name() {
        let store = Store::open_in_memory().expect("open store");
        seed_categories(&store).expect("seed");
        let names: Vec<String> = store
            .list_categories()
            .expect("list")
            .into_iter()
            .map(|category| category.name)
            .collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert_eq!(names[0], "Architecture");
    }
}
