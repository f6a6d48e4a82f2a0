use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::base;
use super::ProviderAdapter;
use crate::config::AppConfig;
use crate::models::{EventSource, NormalizedExternalEvent};
use crate::utils;

const PROVIDER_ID: &str = "eventbrite";
const PROVIDER_NAME: &str = "Eventbrite";
const MAX_EVENTS: usize = 20;
const NO_DESCRIPTION: &str = "No description available";

#[derive(Debug, Deserialize)]
struct OrganizationsResponse {
    #[serde(default)]
    organizations: Vec<Organization>,
}

#[derive(Debug, Deserialize)]
struct Organization {
    id: String,
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    events: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    id: String,
    name: Option<RawText>,
    description: Option<RawText>,
    start: Option<RawStart>,
    venue: Option<RawVenue>,
    url: Option<String>,
    category: Option<RawCategory>,
}

#[derive(Debug, Deserialize)]
struct RawText {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawStart {
    local: Option<String>,
    timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawVenue {
    name: Option<String>,
    address: Option<RawAddress>,
}

#[derive(Debug, Deserialize)]
struct RawAddress {
    city: Option<String>,
    region: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCategory {
    name: Option<String>,
}

pub struct Eventbrite {
    api_key: Option<String>,
    base_url: String,
    client: Client,
}

impl Eventbrite {
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.eventbrite_api_key.clone(),
            &config.eventbrite_base_url,
            base::http_client(config.http_timeout()),
        )
    }

    pub fn new(api_key: Option<String>, base_url: &str, client: Client) -> Self {
        Self {
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            base_url: base_url.to_string(),
            client,
        }
    }

    async fn try_fetch(&self, api_key: &str, city: &str) -> Result<Vec<NormalizedExternalEvent>> {
        let request = self
            .client
            .get(base::endpoint(&self.base_url, "users/me/organizations/"))
            .bearer_auth(api_key);
        let orgs: OrganizationsResponse =
            base::fetch_json(request, "eventbrite organizations").await?;

        let Some(organization) = orgs.organizations.into_iter().next() else {
            info!("no eventbrite organizations found for this account");
            return Ok(self.search_public(city));
        };
        debug!(organization = %organization.id, "eventbrite organization resolved");

        let request = self
            .client
            .get(base::endpoint(
                &self.base_url,
                &format!("organizations/{}/events/", organization.id),
            ))
            .query(&[
                ("status", "live"),
                ("time_filter", "current_future"),
                ("expand", "venue,category"),
            ])
            .bearer_auth(api_key);
        let page: EventsResponse = match base::fetch_json(request, "eventbrite events").await {
            Ok(page) => page,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "eventbrite events request failed");
                return Ok(self.search_public(city));
            }
        };

        if page.events.is_empty() {
            info!("no live eventbrite events found");
            return Ok(self.search_public(city));
        }

        let raw: Vec<RawEvent> = base::decode_each(page.events, "eventbrite event");
        Ok(normalize(raw, city))
    }

    // TODO: query a public search endpoint once the account has the permissions for it.
    fn search_public(&self, city: &str) -> Vec<NormalizedExternalEvent> {
        info!(
            city,
            "eventbrite public event search requires additional API permissions; skipping"
        );
        Vec::new()
    }
}

#[async_trait]
impl ProviderAdapter for Eventbrite {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn source(&self) -> EventSource {
        EventSource::Eventbrite
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn fetch(&self, location_query: &str) -> Vec<NormalizedExternalEvent> {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!("Eventbrite API key not configured - skipping Eventbrite sync");
            return Vec::new();
        };

        match self.try_fetch(api_key, location_query).await {
            Ok(events) => {
                info!(count = events.len(), "eventbrite events fetched");
                events
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "eventbrite fetch failed");
                Vec::new()
            }
        }
    }
}

fn normalize(raw: Vec<RawEvent>, city: &str) -> Vec<NormalizedExternalEvent> {
    raw.into_iter()
        .take(MAX_EVENTS)
        .filter_map(|event| {
            let id = event.id.clone();
            let mapped = normalize_event(event, city);
            if mapped.is_none() {
                debug!(external_id = %id, "dropping eventbrite event with unreadable start");
            }
            mapped
        })
        .collect()
}

fn normalize_event(event: RawEvent, city: &str) -> Option<NormalizedExternalEvent> {
    let start = event.start?;
    let local =
        NaiveDateTime::parse_from_str(start.local.as_deref()?.trim(), "%Y-%m-%dT%H:%M:%S").ok()?;
    let date = resolve_local(local, start.timezone.as_deref());

    let text = |value: Option<RawText>| value.and_then(|t| t.text);
    let title = text(event.name).map(|t| utils::clean_text(&t)).unwrap_or_default();
    let description = text(event.description)
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| NO_DESCRIPTION.to_string());

    let location = event
        .venue
        .map(|venue| {
            let address = venue.address.as_ref();
            utils::join_present(&[
                venue.name.as_deref(),
                address.and_then(|a| a.city.as_deref()),
                address.and_then(|a| a.region.as_deref()),
            ])
        })
        .filter(|location| !location.is_empty())
        .unwrap_or_else(|| city.to_string());

    let category_hint = event
        .category
        .and_then(|c| c.name)
        .map(|name| name.trim().to_string())
        .unwrap_or_default();

    Some(NormalizedExternalEvent {
        external_id: event.id,
        source: EventSource::Eventbrite,
        title,
        description,
        date,
        time: Some(local.format("%H:%M:%S").to_string()),
        location,
        source_url: event.url.unwrap_or_default(),
        image_url: None,
        category_hint,
    })
}

/// Reads a wall-clock start in its IANA zone; unknown zones are taken as UTC.
fn resolve_local(local: NaiveDateTime, timezone: Option<&str>) -> DateTime<Utc> {
    let Some(tz) = timezone.and_then(|name| name.parse::<Tz>().ok()) else {
        return Utc.from_utc_datetime(&local);
    };
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        LocalResult::None => Utc.from_utc_datetime(&local),
    }
}
