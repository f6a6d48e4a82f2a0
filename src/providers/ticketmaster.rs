use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::base;
use super::ProviderAdapter;
use crate::config::AppConfig;
use crate::models::{EventSource, NormalizedExternalEvent};
use crate::utils;

const PROVIDER_ID: &str = "ticketmaster";
const PROVIDER_NAME: &str = "Ticketmaster";
const SEGMENTS: [&str; 5] = ["Music", "Sports", "Arts & Theatre", "Film", "Miscellaneous"];
const PAGE_SIZE: &str = "20";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "_embedded")]
    embedded: Option<SearchEmbedded>,
}

#[derive(Debug, Deserialize)]
struct SearchEmbedded {
    #[serde(default)]
    events: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    id: String,
    name: String,
    info: Option<String>,
    dates: Option<RawDates>,
    #[serde(default)]
    classifications: Vec<Classification>,
    #[serde(default)]
    images: Vec<RawImage>,
    #[serde(rename = "_embedded")]
    embedded: Option<RawEventEmbedded>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDates {
    start: Option<RawStart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStart {
    local_date: Option<String>,
    local_time: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Classification {
    segment: Option<Named>,
    genre: Option<Named>,
    sub_genre: Option<Named>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawImage {
    url: Option<String>,
    #[serde(default)]
    width: u32,
}

#[derive(Debug, Deserialize)]
struct RawEventEmbedded {
    #[serde(default)]
    venues: Vec<RawVenue>,
}

#[derive(Debug, Deserialize)]
struct RawVenue {
    name: Option<String>,
    city: Option<Named>,
    state: Option<RawState>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawState {
    state_code: Option<String>,
}

pub struct Ticketmaster {
    api_key: Option<String>,
    base_url: String,
    client: Client,
}

impl Ticketmaster {
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.ticketmaster_api_key.clone(),
            &config.ticketmaster_base_url,
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

    /// One query per segment; an event listed under several segments is kept once.
    async fn fetch_segments(&self, api_key: &str, city: &str) -> Vec<RawEvent> {
        let url = base::endpoint(&self.base_url, "events.json");
        let mut seen = HashSet::new();
        let mut events = Vec::new();

        for segment in SEGMENTS {
            let request = self.client.get(&url).query(&[
                ("city", city),
                ("segmentName", segment),
                ("apikey", api_key),
                ("size", PAGE_SIZE),
                ("sort", "date,asc"),
            ]);
            let label = format!("ticketmaster segment {segment}");
            match base::fetch_json::<SearchResponse>(request, &label).await {
                Ok(page) => {
                    let page_events: Vec<RawEvent> = base::decode_each(
                        page.embedded.map(|e| e.events).unwrap_or_default(),
                        "ticketmaster event",
                    );
                    debug!(segment, count = page_events.len(), "ticketmaster segment fetched");
                    events.extend(
                        page_events
                            .into_iter()
                            .filter(|event| seen.insert(event.id.clone())),
                    );
                }
                Err(err) => {
                    warn!(segment, error = %format!("{err:#}"), "ticketmaster segment failed");
                }
            }
        }

        events
    }
}

#[async_trait]
impl ProviderAdapter for Ticketmaster {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn source(&self) -> EventSource {
        EventSource::Ticketmaster
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn fetch(&self, location_query: &str) -> Vec<NormalizedExternalEvent> {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!("Ticketmaster API key not configured");
            return Vec::new();
        };

        let raw = self.fetch_segments(api_key, location_query).await;
        if raw.is_empty() {
            info!(city = location_query, "no ticketmaster events found");
            return Vec::new();
        }

        let events = normalize(raw, location_query);
        info!(count = events.len(), "ticketmaster events fetched");
        events
    }
}

fn normalize(raw: Vec<RawEvent>, city: &str) -> Vec<NormalizedExternalEvent> {
    raw.into_iter()
        .filter_map(|event| {
            let id = event.id.clone();
            let mapped = normalize_event(event, city);
            if mapped.is_none() {
                debug!(external_id = %id, "dropping ticketmaster event without a start date");
            }
            mapped
        })
        .collect()
}

fn normalize_event(event: RawEvent, city: &str) -> Option<NormalizedExternalEvent> {
    let start = event.dates.and_then(|dates| dates.start)?;
    let local_date = NaiveDate::parse_from_str(start.local_date.as_deref()?.trim(), "%Y-%m-%d").ok()?;
    let date = Utc.from_utc_datetime(&local_date.and_hms_opt(0, 0, 0)?);

    let classification = event.classifications.into_iter().next();
    let category_hint = map_to_category(classification.as_ref()).to_string();

    let description = match base::non_blank(event.info.as_deref()) {
        Some(info) => info.to_string(),
        None => describe(classification.as_ref(), city),
    };

    let location = event
        .embedded
        .and_then(|embedded| embedded.venues.into_iter().next())
        .map(|venue| {
            utils::join_present(&[
                venue.name.as_deref(),
                venue.city.as_ref().and_then(|c| c.name.as_deref()),
                venue.state.as_ref().and_then(|s| s.state_code.as_deref()),
            ])
        })
        .filter(|location| !location.is_empty())
        .unwrap_or_else(|| city.to_string());

    Some(NormalizedExternalEvent {
        external_id: event.id,
        source: EventSource::Ticketmaster,
        title: utils::clean_text(&event.name),
        description,
        date,
        time: base::non_blank(start.local_time.as_deref()).map(str::to_string),
        location,
        source_url: event.url.unwrap_or_default(),
        image_url: select_image(&event.images),
        category_hint,
    })
}

fn name_of(named: Option<&Named>) -> &str {
    named.and_then(|n| n.name.as_deref()).unwrap_or("")
}

/// Maps segment/genre/subgenre onto the local taxonomy. First matching rule wins.
fn map_to_category(classification: Option<&Classification>) -> &'static str {
    let empty = Classification::default();
    let classification = classification.unwrap_or(&empty);
    let segment = name_of(classification.segment.as_ref()).to_lowercase();
    let genre = name_of(classification.genre.as_ref()).to_lowercase();
    let sub_genre = name_of(classification.sub_genre.as_ref()).to_lowercase();

    if segment == "music" || genre.contains("music") {
        "Music"
    } else if segment == "arts"
        || genre.contains("art")
        || genre.contains("visual arts")
        || genre.contains("museums")
        || genre.contains("dance")
        || sub_genre.contains("ballet")
    {
        "Arts & Culture"
    } else if segment == "arts & theatre"
        || genre.contains("theatre")
        || genre.contains("theater")
        || sub_genre.contains("musical")
        || sub_genre.contains("play")
    {
        "Theater"
    } else if genre.contains("comedy") {
        "Comedy"
    } else if segment == "sports" {
        "Sports"
    } else if genre.contains("family") || genre.contains("children") || sub_genre.contains("kids")
    {
        "Family & Kids"
    } else if genre.contains("festival") || sub_genre.contains("festival") {
        "Festivals"
    } else if genre.contains("fashion") {
        "Fashion"
    } else if genre.contains("business")
        || genre.contains("conference")
        || sub_genre.contains("tech")
    {
        "Business"
    } else {
        "General"
    }
}

/// Prefers an image at least 1024px wide, then 640px, then whatever comes first.
fn select_image(images: &[RawImage]) -> Option<String> {
    images
        .iter()
        .filter(|image| image.url.is_some())
        .find(|image| image.width >= 1024)
        .or_else(|| {
            images
                .iter()
                .filter(|image| image.url.is_some())
                .find(|image| image.width >= 640)
        })
        .or_else(|| images.iter().find(|image| image.url.is_some()))
        .and_then(|image| image.url.clone())
}

fn describe(classification: Option<&Classification>, city: &str) -> String {
    let segment = classification
        .and_then(|c| base::non_blank(c.segment.as_ref().and_then(|s| s.name.as_deref())))
        .unwrap_or("Event");
    let genre = classification
        .and_then(|c| base::non_blank(c.genre.as_ref().and_then(|g| g.name.as_deref())));
    let sub_genre = classification
        .and_then(|c| base::non_blank(c.sub_genre.as_ref().and_then(|g| g.name.as_deref())));

    let mut description = segment.to_string();
    if let Some(genre) = genre {
        description.push_str(&format!(" - {genre}"));
    }
    if let Some(sub_genre) = sub_genre {
        description.push_str(&format!(" ({sub_genre})"));
    }
    description.push_str(&format!(" in {city}"));
    description
}
