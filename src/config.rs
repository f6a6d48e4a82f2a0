use std::{fs, path::Path, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::utils;

pub const DEFAULT_CITY: &str = "New Orleans";
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:3000";
pub const DEFAULT_TICKETMASTER_BASE_URL: &str = "https://app.ticketmaster.com/discovery/v2";
pub const DEFAULT_EVENTBRITE_BASE_URL: &str = "https://www.eventbriteapi.com/v3";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub ticketmaster_api_key: Option<String>,
    pub eventbrite_api_key: Option<String>,
    /// Shared secret the scheduler sends as `Authorization: Bearer <secret>`.
    pub cron_secret: Option<String>,
    pub sync_city: String,
    pub bind_address: String,
    pub database_path: Option<PathBuf>,
    pub ticketmaster_base_url: String,
    pub eventbrite_base_url: String,
    pub http_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ticketmaster_api_key: None,
            eventbrite_api_key: None,
            cron_secret: None,
            sync_city: DEFAULT_CITY.to_string(),
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            database_path: None,
            ticketmaster_base_url: DEFAULT_TICKETMASTER_BASE_URL.to_string(),
            eventbrite_base_url: DEFAULT_EVENTBRITE_BASE_URL.to_string(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

impl AppConfig {
    /// Reads the config file (if any), then applies environment overrides.
    pub fn load() -> Result<Self, String> {
        let path = std::env::var("LOCAL_EVENTS_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| utils::config_path());
        let config = read_config(&path)?;
        Ok(config.with_overrides(|key| std::env::var(key).ok()))
    }

    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(key) = non_empty("TICKETMASTER_API_KEY") {
            self.ticketmaster_api_key = Some(key);
        }
        if let Some(key) = non_empty("EVENTBRITE_API_KEY") {
            self.eventbrite_api_key = Some(key);
        }
        if let Some(secret) = non_empty("CRON_SECRET") {
            self.cron_secret = Some(secret);
        }
        if let Some(city) = non_empty("SYNC_CITY") {
            self.sync_city = city;
        }
        if let Some(addr) = non_empty("BIND_ADDRESS") {
            self.bind_address = addr;
        }
        if let Some(path) = non_empty("DATABASE_PATH") {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(url) = non_empty("TICKETMASTER_BASE_URL") {
            self.ticketmaster_base_url = url;
        }
        if let Some(url) = non_empty("EVENTBRITE_BASE_URL") {
            self.eventbrite_base_url = url;
        }
        if let Some(secs) = non_empty("HTTP_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
        {
            self.http_timeout_secs = secs;
        }
        self
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(utils::database_path)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn read_config(path: &Path) -> Result<AppConfig, String> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = fs::read_to_string(path).map_err(|err| err.to_string())?;
    serde_json::from_str(&contents).map_err(|err| format!("{}: {err}", path.display()))
}
