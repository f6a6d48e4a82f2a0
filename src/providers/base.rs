use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;

const USER_AGENT: &str = "local-events-sync/0.1";

pub fn http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|err| {
            tracing::warn!(error = %err, "falling back to default http client");
            Client::new()
        })
}

/// Sends the request, rejects non-success statuses and decodes the JSON body.
pub async fn fetch_json<T: DeserializeOwned>(request: RequestBuilder, label: &str) -> Result<T> {
    let response = request
        .send()
        .await
        .with_context(|| format!("request failed for {label}"))?;
    let response = response
        .error_for_status()
        .with_context(|| format!("non-success status for {label}"))?;
    response
        .json::<T>()
        .await
        .with_context(|| format!("unable to decode response body for {label}"))
}

pub fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Decodes each raw record on its own; malformed ones are logged and dropped.
pub fn decode_each<T: DeserializeOwned>(values: Vec<Value>, label: &str) -> Vec<T> {
    values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(index, error = %err, "skipping malformed {label} record");
                None
            }
        })
        .collect()
}

/// Empty or whitespace-only strings become `None`.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
