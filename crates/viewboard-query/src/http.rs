//! HTTP client for the analytics endpoint.

use std::time::Duration;

use reqwest::header::CACHE_CONTROL;
use serde_json::Value;
use tracing::debug;
use url::Url;

use viewboard_core::analytics::AnalyticsData;
use viewboard_core::filter::QueryKey;

use crate::error::FetchError;
use crate::fetcher::{AnalyticsFetcher, FetchedAnalytics};

/// Fetches `GET <endpoint>?brands=..&products=..` with reqwest.
#[derive(Debug, Clone)]
pub struct HttpAnalyticsFetcher {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpAnalyticsFetcher {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport(format!("http client build failed: {e}")))?;
        Self::with_client(client, endpoint)
    }

    pub fn with_client(client: reqwest::Client, endpoint: &str) -> Result<Self, FetchError> {
        let endpoint = Url::parse(endpoint.trim())
            .map_err(|e| FetchError::InvalidUrl(format!("{endpoint}: {e}")))?;
        if endpoint.scheme() != "http" && endpoint.scheme() != "https" {
            return Err(FetchError::InvalidUrl(format!(
                "{endpoint}: scheme must be http or https"
            )));
        }
        Ok(Self { client, endpoint })
    }

    /// Endpoint URL with one `brands=` / `products=` pair per set member.
    pub fn request_url(&self, key: &QueryKey) -> Url {
        let mut url = self.endpoint.clone();
        let pairs = key.query_pairs();
        if !pairs.is_empty() {
            let mut query = url.query_pairs_mut();
            for (name, value) in pairs {
                query.append_pair(name, value);
            }
        }
        url
    }
}

#[async_trait::async_trait]
impl AnalyticsFetcher for HttpAnalyticsFetcher {
    async fn fetch(&self, key: &QueryKey) -> Result<FetchedAnalytics, FetchError> {
        let url = self.request_url(key);
        debug!(%url, "GET analytics");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        let max_age = response
            .headers()
            .get(CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_max_age);

        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Client {
                status: status.as_u16(),
                message: error_message(&body)
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_string()),
            });
        }
        if status.is_server_error() {
            return Err(FetchError::Server {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::UnexpectedStatus {
                status: status.as_u16(),
            });
        }

        let data: AnalyticsData = response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;
        Ok(FetchedAnalytics { data, max_age })
    }
}

/// Pull the human-readable message out of an error body.
///
/// Accepts both `{"error": "..."}` and `{"error": {"message": "..."}}`.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("error")? {
        Value::String(message) => Some(message.clone()),
        Value::Object(obj) => obj.get("message")?.as_str().map(str::to_string),
        _ => None,
    }
}

/// Freshness lifetime from a `Cache-Control` value: `max-age`, else `s-maxage`.
///
/// `no-store` and `no-cache` yield zero.
pub fn parse_max_age(header: &str) -> Option<Duration> {
    let mut max_age = None;
    let mut s_maxage = None;
    for directive in header.split(',') {
        let directive = directive.trim().to_ascii_lowercase();
        if directive == "no-store" || directive == "no-cache" {
            return Some(Duration::ZERO);
        }
        let Some((name, value)) = directive.split_once('=') else {
            continue;
        };
        let Ok(secs) = value.trim().trim_matches('"').parse::<u64>() else {
            continue;
        };
        match name.trim() {
            "max-age" => max_age = Some(secs),
            "s-maxage" => s_maxage = Some(secs),
            _ => {}
        }
    }
    max_age.or(s_maxage).map(Duration::from_secs)
}
