//! HTTP client for the Google Custom Search JSON API, image mode.

use std::time::Duration;

use async_trait::async_trait;
use ecompulse_core::ImageMatch;
use reqwest::{Client, StatusCode, Url};

use crate::error::SearchError;
use crate::rate_limit::retry_with_backoff;
use crate::types::SearchResponse;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/";

/// Looks up one image for a product title.
#[async_trait]
pub trait ImageSearch: Send + Sync {
    /// `Ok(None)` when the search ran but returned nothing usable.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] for transport failures and non-2xx responses.
    async fn search_image(&self, query: &str) -> Result<Option<ImageMatch>, SearchError>;
}

/// Custom Search client bound to one API key and search engine.
///
/// Transient errors (429, network failures) are retried with back-off up to
/// `max_retries` additional attempts.
pub struct CustomSearchClient {
    client: Client,
    base_url: Url,
    api_key: String,
    engine_id: String,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl CustomSearchClient {
    /// # Errors
    ///
    /// Returns [`SearchError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        api_key: &str,
        engine_id: &str,
        timeout_secs: u64,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, SearchError> {
        Self::with_base_url(
            api_key,
            engine_id,
            timeout_secs,
            max_retries,
            backoff_base_ms,
            DEFAULT_BASE_URL,
        )
    }

    /// Creates a client with a custom API root (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Http`] if the `reqwest::Client` cannot be
    /// constructed, or [`SearchError::InvalidBaseUrl`] if `base_url` does not
    /// parse.
    pub fn with_base_url(
        api_key: &str,
        engine_id: &str,
        timeout_secs: u64,
        max_retries: u32,
        backoff_base_ms: u64,
        base_url: &str,
    ) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("ecompulse/0.1 (image-enrichment)")
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| SearchError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.to_string(),
            engine_id: engine_id.to_string(),
            max_retries,
            backoff_base_ms,
        })
    }

    /// Builds the `customsearch/v1` URL for an image query. Contains the
    /// API key, so it must never be logged.
    fn search_url(&self, query: &str) -> Result<Url, SearchError> {
        let mut url =
            self.base_url
                .join("customsearch/v1")
                .map_err(|e| SearchError::InvalidBaseUrl {
                    url: self.base_url.to_string(),
                    reason: e.to_string(),
                })?;
        url.query_pairs_mut()
            .append_pair("key", &self.api_key)
            .append_pair("cx", &self.engine_id)
            .append_pair("q", query)
            .append_pair("searchType", "image")
            .append_pair("num", "1");
        Ok(url)
    }

    async fn search_once(&self, url: &Url, query: &str) -> Result<Option<ImageMatch>, SearchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(SearchError::transport)?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok());
            return Err(SearchError::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            return Err(SearchError::UnexpectedStatus {
                status: status.as_u16(),
                query: query.to_string(),
            });
        }

        let body = response.text().await.map_err(SearchError::transport)?;
        let parsed =
            serde_json::from_str::<SearchResponse>(&body).map_err(|e| SearchError::Deserialize {
                context: format!("image search for \"{query}\""),
                source: e,
            })?;
        Ok(parsed.first_match())
    }
}

#[async_trait]
impl ImageSearch for CustomSearchClient {
    async fn search_image(&self, query: &str) -> Result<Option<ImageMatch>, SearchError> {
        let url = self.search_url(query)?;
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.search_once(&url, query)
        })
        .await
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
