use thiserror::Error;

/// Errors from the Custom Search client.
///
/// Request URLs carry the API key, so none of these variants include one.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// `retry_after_secs` is the `Retry-After` header, when sent.
    #[error("rate limited by Custom Search")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("unexpected HTTP status {status} searching for \"{query}\"")]
    UnexpectedStatus { status: u16, query: String },

    #[error("invalid search API URL \"{url}\": {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

impl SearchError {
    /// Wraps a transport error with its URL (and so the API key) stripped.
    pub(crate) fn transport(err: reqwest::Error) -> Self {
        SearchError::Http(err.without_url())
    }
}
