use thiserror::Error;

/// Errors returned by the BigQuery REST client.
#[derive(Debug, Error)]
pub enum BigQueryError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response. `message` is the `error.message` field of the
    /// Google error envelope when present.
    #[error("unexpected HTTP status {status} from {url}: {message}")]
    UnexpectedStatus {
        status: u16,
        url: String,
        message: String,
    },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Credentials could not be loaded or exchanged for an access token.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// A result cell did not match its declared schema type.
    #[error("cannot decode column {column}: {reason}")]
    Decode { column: String, reason: String },

    /// The query job did not finish within the polling budget.
    #[error("query job {job_id} did not complete after {polls} polls")]
    JobIncomplete { job_id: String, polls: u32 },

    /// `insertAll` accepted the request but rejected individual rows.
    #[error("insertAll rejected {} row(s): {}", .0.len(), summarize(.0))]
    InsertRejected(Vec<RowInsertError>),

    #[error("invalid base URL \"{url}\": {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

/// One entry of an `insertAll` response's `insertErrors` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowInsertError {
    /// Index within the request's `rows` array.
    pub index: usize,
    pub reason: String,
    pub message: String,
}

fn summarize(errors: &[RowInsertError]) -> String {
    errors
        .iter()
        .map(|e| format!("row {} ({}: {})", e.index, e.reason, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}
