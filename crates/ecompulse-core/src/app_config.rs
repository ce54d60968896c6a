use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Where BigQuery credentials come from.
///
/// Resolution order when loading from env: inline service-account JSON,
/// then a key file path, then a pre-issued access token.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialsSource {
    /// `GCP_SERVICE_ACCOUNT_JSON`: the full service-account key document.
    InlineJson(String),
    /// `GOOGLE_APPLICATION_CREDENTIALS`: path to a service-account key file.
    KeyFile(PathBuf),
    /// `BIGQUERY_ACCESS_TOKEN`: an OAuth2 bearer token, e.g. from
    /// `gcloud auth print-access-token`. Not refreshed.
    AccessToken(String),
}

impl std::fmt::Debug for CredentialsSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialsSource::InlineJson(_) => f.write_str("InlineJson([redacted])"),
            CredentialsSource::KeyFile(path) => f.debug_tuple("KeyFile").field(path).finish(),
            CredentialsSource::AccessToken(_) => f.write_str("AccessToken([redacted])"),
        }
    }
}

/// Fully-qualified location of the source ranking table and the dataset
/// that receives analysis results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BigQueryTarget {
    pub project_id: String,
    pub dataset_id: String,
    /// Ranking table read by the momentum and week-rank pipelines.
    pub table_id: String,
    /// Ranking table with a precomputed `rank_improvement` column.
    pub optimized_table_id: String,
    pub momentum_table: String,
    pub week_rank_table: String,
}

impl BigQueryTarget {
    /// Backtick-quoted `project.dataset.table` reference for standard SQL.
    #[must_use]
    pub fn qualified(&self, table: &str) -> String {
        format!("`{}.{}.{table}`", self.project_id, self.dataset_id)
    }
}

/// Per-run task parameters, the `TASK_*` variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskConfig {
    pub country: String,
    pub category_id: String,
    pub limit: u32,
    pub days_back: u32,
    /// Delay inserted between consecutive image searches.
    pub delay_between_requests_ms: u64,
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    pub bigquery: BigQueryTarget,
    pub credentials: CredentialsSource,
    pub search_api_key: String,
    pub search_engine_id: String,
    pub task: TaskConfig,
    pub http_timeout_secs: u64,
    pub search_concurrency: usize,
    pub search_max_retries: u32,
    pub search_retry_backoff_base_ms: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("bigquery", &self.bigquery)
            .field("credentials", &self.credentials)
            .field("search_api_key", &"[redacted]")
            .field("search_engine_id", &self.search_engine_id)
            .field("task", &self.task)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("search_concurrency", &self.search_concurrency)
            .field("search_max_retries", &self.search_max_retries)
            .field(
                "search_retry_backoff_base_ms",
                &self.search_retry_backoff_base_ms,
            )
            .finish()
    }
}
