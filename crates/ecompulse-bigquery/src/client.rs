//! HTTP client for the BigQuery v2 REST API.
//!
//! Covers the two endpoints this workspace needs: `jobs.query` (standard SQL
//! with named parameters, polled until the job completes and paged until all
//! rows are read) and `tabledata.insertAll`.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::auth::TokenProvider;
use crate::error::{BigQueryError, RowInsertError};
use crate::rows::{decode_rows, RawRow, TableSchema};

const DEFAULT_BASE_URL: &str = "https://bigquery.googleapis.com/bigquery/v2/";
/// Server-side wait per `jobs.query` / `getQueryResults` call.
const QUERY_TIMEOUT_MS: u64 = 10_000;
/// `getQueryResults` calls allowed while the job is still running.
const MAX_POLLS: u32 = 30;
/// Result pages read before giving up on a runaway result set.
const MAX_PAGES: usize = 100;

/// A named query parameter in the REST API's `queryParameters` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParameter {
    pub name: String,
    pub parameter_type: ParameterType,
    pub parameter_value: ParameterValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterType {
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterValue {
    pub value: String,
}

/// A standard-SQL query plus its named parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub sql: String,
    pub parameters: Vec<QueryParameter>,
}

impl QueryRequest {
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            parameters: Vec::new(),
        }
    }

    fn with_param(mut self, name: &str, type_name: &str, value: String) -> Self {
        self.parameters.push(QueryParameter {
            name: name.to_string(),
            parameter_type: ParameterType {
                type_name: type_name.to_string(),
            },
            parameter_value: ParameterValue { value },
        });
        self
    }

    #[must_use]
    pub fn string_param(self, name: &str, value: &str) -> Self {
        self.with_param(name, "STRING", value.to_string())
    }

    #[must_use]
    pub fn int_param(self, name: &str, value: i64) -> Self {
        self.with_param(name, "INT64", value.to_string())
    }

    /// INT64 parameter given as decimal text, e.g. a category id read from
    /// config. Sent unchanged since INT64 values travel as strings anyway.
    #[must_use]
    pub fn int_text_param(self, name: &str, value: &str) -> Self {
        self.with_param(name, "INT64", value.to_string())
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.parameter_value.value.as_str())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryBody<'a> {
    query: &'a str,
    use_legacy_sql: bool,
    parameter_mode: &'static str,
    query_parameters: &'a [QueryParameter],
    timeout_ms: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: bool,
    #[serde(default)]
    job_reference: Option<JobReference>,
    #[serde(default)]
    schema: Option<TableSchema>,
    #[serde(default)]
    rows: Vec<RawRow>,
    #[serde(default)]
    page_token: Option<String>,
}

/// One row of an `insertAll` request. `insert_id` lets BigQuery drop
/// duplicates when the same row is sent twice within its dedup window.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertRow {
    pub insert_id: String,
    pub json: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllBody<'a> {
    kind: &'static str,
    skip_invalid_rows: bool,
    ignore_unknown_values: bool,
    rows: &'a [InsertRow],
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllResponse {
    #[serde(default)]
    insert_errors: Vec<InsertErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct InsertErrorEntry {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorProto,
}

/// Client for one BigQuery project.
///
/// Use [`BigQueryClient::new`] for production or
/// [`BigQueryClient::with_base_url`] to point at a mock server in tests.
pub struct BigQueryClient {
    http: Client,
    base_url: Url,
    project_id: String,
    auth: Arc<dyn TokenProvider>,
}

impl BigQueryClient {
    /// # Errors
    ///
    /// Returns [`BigQueryError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        project_id: &str,
        auth: Arc<dyn TokenProvider>,
        timeout_secs: u64,
    ) -> Result<Self, BigQueryError> {
        Self::with_base_url(project_id, auth, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom API root (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`BigQueryError::Http`] if the `reqwest::Client` cannot be
    /// constructed, or [`BigQueryError::InvalidBaseUrl`] if `base_url` does
    /// not parse.
    pub fn with_base_url(
        project_id: &str,
        auth: Arc<dyn TokenProvider>,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, BigQueryError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("ecompulse/0.1 (trend-analysis)")
            .build()?;

        // Exactly one trailing slash so `join` appends below the root.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| BigQueryError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            http,
            base_url,
            project_id: project_id.to_string(),
            auth,
        })
    }

    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Runs a query and returns every result row decoded against the result
    /// schema.
    ///
    /// # Errors
    ///
    /// - [`BigQueryError::UnexpectedStatus`] for a non-2xx response.
    /// - [`BigQueryError::JobIncomplete`] if the job outlives the poll budget.
    /// - [`BigQueryError::Decode`] if a cell does not match its column type.
    /// - [`BigQueryError::Http`] / [`BigQueryError::Auth`] on transport or
    ///   credential failures.
    pub async fn query(
        &self,
        request: &QueryRequest,
    ) -> Result<Vec<Map<String, Value>>, BigQueryError> {
        let url = self.endpoint(&format!("projects/{}/queries", self.project_id))?;
        let body = QueryBody {
            query: &request.sql,
            use_legacy_sql: false,
            parameter_mode: "NAMED",
            query_parameters: &request.parameters,
            timeout_ms: QUERY_TIMEOUT_MS,
        };

        let mut response: QueryResponse = self.post_json(&url, &body, "jobs.query").await?;
        let mut schema = response.schema.take();
        let mut raw_rows = std::mem::take(&mut response.rows);
        let mut polls = 0u32;
        let mut pages = 1usize;

        while !response.job_complete || response.page_token.is_some() {
            let job = response.job_reference.take().unwrap_or_default();
            if response.job_complete {
                pages += 1;
                if pages > MAX_PAGES {
                    tracing::warn!(
                        job_id = %job.job_id,
                        rows = raw_rows.len(),
                        "result page limit reached, truncating"
                    );
                    break;
                }
            } else {
                polls += 1;
                if polls > MAX_POLLS {
                    return Err(BigQueryError::JobIncomplete {
                        job_id: job.job_id,
                        polls: MAX_POLLS,
                    });
                }
                tracing::debug!(job_id = %job.job_id, polls, "query job still running");
            }

            let page_token = response.page_token.take();
            response = self.query_results(&job, page_token.as_deref()).await?;
            if response.job_reference.is_none() {
                response.job_reference = Some(job);
            }
            if schema.is_none() {
                schema = response.schema.take();
            }
            raw_rows.append(&mut response.rows);
        }

        let schema = schema.unwrap_or_default();
        tracing::debug!(rows = raw_rows.len(), "query returned");
        decode_rows(&schema, &raw_rows)
    }

    /// Runs a query and deserializes each decoded row into `T`.
    ///
    /// # Errors
    ///
    /// Everything [`BigQueryClient::query`] returns, plus
    /// [`BigQueryError::Deserialize`] when a row does not fit `T`.
    pub async fn query_as<T: DeserializeOwned>(
        &self,
        request: &QueryRequest,
        context: &str,
    ) -> Result<Vec<T>, BigQueryError> {
        self.query(request)
            .await?
            .into_iter()
            .map(|row| {
                serde_json::from_value(Value::Object(row)).map_err(|e| {
                    BigQueryError::Deserialize {
                        context: context.to_string(),
                        source: e,
                    }
                })
            })
            .collect()
    }

    async fn query_results(
        &self,
        job: &JobReference,
        page_token: Option<&str>,
    ) -> Result<QueryResponse, BigQueryError> {
        let mut url = self.endpoint(&format!(
            "projects/{}/queries/{}",
            self.project_id, job.job_id
        ))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("timeoutMs", &QUERY_TIMEOUT_MS.to_string());
            if let Some(location) = &job.location {
                pairs.append_pair("location", location);
            }
            if let Some(token) = page_token {
                pairs.append_pair("pageToken", token);
            }
        }

        let token = self.auth.access_token().await?;
        let response = self.http.get(url.clone()).bearer_auth(token).send().await?;
        Self::parse_response(response, &url, "jobs.getQueryResults").await
    }

    /// Streams `rows` into `dataset.table`.
    ///
    /// The call is all-or-nothing: invalid rows are not skipped, so any
    /// `insertErrors` in the response means nothing was written.
    ///
    /// # Errors
    ///
    /// - [`BigQueryError::InsertRejected`] when the response lists row errors.
    /// - [`BigQueryError::UnexpectedStatus`] for a non-2xx response.
    /// - [`BigQueryError::Http`] / [`BigQueryError::Auth`] on transport or
    ///   credential failures.
    pub async fn insert_all(
        &self,
        dataset_id: &str,
        table_id: &str,
        rows: &[InsertRow],
    ) -> Result<(), BigQueryError> {
        let url = self.endpoint(&format!(
            "projects/{}/datasets/{dataset_id}/tables/{table_id}/insertAll",
            self.project_id
        ))?;
        let body = InsertAllBody {
            kind: "bigquery#tableDataInsertAllRequest",
            skip_invalid_rows: false,
            ignore_unknown_values: false,
            rows,
        };

        let response: InsertAllResponse = self.post_json(&url, &body, "tabledata.insertAll").await?;
        if response.insert_errors.is_empty() {
            return Ok(());
        }

        let errors = response
            .insert_errors
            .into_iter()
            .map(|entry| {
                let first = entry.errors.into_iter().next().unwrap_or_default();
                RowInsertError {
                    index: entry.index,
                    reason: first.reason,
                    message: first.message,
                }
            })
            .collect();
        Err(BigQueryError::InsertRejected(errors))
    }

    fn endpoint(&self, path: &str) -> Result<Url, BigQueryError> {
        self.base_url
            .join(path)
            .map_err(|e| BigQueryError::InvalidBaseUrl {
                url: format!("{}{path}", self.base_url),
                reason: e.to_string(),
            })
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &Url,
        body: &B,
        context: &str,
    ) -> Result<T, BigQueryError> {
        let token = self.auth.access_token().await?;
        let response = self
            .http
            .post(url.clone())
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        Self::parse_response(response, url, context).await
    }

    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
        url: &Url,
        context: &str,
    ) -> Result<T, BigQueryError> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|envelope| envelope.error.message)
                .unwrap_or(text);
            return Err(BigQueryError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
                message,
            });
        }

        serde_json::from_str(&text).map_err(|e| BigQueryError::Deserialize {
            context: context.to_string(),
            source: e,
        })
    }
}
