//! Ranking snapshot queries.
//!
//! Each query is built by a pure function so its SQL and parameters can be
//! checked without a server. Titles come back as the raw locale-tagged
//! `product_title` list and are resolved with
//! [`resolve_title`](ecompulse_core::resolve_title), so the current and
//! previous snapshots always use the same rule.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ecompulse_core::{
    resolve_title, BigQueryTarget, CategoryFilter, ImprovedRanking, LocalizedTitle,
    RankingSnapshot, TaskConfig, ALL_CATEGORIES_SENTINEL,
};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::client::{BigQueryClient, QueryRequest};
use crate::error::BigQueryError;

/// Row cap for the previous snapshot, independent of the task limit.
pub const PREVIOUS_SNAPSHOT_LIMIT: i64 = 100;

/// Parameters shared by every ranking query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankingQuery {
    pub country: String,
    pub category: CategoryFilter,
    pub limit: u32,
    pub days_back: u32,
}

impl RankingQuery {
    #[must_use]
    pub fn from_task(task: &TaskConfig) -> Self {
        Self {
            country: task.country.clone(),
            category: CategoryFilter::from_task_category(&task.category_id),
            limit: task.limit,
            days_back: task.days_back,
        }
    }

    /// The same query with the all-categories sentinel taken as a literal
    /// category id. Only the optimized table honors the sentinel.
    fn literal_category(&self) -> Self {
        match self.category {
            CategoryFilter::All => Self {
                category: CategoryFilter::Category(ALL_CATEGORIES_SENTINEL.to_string()),
                ..self.clone()
            },
            CategoryFilter::Category(_) => self.clone(),
        }
    }

    fn category_condition(&self) -> &'static str {
        match self.category {
            CategoryFilter::All => "",
            CategoryFilter::Category(_) => "AND ranking_category = @categoryId",
        }
    }

    fn base_request(&self, sql: String) -> QueryRequest {
        let request = QueryRequest::new(sql).string_param("country", &self.country);
        match &self.category {
            CategoryFilter::All => request,
            CategoryFilter::Category(id) => request.int_text_param("categoryId", id),
        }
    }
}

/// Latest snapshot for the query's country and category, best rank first.
#[must_use]
pub fn current_snapshot_query(table: &str, query: &RankingQuery) -> QueryRequest {
    let query = &query.literal_category();
    let category = query.category_condition();
    let sql = format!(
        "SELECT product_title, rank, relative_demand, rank_timestamp
FROM {table}
WHERE ranking_country = @country
  {category}
  AND rank_timestamp = (
    SELECT MAX(rank_timestamp)
    FROM {table}
    WHERE ranking_country = @country
      {category}
  )
ORDER BY rank ASC
LIMIT @limit"
    );
    query
        .base_request(sql)
        .int_param("limit", i64::from(query.limit))
}

/// Rows at least `days_back` days old, most recent first.
#[must_use]
pub fn previous_snapshot_query(table: &str, query: &RankingQuery) -> QueryRequest {
    let query = &query.literal_category();
    let category = query.category_condition();
    let sql = format!(
        "SELECT product_title, rank, relative_demand, rank_timestamp
FROM {table}
WHERE ranking_country = @country
  {category}
  AND rank_timestamp <= TIMESTAMP_SUB(CURRENT_TIMESTAMP(), INTERVAL @daysBack DAY)
ORDER BY rank_timestamp DESC, rank ASC
LIMIT @limit"
    );
    query
        .base_request(sql)
        .int_param("daysBack", i64::from(query.days_back))
        .int_param("limit", PREVIOUS_SNAPSHOT_LIMIT)
}

/// Rows of the latest snapshot in the optimized table that moved up,
/// largest improvement first. [`CategoryFilter::All`] drops the category
/// condition here.
#[must_use]
pub fn improved_rankings_query(table: &str, query: &RankingQuery) -> QueryRequest {
    let category = query.category_condition();
    let sql = format!(
        "SELECT product_title, rank AS current_rank, rank_improvement,
  relative_demand AS current_relative_demand, rank_timestamp, ranking_category
FROM {table}
WHERE ranking_country = @country
  {category}
  AND rank_improvement > 0
  AND rank_timestamp = (
    SELECT MAX(rank_timestamp)
    FROM {table}
    WHERE ranking_country = @country
      {category}
  )
ORDER BY rank_improvement DESC
LIMIT @limit"
    );
    query
        .base_request(sql)
        .int_param("limit", i64::from(query.limit))
}

#[derive(Debug, Deserialize)]
struct SnapshotRow {
    #[serde(default)]
    product_title: Option<Vec<LocalizedTitle>>,
    rank: i64,
    #[serde(default)]
    relative_demand: Option<f64>,
    rank_timestamp: DateTime<Utc>,
}

impl SnapshotRow {
    fn into_snapshot(self) -> Option<RankingSnapshot> {
        let title = resolve_title(self.product_title.as_deref().unwrap_or_default())?;
        Some(RankingSnapshot {
            product_title: title,
            rank: self.rank,
            relative_demand: self.relative_demand.unwrap_or(f64::NAN),
            timestamp: self.rank_timestamp,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ImprovedRow {
    #[serde(default)]
    product_title: Option<Vec<LocalizedTitle>>,
    current_rank: i64,
    rank_improvement: i64,
    #[serde(default)]
    current_relative_demand: Option<f64>,
    #[serde(default)]
    rank_timestamp: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "string_or_number")]
    ranking_category: Option<String>,
}

impl ImprovedRow {
    fn into_ranking(self) -> Option<ImprovedRanking> {
        let title = resolve_title(self.product_title.as_deref().unwrap_or_default())?;
        Some(ImprovedRanking {
            product_title: title,
            current_rank: self.current_rank,
            rank_improvement: self.rank_improvement,
            current_relative_demand: self.current_relative_demand,
            rank_timestamp: self.rank_timestamp,
            ranking_category: self.ranking_category,
        })
    }
}

/// `ranking_category` is an integer column in some tables and a string in
/// others.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Drops rows whose title list resolves to nothing; they cannot be joined.
fn keep_titled<R, T>(rows: Vec<R>, convert: fn(R) -> Option<T>, context: &str) -> Vec<T> {
    let total = rows.len();
    let kept: Vec<T> = rows.into_iter().filter_map(convert).collect();
    if kept.len() < total {
        tracing::warn!(
            context,
            dropped = total - kept.len(),
            "skipping ranking rows without a product title"
        );
    }
    kept
}

/// Read access to ranking snapshots.
#[async_trait]
pub trait RankingSource: Send + Sync {
    /// # Errors
    ///
    /// Returns [`BigQueryError`] if the query fails; no partial results.
    async fn current_snapshot(
        &self,
        query: &RankingQuery,
    ) -> Result<Vec<RankingSnapshot>, BigQueryError>;

    /// # Errors
    ///
    /// Returns [`BigQueryError`] if the query fails; no partial results.
    async fn previous_snapshot(
        &self,
        query: &RankingQuery,
    ) -> Result<Vec<RankingSnapshot>, BigQueryError>;

    /// # Errors
    ///
    /// Returns [`BigQueryError`] if the query fails; no partial results.
    async fn improved_rankings(
        &self,
        query: &RankingQuery,
    ) -> Result<Vec<ImprovedRanking>, BigQueryError>;
}

/// The current and previous snapshots for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshots {
    pub current: Vec<RankingSnapshot>,
    pub previous: Vec<RankingSnapshot>,
}

/// Fetch both snapshots, current first. Either failure aborts the fetch.
///
/// # Errors
///
/// Returns the first [`BigQueryError`] raised by `source`.
pub async fn fetch_snapshots<S: RankingSource + ?Sized>(
    source: &S,
    query: &RankingQuery,
) -> Result<Snapshots, BigQueryError> {
    let current = source.current_snapshot(query).await?;
    tracing::info!(
        country = %query.country,
        category = ?query.category,
        rows = current.len(),
        "fetched current rankings"
    );

    let previous = source.previous_snapshot(query).await?;
    tracing::info!(
        country = %query.country,
        days_back = query.days_back,
        rows = previous.len(),
        "fetched previous rankings"
    );

    Ok(Snapshots { current, previous })
}

/// [`RankingSource`] backed by BigQuery tables.
pub struct BigQueryRankingSource {
    client: Arc<BigQueryClient>,
    ranking_table: String,
    optimized_table: String,
}

impl BigQueryRankingSource {
    #[must_use]
    pub fn new(client: Arc<BigQueryClient>, target: &BigQueryTarget) -> Self {
        Self {
            client,
            ranking_table: target.qualified(&target.table_id),
            optimized_table: target.qualified(&target.optimized_table_id),
        }
    }

    async fn snapshot(
        &self,
        request: QueryRequest,
        context: &str,
    ) -> Result<Vec<RankingSnapshot>, BigQueryError> {
        tracing::debug!(sql = %request.sql, context, "running ranking query");
        let rows: Vec<SnapshotRow> = self.client.query_as(&request, context).await?;
        Ok(keep_titled(rows, SnapshotRow::into_snapshot, context))
    }
}

#[async_trait]
impl RankingSource for BigQueryRankingSource {
    async fn current_snapshot(
        &self,
        query: &RankingQuery,
    ) -> Result<Vec<RankingSnapshot>, BigQueryError> {
        let request = current_snapshot_query(&self.ranking_table, query);
        self.snapshot(request, "current rankings").await
    }

    async fn previous_snapshot(
        &self,
        query: &RankingQuery,
    ) -> Result<Vec<RankingSnapshot>, BigQueryError> {
        let request = previous_snapshot_query(&self.ranking_table, query);
        self.snapshot(request, "previous rankings").await
    }

    async fn improved_rankings(
        &self,
        query: &RankingQuery,
    ) -> Result<Vec<ImprovedRanking>, BigQueryError> {
        let request = improved_rankings_query(&self.optimized_table, query);
        tracing::debug!(sql = %request.sql, "running rank improvement query");
        let rows: Vec<ImprovedRow> = self.client.query_as(&request, "rank improvement").await?;
        Ok(keep_titled(rows, ImprovedRow::into_ranking, "rank improvement"))
    }
}
