//! Fakes for the pipeline tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use ecompulse_bigquery::{BigQueryError, InsertRow, RankingQuery, RankingSource, RowSink};
use ecompulse_core::{
    AppConfig, BigQueryTarget, CredentialsSource, Environment, ImageMatch, ImprovedRanking,
    RankingSnapshot, TaskConfig,
};
use ecompulse_search::{EnrichOptions, ImageSearch, SearchError};
use serde_json::Value;

pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        env: Environment::Test,
        log_level: "info".to_string(),
        bigquery: BigQueryTarget {
            project_id: "proj".to_string(),
            dataset_id: "merchant".to_string(),
            table_id: "BestSellers_TopProducts".to_string(),
            optimized_table_id: "BestSellers_TopProducts_Optimized".to_string(),
            momentum_table: "product_momentum_analysis".to_string(),
            week_rank_table: "product_week_rank_enriched".to_string(),
        },
        credentials: CredentialsSource::AccessToken("ya29.test".to_string()),
        search_api_key: "search-key".to_string(),
        search_engine_id: "engine-1".to_string(),
        task: test_task(),
        http_timeout_secs: 5,
        search_concurrency: 1,
        search_max_retries: 0,
        search_retry_backoff_base_ms: 0,
    }
}

pub(crate) fn test_task() -> TaskConfig {
    TaskConfig {
        country: "US".to_string(),
        category_id: "1253".to_string(),
        limit: 10,
        days_back: 7,
        delay_between_requests_ms: 0,
    }
}

pub(crate) fn no_delay() -> EnrichOptions {
    EnrichOptions::new(0, 1)
}

pub(crate) fn snap(title: &str, rank: i64, demand: f64) -> RankingSnapshot {
    RankingSnapshot {
        product_title: title.to_string(),
        rank,
        relative_demand: demand,
        timestamp: Utc.with_ymd_and_hms(2026, 3, 8, 0, 0, 0).unwrap(),
    }
}

pub(crate) fn improved(title: &str, rank: i64, improvement: i64, category: &str) -> ImprovedRanking {
    ImprovedRanking {
        product_title: title.to_string(),
        current_rank: rank,
        rank_improvement: improvement,
        current_relative_demand: Some(0.5),
        rank_timestamp: None,
        ranking_category: Some(category.to_string()),
    }
}

fn query_failed() -> BigQueryError {
    BigQueryError::UnexpectedStatus {
        status: 500,
        url: "http://fake/queries".to_string(),
        message: "backend error".to_string(),
    }
}

#[derive(Default)]
pub(crate) struct FakeRankings {
    pub(crate) current: Vec<RankingSnapshot>,
    pub(crate) previous: Vec<RankingSnapshot>,
    pub(crate) improved: Vec<ImprovedRanking>,
    pub(crate) fail_current: bool,
    pub(crate) queries: Mutex<Vec<RankingQuery>>,
}

#[async_trait]
impl RankingSource for FakeRankings {
    async fn current_snapshot(
        &self,
        query: &RankingQuery,
    ) -> Result<Vec<RankingSnapshot>, BigQueryError> {
        self.queries.lock().unwrap().push(query.clone());
        if self.fail_current {
            return Err(query_failed());
        }
        Ok(self.current.clone())
    }

    async fn previous_snapshot(
        &self,
        query: &RankingQuery,
    ) -> Result<Vec<RankingSnapshot>, BigQueryError> {
        self.queries.lock().unwrap().push(query.clone());
        Ok(self.previous.clone())
    }

    async fn improved_rankings(
        &self,
        query: &RankingQuery,
    ) -> Result<Vec<ImprovedRanking>, BigQueryError> {
        self.queries.lock().unwrap().push(query.clone());
        Ok(self.improved.clone())
    }
}

/// Finds an image for every title except those listed in `failing`.
#[derive(Default)]
pub(crate) struct FakeSearch {
    pub(crate) failing: Vec<String>,
    pub(crate) calls: Mutex<Vec<String>>,
}

impl FakeSearch {
    pub(crate) fn failing(title: &str) -> Self {
        Self {
            failing: vec![title.to_string()],
            ..Self::default()
        }
    }
}

#[async_trait]
impl ImageSearch for FakeSearch {
    async fn search_image(&self, query: &str) -> Result<Option<ImageMatch>, SearchError> {
        self.calls.lock().unwrap().push(query.to_string());
        if self.failing.iter().any(|t| t == query) {
            return Err(SearchError::UnexpectedStatus {
                status: 500,
                query: query.to_string(),
            });
        }
        Ok(Some(ImageMatch {
            image_url: format!("https://img.example/{query}.jpg"),
            search_title: Some(query.to_string()),
            search_link: Some(format!("https://shop.example/{query}")),
        }))
    }
}

/// Records inserted rows. Rejects any call that includes a row titled
/// `reject_title`, so a bulk call holding one fails as a whole.
pub(crate) struct RecordingSink {
    pub(crate) table: String,
    pub(crate) reject_title: Option<String>,
    pub(crate) calls: Mutex<Vec<usize>>,
    pub(crate) rows: Mutex<Vec<Value>>,
}

impl RecordingSink {
    pub(crate) fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            reject_title: None,
            calls: Mutex::new(Vec::new()),
            rows: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn rejecting(table: &str, title: &str) -> Self {
        Self {
            reject_title: Some(title.to_string()),
            ..Self::new(table)
        }
    }

    pub(crate) fn written(&self) -> Vec<Value> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl RowSink for RecordingSink {
    fn table_name(&self) -> &str {
        &self.table
    }

    async fn insert(&self, rows: &[InsertRow]) -> Result<(), BigQueryError> {
        self.calls.lock().unwrap().push(rows.len());
        if let Some(reject) = &self.reject_title {
            if rows
                .iter()
                .any(|r| r.json["product_title"].as_str() == Some(reject.as_str()))
            {
                return Err(BigQueryError::Auth("row rejected".to_string()));
            }
        }
        self.rows
            .lock()
            .unwrap()
            .extend(rows.iter().map(|r| r.json.clone()));
        Ok(())
    }
}
