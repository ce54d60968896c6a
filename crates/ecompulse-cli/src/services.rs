//! Client construction from [`AppConfig`]. Every pipeline receives its
//! clients from here; nothing is global.

use std::sync::Arc;

use anyhow::Context;
use ecompulse_bigquery::{token_provider, BigQueryClient, BigQueryRankingSource, BigQueryTable};
use ecompulse_core::{AppConfig, BigQueryTarget};
use ecompulse_search::{CustomSearchClient, EnrichOptions};

pub(crate) struct Services {
    pub(crate) bigquery: Arc<BigQueryClient>,
    pub(crate) search: CustomSearchClient,
    target: BigQueryTarget,
    enrich: EnrichOptions,
}

impl Services {
    /// Build the BigQuery and Custom Search clients. No network call is made
    /// until a pipeline runs.
    pub(crate) fn connect(config: &AppConfig) -> anyhow::Result<Self> {
        let auth = token_provider(&config.credentials, config.http_timeout_secs)
            .context("failed to load BigQuery credentials")?;
        let bigquery = BigQueryClient::new(
            &config.bigquery.project_id,
            auth,
            config.http_timeout_secs,
        )
        .context("failed to build BigQuery client")?;

        let search = CustomSearchClient::new(
            &config.search_api_key,
            &config.search_engine_id,
            config.http_timeout_secs,
            config.search_max_retries,
            config.search_retry_backoff_base_ms,
        )
        .context("failed to build Custom Search client")?;

        tracing::debug!(
            project = %config.bigquery.project_id,
            dataset = %config.bigquery.dataset_id,
            "clients ready"
        );

        Ok(Self {
            bigquery: Arc::new(bigquery),
            search,
            target: config.bigquery.clone(),
            enrich: enrich_options(config),
        })
    }

    pub(crate) fn ranking_source(&self) -> BigQueryRankingSource {
        BigQueryRankingSource::new(Arc::clone(&self.bigquery), &self.target)
    }

    pub(crate) fn momentum_table(&self) -> BigQueryTable {
        BigQueryTable::new(
            Arc::clone(&self.bigquery),
            &self.target.dataset_id,
            &self.target.momentum_table,
        )
    }

    pub(crate) fn week_rank_table(&self) -> BigQueryTable {
        BigQueryTable::new(
            Arc::clone(&self.bigquery),
            &self.target.dataset_id,
            &self.target.week_rank_table,
        )
    }

    pub(crate) fn enrich_options(&self) -> EnrichOptions {
        self.enrich
    }
}

pub(crate) fn enrich_options(config: &AppConfig) -> EnrichOptions {
    EnrichOptions::new(
        config.task.delay_between_requests_ms,
        config.search_concurrency,
    )
}
