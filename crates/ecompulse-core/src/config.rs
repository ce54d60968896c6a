use std::path::PathBuf;

use crate::app_config::{AppConfig, BigQueryTarget, CredentialsSource, Environment, TaskConfig};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    load_dotenv();
    load_app_config_from_env()
}

/// Load `.env` into the process environment without validating anything.
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Reads configuration from the process environment without loading `.env`.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let env = parse_environment(&or_default("ECOMPULSE_ENV", "development"))?;
    let log_level = or_default("ECOMPULSE_LOG_LEVEL", "info");

    let from_url = lookup("DATABASE_URL")
        .ok()
        .map(|raw| parse_database_url(&raw))
        .unwrap_or_default();
    let table_param = |param: Option<String>, var: &str| -> Result<String, ConfigError> {
        match param {
            Some(value) => Ok(value),
            None => require(var),
        }
    };

    let bigquery = BigQueryTarget {
        project_id: table_param(from_url.project, "GOOGLE_CLOUD_PROJECT_ID")?,
        dataset_id: table_param(from_url.dataset, "BIGQUERY_DATASET_ID")?,
        table_id: table_param(from_url.table, "BIGQUERY_TABLE_ID")?,
        optimized_table_id: or_default(
            "ECOMPULSE_OPTIMIZED_TABLE_ID",
            "BestSellers_TopProducts_Optimized",
        ),
        momentum_table: or_default("ECOMPULSE_MOMENTUM_TABLE", "product_momentum_analysis"),
        week_rank_table: or_default("ECOMPULSE_WEEK_RANK_TABLE", "product_week_rank_enriched"),
    };

    let credentials = resolve_credentials(&lookup)?;

    let search_api_key = require("GOOGLE_SEARCH_API_KEY")?;
    let search_engine_id = require("GOOGLE_SEARCH_ENGINE_ID")?;

    let category_id = or_default("TASK_CATEGORY_ID", "1253");
    category_id
        .parse::<u64>()
        .map_err(|e| invalid("TASK_CATEGORY_ID", e.to_string()))?;

    let limit = parse_u32("TASK_LIMIT", "10")?;
    if limit == 0 {
        return Err(invalid("TASK_LIMIT", "must be at least 1".to_string()));
    }

    let task = TaskConfig {
        country: or_default("TASK_COUNTRY", "US"),
        category_id,
        limit,
        days_back: parse_u32("TASK_DAYS_BACK", "7")?,
        delay_between_requests_ms: parse_u64("TASK_DELAY", "1000")?,
    };

    let http_timeout_secs = parse_u64("ECOMPULSE_HTTP_TIMEOUT_SECS", "30")?;
    let search_concurrency = parse_usize("ECOMPULSE_SEARCH_CONCURRENCY", "1")?;
    if search_concurrency == 0 {
        return Err(invalid(
            "ECOMPULSE_SEARCH_CONCURRENCY",
            "must be at least 1".to_string(),
        ));
    }
    let search_max_retries = parse_u32("ECOMPULSE_SEARCH_MAX_RETRIES", "0")?;
    let search_retry_backoff_base_ms = parse_u64("ECOMPULSE_SEARCH_RETRY_BACKOFF_BASE_MS", "1000")?;

    Ok(AppConfig {
        env,
        log_level,
        bigquery,
        credentials,
        search_api_key,
        search_engine_id,
        task,
        http_timeout_secs,
        search_concurrency,
        search_max_retries,
        search_retry_backoff_base_ms,
    })
}

/// Pick the first credentials source present, in order: inline JSON, key
/// file, pre-issued access token.
fn resolve_credentials<F>(lookup: &F) -> Result<CredentialsSource, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let present = |var: &str| lookup(var).ok().filter(|v| !v.trim().is_empty());

    if let Some(json) = present("GCP_SERVICE_ACCOUNT_JSON") {
        return Ok(CredentialsSource::InlineJson(json));
    }
    if let Some(path) = present("GOOGLE_APPLICATION_CREDENTIALS") {
        return Ok(CredentialsSource::KeyFile(PathBuf::from(path)));
    }
    if let Some(token) = present("BIGQUERY_ACCESS_TOKEN") {
        return Ok(CredentialsSource::AccessToken(token));
    }
    Err(ConfigError::MissingEnvVar(
        "GCP_SERVICE_ACCOUNT_JSON (or GOOGLE_APPLICATION_CREDENTIALS / BIGQUERY_ACCESS_TOKEN)"
            .to_string(),
    ))
}

/// BigQuery coordinates embedded in `DATABASE_URL` query parameters.
#[derive(Debug, Default, PartialEq, Eq)]
struct UrlTableParams {
    project: Option<String>,
    dataset: Option<String>,
    table: Option<String>,
}

/// Extract `bigquery_project`, `bigquery_dataset` and `bigquery_table` from a
/// `DATABASE_URL` such as `postgresql://h/db?bigquery_project=p&bigquery_dataset=d`.
///
/// An unparseable URL yields no overrides; the plain env vars are used instead.
fn parse_database_url(raw: &str) -> UrlTableParams {
    let Ok(url) = url::Url::parse(raw) else {
        return UrlTableParams::default();
    };

    let mut params = UrlTableParams::default();
    for (key, value) in url.query_pairs() {
        if value.is_empty() {
            continue;
        }
        match key.as_ref() {
            "bigquery_project" => params.project = Some(value.into_owned()),
            "bigquery_dataset" => params.dataset = Some(value.into_owned()),
            "bigquery_table" => params.table = Some(value.into_owned()),
            _ => {}
        }
    }
    params
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` for anything other than
/// `development`, `test` or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "ECOMPULSE_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
