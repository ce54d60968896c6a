//! Pieces shared by the three pipelines.

use anyhow::Context;
use chrono::Utc;
use ecompulse_bigquery::{to_insert_rows, write_with_fallback, RowSink, RunContext, WriteReport};
use ecompulse_core::TaskConfig;
use serde::Serialize;

use crate::report::render_write_report;

/// Entries per ranked list in the console reports.
pub(crate) const TOP_N: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RunOptions {
    pub(crate) report: bool,
    pub(crate) dry_run: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            report: true,
            dry_run: false,
        }
    }
}

/// What a pipeline did, for the caller and for tests.
#[derive(Debug, Default)]
pub(crate) struct RunSummary {
    /// Records that went through enrichment.
    pub(crate) processed: usize,
    /// `None` when nothing was written (dry run or no input rows).
    pub(crate) write: Option<WriteReport>,
}

/// Stamp for every row of this run.
pub(crate) fn run_context(task: &TaskConfig) -> RunContext {
    RunContext {
        country: task.country.clone(),
        category_id: task.category_id.clone(),
        timestamp: Utc::now(),
    }
}

/// Append `rows` to `sink` unless this is a dry run, printing the outcome.
pub(crate) async fn write_rows<W, T>(
    sink: &W,
    rows: &[T],
    dry_run: bool,
) -> anyhow::Result<Option<WriteReport>>
where
    W: RowSink + ?Sized,
    T: Serialize,
{
    if dry_run {
        tracing::info!(table = sink.table_name(), rows = rows.len(), "dry run, skipping write");
        println!(
            "dry-run: would write {} rows to {}",
            rows.len(),
            sink.table_name()
        );
        return Ok(None);
    }

    let insert_rows = to_insert_rows(rows).context("failed to serialize result rows")?;
    let report = write_with_fallback(sink, &insert_rows).await;
    if !report.is_complete() {
        tracing::error!(
            table = %report.table,
            failed = report.failed(),
            rows = ?report.failed_rows(),
            "some rows could not be written"
        );
    }
    println!("{}", render_write_report(&report));
    Ok(Some(report))
}
