//! `ecompulse momentum`: fetch both snapshots, score every current product,
//! enrich with images, append to the momentum table and report.

use anyhow::Context;
use ecompulse_bigquery::{fetch_snapshots, MomentumRow, RankingQuery, RankingSource, RowSink};
use ecompulse_core::{analyze_momentum, build_trend_report, TaskConfig, TrendType};
use ecompulse_search::{enrich_all, EnrichOptions, ImageSearch};

use crate::pipeline::{run_context, write_rows, RunOptions, RunSummary, TOP_N};
use crate::report::render_trend_report;

/// # Errors
///
/// Returns an error if either snapshot query fails or rows cannot be
/// serialized. Failed searches and rejected rows are not errors.
pub(crate) async fn run<R, S, W>(
    source: &R,
    search: &S,
    sink: &W,
    task: &TaskConfig,
    enrich: &EnrichOptions,
    options: RunOptions,
) -> anyhow::Result<RunSummary>
where
    R: RankingSource + ?Sized,
    S: ImageSearch + ?Sized,
    W: RowSink + ?Sized,
{
    let query = RankingQuery::from_task(task);
    tracing::info!(
        country = %task.country,
        category = %task.category_id,
        limit = task.limit,
        days_back = task.days_back,
        "starting momentum analysis"
    );

    let snapshots = fetch_snapshots(source, &query)
        .await
        .context("failed to fetch ranking snapshots")?;
    if snapshots.current.is_empty() {
        tracing::warn!(
            country = %task.country,
            category = %task.category_id,
            "no current rankings found, nothing to analyze"
        );
        println!(
            "No current rankings for country {} category {}",
            task.country, task.category_id
        );
        return Ok(RunSummary::default());
    }

    let records = analyze_momentum(&snapshots.current, &snapshots.previous);
    let new_products = records
        .iter()
        .filter(|r| r.trend_type == TrendType::NewProduct)
        .count();
    tracing::info!(
        records = records.len(),
        matched = records.len() - new_products,
        new_products,
        "momentum computed"
    );

    let enriched = enrich_all(search, records, |r| r.product_title.as_str(), enrich).await;

    let ctx = run_context(task);
    let rows: Vec<MomentumRow> = enriched
        .iter()
        .map(|record| MomentumRow::from_record(record, &ctx))
        .collect();
    let write = write_rows(sink, &rows, options.dry_run).await?;

    if options.report {
        println!("{}", render_trend_report(&build_trend_report(&enriched, TOP_N)));
    }

    Ok(RunSummary {
        processed: enriched.len(),
        write,
    })
}
