//! `ecompulse week-rank`: the current top products, enriched with images and
//! appended to the week-rank table.

use anyhow::Context;
use ecompulse_bigquery::{RankingQuery, RankingSource, RowSink, WeekRankRow};
use ecompulse_core::TaskConfig;
use ecompulse_search::{enrich_all, EnrichOptions, ImageSearch};

use crate::pipeline::{run_context, write_rows, RunOptions, RunSummary};
use crate::report::render_week_rank_summary;

/// # Errors
///
/// Returns an error if the ranking query fails or rows cannot be
/// serialized.
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
    let top = source
        .current_snapshot(&query)
        .await
        .context("failed to fetch current rankings")?;
    tracing::info!(
        country = %task.country,
        category = %task.category_id,
        rows = top.len(),
        "fetched top products"
    );

    if top.is_empty() {
        tracing::warn!(country = %task.country, "no current rankings found");
        println!(
            "No current rankings for country {} category {}",
            task.country, task.category_id
        );
        return Ok(RunSummary::default());
    }

    let enriched = enrich_all(search, top, |s| s.product_title.as_str(), enrich).await;

    let ctx = run_context(task);
    let rows: Vec<WeekRankRow> = enriched
        .iter()
        .map(|snapshot| WeekRankRow::from_snapshot(snapshot, &ctx))
        .collect();
    let write = write_rows(sink, &rows, options.dry_run).await?;

    if options.report {
        println!("{}", render_week_rank_summary(&enriched));
    }

    Ok(RunSummary {
        processed: enriched.len(),
        write,
    })
}
