//! `ecompulse rank-improvement`: products that moved up in the optimized
//! ranking table, written to the momentum table as `ROCKET_RISING`.

use anyhow::Context;
use ecompulse_bigquery::{MomentumRow, RankingQuery, RankingSource, RowSink};
use ecompulse_core::{build_rank_improvement_report, TaskConfig};
use ecompulse_search::{enrich_all, EnrichOptions, ImageSearch};

use crate::pipeline::{run_context, write_rows, RunOptions, RunSummary};
use crate::report::render_rank_improvement_report;

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
    let rankings = source
        .improved_rankings(&query)
        .await
        .context("failed to fetch improved rankings")?;
    tracing::info!(
        country = %task.country,
        category = %task.category_id,
        rows = rankings.len(),
        "fetched improved rankings"
    );

    if rankings.is_empty() {
        tracing::warn!(country = %task.country, "no products with a rank improvement");
        println!(
            "No rank improvements for country {} category {}",
            task.country, task.category_id
        );
        return Ok(RunSummary::default());
    }

    let enriched = enrich_all(search, rankings, |r| r.product_title.as_str(), enrich).await;

    let ctx = run_context(task);
    let rows: Vec<MomentumRow> = enriched
        .iter()
        .map(|ranking| MomentumRow::from_improved(ranking, &ctx))
        .collect();
    let write = write_rows(sink, &rows, options.dry_run).await?;

    if options.report {
        let summary = build_rank_improvement_report(&enriched);
        println!("{}", render_rank_improvement_report(&enriched, &summary));
    }

    Ok(RunSummary {
        processed: enriched.len(),
        write,
    })
}
