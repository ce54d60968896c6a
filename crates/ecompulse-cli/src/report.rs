//! Console renderers. Each returns the full text so it can be checked in
//! tests; callers print it.

use ecompulse_bigquery::{WriteMode, WriteReport};
use ecompulse_core::{
    Enriched, ImprovedRanking, MomentumRecord, RankImprovementReport, RankingSnapshot,
    TrendReport, TrendType,
};

const RULE_WIDTH: usize = 60;

fn decimal(value: f64) -> String {
    if value.is_finite() {
        format!("{value:.2}")
    } else {
        "n/a".to_string()
    }
}

fn signed(value: f64) -> String {
    if value.is_finite() {
        format!("{value:+.2}")
    } else {
        "n/a".to_string()
    }
}

fn optional(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), decimal)
}

fn heading(lines: &mut Vec<String>, title: &str) {
    lines.push(String::new());
    lines.push(title.to_string());
}

pub(crate) fn render_trend_report<R: AsRef<MomentumRecord>>(report: &TrendReport<'_, R>) -> String {
    let mut lines = vec![
        format!("Momentum report ({} products)", report.total),
        "=".repeat(RULE_WIDTH),
    ];

    heading(&mut lines, "Rocket rising:");
    if report.rocket_rising.is_empty() {
        lines.push("  (none)".to_string());
    }
    for (i, record) in report.rocket_rising.iter().enumerate() {
        let r = (*record).as_ref();
        lines.push(format!("{}. {}", i + 1, r.product_title));
        if let (Some(previous), Some(improvement)) = (r.previous_rank, r.rank_improvement) {
            lines.push(format!(
                "   rank: {previous} -> {} ({improvement:+})",
                r.current_rank
            ));
        }
        lines.push(format!(
            "   demand: {} -> {} ({})",
            optional(r.previous_relative_demand),
            decimal(r.current_relative_demand),
            r.demand_change.map_or_else(|| "n/a".to_string(), signed)
        ));
        lines.push(format!("   momentum: {}", decimal(r.momentum_score)));
    }

    heading(&mut lines, "Demand increasing:");
    if report.demand_increasing.is_empty() {
        lines.push("  (none)".to_string());
    }
    for (i, record) in report.demand_increasing.iter().enumerate() {
        let r = (*record).as_ref();
        lines.push(format!("{}. {}", i + 1, r.product_title));
        lines.push(format!(
            "   demand: {} -> {} ({})",
            optional(r.previous_relative_demand),
            decimal(r.current_relative_demand),
            r.demand_change.map_or_else(|| "n/a".to_string(), signed)
        ));
        lines.push(format!(
            "   rank: {} (change {})",
            r.current_rank,
            r.rank_improvement
                .map_or_else(|| "n/a".to_string(), |v| format!("{v:+}"))
        ));
    }

    heading(&mut lines, "Trend distribution:");
    for trend in TrendType::ALL {
        let count = report.count(trend);
        if count > 0 {
            lines.push(format!("{trend}: {count}"));
        }
    }

    heading(&mut lines, "Averages:");
    match report.rank_improvement {
        Some(stats) => lines.push(format!(
            "rank improvement: {} (min {:+}, max {:+})",
            decimal(stats.average),
            stats.min,
            stats.max
        )),
        None => lines.push("rank improvement: n/a".to_string()),
    }
    lines.push(format!(
        "demand change: {}",
        optional(report.average_demand_change)
    ));
    lines.push(format!(
        "momentum score: {}",
        optional(report.average_momentum_score)
    ));

    lines.join("\n")
}

pub(crate) fn render_rank_improvement_report(
    rows: &[Enriched<ImprovedRanking>],
    summary: &RankImprovementReport,
) -> String {
    let mut lines = vec![
        format!("Rank improvement report ({} products)", summary.count),
        "=".repeat(RULE_WIDTH),
    ];

    for (i, row) in rows.iter().enumerate() {
        let r = &row.record;
        lines.push(format!("{}. {}", i + 1, r.product_title));
        lines.push(format!(
            "   rank: {} -> {} (+{})",
            r.previous_rank(),
            r.current_rank,
            r.rank_improvement
        ));
        lines.push(format!(
            "   category: {}",
            r.ranking_category.as_deref().unwrap_or("n/a")
        ));
        lines.push(format!(
            "   image: {}",
            row.image_url().unwrap_or("not found")
        ));
    }

    heading(&mut lines, "Summary:");
    lines.push(format!("products: {}", summary.count));
    lines.push(format!("total improvement: {}", summary.total_improvement));
    lines.push(format!(
        "average improvement: {}",
        optional(summary.average_improvement)
    ));
    lines.push(format!(
        "max improvement: {}",
        summary
            .max_improvement
            .map_or_else(|| "n/a".to_string(), |v| v.to_string())
    ));

    heading(&mut lines, "Per category:");
    for (category, stats) in &summary.per_category {
        lines.push(format!(
            "{category}: {} products, total improvement {}",
            stats.count, stats.total_improvement
        ));
    }

    lines.join("\n")
}

pub(crate) fn render_week_rank_summary(rows: &[Enriched<RankingSnapshot>]) -> String {
    let with_images = rows.iter().filter(|r| r.image.is_some()).count();
    let mut lines = vec![format!(
        "Weekly top products ({} products, {with_images} with images)",
        rows.len()
    )];
    for row in rows {
        let marker = if row.image.is_some() {
            "image"
        } else {
            "no image"
        };
        lines.push(format!(
            "#{} {} [{marker}]",
            row.record.rank, row.record.product_title
        ));
    }
    lines.join("\n")
}

pub(crate) fn render_write_report(report: &WriteReport) -> String {
    let total = report.outcomes.len();
    match report.mode {
        WriteMode::Bulk => format!(
            "Wrote {}/{total} rows to {} (bulk insert)",
            report.inserted(),
            report.table
        ),
        WriteMode::RowByRow => {
            let failed: Vec<String> = report
                .failed_rows()
                .iter()
                .map(ToString::to_string)
                .collect();
            let mut line = format!(
                "Wrote {}/{total} rows to {} (row-by-row fallback)",
                report.inserted(),
                report.table
            );
            if !failed.is_empty() {
                line.push_str(&format!(", failed rows: {}", failed.join(", ")));
            }
            line
        }
    }
}
