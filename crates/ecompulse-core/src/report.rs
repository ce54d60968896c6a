//! Aggregates for the console reports. Renderers live in the CLI; this module
//! only computes.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::momentum::{MomentumRecord, TrendType};
use crate::ranking::ImprovedRanking;

/// Label used for rank-improvement rows without a `ranking_category`.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankImprovementStats {
    pub average: f64,
    pub min: i64,
    pub max: i64,
}

/// Summary of one momentum run.
///
/// `R` is anything that reads as a [`MomentumRecord`], so the report can be
/// built over enriched records without copying them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendReport<'a, R> {
    pub total: usize,
    /// Top `ROCKET_RISING` records, in momentum order.
    pub rocket_rising: Vec<&'a R>,
    /// Top records with `demand_change > 0`, by `demand_change` descending.
    pub demand_increasing: Vec<&'a R>,
    /// Count per trend type. Trends with no records are absent.
    pub trend_counts: BTreeMap<TrendType, usize>,
    /// Over records that had a previous snapshot. `None` when every record
    /// is new.
    pub rank_improvement: Option<RankImprovementStats>,
    /// Over records with a finite demand change.
    pub average_demand_change: Option<f64>,
    /// Over all records, new products contributing `0`.
    pub average_momentum_score: Option<f64>,
}

impl<R> TrendReport<'_, R> {
    #[must_use]
    pub fn count(&self, trend: TrendType) -> usize {
        self.trend_counts.get(&trend).copied().unwrap_or(0)
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(sum: f64, n: usize) -> Option<f64> {
    (n > 0).then(|| sum / n as f64)
}

/// Build a [`TrendReport`] with `top_n` entries per list.
///
/// Expects `records` in the order returned by
/// [`analyze_momentum`](crate::momentum::analyze_momentum); the
/// `rocket_rising` list keeps that order.
#[must_use]
pub fn build_trend_report<R: AsRef<MomentumRecord>>(records: &[R], top_n: usize) -> TrendReport<'_, R> {
    let rocket_rising = records
        .iter()
        .filter(|r| r.as_ref().trend_type == TrendType::RocketRising)
        .take(top_n)
        .collect();

    let mut demand_increasing: Vec<&R> = records
        .iter()
        .filter(|r| r.as_ref().demand_change.is_some_and(|d| d > 0.0))
        .collect();
    demand_increasing.sort_by(|a, b| {
        let a = a.as_ref().demand_change.unwrap_or(0.0);
        let b = b.as_ref().demand_change.unwrap_or(0.0);
        b.total_cmp(&a)
    });
    demand_increasing.truncate(top_n);

    let mut trend_counts = BTreeMap::new();
    for r in records {
        *trend_counts.entry(r.as_ref().trend_type).or_insert(0) += 1;
    }

    let improvements: Vec<i64> = records
        .iter()
        .filter_map(|r| r.as_ref().rank_improvement)
        .collect();
    #[allow(clippy::cast_precision_loss)]
    let rank_improvement = match (improvements.iter().min(), improvements.iter().max()) {
        (Some(&min), Some(&max)) => Some(RankImprovementStats {
            average: improvements.iter().sum::<i64>() as f64 / improvements.len() as f64,
            min,
            max,
        }),
        _ => None,
    };

    let demand_changes: Vec<f64> = records
        .iter()
        .filter_map(|r| r.as_ref().demand_change)
        .collect();
    let average_demand_change = mean(demand_changes.iter().sum(), demand_changes.len());

    let average_momentum_score = mean(
        records.iter().map(|r| r.as_ref().momentum_score).sum(),
        records.len(),
    );

    TrendReport {
        total: records.len(),
        rocket_rising,
        demand_increasing,
        trend_counts,
        rank_improvement,
        average_demand_change,
        average_momentum_score,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryStats {
    pub count: usize,
    pub total_improvement: i64,
}

/// Summary of a rank-improvement run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankImprovementReport {
    pub count: usize,
    pub total_improvement: i64,
    pub average_improvement: Option<f64>,
    pub max_improvement: Option<i64>,
    /// Keyed by `ranking_category`, [`UNKNOWN_CATEGORY`] when absent.
    pub per_category: BTreeMap<String, CategoryStats>,
}

#[must_use]
pub fn build_rank_improvement_report<R: AsRef<ImprovedRanking>>(rows: &[R]) -> RankImprovementReport {
    let mut per_category: BTreeMap<String, CategoryStats> = BTreeMap::new();
    let mut total_improvement = 0_i64;
    let mut max_improvement = None;

    for row in rows {
        let row = row.as_ref();
        total_improvement = total_improvement.saturating_add(row.rank_improvement);
        max_improvement = max_improvement.max(Some(row.rank_improvement));

        let key = row
            .ranking_category
            .clone()
            .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());
        let stats = per_category.entry(key).or_default();
        stats.count += 1;
        stats.total_improvement = stats.total_improvement.saturating_add(row.rank_improvement);
    }

    #[allow(clippy::cast_precision_loss)]
    let average_improvement = mean(total_improvement as f64, rows.len());

    RankImprovementReport {
        count: rows.len(),
        total_improvement,
        average_improvement,
        max_improvement,
        per_category,
    }
}

impl AsRef<ImprovedRanking> for ImprovedRanking {
    fn as_ref(&self) -> &ImprovedRanking {
        self
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::enriched::Enriched;
    use crate::momentum::analyze_momentum;
    use crate::ranking::RankingSnapshot;

    fn snap(title: &str, rank: i64, demand: f64) -> RankingSnapshot {
        RankingSnapshot {
            product_title: title.to_string(),
            rank,
            relative_demand: demand,
            timestamp: Utc.with_ymd_and_hms(2026, 3, 9, 0, 0, 0).unwrap(),
        }
    }

    fn records() -> Vec<MomentumRecord> {
        let current = [
            snap("Rocket", 2, 1.5),
            snap("Stable", 5, 0.5),
            snap("Fresh", 1, 3.0),
            snap("Sinking", 20, 0.1),
            snap("Popular", 12, 1.4),
        ];
        let previous = [
            snap("Rocket", 10, 1.0),
            snap("Stable", 5, 0.5),
            snap("Sinking", 8, 0.6),
            snap("Popular", 9, 0.4),
        ];
        analyze_momentum(&current, &previous)
    }

    #[test]
    fn counts_every_trend_present() {
        let records = records();
        let report = build_trend_report(&records, 10);
        assert_eq!(report.total, 5);
        assert_eq!(report.count(TrendType::RocketRising), 1);
        assert_eq!(report.count(TrendType::Stable), 1);
        assert_eq!(report.count(TrendType::NewProduct), 1);
        assert_eq!(report.count(TrendType::Declining), 1);
        assert_eq!(report.count(TrendType::DemandIncreasing), 1);
        assert_eq!(report.count(TrendType::RankImproving), 0);
        assert_eq!(report.trend_counts.values().sum::<usize>(), 5);
    }

    #[test]
    fn demand_list_is_sorted_by_change_and_excludes_non_positive() {
        let records = records();
        let report = build_trend_report(&records, 10);
        let titles: Vec<&str> = report
            .demand_increasing
            .iter()
            .map(|r| r.product_title.as_str())
            .collect();
        assert_eq!(titles, ["Popular", "Rocket"]);
    }

    #[test]
    fn top_n_truncates_lists() {
        let records = records();
        let report = build_trend_report(&records, 1);
        assert_eq!(report.demand_increasing.len(), 1);
        assert_eq!(report.rocket_rising.len(), 1);
        assert_eq!(report.rocket_rising[0].product_title, "Rocket");
    }

    #[test]
    fn rank_stats_skip_new_products() {
        let records = records();
        let stats = build_trend_report(&records, 10).rank_improvement.unwrap();
        // Rocket +8, Stable 0, Sinking -12, Popular -3.
        assert_eq!(stats.min, -12);
        assert_eq!(stats.max, 8);
        assert!((stats.average - (-7.0 / 4.0)).abs() < 1e-9);
    }

    #[test]
    fn averages_over_expected_populations() {
        let records = records();
        let report = build_trend_report(&records, 10);
        let expected_demand = (0.5 + 0.0 - 0.5 + 1.0) / 4.0;
        assert!((report.average_demand_change.unwrap() - expected_demand).abs() < 1e-9);
        let expected_score: f64 = records.iter().map(|r| r.momentum_score).sum::<f64>() / 5.0;
        assert!((report.average_momentum_score.unwrap() - expected_score).abs() < 1e-9);
    }

    #[test]
    fn empty_input_has_no_stats() {
        let report = build_trend_report::<MomentumRecord>(&[], 10);
        assert_eq!(report.total, 0);
        assert!(report.trend_counts.is_empty());
        assert_eq!(report.rank_improvement, None);
        assert_eq!(report.average_demand_change, None);
        assert_eq!(report.average_momentum_score, None);
    }

    #[test]
    fn report_accepts_enriched_records() {
        let enriched: Vec<Enriched<MomentumRecord>> =
            records().into_iter().map(Enriched::bare).collect();
        let report = build_trend_report(&enriched, 10);
        assert_eq!(report.rocket_rising[0].record.product_title, "Rocket");
    }

    fn improved(title: &str, improvement: i64, category: Option<&str>) -> ImprovedRanking {
        ImprovedRanking {
            product_title: title.to_string(),
            current_rank: 3,
            rank_improvement: improvement,
            current_relative_demand: None,
            rank_timestamp: None,
            ranking_category: category.map(str::to_string),
        }
    }

    #[test]
    fn rank_improvement_report_groups_by_category() {
        let rows = [
            improved("A", 12, Some("1253")),
            improved("B", 4, Some("1253")),
            improved("C", 20, Some("536")),
            improved("D", 2, None),
        ];
        let report = build_rank_improvement_report(&rows);
        assert_eq!(report.count, 4);
        assert_eq!(report.total_improvement, 38);
        assert_eq!(report.max_improvement, Some(20));
        assert!((report.average_improvement.unwrap() - 9.5).abs() < 1e-9);
        assert_eq!(
            report.per_category["1253"],
            CategoryStats {
                count: 2,
                total_improvement: 16
            }
        );
        assert_eq!(report.per_category[UNKNOWN_CATEGORY].count, 1);
    }

    #[test]
    fn empty_rank_improvement_report() {
        let report = build_rank_improvement_report::<ImprovedRanking>(&[]);
        assert_eq!(report.count, 0);
        assert_eq!(report.average_improvement, None);
        assert_eq!(report.max_improvement, None);
    }
}
