//! Momentum scoring and trend classification.
//!
//! Joins a current ranking snapshot against a previous one by resolved
//! product title and scores each current product. Everything here is pure:
//! no I/O and no clock reads, so the same inputs always give the same output.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ranking::RankingSnapshot;

/// Weight of the rank delta in the momentum score.
pub const RANK_WEIGHT: f64 = 0.7;
/// Weight of the demand delta in the momentum score.
pub const DEMAND_WEIGHT: f64 = 0.3;

/// Categorical summary of how rank and demand moved between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendType {
    /// Rank up and demand up.
    RocketRising,
    /// Rank up, demand down.
    RankImproving,
    /// Rank down, demand up.
    DemandIncreasing,
    /// Rank down and demand down.
    Declining,
    /// Rank unchanged, demand up.
    StableGrowing,
    /// Rank unchanged, demand down.
    StableDeclining,
    /// Neither moved.
    Stable,
    /// No earlier snapshot to compare against.
    NewProduct,
    /// Deltas fall outside the decision table (one side zero while the other
    /// moved, or a non-finite demand value).
    Unknown,
}

impl TrendType {
    /// Every variant, in report order.
    pub const ALL: [TrendType; 9] = [
        TrendType::RocketRising,
        TrendType::RankImproving,
        TrendType::DemandIncreasing,
        TrendType::Declining,
        TrendType::StableGrowing,
        TrendType::StableDeclining,
        TrendType::Stable,
        TrendType::NewProduct,
        TrendType::Unknown,
    ];

    /// The wire/label form stored in the results table, e.g. `"ROCKET_RISING"`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TrendType::RocketRising => "ROCKET_RISING",
            TrendType::RankImproving => "RANK_IMPROVING",
            TrendType::DemandIncreasing => "DEMAND_INCREASING",
            TrendType::Declining => "DECLINING",
            TrendType::StableGrowing => "STABLE_GROWING",
            TrendType::StableDeclining => "STABLE_DECLINING",
            TrendType::Stable => "STABLE",
            TrendType::NewProduct => "NEW_PRODUCT",
            TrendType::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for TrendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a product by the signs of its rank and demand deltas.
///
/// Evaluated top to bottom, first match wins:
///
/// | rank | demand | trend |
/// |------|--------|-------|
/// | > 0  | > 0    | `RocketRising` |
/// | > 0  | < 0    | `RankImproving` |
/// | < 0  | > 0    | `DemandIncreasing` |
/// | < 0  | < 0    | `Declining` |
/// | = 0  | > 0    | `StableGrowing` |
/// | = 0  | < 0    | `StableDeclining` |
/// | = 0  | = 0    | `Stable` |
/// | otherwise |   | `Unknown` |
///
/// A `NaN` demand delta fails every comparison and lands on `Unknown`.
#[must_use]
pub fn classify_trend(rank_improvement: i64, demand_change: f64) -> TrendType {
    let rank = rank_improvement.cmp(&0);
    match (rank, demand_change.partial_cmp(&0.0)) {
        (Ordering::Greater, Some(Ordering::Greater)) => TrendType::RocketRising,
        (Ordering::Greater, Some(Ordering::Less)) => TrendType::RankImproving,
        (Ordering::Less, Some(Ordering::Greater)) => TrendType::DemandIncreasing,
        (Ordering::Less, Some(Ordering::Less)) => TrendType::Declining,
        (Ordering::Equal, Some(Ordering::Greater)) => TrendType::StableGrowing,
        (Ordering::Equal, Some(Ordering::Less)) => TrendType::StableDeclining,
        (Ordering::Equal, Some(Ordering::Equal)) => TrendType::Stable,
        _ => TrendType::Unknown,
    }
}

/// Score and classification for one product in the current snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentumRecord {
    pub product_title: String,
    pub current_rank: i64,
    /// `None` when the product has no previous snapshot.
    pub previous_rank: Option<i64>,
    /// `previous_rank - current_rank`; positive means the product moved up.
    pub rank_improvement: Option<i64>,
    pub current_relative_demand: f64,
    pub previous_relative_demand: Option<f64>,
    /// `current - previous` demand. `None` for new products and when either
    /// demand value is not finite.
    pub demand_change: Option<f64>,
    /// `rank_improvement * 0.7 + demand_change * 0.3`, or `0.0` when either
    /// input is missing.
    pub momentum_score: f64,
    pub trend_type: TrendType,
    pub current_timestamp: DateTime<Utc>,
    pub previous_timestamp: Option<DateTime<Utc>>,
    /// Whole days between the two snapshots.
    pub days_between_rankings: Option<i64>,
}

impl MomentumRecord {
    fn compared(current: &RankingSnapshot, previous: &RankingSnapshot) -> Self {
        let rank_improvement = previous.rank - current.rank;
        let raw_demand_change = current.relative_demand - previous.relative_demand;
        let trend_type = classify_trend(rank_improvement, raw_demand_change);

        let demand_change = Some(raw_demand_change).filter(|d| d.is_finite());
        #[allow(clippy::cast_precision_loss)]
        let momentum_score = demand_change.map_or(0.0, |demand| {
            rank_improvement as f64 * RANK_WEIGHT + demand * DEMAND_WEIGHT
        });

        Self {
            product_title: current.product_title.clone(),
            current_rank: current.rank,
            previous_rank: Some(previous.rank),
            rank_improvement: Some(rank_improvement),
            current_relative_demand: current.relative_demand,
            previous_relative_demand: Some(previous.relative_demand),
            demand_change,
            momentum_score,
            trend_type,
            current_timestamp: current.timestamp,
            previous_timestamp: Some(previous.timestamp),
            days_between_rankings: Some((current.timestamp - previous.timestamp).num_days()),
        }
    }

    fn new_product(current: &RankingSnapshot) -> Self {
        Self {
            product_title: current.product_title.clone(),
            current_rank: current.rank,
            previous_rank: None,
            rank_improvement: None,
            current_relative_demand: current.relative_demand,
            previous_relative_demand: None,
            demand_change: None,
            momentum_score: 0.0,
            trend_type: TrendType::NewProduct,
            current_timestamp: current.timestamp,
            previous_timestamp: None,
            days_between_rankings: None,
        }
    }

    #[must_use]
    pub fn is_new_product(&self) -> bool {
        self.previous_rank.is_none()
    }
}

/// Join `current` against `previous` by product title and score every
/// current product.
///
/// `previous` is expected newest-first: when a title appears more than once
/// only its first occurrence is used. Titles are a best-effort join key, so
/// two distinct products sharing a title collapse onto the same previous
/// entry.
///
/// The result has one record per `current` entry, sorted by
/// `momentum_score` descending. The sort is stable, so equal scores keep
/// their order from `current`.
#[must_use]
pub fn analyze_momentum(
    current: &[RankingSnapshot],
    previous: &[RankingSnapshot],
) -> Vec<MomentumRecord> {
    let mut lookup: HashMap<&str, &RankingSnapshot> = HashMap::with_capacity(previous.len());
    for snapshot in previous {
        lookup
            .entry(snapshot.product_title.as_str())
            .or_insert(snapshot);
    }

    let mut records: Vec<MomentumRecord> = current
        .iter()
        .map(|snapshot| match lookup.get(snapshot.product_title.as_str()) {
            Some(prev) => MomentumRecord::compared(snapshot, prev),
            None => MomentumRecord::new_product(snapshot),
        })
        .collect();

    records.sort_by(|a, b| b.momentum_score.total_cmp(&a.momentum_score));
    records
}

#[cfg(test)]
#[path = "momentum_test.rs"]
mod tests;
