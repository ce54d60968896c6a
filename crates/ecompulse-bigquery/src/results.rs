//! Flat rows for the analysis result tables.
//!
//! The destination schemas take scalar columns only, so each enriched record
//! is flattened here. Non-finite floats are written as null.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use ecompulse_core::{Enriched, EnrichedMomentumRecord, ImprovedRanking, RankingSnapshot, TrendType};
use serde::{Serialize, Serializer};

/// Values stamped on every row of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub country: String,
    pub category_id: String,
    /// One timestamp per run, used for `analysis_timestamp`, `created_at`
    /// and `updated_at`.
    pub timestamp: DateTime<Utc>,
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// TIMESTAMP columns hold microseconds; finer digits are dropped.
fn micros<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.trunc_subsecs(6).to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

/// A row of `product_momentum_analysis`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MomentumRow {
    pub product_title: String,
    pub current_rank: i64,
    pub previous_rank: Option<i64>,
    /// Column name for the rank improvement.
    pub rank_change: Option<i64>,
    pub current_relative_demand: Option<f64>,
    pub previous_relative_demand: Option<f64>,
    pub demand_change: Option<f64>,
    pub momentum_score: f64,
    pub trend_type: TrendType,
    pub country: String,
    pub category_id: String,
    pub image_url: Option<String>,
    pub search_title: Option<String>,
    pub search_link: Option<String>,
    #[serde(serialize_with = "micros")]
    pub analysis_timestamp: DateTime<Utc>,
    #[serde(serialize_with = "micros")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "micros")]
    pub updated_at: DateTime<Utc>,
}

impl MomentumRow {
    #[must_use]
    pub fn from_record(enriched: &EnrichedMomentumRecord, ctx: &RunContext) -> Self {
        let record = &enriched.record;
        Self {
            product_title: record.product_title.clone(),
            current_rank: record.current_rank,
            previous_rank: record.previous_rank,
            rank_change: record.rank_improvement,
            current_relative_demand: finite(record.current_relative_demand),
            previous_relative_demand: record.previous_relative_demand.and_then(finite),
            demand_change: record.demand_change.and_then(finite),
            momentum_score: finite(record.momentum_score).unwrap_or(0.0),
            trend_type: record.trend_type,
            country: ctx.country.clone(),
            category_id: ctx.category_id.clone(),
            image_url: owned(enriched.image_url()),
            search_title: owned(enriched.search_title()),
            search_link: owned(enriched.search_link()),
            analysis_timestamp: ctx.timestamp,
            created_at: ctx.timestamp,
            updated_at: ctx.timestamp,
        }
    }

    /// Row for a product taken from the optimized table, which only knows
    /// the current rank and its improvement.
    ///
    /// The previous rank is reconstructed, demand is treated as unchanged,
    /// the score is the improvement itself and the trend is always
    /// `ROCKET_RISING`. The row's own category wins over the run's.
    #[must_use]
    pub fn from_improved(enriched: &Enriched<ImprovedRanking>, ctx: &RunContext) -> Self {
        let ranking = &enriched.record;
        let demand = ranking.current_relative_demand.and_then(finite);
        #[allow(clippy::cast_precision_loss)]
        let momentum_score = ranking.rank_improvement as f64;
        Self {
            product_title: ranking.product_title.clone(),
            current_rank: ranking.current_rank,
            previous_rank: Some(ranking.previous_rank()),
            rank_change: Some(ranking.rank_improvement),
            current_relative_demand: demand,
            previous_relative_demand: demand,
            demand_change: Some(0.0),
            momentum_score,
            trend_type: TrendType::RocketRising,
            country: ctx.country.clone(),
            category_id: ranking
                .ranking_category
                .clone()
                .unwrap_or_else(|| ctx.category_id.clone()),
            image_url: owned(enriched.image_url()),
            search_title: owned(enriched.search_title()),
            search_link: owned(enriched.search_link()),
            analysis_timestamp: ctx.timestamp,
            created_at: ctx.timestamp,
            updated_at: ctx.timestamp,
        }
    }
}

/// A row of `product_week_rank_enriched`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekRankRow {
    pub rank: i64,
    pub product_title: String,
    pub category_id: String,
    pub image_url: Option<String>,
    pub search_title: Option<String>,
    pub search_link: Option<String>,
    pub country: String,
    #[serde(serialize_with = "micros")]
    pub rank_timestamp: DateTime<Utc>,
    #[serde(serialize_with = "micros")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "micros")]
    pub updated_at: DateTime<Utc>,
}

impl WeekRankRow {
    #[must_use]
    pub fn from_snapshot(enriched: &Enriched<RankingSnapshot>, ctx: &RunContext) -> Self {
        let snapshot = &enriched.record;
        Self {
            rank: snapshot.rank,
            product_title: snapshot.product_title.clone(),
            category_id: ctx.category_id.clone(),
            image_url: owned(enriched.image_url()),
            search_title: owned(enriched.search_title()),
            search_link: owned(enriched.search_link()),
            country: ctx.country.clone(),
            rank_timestamp: snapshot.timestamp,
            created_at: ctx.timestamp,
            updated_at: ctx.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Timelike};
    use ecompulse_core::{analyze_momentum, ImageMatch};
    use serde_json::{json, Value};

    use super::*;

    fn ctx() -> RunContext {
        RunContext {
            country: "US".to_string(),
            category_id: "1253".to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 3, 9, 12, 0, 0).unwrap(),
        }
    }

    fn snap(title: &str, rank: i64, demand: f64) -> RankingSnapshot {
        RankingSnapshot {
            product_title: title.to_string(),
            rank,
            relative_demand: demand,
            timestamp: Utc.with_ymd_and_hms(2026, 3, 8, 0, 0, 0).unwrap(),
        }
    }

    fn image() -> ImageMatch {
        ImageMatch {
            image_url: "https://img.example/leash.jpg".to_string(),
            search_title: Some("Leash".to_string()),
            search_link: Some("https://shop.example/leash".to_string()),
        }
    }

    #[test]
    fn momentum_row_is_flat_and_stamped() {
        let record = analyze_momentum(&[snap("Leash", 3, 1.2)], &[snap("Leash", 8, 0.9)])
            .remove(0);
        let row = MomentumRow::from_record(&Enriched::new(record, Some(image())), &ctx());
        let value = serde_json::to_value(&row).unwrap();

        let object = value.as_object().unwrap();
        assert!(object.values().all(|v| !v.is_object() && !v.is_array()));
        assert_eq!(value["rank_change"], json!(5));
        assert_eq!(value["trend_type"], json!("ROCKET_RISING"));
        assert_eq!(value["country"], json!("US"));
        assert_eq!(value["category_id"], json!("1253"));
        assert_eq!(value["image_url"], json!("https://img.example/leash.jpg"));
        assert_eq!(value["analysis_timestamp"], json!("2026-03-09T12:00:00Z"));
        assert_eq!(value["created_at"], value["updated_at"]);
    }

    fn fraction_digits(value: &Value) -> usize {
        let text = value.as_str().unwrap();
        text.split_once('.')
            .map_or(0, |(_, rest)| rest.trim_end_matches('Z').len())
    }

    #[test]
    fn timestamps_are_written_at_microsecond_precision() {
        let mut ctx = ctx();
        ctx.timestamp = ctx.timestamp.with_nanosecond(123_456_789).unwrap();
        let record = analyze_momentum(&[snap("Leash", 3, 1.2)], &[]).remove(0);
        let value =
            serde_json::to_value(MomentumRow::from_record(&Enriched::bare(record), &ctx)).unwrap();
        assert_eq!(value["analysis_timestamp"], json!("2026-03-09T12:00:00.123456Z"));
        assert_eq!(value["created_at"], value["analysis_timestamp"]);

        let mut snapshot = snap("Leash", 1, 1.0);
        snapshot.timestamp = Utc::now();
        ctx.timestamp = Utc::now();
        let value =
            serde_json::to_value(WeekRankRow::from_snapshot(&Enriched::bare(snapshot), &ctx))
                .unwrap();
        for column in ["rank_timestamp", "created_at", "updated_at"] {
            assert!(fraction_digits(&value[column]) <= 6, "{column}: {}", value[column]);
        }
    }

    #[test]
    fn new_product_row_has_null_deltas_and_image_fields() {
        let record = analyze_momentum(&[snap("Bowl", 1, 2.0)], &[]).remove(0);
        let row = MomentumRow::from_record(&Enriched::bare(record), &ctx());
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["previous_rank"], Value::Null);
        assert_eq!(value["rank_change"], Value::Null);
        assert_eq!(value["demand_change"], Value::Null);
        assert_eq!(value["image_url"], Value::Null);
        assert_eq!(value["momentum_score"], json!(0.0));
        assert_eq!(value["trend_type"], json!("NEW_PRODUCT"));
    }

    #[test]
    fn nan_demand_is_written_as_null() {
        let record = analyze_momentum(&[snap("Toy", 2, f64::NAN)], &[]).remove(0);
        let row = MomentumRow::from_record(&Enriched::bare(record), &ctx());
        assert_eq!(row.current_relative_demand, None);
    }

    #[test]
    fn improved_row_reconstructs_previous_rank() {
        let ranking = ImprovedRanking {
            product_title: "Collar".to_string(),
            current_rank: 4,
            rank_improvement: 11,
            current_relative_demand: Some(0.6),
            rank_timestamp: None,
            ranking_category: Some("536".to_string()),
        };
        let row = MomentumRow::from_improved(&Enriched::bare(ranking), &ctx());
        assert_eq!(row.previous_rank, Some(15));
        assert_eq!(row.rank_change, Some(11));
        assert_eq!(row.demand_change, Some(0.0));
        assert_eq!(row.previous_relative_demand, Some(0.6));
        assert!((row.momentum_score - 11.0).abs() < f64::EPSILON);
        assert_eq!(row.trend_type, TrendType::RocketRising);
        assert_eq!(row.category_id, "536");
    }

    #[test]
    fn improved_row_without_category_uses_run_category() {
        let ranking = ImprovedRanking {
            product_title: "Collar".to_string(),
            current_rank: 4,
            rank_improvement: 1,
            current_relative_demand: None,
            rank_timestamp: None,
            ranking_category: None,
        };
        let row = MomentumRow::from_improved(&Enriched::bare(ranking), &ctx());
        assert_eq!(row.category_id, "1253");
    }

    #[test]
    fn week_rank_row_keeps_snapshot_timestamp() {
        let enriched = Enriched::new(snap("Leash", 1, 1.0), Some(image()));
        let row = WeekRankRow::from_snapshot(&enriched, &ctx());
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["rank"], json!(1));
        assert_eq!(value["rank_timestamp"], json!("2026-03-08T00:00:00Z"));
        assert_eq!(value["created_at"], json!("2026-03-09T12:00:00Z"));
        assert_eq!(value["search_link"], json!("https://shop.example/leash"));
    }
}
