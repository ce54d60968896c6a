use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category id that means "every category" in the rank-improvement
/// pipeline: the category filter is dropped entirely.
pub const ALL_CATEGORIES_SENTINEL: &str = "123456";

/// One locale-tagged entry from the `product_title` repeated field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedTitle {
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl LocalizedTitle {
    #[must_use]
    pub fn new(locale: &str, name: &str) -> Self {
        Self {
            locale: Some(locale.to_string()),
            name: Some(name.to_string()),
        }
    }
}

/// Pick the display title for a product: the `"en"` entry when one exists,
/// otherwise the first entry in the list.
///
/// Both ranking snapshots go through this same function so titles stay
/// comparable as a join key. An `"en"` entry without a name falls through to
/// the first entry, matching `COALESCE` over the two lookups.
#[must_use]
pub fn resolve_title(titles: &[LocalizedTitle]) -> Option<String> {
    titles
        .iter()
        .find(|t| t.locale.as_deref() == Some("en") && t.name.is_some())
        .or_else(|| titles.first())
        .and_then(|t| t.name.clone())
}

/// One timestamped observation of a product's rank and demand for a
/// (country, category) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingSnapshot {
    pub product_title: String,
    pub rank: i64,
    /// Normalized demand indicator from Merchant Center. `NaN` when the
    /// source column is null.
    pub relative_demand: f64,
    pub timestamp: DateTime<Utc>,
}

/// A row from the optimized ranking table, which carries a precomputed
/// `rank_improvement` against the previous collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovedRanking {
    pub product_title: String,
    pub current_rank: i64,
    pub rank_improvement: i64,
    pub current_relative_demand: Option<f64>,
    pub rank_timestamp: Option<DateTime<Utc>>,
    pub ranking_category: Option<String>,
}

impl ImprovedRanking {
    /// Rank before the improvement: `current_rank + rank_improvement`.
    #[must_use]
    pub fn previous_rank(&self) -> i64 {
        self.current_rank.saturating_add(self.rank_improvement)
    }
}

/// Category scope for a ranking query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryFilter {
    All,
    Category(String),
}

impl CategoryFilter {
    /// Interpret a configured category id, mapping
    /// [`ALL_CATEGORIES_SENTINEL`] to [`CategoryFilter::All`].
    #[must_use]
    pub fn from_task_category(category_id: &str) -> Self {
        if category_id == ALL_CATEGORIES_SENTINEL {
            Self::All
        } else {
            Self::Category(category_id.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_title_prefers_english() {
        let titles = vec![
            LocalizedTitle::new("de", "Hundeleine"),
            LocalizedTitle::new("en", "Dog Leash"),
        ];
        assert_eq!(resolve_title(&titles).as_deref(), Some("Dog Leash"));
    }

    #[test]
    fn resolve_title_falls_back_to_first_entry() {
        let titles = vec![
            LocalizedTitle::new("fr", "Laisse"),
            LocalizedTitle::new("de", "Hundeleine"),
        ];
        assert_eq!(resolve_title(&titles).as_deref(), Some("Laisse"));
    }

    #[test]
    fn resolve_title_empty_list_is_none() {
        assert_eq!(resolve_title(&[]), None);
    }

    #[test]
    fn resolve_title_english_without_name_uses_first_entry() {
        let titles = vec![
            LocalizedTitle::new("fr", "Laisse"),
            LocalizedTitle {
                locale: Some("en".to_string()),
                name: None,
            },
        ];
        assert_eq!(resolve_title(&titles).as_deref(), Some("Laisse"));
    }

    #[test]
    fn localized_title_deserializes_with_missing_fields() {
        let title: LocalizedTitle = serde_json::from_str(r#"{"name":"Mug"}"#).unwrap();
        assert_eq!(title.locale, None);
        assert_eq!(title.name.as_deref(), Some("Mug"));
    }

    #[test]
    fn previous_rank_adds_improvement() {
        let row = ImprovedRanking {
            product_title: "Mug".to_string(),
            current_rank: 4,
            rank_improvement: 6,
            current_relative_demand: Some(1.5),
            rank_timestamp: None,
            ranking_category: Some("1253".to_string()),
        };
        assert_eq!(row.previous_rank(), 10);
    }

    #[test]
    fn sentinel_category_means_all() {
        assert_eq!(
            CategoryFilter::from_task_category("123456"),
            CategoryFilter::All
        );
        assert_eq!(
            CategoryFilter::from_task_category("1253"),
            CategoryFilter::Category("1253".to_string())
        );
    }
}
