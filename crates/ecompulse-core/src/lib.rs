pub mod app_config;
pub mod config;
pub mod enriched;
pub mod momentum;
pub mod ranking;
pub mod report;

pub use app_config::{AppConfig, BigQueryTarget, CredentialsSource, Environment, TaskConfig};
pub use config::{load_app_config, load_app_config_from_env, load_dotenv};
pub use enriched::{Enriched, EnrichedMomentumRecord, ImageMatch};
pub use momentum::{analyze_momentum, classify_trend, MomentumRecord, TrendType};
pub use ranking::{
    resolve_title, CategoryFilter, ImprovedRanking, LocalizedTitle, RankingSnapshot,
    ALL_CATEGORIES_SENTINEL,
};
pub use report::{
    build_rank_improvement_report, build_trend_report, CategoryStats, RankImprovementReport,
    RankImprovementStats, TrendReport,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for environment variable {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
