pub mod client;
pub mod enricher;
pub mod error;
pub(crate) mod rate_limit;
pub mod types;

pub use client::{CustomSearchClient, ImageSearch};
pub use enricher::{enrich_all, enrich_one, EnrichOptions, EnrichmentOutcome};
pub use error::SearchError;
