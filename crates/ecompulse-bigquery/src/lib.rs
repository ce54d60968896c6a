//! BigQuery access for the trend pipelines: OAuth2 credentials, the REST
//! client, ranking snapshot queries and the append-only result writer.

pub mod auth;
pub mod client;
pub mod error;
pub mod ranking;
pub mod results;
pub mod rows;
pub mod writer;

pub use auth::{token_provider, ServiceAccountAuth, ServiceAccountKey, StaticToken, TokenProvider};
pub use client::{BigQueryClient, InsertRow, QueryRequest};
pub use error::{BigQueryError, RowInsertError};
pub use ranking::{
    current_snapshot_query, fetch_snapshots, improved_rankings_query, previous_snapshot_query,
    BigQueryRankingSource, RankingQuery, RankingSource, Snapshots, PREVIOUS_SNAPSHOT_LIMIT,
};
pub use results::{MomentumRow, RunContext, WeekRankRow};
pub use writer::{
    to_insert_rows, write_with_fallback, BigQueryTable, RowOutcome, RowSink, WriteMode,
    WriteReport,
};
