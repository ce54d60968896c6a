//! Append-only result writer with row-by-row fallback.
//!
//! [`write_with_fallback`] tries one bulk insert. If that call fails it
//! inserts each row on its own so a single malformed row cannot sink the
//! batch, and records what happened to every row in a [`WriteReport`].
//! Failed rows are not retried.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::client::{BigQueryClient, InsertRow};
use crate::error::BigQueryError;

/// Destination for flat result rows.
#[async_trait]
pub trait RowSink: Send + Sync {
    /// Name used in log lines.
    fn table_name(&self) -> &str;

    /// Insert `rows` in one call. All or nothing.
    ///
    /// # Errors
    ///
    /// Returns [`BigQueryError`] if the call fails or any row is rejected.
    async fn insert(&self, rows: &[InsertRow]) -> Result<(), BigQueryError>;
}

/// A BigQuery table in the configured dataset.
pub struct BigQueryTable {
    client: Arc<BigQueryClient>,
    dataset_id: String,
    table_id: String,
}

impl BigQueryTable {
    #[must_use]
    pub fn new(client: Arc<BigQueryClient>, dataset_id: &str, table_id: &str) -> Self {
        Self {
            client,
            dataset_id: dataset_id.to_string(),
            table_id: table_id.to_string(),
        }
    }
}

#[async_trait]
impl RowSink for BigQueryTable {
    fn table_name(&self) -> &str {
        &self.table_id
    }

    async fn insert(&self, rows: &[InsertRow]) -> Result<(), BigQueryError> {
        self.client
            .insert_all(&self.dataset_id, &self.table_id, rows)
            .await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// The single bulk call succeeded.
    Bulk,
    /// The bulk call failed and rows were inserted one at a time.
    RowByRow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Inserted,
    Failed { reason: String },
}

impl RowOutcome {
    #[must_use]
    pub fn is_inserted(&self) -> bool {
        matches!(self, RowOutcome::Inserted)
    }
}

/// What happened to each row of one write, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    pub table: String,
    pub mode: WriteMode,
    pub outcomes: Vec<RowOutcome>,
    /// Error from the bulk call when the writer fell back.
    pub bulk_error: Option<String>,
}

impl WriteReport {
    #[must_use]
    pub fn inserted(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_inserted()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.inserted()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed() == 0
    }

    /// Indices of rows that could not be inserted.
    #[must_use]
    pub fn failed_rows(&self) -> Vec<usize> {
        self.outcomes
            .iter()
            .enumerate()
            .filter(|(_, o)| !o.is_inserted())
            .map(|(i, _)| i)
            .collect()
    }
}

/// Serialize rows into `insertAll` form, giving each a fresh insert id.
///
/// # Errors
///
/// Returns [`BigQueryError::Deserialize`] if a row fails to serialize.
pub fn to_insert_rows<T: Serialize>(rows: &[T]) -> Result<Vec<InsertRow>, BigQueryError> {
    rows.iter()
        .map(|row| {
            let json = serde_json::to_value(row).map_err(|e| BigQueryError::Deserialize {
                context: "result row".to_string(),
                source: e,
            })?;
            Ok(InsertRow {
                insert_id: Uuid::new_v4().to_string(),
                json,
            })
        })
        .collect()
}

/// Append `rows` to `sink`, falling back to row-by-row inserts when the bulk
/// call fails.
///
/// Never returns an error: per-row failures are logged and collected in the
/// report. The same insert ids are reused in the fallback, so rows that a
/// failed bulk call did land are not duplicated.
pub async fn write_with_fallback<S: RowSink + ?Sized>(
    sink: &S,
    rows: &[InsertRow],
) -> WriteReport {
    let table = sink.table_name().to_string();

    if rows.is_empty() {
        tracing::info!(table = %table, "no rows to write");
        return WriteReport {
            table,
            mode: WriteMode::Bulk,
            outcomes: Vec::new(),
            bulk_error: None,
        };
    }

    let bulk_error = match sink.insert(rows).await {
        Ok(()) => {
            tracing::info!(table = %table, rows = rows.len(), "bulk insert succeeded");
            return WriteReport {
                table,
                mode: WriteMode::Bulk,
                outcomes: vec![RowOutcome::Inserted; rows.len()],
                bulk_error: None,
            };
        }
        Err(e) => e.to_string(),
    };

    tracing::warn!(
        table = %table,
        rows = rows.len(),
        error = %bulk_error,
        "bulk insert failed, falling back to row-by-row inserts"
    );

    let mut outcomes = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        match sink.insert(std::slice::from_ref(row)).await {
            Ok(()) => {
                tracing::debug!(table = %table, row = index, "row inserted");
                outcomes.push(RowOutcome::Inserted);
            }
            Err(e) => {
                tracing::error!(
                    table = %table,
                    row = index,
                    error = %e,
                    data = %row.json,
                    "row insert failed"
                );
                outcomes.push(RowOutcome::Failed {
                    reason: e.to_string(),
                });
            }
        }
    }

    let report = WriteReport {
        table,
        mode: WriteMode::RowByRow,
        outcomes,
        bulk_error: Some(bulk_error),
    };
    tracing::info!(
        table = %report.table,
        inserted = report.inserted(),
        failed = report.failed(),
        "row-by-row insert finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::{json, Value};

    use super::*;

    /// Rejects any call containing a row whose `json.bad` is true.
    #[derive(Default)]
    struct PickySink {
        calls: Mutex<Vec<usize>>,
        always_fail: bool,
    }

    #[async_trait]
    impl RowSink for PickySink {
        fn table_name(&self) -> &str {
            "product_momentum_analysis"
        }

        async fn insert(&self, rows: &[InsertRow]) -> Result<(), BigQueryError> {
            self.calls.lock().unwrap().push(rows.len());
            if self.always_fail || rows.iter().any(|r| r.json["bad"] == json!(true)) {
                return Err(BigQueryError::Auth("rejected".to_string()));
            }
            Ok(())
        }
    }

    fn rows(bad: &[bool]) -> Vec<InsertRow> {
        let values: Vec<Value> = bad.iter().map(|b| json!({ "bad": b })).collect();
        to_insert_rows(&values).unwrap()
    }

    #[tokio::test]
    async fn bulk_success_makes_one_call() {
        let sink = PickySink::default();
        let report = write_with_fallback(&sink, &rows(&[false, false, false])).await;
        assert_eq!(report.mode, WriteMode::Bulk);
        assert_eq!(report.inserted(), 3);
        assert!(report.is_complete());
        assert_eq!(*sink.calls.lock().unwrap(), vec![3]);
    }

    #[tokio::test]
    async fn bulk_failure_isolates_bad_rows() {
        let sink = PickySink::default();
        let report = write_with_fallback(&sink, &rows(&[false, true, false, true])).await;
        assert_eq!(report.mode, WriteMode::RowByRow);
        assert_eq!(report.inserted(), 2);
        assert_eq!(report.failed(), 2);
        assert_eq!(report.failed_rows(), vec![1, 3]);
        assert!(report.bulk_error.is_some());
        assert_eq!(*sink.calls.lock().unwrap(), vec![4, 1, 1, 1, 1]);
    }

    #[tokio::test]
    async fn every_row_failing_still_reports_each_row() {
        let sink = PickySink {
            always_fail: true,
            ..PickySink::default()
        };
        let report = write_with_fallback(&sink, &rows(&[false, false])).await;
        assert_eq!(report.failed(), 2);
        assert!(matches!(
            &report.outcomes[0],
            RowOutcome::Failed { reason } if reason.contains("rejected")
        ));
    }

    #[tokio::test]
    async fn empty_input_skips_the_sink() {
        let sink = PickySink::default();
        let report = write_with_fallback(&sink, &[]).await;
        assert!(report.outcomes.is_empty());
        assert!(sink.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn insert_ids_are_unique() {
        let rows = rows(&[false, false, false]);
        let mut ids: Vec<&str> = rows.iter().map(|r| r.insert_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }
}
