//! Decoding of `jobs.query` result rows.
//!
//! BigQuery returns rows as nested `{"f": [{"v": ...}]}` cells with every
//! scalar encoded as a string. [`decode_rows`] walks the result schema and
//! rebuilds plain JSON objects keyed by column name so rows can be
//! deserialized straight into structs. Integers and floats become JSON
//! numbers, timestamps become RFC 3339 strings, repeated fields become arrays
//! and records become nested objects.

use chrono::DateTime;
use serde::Deserialize;
use serde_json::{Map, Number, Value};

use crate::error::BigQueryError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableSchema {
    #[serde(default)]
    pub fields: Vec<TableFieldSchema>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableFieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub fields: Vec<TableFieldSchema>,
}

impl TableFieldSchema {
    fn is_repeated(&self) -> bool {
        self.mode.as_deref() == Some("REPEATED")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRow {
    #[serde(default)]
    pub f: Vec<RawCell>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCell {
    #[serde(default)]
    pub v: Value,
}

/// Decode every row against `schema`.
///
/// # Errors
///
/// Returns [`BigQueryError::Decode`] if a cell does not match its column type.
pub fn decode_rows(
    schema: &TableSchema,
    rows: &[RawRow],
) -> Result<Vec<Map<String, Value>>, BigQueryError> {
    rows.iter().map(|row| decode_record(&schema.fields, row)).collect()
}

fn decode_record(
    fields: &[TableFieldSchema],
    row: &RawRow,
) -> Result<Map<String, Value>, BigQueryError> {
    let mut out = Map::with_capacity(fields.len());
    for (index, field) in fields.iter().enumerate() {
        let raw = row.f.get(index).map_or(&Value::Null, |cell| &cell.v);
        out.insert(field.name.clone(), decode_field(field, raw)?);
    }
    Ok(out)
}

fn decode_field(field: &TableFieldSchema, raw: &Value) -> Result<Value, BigQueryError> {
    if raw.is_null() {
        return Ok(if field.is_repeated() {
            Value::Array(Vec::new())
        } else {
            Value::Null
        });
    }

    if field.is_repeated() {
        let Value::Array(items) = raw else {
            return Err(decode_error(field, "expected an array for a REPEATED field"));
        };
        return items
            .iter()
            .map(|item| decode_value(field, item.get("v").unwrap_or(&Value::Null)))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array);
    }

    decode_value(field, raw)
}

fn decode_value(field: &TableFieldSchema, raw: &Value) -> Result<Value, BigQueryError> {
    if raw.is_null() {
        return Ok(Value::Null);
    }

    match field.field_type.as_str() {
        "RECORD" | "STRUCT" => {
            let row: RawRow = serde_json::from_value(raw.clone())
                .map_err(|e| decode_error(field, &format!("malformed record: {e}")))?;
            decode_record(&field.fields, &row).map(Value::Object)
        }
        "INTEGER" | "INT64" => {
            let text = as_text(field, raw)?;
            let n: i64 = text
                .parse()
                .map_err(|_| decode_error(field, &format!("not an integer: {text}")))?;
            Ok(Value::Number(n.into()))
        }
        "FLOAT" | "FLOAT64" | "NUMERIC" | "BIGNUMERIC" => {
            let text = as_text(field, raw)?;
            let n: f64 = text
                .parse()
                .map_err(|_| decode_error(field, &format!("not a number: {text}")))?;
            // NaN and infinities have no JSON form and decode as null.
            Ok(Number::from_f64(n).map_or(Value::Null, Value::Number))
        }
        "BOOLEAN" | "BOOL" => match as_text(field, raw)? {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            other => Err(decode_error(field, &format!("not a boolean: {other}"))),
        },
        "TIMESTAMP" => {
            let text = as_text(field, raw)?;
            let seconds: f64 = text
                .parse()
                .map_err(|_| decode_error(field, &format!("not an epoch timestamp: {text}")))?;
            #[allow(clippy::cast_possible_truncation)]
            let micros = (seconds * 1_000_000.0).round() as i64;
            let ts = DateTime::from_timestamp_micros(micros)
                .ok_or_else(|| decode_error(field, &format!("timestamp out of range: {text}")))?;
            Ok(Value::String(ts.to_rfc3339()))
        }
        _ => Ok(Value::String(as_text(field, raw)?.to_string())),
    }
}

fn as_text<'a>(field: &TableFieldSchema, raw: &'a Value) -> Result<&'a str, BigQueryError> {
    raw.as_str()
        .ok_or_else(|| decode_error(field, &format!("expected a string cell, got {raw}")))
}

fn decode_error(field: &TableFieldSchema, reason: &str) -> BigQueryError {
    BigQueryError::Decode {
        column: field.name.clone(),
        reason: reason.to_string(),
    }
}
