//! Named-column input adapter. Rows arrive as JSON objects (one per user) and
//! are checked against the `UserRecord` schema.

use chrono::{DateTime, NaiveDateTime, Utc};
use mece_core::{SegmentationError, SegmentationResult, UserRecord};
use serde_json::{Map, Value};

pub type Row = Map<String, Value>;

pub const REQUIRED_COLUMNS: [&str; 7] = [
    "user_id",
    "cart_abandoned_date",
    "avg_order_value",
    "sessions_last_30d",
    "num_cart_items",
    "engagement_score",
    "profitability_score",
];

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse either a JSON array of objects or JSON Lines.
pub fn rows_from_json(text: &str) -> SegmentationResult<Vec<Row>> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }
    trimmed
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str::<Row>(line).map_err(SegmentationError::from))
        .collect()
}

/// Convert rows into records, failing on the first missing or mistyped
/// column. A null `cart_abandoned_date` is accepted.
pub fn records_from_rows(rows: &[Row]) -> SegmentationResult<Vec<UserRecord>> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| record_from_row(index, row))
        .collect()
}

fn record_from_row(index: usize, row: &Row) -> SegmentationResult<UserRecord> {
    for column in REQUIRED_COLUMNS {
        if !row.contains_key(column) {
            return Err(SegmentationError::schema(
                column,
                format!("missing in row {index}"),
            ));
        }
    }

    Ok(UserRecord {
        user_id: string_field(index, row, "user_id")?,
        cart_abandoned_at: timestamp_field(index, row, "cart_abandoned_date")?,
        last_order_at: timestamp_field(index, row, "last_order_date")?,
        avg_order_value: float_field(index, row, "avg_order_value")?,
        sessions_last_30d: count_field(index, row, "sessions_last_30d")?,
        num_cart_items: count_field(index, row, "num_cart_items")?,
        engagement_score: float_field(index, row, "engagement_score")?,
        profitability_score: float_field(index, row, "profitability_score")?,
    })
}

fn mistyped(index: usize, column: &str, expected: &str, value: &Value) -> SegmentationError {
    SegmentationError::schema(
        column,
        format!("row {index}: expected {expected}, found {value}"),
    )
}

fn string_field(index: usize, row: &Row, column: &str) -> SegmentationResult<String> {
    match &row[column] {
        Value::String(s) if !s.is_empty() => Ok(s.clone()),
        other => Err(mistyped(index, column, "non-empty string", other)),
    }
}

fn float_field(index: usize, row: &Row, column: &str) -> SegmentationResult<f64> {
    let value = &row[column];
    value
        .as_f64()
        .ok_or_else(|| mistyped(index, column, "number", value))
}

/// Non-negative integer; whole floats such as `8.0` are accepted.
fn count_field(index: usize, row: &Row, column: &str) -> SegmentationResult<u32> {
    let value = &row[column];
    let parsed = match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        }),
        _ => None,
    };
    parsed
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| mistyped(index, column, "non-negative integer", value))
}

fn timestamp_field(
    index: usize,
    row: &Row,
    column: &str,
) -> SegmentationResult<Option<DateTime<Utc>>> {
    match row.get(column) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => parse_timestamp(s)
            .map(Some)
            .ok_or_else(|| mistyped(index, column, "RFC 3339 timestamp", &row[column])),
        Some(other) => Err(mistyped(index, column, "timestamp string", other)),
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}
