//! Raw ledger records → typed rows.
//!
//! Pure and total: every well-formed `LedgerRecord` normalizes, nothing
//! here touches the ledger.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Serialize, Serializer};

use ledger_api::LedgerRecord;

/// First run of ASCII digits, optionally followed by a dot and more digits.
static MAGNITUDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+\.?[0-9]*").expect("invalid magnitude pattern"));

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&ts.format(TIMESTAMP_FORMAT))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanedRow {
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub source_id: String,
    pub category: String,
    /// Original text, untouched.
    pub value: String,
    /// Magnitude extracted from `value`; 0.0 when there is none.
    pub numeric_value: f64,
}

/// Ledger seconds → UTC calendar time. Seconds beyond chrono's range
/// (hundreds of millennia out) clamp to the latest representable instant
/// so that normalization stays total.
pub fn to_calendar(timestamp: u64) -> DateTime<Utc> {
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Magnitude embedded in a free-text value: the first maximal numeric
/// substring, read as `f64`. No match yields `0.0`, so a zero reading and
/// a missing one are indistinguishable downstream.
///
/// Signs and exponents are not recognised (`"-4.5"` → 4.5).
///
/// A digit run too long for `f64` counts as no magnitude and yields `0.0`,
/// never infinity.
///
/// Identifiers are not told apart from measurements: `"RFID-482193"`
/// yields 482193.0 and `"PKG1234"` yields 1234.0. That is the established
/// behaviour of the dataset and stays as-is until callers can say which
/// categories carry measurements.
pub fn extract_magnitude(value: &str) -> f64 {
    MAGNITUDE
        .find(value)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

pub fn normalize_record(record: &LedgerRecord) -> CleanedRow {
    CleanedRow {
        timestamp: to_calendar(record.timestamp),
        source_id: record.source_id.clone(),
        category: record.category.clone(),
        value: record.value.clone(),
        numeric_value: extract_magnitude(&record.value),
    }
}

/// Normalize in ledger order; the output has one row per input record.
pub fn normalize(records: &[LedgerRecord]) -> Vec<CleanedRow> {
    records.iter().map(normalize_record).collect()
}
