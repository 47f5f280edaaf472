use serde::{Deserialize, Serialize};

// ════════════════════════════════════════════════════════════════
//  SourceRow
// ════════════════════════════════════════════════════════════════

/// Caller-supplied part of a ledger record: what gets submitted to
/// `append`. The ledger assigns the timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRow {
    /// Device or package identity (opaque).
    pub source_id: String,
    /// Measurement kind, e.g. "Temperature".
    pub category: String,
    /// Free-text payload, may embed a magnitude with units ("22.5°C").
    pub value: String,
}

impl SourceRow {
    pub fn new(
        source_id: impl Into<String>,
        category: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            category: category.into(),
            value: value.into(),
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  LedgerRecord
// ════════════════════════════════════════════════════════════════

/// One durable record at a fixed ledger index.
///
/// `timestamp` is ledger-assigned (seconds since epoch). Two records
/// confirmed within the same tick share a timestamp, so ordering must
/// always come from the index, never from this field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub timestamp: u64,
    pub source_id: String,
    pub category: String,
    pub value: String,
}

impl LedgerRecord {
    pub fn from_row(timestamp: u64, row: &SourceRow) -> Self {
        Self {
            timestamp,
            source_id: row.source_id.clone(),
            category: row.category.clone(),
            value: row.value.clone(),
        }
    }

    /// Caller-supplied fields, for comparing against what was submitted.
    pub fn row(&self) -> SourceRow {
        SourceRow::new(&self.source_id, &self.category, &self.value)
    }
}

// ════════════════════════════════════════════════════════════════
//  Confirmation
// ════════════════════════════════════════════════════════════════

/// Proof that an append is durable.
///
/// Deliberately carries no index: under concurrent writers the final
/// position is only knowable by reading the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    /// Transaction identifier (hash for on-chain backends).
    pub tx_id: String,
    /// Block that included the transaction, when the backend has blocks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    /// Ledger-assigned timestamp, when the backend reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}
