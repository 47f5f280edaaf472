/// Category of a ledger error. Lets callers decide how far a failure
/// reaches (one row, one operation, the whole run) without matching on
/// every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Service unreachable; fatal to the run, no automatic retry.
    Connection,
    /// A single append could not be transmitted or confirmed in time.
    Submission,
    /// The ledger refused a specific write.
    Rejected,
    /// Read past the end of the log.
    Index,
    /// Record exists but could not be read back.
    Unreadable,
    /// Response from the service could not be interpreted.
    Decode,
    /// Invalid configuration; permanent, fail at startup.
    Config,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Connection => f.write_str("connection"),
            ErrorKind::Submission => f.write_str("submission"),
            ErrorKind::Rejected => f.write_str("rejected"),
            ErrorKind::Index => f.write_str("index"),
            ErrorKind::Unreadable => f.write_str("unreadable"),
            ErrorKind::Decode => f.write_str("decode"),
            ErrorKind::Config => f.write_str("config"),
        }
    }
}

/// Unified error type for every ledger backend and for `LedgerClient`.
///
/// Invalid UTF-8 in a ledger response converts to `Decode`, so decoders
/// can use `?` on `String::from_utf8`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger unreachable: {0}")]
    Connection(String),

    #[error("submission failed: {0}")]
    Submission(String),

    #[error("write rejected: {0}")]
    Rejected(String),

    #[error("index {index} out of range (count {count})")]
    Index { index: u64, count: u64 },

    #[error("record {index} unreadable: {reason}")]
    Unreadable { index: u64, reason: String },

    #[error("bad response: {0}")]
    Decode(String),

    #[error("config: {0}")]
    Config(String),
}

impl LedgerError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn submission(msg: impl Into<String>) -> Self {
        Self::Submission(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Connection(_) => ErrorKind::Connection,
            LedgerError::Submission(_) => ErrorKind::Submission,
            LedgerError::Rejected(_) => ErrorKind::Rejected,
            LedgerError::Index { .. } => ErrorKind::Index,
            LedgerError::Unreadable { .. } => ErrorKind::Unreadable,
            LedgerError::Decode(_) => ErrorKind::Decode,
            LedgerError::Config(_) => ErrorKind::Config,
        }
    }

    /// Message without the variant prefix, for per-row report entries.
    pub fn reason(&self) -> String {
        match self {
            LedgerError::Connection(m)
            | LedgerError::Submission(m)
            | LedgerError::Rejected(m)
            | LedgerError::Decode(m)
            | LedgerError::Config(m) => m.clone(),
            LedgerError::Index { index, count } => format!("index {index} >= count {count}"),
            LedgerError::Unreadable { reason, .. } => reason.clone(),
        }
    }
}

impl From<std::string::FromUtf8Error> for LedgerError {
    fn from(e: std::string::FromUtf8Error) -> Self {
        Self::Decode(e.to_string())
    }
}
