#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("no ledger configured: set [ledger] in the config file or pass --contract")]
    NoLedger,

    #[error("{path}:{line}: {detail}")]
    Input { path: String, line: usize, detail: String },

    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("ledger: {0}")]
    Ledger(#[from] ledger_api::LedgerError),

    #[error("{0}")]
    Pipeline(#[from] pipeline::PipelineError),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Incomplete(String),
}

impl TrackerError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}
