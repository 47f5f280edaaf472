use ledger_api::LedgerError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),

    #[error("retrieval failed at index {index}: {source}")]
    Retrieval { index: u64, source: LedgerError },

    #[error("cancelled")]
    Cancelled,
}
