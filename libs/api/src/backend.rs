use std::future::Future;
use std::pin::Pin;

use crate::error::LedgerError;
use crate::types::{Confirmation, LedgerRecord, SourceRow};

/// Ledger backend trait.
///
/// The pipeline doesn't know concrete implementations; for it a ledger is
/// just this trait. Every method may be slow (network round trips), so
/// all of them are async. Bounding the wait is the caller's job;
/// `append` in particular may pend until the write is durable.
pub trait LedgerBackend: Send + Sync {
    /// Cheap reachability check.
    fn ping(&self) -> Pin<Box<dyn Future<Output = Result<(), LedgerError>> + Send + '_>>;

    /// Submit one record and resolve once the ledger confirms it durable.
    fn append(
        &self,
        row: &SourceRow,
    ) -> Pin<Box<dyn Future<Output = Result<Confirmation, LedgerError>> + Send + '_>>;

    /// Number of durable records.
    fn count(&self) -> Pin<Box<dyn Future<Output = Result<u64, LedgerError>> + Send + '_>>;

    /// Durable record at `index`. `LedgerError::Index` past the end.
    fn read_at(
        &self,
        index: u64,
    ) -> Pin<Box<dyn Future<Output = Result<LedgerRecord, LedgerError>> + Send + '_>>;
}
