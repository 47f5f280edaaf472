//! Shared vocabulary of the ledger pipeline: record types, the backend
//! trait and the error taxonomy.

mod backend;
mod error;
mod types;
mod util;

pub use backend::LedgerBackend;
pub use error::{ErrorKind, LedgerError};
pub use types::{Confirmation, LedgerRecord, SourceRow};
pub use util::{now_secs, strip_hex_prefix};
