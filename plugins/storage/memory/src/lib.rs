use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::RwLock;

use ledger_api::{Confirmation, LedgerBackend, LedgerError, LedgerRecord, SourceRow, now_secs};

// ═══════════════════════════════════════════════════════════════
//  MemoryLedgerConfig
// ═══════════════════════════════════════════════════════════════

fn default_max_records() -> usize {
    100_000
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct MemoryLedgerConfig {
    #[serde(default = "default_max_records")]
    pub max_records: usize,
}

impl Default for MemoryLedgerConfig {
    fn default() -> Self {
        Self {
            max_records: default_max_records(),
        }
    }
}

type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;
type Validator = Arc<dyn Fn(&SourceRow) -> Result<(), String> + Send + Sync>;

// ═══════════════════════════════════════════════════════════════
//  MemoryLedger
// ═══════════════════════════════════════════════════════════════

/// In-process append-only ledger.
///
/// Nothing survives the process, so it serves dry runs and as the ledger
/// double in tests. Unlike a ring buffer it never evicts: once
/// `max_records` is reached further appends are rejected.
///
/// The fault switches (`disconnect`, `stall`, `mark_unreadable`, ...)
/// simulate the failure modes of a remote ledger.
pub struct MemoryLedger {
    records: RwLock<Vec<LedgerRecord>>,
    max_records: usize,
    clock: Clock,
    validator: Option<Validator>,
    connected: AtomicBool,
    stalled: AtomicBool,
    /// Remaining appends before the connection drops; `u64::MAX` = never.
    drop_after: AtomicU64,
    unreadable: Mutex<HashSet<u64>>,
    tx_seq: AtomicU64,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new(&MemoryLedgerConfig::default())
    }
}

impl MemoryLedger {
    pub fn new(config: &MemoryLedgerConfig) -> Self {
        Self {
            records: RwLock::new(Vec::with_capacity(config.max_records.min(65536))),
            max_records: config.max_records,
            clock: Arc::new(now_secs),
            validator: None,
            connected: AtomicBool::new(true),
            stalled: AtomicBool::new(false),
            drop_after: AtomicU64::new(u64::MAX),
            unreadable: Mutex::new(HashSet::new()),
            tx_seq: AtomicU64::new(0),
        }
    }

    /// Replace the timestamp source (seconds since epoch).
    pub fn with_clock(mut self, clock: impl Fn() -> u64 + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Reject rows for which `validator` returns `Err(reason)`.
    pub fn with_validator(
        mut self,
        validator: impl Fn(&SourceRow) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn reconnect(&self) {
        self.drop_after.store(u64::MAX, Ordering::SeqCst);
        self.connected.store(true, Ordering::SeqCst);
    }

    /// Drop the connection once `n` more appends have been confirmed.
    pub fn disconnect_after(&self, n: u64) {
        if n == 0 {
            self.disconnect();
        } else {
            self.drop_after.store(n, Ordering::SeqCst);
        }
    }

    /// While stalled, appends are accepted but never confirmed.
    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    pub fn mark_unreadable(&self, index: u64) {
        if let Ok(mut set) = self.unreadable.lock() {
            set.insert(index);
        }
    }

    fn ensure_connected(&self) -> Result<(), LedgerError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(LedgerError::connection("memory ledger disconnected"))
        }
    }

    fn is_unreadable(&self, index: u64) -> bool {
        self.unreadable
            .lock()
            .map(|set| set.contains(&index))
            .unwrap_or(false)
    }

    fn note_confirmed(&self) {
        let left = self.drop_after.load(Ordering::SeqCst);
        if left == u64::MAX {
            return;
        }
        if left <= 1 {
            self.disconnect();
        } else {
            self.drop_after.store(left - 1, Ordering::SeqCst);
        }
    }
}

impl LedgerBackend for MemoryLedger {
    fn ping(&self) -> Pin<Box<dyn Future<Output = Result<(), LedgerError>> + Send + '_>> {
        Box::pin(async { self.ensure_connected() })
    }

    fn append(
        &self,
        row: &SourceRow,
    ) -> Pin<Box<dyn Future<Output = Result<Confirmation, LedgerError>> + Send + '_>> {
        let row = row.clone();
        Box::pin(async move {
            if !self.connected.load(Ordering::SeqCst) {
                return Err(LedgerError::submission("memory ledger disconnected"));
            }
            if let Some(validator) = &self.validator {
                validator(&row).map_err(LedgerError::Rejected)?;
            }
            if self.stalled.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }

            let timestamp = (self.clock)();
            {
                let mut buf = self.records.write().await;
                if buf.len() >= self.max_records {
                    return Err(LedgerError::rejected(format!(
                        "ledger full ({} records)",
                        self.max_records
                    )));
                }
                buf.push(LedgerRecord::from_row(timestamp, &row));
            }
            self.note_confirmed();

            let seq = self.tx_seq.fetch_add(1, Ordering::SeqCst);
            Ok(Confirmation {
                tx_id: format!("mem-{seq:08}"),
                block_number: None,
                timestamp: Some(timestamp),
            })
        })
    }

    fn count(&self) -> Pin<Box<dyn Future<Output = Result<u64, LedgerError>> + Send + '_>> {
        Box::pin(async move {
            self.ensure_connected()?;
            Ok(self.records.read().await.len() as u64)
        })
    }

    fn read_at(
        &self,
        index: u64,
    ) -> Pin<Box<dyn Future<Output = Result<LedgerRecord, LedgerError>> + Send + '_>> {
        Box::pin(async move {
            self.ensure_connected()?;
            let buf = self.records.read().await;
            let count = buf.len() as u64;
            let record = usize::try_from(index)
                .ok()
                .and_then(|i| buf.get(i))
                .ok_or(LedgerError::Index { index, count })?;
            if self.is_unreadable(index) {
                return Err(LedgerError::Unreadable {
                    index,
                    reason: "marked unreadable".into(),
                });
            }
            Ok(record.clone())
        })
    }
}
