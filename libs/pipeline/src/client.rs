use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ledger_api::{Confirmation, LedgerBackend, LedgerError, LedgerRecord, SourceRow};

use crate::config::ClientTimeouts;

/// Connected handle to one ledger.
///
/// The only way to get one is [`LedgerClient::connect`], so every other
/// operation runs against a ledger that answered at least once. Each call
/// is bounded by [`ClientTimeouts`]: an append that does not confirm in
/// time becomes `Submission`, anything else that hangs becomes
/// `Connection`. Nothing is retried here.
///
/// Cloning is cheap and shares the backend.
#[derive(Clone)]
pub struct LedgerClient {
    name: String,
    backend: Arc<dyn LedgerBackend>,
    timeouts: ClientTimeouts,
}

impl std::fmt::Debug for LedgerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerClient")
            .field("name", &self.name)
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

async fn bounded<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T, LedgerError>>,
    on_timeout: impl FnOnce() -> LedgerError,
) -> Result<T, LedgerError> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout()),
    }
}

impl LedgerClient {
    pub async fn connect(
        name: impl Into<String>,
        backend: Arc<dyn LedgerBackend>,
        timeouts: ClientTimeouts,
    ) -> Result<Self, LedgerError> {
        let name = name.into();
        let limit = timeouts.connect();
        bounded(limit, backend.ping(), || {
            LedgerError::connection(format!("no answer within {limit:?}"))
        })
        .await
        .map_err(|e| match e {
            // Whatever the backend said, failing here means unreachable.
            e @ (LedgerError::Connection(_) | LedgerError::Config(_)) => e,
            other => LedgerError::connection(other.to_string()),
        })?;

        tracing::info!(ledger = %name, "connected");
        Ok(Self {
            name,
            backend,
            timeouts,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Submit one record and wait until it is durable.
    ///
    /// The confirmation does not say where the record landed.
    pub async fn append(&self, row: &SourceRow) -> Result<Confirmation, LedgerError> {
        let limit = self.timeouts.confirm();
        let confirmation = bounded(limit, self.backend.append(row), || {
            LedgerError::submission(format!("not confirmed within {limit:?}"))
        })
        .await?;
        tracing::debug!(
            ledger = %self.name,
            tx = %confirmation.tx_id,
            source_id = %row.source_id,
            "append confirmed"
        );
        Ok(confirmation)
    }

    pub async fn count(&self) -> Result<u64, LedgerError> {
        let limit = self.timeouts.call();
        bounded(limit, self.backend.count(), || {
            LedgerError::connection(format!("count: no answer within {limit:?}"))
        })
        .await
    }

    pub async fn read_at(&self, index: u64) -> Result<LedgerRecord, LedgerError> {
        let limit = self.timeouts.call();
        bounded(limit, self.backend.read_at(index), || {
            LedgerError::connection(format!("read {index}: no answer within {limit:?}"))
        })
        .await
    }

    /// Reachability check, used to tell a dropped connection apart from a
    /// one-off submission failure.
    pub async fn ping(&self) -> Result<(), LedgerError> {
        let limit = self.timeouts.call();
        bounded(limit, self.backend.ping(), || {
            LedgerError::connection(format!("ping: no answer within {limit:?}"))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_memory::MemoryLedger;

    #[tokio::test]
    async fn connect_fails_when_unreachable() {
        let ledger = Arc::new(MemoryLedger::default());
        ledger.disconnect();
        let err = LedgerClient::connect("mem", ledger, ClientTimeouts::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Connection(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn unconfirmed_append_times_out_as_submission_error() {
        let ledger = Arc::new(MemoryLedger::default());
        let client = LedgerClient::connect("mem", ledger.clone(), ClientTimeouts::default())
            .await
            .unwrap();
        ledger.set_stalled(true);

        let err = client
            .append(&SourceRow::new("D1", "Temp", "22.5C"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Submission(_)));
        assert_eq!(client.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn read_past_count_is_index_error() {
        let ledger = Arc::new(MemoryLedger::default());
        let client = LedgerClient::connect("mem", ledger, ClientTimeouts::default())
            .await
            .unwrap();
        client.append(&SourceRow::new("D1", "Temp", "22.5C")).await.unwrap();

        assert_eq!(client.count().await.unwrap(), 1);
        assert_eq!(
            client.read_at(1).await.unwrap_err(),
            LedgerError::Index { index: 1, count: 1 }
        );
    }
}
