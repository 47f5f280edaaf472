use tokio_util::sync::CancellationToken;

use ledger_api::LedgerRecord;

use crate::client::LedgerClient;
use crate::error::PipelineError;

/// Replays the ledger into memory.
///
/// `fetch_all` reads the count once and then indices `0..count` in
/// order. Records appended during the scan are not included; the result
/// is one consistent snapshot. Any failing read fails the whole call and
/// the partial result is dropped.
pub struct Retriever {
    client: LedgerClient,
    token: CancellationToken,
}

impl Retriever {
    pub fn new(client: LedgerClient) -> Self {
        Self {
            client,
            token: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub async fn fetch_all(&self) -> Result<Vec<LedgerRecord>, PipelineError> {
        let ledger = self.client.name();
        let snapshot = self.client.count().await?;
        tracing::info!(%ledger, snapshot, "retrieval started");

        let mut records = Vec::with_capacity(usize::try_from(snapshot).unwrap_or(0).min(65536));
        for index in 0..snapshot {
            if self.token.is_cancelled() {
                tracing::info!(%ledger, index, "retrieval cancelled");
                return Err(PipelineError::Cancelled);
            }
            let record = self
                .client
                .read_at(index)
                .await
                .map_err(|source| PipelineError::Retrieval { index, source })?;
            records.push(record);

            if (index + 1) % 500 == 0 {
                tracing::debug!(%ledger, read = index + 1, snapshot, "retrieval progress");
            }
        }

        tracing::info!(%ledger, records = records.len(), "retrieval finished");
        Ok(records)
    }
}
