use serde::Serialize;
use tokio_util::sync::CancellationToken;

use ledger_api::{Confirmation, ErrorKind, LedgerError, SourceRow};

use crate::client::LedgerClient;
use crate::error::PipelineError;
use crate::pacing::Pacer;

// ═══════════════════════════════════════════════════════════════
//  Report
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RowOutcome {
    /// Submitted and durable.
    Confirmed { confirmation: Confirmation },
    /// Attempted; the ledger did not take it.
    Failed { kind: ErrorKind, reason: String },
    /// Never submitted because the run stopped first.
    NotAttempted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowReport {
    /// Position in the input sequence.
    pub position: usize,
    pub row: SourceRow,
    pub outcome: RowOutcome,
}

/// Why a run ended before the input did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Halt {
    Cancelled,
    ConnectionLost { detail: String },
}

impl std::fmt::Display for Halt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Halt::Cancelled => f.write_str("cancelled"),
            Halt::ConnectionLost { detail } => write!(f, "connection lost: {detail}"),
        }
    }
}

/// Outcome of one ingestion run: one entry per input row, in input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionReport {
    pub entries: Vec<RowReport>,
    /// Ledger count observed before the first append.
    pub count_before: u64,
    /// Ledger count observed after the last attempt, if still reachable.
    pub count_after: Option<u64>,
    pub halted: Option<Halt>,
}

impl IngestionReport {
    fn tally(&self, pred: impl Fn(&RowOutcome) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.outcome)).count()
    }

    pub fn succeeded(&self) -> usize {
        self.tally(|o| matches!(o, RowOutcome::Confirmed { .. }))
    }

    pub fn failed(&self) -> usize {
        self.tally(|o| matches!(o, RowOutcome::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.tally(|o| matches!(o, RowOutcome::NotAttempted))
    }

    /// Every row confirmed and the run was not halted.
    pub fn is_complete(&self) -> bool {
        self.halted.is_none() && self.succeeded() == self.entries.len()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Ingestor
// ═══════════════════════════════════════════════════════════════

/// Drives source rows through `LedgerClient::append`, one at a time.
///
/// Per-row failures (`Submission`, `Rejected`, ...) are recorded and the
/// run moves on. Two things stop it early: cancellation, and a submission
/// failure after which the ledger no longer answers a ping. Either way
/// the remaining rows are reported as not attempted and everything
/// already confirmed stays durable.
pub struct Ingestor<P> {
    client: LedgerClient,
    pacer: P,
    token: CancellationToken,
}

impl<P: Pacer> Ingestor<P> {
    pub fn new(client: LedgerClient, pacer: P) -> Self {
        Self {
            client,
            pacer,
            token: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// A `Connection` error from the initial count is returned as-is: the
    /// run never started, so there is nothing to report.
    pub async fn run<I>(&mut self, rows: I) -> Result<IngestionReport, PipelineError>
    where
        I: IntoIterator<Item = SourceRow>,
    {
        let ledger = self.client.name().to_string();
        let count_before = self.client.count().await?;

        let mut rows = rows.into_iter().enumerate();
        let mut entries = Vec::with_capacity(rows.size_hint().0);
        let mut halted = None;

        tracing::info!(%ledger, count_before, "ingestion started");

        for (position, row) in rows.by_ref() {
            if self.should_stop(position).await {
                halted = Some(Halt::Cancelled);
                entries.push(not_attempted(position, row));
                break;
            }

            match self.client.append(&row).await {
                Ok(confirmation) => {
                    self.pacer.submitted();
                    tracing::info!(
                        %ledger,
                        position,
                        source_id = %row.source_id,
                        tx = %confirmation.tx_id,
                        "row confirmed"
                    );
                    entries.push(RowReport {
                        position,
                        row,
                        outcome: RowOutcome::Confirmed { confirmation },
                    });
                }
                Err(e) => {
                    tracing::warn!(%ledger, position, source_id = %row.source_id, error = %e, "row failed");
                    let lost = self.connection_lost(&e).await;
                    entries.push(RowReport {
                        position,
                        row,
                        outcome: RowOutcome::Failed {
                            kind: e.kind(),
                            reason: e.reason(),
                        },
                    });
                    if let Some(detail) = lost {
                        tracing::error!(%ledger, position, %detail, "connection lost, halting");
                        halted = Some(Halt::ConnectionLost { detail });
                        break;
                    }
                }
            }
        }

        entries.extend(rows.map(|(position, row)| not_attempted(position, row)));

        let count_after = match self.client.count().await {
            Ok(n) => Some(n),
            Err(e) => {
                tracing::warn!(%ledger, error = %e, "post-run count unavailable");
                None
            }
        };

        let report = IngestionReport {
            entries,
            count_before,
            count_after,
            halted,
        };
        tracing::info!(
            %ledger,
            succeeded = report.succeeded(),
            failed = report.failed(),
            skipped = report.skipped(),
            ?count_after,
            "ingestion finished"
        );
        Ok(report)
    }

    /// Pace before every row but the first; true if cancelled meanwhile.
    async fn should_stop(&mut self, position: usize) -> bool {
        if self.token.is_cancelled() {
            return true;
        }
        if position == 0 {
            return false;
        }
        tokio::select! {
            _ = self.token.cancelled() => true,
            _ = self.pacer.ready() => false,
        }
    }

    /// Some(detail) if the failure means the ledger itself is gone.
    async fn connection_lost(&self, err: &LedgerError) -> Option<String> {
        match err.kind() {
            ErrorKind::Connection => Some(err.reason()),
            ErrorKind::Submission => match self.client.ping().await {
                Err(e) if e.kind() == ErrorKind::Connection => Some(e.reason()),
                _ => None,
            },
            _ => None,
        }
    }
}

fn not_attempted(position: usize, row: SourceRow) -> RowReport {
    RowReport {
        position,
        row,
        outcome: RowOutcome::NotAttempted,
    }
}
