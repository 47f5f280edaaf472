use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use ledger_api::{LedgerBackend, LedgerError};
use ledger_evm_rpc::EvmLedger;
use ledger_memory::MemoryLedger;
use pipeline::LedgerClient;

use crate::config::{Effective, LedgerConfig};
use crate::error::TrackerError;

/// Build the configured backend and connect a client to it.
pub async fn open(eff: &Effective) -> Result<LedgerClient, TrackerError> {
    let (name, backend): (String, Arc<dyn LedgerBackend>) = match eff.ledger()? {
        LedgerConfig::EvmRpc(cfg) => {
            let limit = eff.timeouts.connect();
            let ledger = tokio::time::timeout(limit, EvmLedger::connect(cfg))
                .await
                .map_err(|_| LedgerError::connection(format!("{}: no answer within {limit:?}", cfg.url)))??;
            (cfg.url.clone(), Arc::new(ledger) as Arc<dyn LedgerBackend>)
        }
        LedgerConfig::Memory(cfg) => {
            tracing::warn!("using in-memory ledger, records are lost on exit");
            ("memory".to_string(), Arc::new(MemoryLedger::new(cfg)) as Arc<dyn LedgerBackend>)
        }
    };
    Ok(LedgerClient::connect(name, backend, eff.timeouts).await?)
}

/// Token cancelled on the first Ctrl-C.
pub fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("interrupt received, stopping after the current record");
                trigger.cancel();
            }
            Err(e) => tracing::warn!(error = %e, "cannot listen for Ctrl-C"),
        }
    });
    token
}
