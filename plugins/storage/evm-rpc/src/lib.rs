mod abi;
mod config;
mod rpc;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::json;

use ledger_api::{Confirmation, LedgerBackend, LedgerError, LedgerRecord, SourceRow, strip_hex_prefix};

use rpc::{Receipt, RpcClient, RpcError, data, parse_data, parse_quantity, quantity};

pub use config::{EvmLedgerConfig, normalize_address};

/// Ledger backed by the record contract on an Ethereum-compatible node
/// (Ganache, anvil, geth dev mode), spoken to over JSON-RPC/HTTP.
///
/// Writes are `storeData` transactions signed by the node (the sender
/// must be an unlocked account); a write counts as durable once its
/// receipt is mined with a success status. Reads are `eth_call`s against
/// the latest block.
pub struct EvmLedger {
    rpc: RpcClient,
    contract: String,
    from: String,
    gas: u64,
    poll_interval: Duration,
}

impl EvmLedger {
    /// Reach the node, check that a contract is deployed at the configured
    /// address and resolve the sending account.
    pub async fn connect(config: &EvmLedgerConfig) -> Result<Self, LedgerError> {
        let contract = normalize_address("contract", &config.contract)?;
        let rpc = RpcClient::new(&config.url, Duration::from_millis(config.request_timeout_ms))
            .map_err(|e| LedgerError::config(e.to_string()))?;

        let chain_id: String = rpc
            .call("eth_chainId", json!([]))
            .await
            .map_err(|e| LedgerError::connection(format!("{}: {e}", config.url)))?;
        let chain_id = parse_quantity(&chain_id).map_err(read_error)?;

        let code: String = rpc
            .call("eth_getCode", json!([contract, "latest"]))
            .await
            .map_err(read_error)?;
        if parse_data(&code).map_err(read_error)?.is_empty() {
            return Err(LedgerError::config(format!(
                "no contract deployed at {contract} (chain {chain_id})"
            )));
        }

        let from = match &config.from {
            Some(addr) => normalize_address("from", addr)?,
            None => {
                let accounts: Vec<String> = rpc
                    .call("eth_accounts", json!([]))
                    .await
                    .map_err(read_error)?;
                let first = accounts
                    .first()
                    .ok_or_else(|| LedgerError::config("node exposes no unlocked accounts; set `from`"))?;
                normalize_address("from", first)?
            }
        };

        tracing::info!(url = %config.url, chain_id, %contract, %from, "ledger contract reachable");

        Ok(Self {
            rpc,
            contract,
            from,
            gas: config.gas,
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
        })
    }

    async fn eth_call(&self, calldata: Vec<u8>) -> Result<Vec<u8>, RpcError> {
        let call = json!({ "to": self.contract, "data": data(&calldata) });
        let out: String = self.rpc.call("eth_call", json!([call, "latest"])).await?;
        parse_data(&out)
    }

    async fn fetch_count(&self) -> Result<u64, LedgerError> {
        let bytes = self
            .eth_call(abi::GET_TOTAL_RECORDS.to_vec())
            .await
            .map_err(read_error)?;
        abi::decode_uint(&bytes, 0)
    }

    async fn fetch_record(&self, index: u64) -> Result<LedgerRecord, LedgerError> {
        let outcome = match self.eth_call(abi::encode_uint_call(abi::GET_RECORD, index)).await {
            Ok(bytes) => abi::decode_record(&bytes).map_err(|e| e.reason()),
            Err(RpcError::Transport(m)) => return Err(LedgerError::Connection(m)),
            Err(e) => Err(e.to_string()),
        };

        match outcome {
            Ok(record) => Ok(record),
            Err(reason) => {
                let count = self.fetch_count().await?;
                Err(read_failure(index, count, reason))
            }
        }
    }

    async fn submit(&self, row: &SourceRow) -> Result<Confirmation, LedgerError> {
        let calldata = abi::encode_strings_call(
            abi::STORE_DATA,
            &[row.source_id.as_str(), row.category.as_str(), row.value.as_str()],
        );
        let tx = json!({
            "from": self.from,
            "to": self.contract,
            "gas": quantity(self.gas),
            "data": data(&calldata),
        });

        let tx_hash: String = self
            .rpc
            .call("eth_sendTransaction", json!([tx]))
            .await
            .map_err(send_error)?;
        tracing::debug!(tx = %tx_hash, source_id = %row.source_id, "transaction sent");

        let receipt = self.wait_for_receipt(&tx_hash).await?;
        check_receipt(&receipt)?;

        Ok(Confirmation {
            block_number: receipt
                .block_number
                .as_deref()
                .and_then(|b| parse_quantity(b).ok()),
            timestamp: self.stored_timestamp(&receipt),
            tx_id: receipt.transaction_hash,
        })
    }

    /// Poll until mined. Unbounded on purpose: `LedgerClient` owns the
    /// confirmation deadline and drops this future when it passes.
    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<Receipt, LedgerError> {
        loop {
            let receipt: Option<Receipt> = self
                .rpc
                .call("eth_getTransactionReceipt", json!([tx_hash]))
                .await
                .map_err(|e| LedgerError::submission(format!("awaiting receipt for {tx_hash}: {e}")))?;
            if let Some(receipt) = receipt {
                return Ok(receipt);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Ledger-assigned timestamp from the `DataStored` event, if emitted.
    fn stored_timestamp(&self, receipt: &Receipt) -> Option<u64> {
        receipt
            .logs
            .iter()
            .filter(|log| log.address.eq_ignore_ascii_case(&self.contract))
            .find(|log| {
                log.topics
                    .first()
                    .is_some_and(|t| strip_hex_prefix(t).eq_ignore_ascii_case(abi::DATA_STORED_TOPIC))
            })
            .and_then(|log| parse_data(&log.data).ok())
            .and_then(|bytes| abi::decode_uint(&bytes, 0).ok())
    }
}

/// Failure of a read-only call: no answer means no connection.
fn read_error(e: RpcError) -> LedgerError {
    match e {
        RpcError::Transport(m) => LedgerError::Connection(m),
        other => LedgerError::Decode(other.to_string()),
    }
}

/// A failed `getRecord` at `index`, given the count observed afterwards.
/// Reverts and empty returns look alike for "past the end" and "broken
/// record"; the count tells them apart.
fn read_failure(index: u64, count: u64, reason: String) -> LedgerError {
    if index >= count {
        LedgerError::Index { index, count }
    } else {
        LedgerError::Unreadable { index, reason }
    }
}

/// Failure of `eth_sendTransaction`. A node error is the node refusing
/// this write; anything else means it never got through.
fn send_error(e: RpcError) -> LedgerError {
    match e {
        RpcError::Node { code, message } => LedgerError::rejected(format!("{message} (code {code})")),
        RpcError::Transport(m) | RpcError::Decode(m) => LedgerError::Submission(m),
    }
}

fn check_receipt(receipt: &Receipt) -> Result<(), LedgerError> {
    if receipt.reverted() {
        return Err(LedgerError::rejected(format!(
            "transaction {} reverted",
            receipt.transaction_hash
        )));
    }
    Ok(())
}

impl LedgerBackend for EvmLedger {
    fn ping(&self) -> Pin<Box<dyn Future<Output = Result<(), LedgerError>> + Send + '_>> {
        Box::pin(async move {
            let _: String = self
                .rpc
                .call("eth_blockNumber", json!([]))
                .await
                .map_err(read_error)?;
            Ok(())
        })
    }

    fn append(
        &self,
        row: &SourceRow,
    ) -> Pin<Box<dyn Future<Output = Result<Confirmation, LedgerError>> + Send + '_>> {
        let row = row.clone();
        Box::pin(async move { self.submit(&row).await })
    }

    fn count(&self) -> Pin<Box<dyn Future<Output = Result<u64, LedgerError>> + Send + '_>> {
        Box::pin(self.fetch_count())
    }

    fn read_at(
        &self,
        index: u64,
    ) -> Pin<Box<dyn Future<Output = Result<LedgerRecord, LedgerError>> + Send + '_>> {
        Box::pin(self.fetch_record(index))
    }
}
