use serde::Deserialize;

use ledger_api::{LedgerError, strip_hex_prefix};

fn default_url() -> String {
    "http://127.0.0.1:7545".to_string()
}

fn default_gas() -> u64 {
    3_000_000
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

/// Connection settings for a contract-backed ledger on an
/// Ethereum-compatible node.
#[derive(Debug, Clone, Deserialize)]
pub struct EvmLedgerConfig {
    /// JSON-RPC endpoint.
    #[serde(default = "default_url")]
    pub url: String,
    /// Address of the deployed record contract.
    pub contract: String,
    /// Sending account. Without it the node's first unlocked account is used.
    #[serde(default)]
    pub from: Option<String>,
    /// Gas limit per `storeData` transaction.
    #[serde(default = "default_gas")]
    pub gas: u64,
    /// Delay between receipt polls while waiting for a transaction to be mined.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Per-HTTP-request timeout.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl EvmLedgerConfig {
    /// Defaults for everything but the contract address.
    pub fn new(contract: impl Into<String>) -> Self {
        Self {
            url: default_url(),
            contract: contract.into(),
            from: None,
            gas: default_gas(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Validate a 20-byte hex address and normalize it to lowercase `0x…`.
pub fn normalize_address(field: &str, s: &str) -> Result<String, LedgerError> {
    let bytes = hex::decode(strip_hex_prefix(s.trim()))
        .map_err(|e| LedgerError::config(format!("{field}: bad address {s:?}: {e}")))?;
    if bytes.len() != 20 {
        return Err(LedgerError::config(format!(
            "{field}: address {s:?} has {} bytes, expected 20",
            bytes.len()
        )));
    }
    Ok(format!("0x{}", hex::encode(bytes)))
}
