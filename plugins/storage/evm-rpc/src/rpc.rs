use std::sync::atomic::{AtomicU64, Ordering};

use serde::Deserialize;
use serde::de::DeserializeOwned;

use ledger_api::strip_hex_prefix;

/// Failure of a single JSON-RPC round trip. Callers map it onto
/// `LedgerError` depending on the operation (a transport failure means
/// something different for `append` than for a read).
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RpcError {
    /// Request never got an answer (refused, reset, HTTP status).
    Transport(String),
    /// The node answered with a JSON-RPC error object.
    Node { code: i64, message: String },
    /// The node answered with something we could not interpret.
    Decode(String),
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpcError::Transport(m) => write!(f, "transport: {m}"),
            RpcError::Node { code, message } => write!(f, "node error {code}: {message}"),
            RpcError::Decode(m) => write!(f, "decode: {m}"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

/// Interpret a JSON-RPC response body. A missing `result` reads as `null`
/// so that `Option<T>` results (pending receipts) decode to `None`.
pub(crate) fn parse_response<T: DeserializeOwned>(body: &[u8]) -> Result<T, RpcError> {
    let resp: RpcResponse =
        serde_json::from_slice(body).map_err(|e| RpcError::Decode(format!("response: {e}")))?;
    if let Some(err) = resp.error {
        return Err(RpcError::Node {
            code: err.code,
            message: err.message,
        });
    }
    let result = resp.result.unwrap_or(serde_json::Value::Null);
    serde_json::from_value(result).map_err(|e| RpcError::Decode(format!("result: {e}")))
}

/// `"0x1a"` → 26.
pub(crate) fn parse_quantity(s: &str) -> Result<u64, RpcError> {
    let digits = strip_hex_prefix(s);
    if digits.is_empty() {
        return Err(RpcError::Decode(format!("empty quantity {s:?}")));
    }
    u64::from_str_radix(digits, 16).map_err(|e| RpcError::Decode(format!("quantity {s:?}: {e}")))
}

pub(crate) fn quantity(v: u64) -> String {
    format!("0x{v:x}")
}

pub(crate) fn parse_data(s: &str) -> Result<Vec<u8>, RpcError> {
    hex::decode(strip_hex_prefix(s)).map_err(|e| RpcError::Decode(format!("hex data: {e}")))
}

pub(crate) fn data(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

// ═══════════════════════════════════════════════════════════════
//  Receipt
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Receipt {
    pub transaction_hash: String,
    #[serde(default)]
    pub block_number: Option<String>,
    /// `0x1` success, `0x0` reverted. Absent on pre-Byzantium chains.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub logs: Vec<Log>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Log {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub data: String,
}

impl Receipt {
    pub fn reverted(&self) -> bool {
        matches!(self.status.as_deref().map(parse_quantity), Some(Ok(0)))
    }
}

// ═══════════════════════════════════════════════════════════════
//  RpcClient
// ═══════════════════════════════════════════════════════════════

pub(crate) struct RpcClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: &str, request_timeout: std::time::Duration) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| RpcError::Transport(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: url.to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let resp = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcError::Transport(format!("{method}: {e}")))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| RpcError::Transport(format!("{method} read: {e}")))?;

        if !status.is_success() {
            // Some nodes report JSON-RPC errors with a non-2xx status.
            if let Err(e @ RpcError::Node { .. }) = parse_response::<serde_json::Value>(&bytes) {
                return Err(e);
            }
            return Err(RpcError::Transport(format!(
                "{method}: HTTP {status}: {}",
                String::from_utf8_lossy(&bytes)
            )));
        }

        tracing::trace!(method, id, "rpc ok");
        parse_response(&bytes)
    }
}
