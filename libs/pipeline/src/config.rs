use std::time::Duration;

use serde::Deserialize;

// ═══════════════════════════════════════════════════════════════
//  Timeouts
// ═══════════════════════════════════════════════════════════════

fn default_connect_ms() -> u64 {
    5_000
}
fn default_confirm_ms() -> u64 {
    120_000
}
fn default_call_ms() -> u64 {
    10_000
}

/// Upper bounds on how long a single ledger call may take.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ClientTimeouts {
    /// Initial reachability check.
    #[serde(default = "default_connect_ms")]
    pub connect_ms: u64,
    /// Submission plus wait for the write to become durable.
    #[serde(default = "default_confirm_ms")]
    pub confirm_ms: u64,
    /// Read-only calls (`count`, `read_at`, ping).
    #[serde(default = "default_call_ms")]
    pub call_ms: u64,
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self {
            connect_ms: default_connect_ms(),
            confirm_ms: default_confirm_ms(),
            call_ms: default_call_ms(),
        }
    }
}

impl ClientTimeouts {
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }
    pub fn confirm(&self) -> Duration {
        Duration::from_millis(self.confirm_ms)
    }
    pub fn call(&self) -> Duration {
        Duration::from_millis(self.call_ms)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Ingest
// ═══════════════════════════════════════════════════════════════

fn default_pace_ms() -> u64 {
    1_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// Minimum gap between consecutive submissions, 0 = unpaced.
    #[serde(default = "default_pace_ms")]
    pub pace_ms: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            pace_ms: default_pace_ms(),
        }
    }
}
