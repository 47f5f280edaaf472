use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Deserialize;

use ledger_evm_rpc::EvmLedgerConfig;
use ledger_memory::MemoryLedgerConfig;
use pipeline::config::{ClientTimeouts, IngestConfig};

use crate::error::TrackerError;

pub const DEFAULT_CONFIG: &str = "tracker.toml";

#[derive(Parser)]
#[command(
    name = "ledger-tracker",
    about = "Append sensor readings to a contract ledger and rebuild the dataset from it"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone, Debug)]
pub struct GlobalArgs {
    /// Path to the TOML config file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG, env = "LEDGER_TRACKER_CONFIG")]
    pub config: String,

    /// JSON-RPC endpoint (overrides [ledger].url)
    #[arg(long, global = true, env = "LEDGER_URL")]
    pub url: Option<String>,

    /// Record contract address (overrides [ledger].contract)
    #[arg(long, global = true, env = "LEDGER_CONTRACT")]
    pub contract: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Submit rows from a CSV file to the ledger, one confirmed write at a time
    Ingest(IngestArgs),
    /// Read the whole ledger, normalize it and write the cleaned dataset
    Retrieve(RetrieveArgs),
    /// Print the record count and the first record
    Status,
    /// Generate a synthetic logistics dataset
    Simulate(SimulateArgs),
}

#[derive(Args, Clone, Debug)]
pub struct IngestArgs {
    /// CSV file with a header row
    #[arg(long)]
    pub input: String,

    /// Write the per-row report as JSON
    #[arg(long)]
    pub report: Option<String>,

    /// Minimum gap between submissions in ms (overrides [ingest].pace_ms, 0 = unpaced)
    #[arg(long)]
    pub pace_ms: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Csv,
    Json,
}

#[derive(Args, Clone, Debug)]
pub struct RetrieveArgs {
    #[arg(long, default_value = "cleaned_iot_data.csv")]
    pub output: String,

    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    pub format: OutputFormat,
}

#[derive(Args, Clone, Debug)]
pub struct SimulateArgs {
    /// Number of logistics records
    #[arg(long, default_value_t = 100)]
    pub records: usize,

    /// PRNG seed (0 = current time)
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Directory for logistics_data.csv / logistics_data.json
    #[arg(long, default_value = ".")]
    pub output_dir: String,

    /// Also write ingest-ready rows (device_id, data_type, data_value) here
    #[arg(long)]
    pub rows: Option<String>,
}

// ---- TOML Config ----

/// Which ledger to talk to, selected by `kind`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum LedgerConfig {
    EvmRpc(EvmLedgerConfig),
    Memory(MemoryLedgerConfig),
}

fn default_source_column() -> String {
    "device_id".into()
}
fn default_category_column() -> String {
    "data_type".into()
}
fn default_value_column() -> String {
    "data_value".into()
}

/// Header names mapping tabular files onto ledger fields.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnNames {
    #[serde(default = "default_source_column")]
    pub source_id: String,
    #[serde(default = "default_category_column")]
    pub category: String,
    #[serde(default = "default_value_column")]
    pub value: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            source_id: default_source_column(),
            category: default_category_column(),
            value: default_value_column(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TrackerConfig {
    #[serde(default)]
    pub ledger: Option<LedgerConfig>,
    #[serde(default)]
    pub timeouts: ClientTimeouts,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub columns: ColumnNames,
}

impl TrackerConfig {
    pub fn load(path: &str) -> Result<Self, TrackerError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TrackerError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        Self::parse(&content)
            .map_err(|e| TrackerError::Config { context: "parse", detail: format!("'{path}': {e}") })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Only the default path may be absent; a path someone asked for must exist.
fn load_or_default(path: &str) -> Result<TrackerConfig, TrackerError> {
    if path == DEFAULT_CONFIG && !std::path::Path::new(path).exists() {
        tracing::debug!(path, "no config file, using defaults");
        return Ok(TrackerConfig::default());
    }
    TrackerConfig::load(path)
}

// ---- Effective ----

/// Final settings after merging: config file < env/CLI.
#[derive(Debug)]
pub struct Effective {
    ledger: Option<LedgerConfig>,
    pub timeouts: ClientTimeouts,
    pub ingest: IngestConfig,
    pub columns: ColumnNames,
}

impl Effective {
    pub fn new(args: &GlobalArgs) -> Result<Self, TrackerError> {
        Ok(Self::merge(load_or_default(&args.config)?, args))
    }

    fn merge(cfg: TrackerConfig, args: &GlobalArgs) -> Self {
        let ledger = match cfg.ledger {
            Some(LedgerConfig::EvmRpc(mut evm)) => {
                if let Some(contract) = &args.contract {
                    evm.contract = contract.clone();
                }
                if let Some(url) = &args.url {
                    evm.url = url.clone();
                }
                Some(LedgerConfig::EvmRpc(evm))
            }
            Some(memory @ LedgerConfig::Memory(_)) => Some(memory),
            None => args.contract.as_ref().map(|contract| {
                let mut evm = EvmLedgerConfig::new(contract.clone());
                if let Some(url) = &args.url {
                    evm.url = url.clone();
                }
                LedgerConfig::EvmRpc(evm)
            }),
        };

        Self {
            ledger,
            timeouts: cfg.timeouts,
            ingest: cfg.ingest,
            columns: cfg.columns,
        }
    }

    pub fn ledger(&self) -> Result<&LedgerConfig, TrackerError> {
        self.ledger.as_ref().ok_or(TrackerError::NoLedger)
    }
}
