pub mod config;
pub mod error;
pub mod normalize;
mod client;
mod ingest;
mod pacing;
mod retrieve;

pub use client::LedgerClient;
pub use error::PipelineError;
pub use ingest::{Halt, IngestionReport, Ingestor, RowOutcome, RowReport};
pub use normalize::{CleanedRow, extract_magnitude, normalize};
pub use pacing::{MinInterval, Pacer, Unpaced, pacer_for};
pub use retrieve::Retriever;
