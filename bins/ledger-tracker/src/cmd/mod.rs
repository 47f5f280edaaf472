pub mod ingest;
pub mod ledger;
pub mod retrieve;
pub mod simulate;
pub mod status;
pub mod table;
