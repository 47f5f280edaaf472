use pipeline::{CleanedRow, Retriever, normalize};

use crate::cmd::{ledger, table::CsvWriter};
use crate::config::{ColumnNames, Effective, GlobalArgs, OutputFormat, RetrieveArgs};
use crate::error::TrackerError;

const PREVIEW_ROWS: usize = 5;

pub async fn run(global: &GlobalArgs, args: RetrieveArgs) -> Result<(), TrackerError> {
    let eff = Effective::new(global)?;
    let client = ledger::open(&eff).await?;

    let records = Retriever::new(client)
        .with_cancellation(ledger::ctrl_c_token())
        .fetch_all()
        .await?;
    let cleaned = normalize(&records);

    let body = match args.format {
        OutputFormat::Csv => to_csv(&cleaned, &eff.columns),
        OutputFormat::Json => serde_json::to_string_pretty(&cleaned)?,
    };
    std::fs::write(&args.output, body).map_err(|e| TrackerError::io(args.output.as_str(), e))?;
    tracing::info!(output = %args.output, rows = cleaned.len(), "cleaned dataset written");

    for row in cleaned.iter().take(PREVIEW_ROWS) {
        println!(
            "{}  {:<12} {:<12} {:<20} {}",
            row.timestamp.format(pipeline::normalize::TIMESTAMP_FORMAT),
            row.source_id,
            row.category,
            row.value,
            row.numeric_value
        );
    }
    println!("{} rows written to {}", cleaned.len(), args.output);
    Ok(())
}

/// Ledger fields go under the configured column names, so a cleaned file
/// keeps the headers of the data that was ingested. Magnitudes always
/// carry a fractional part (`482193.0`, `0.0`).
fn to_csv(rows: &[CleanedRow], names: &ColumnNames) -> String {
    let mut w = CsvWriter::new(&[
        "timestamp",
        names.source_id.as_str(),
        names.category.as_str(),
        names.value.as_str(),
        "numeric_value",
    ]);
    for row in rows {
        w.record(&[
            row.timestamp.format(pipeline::normalize::TIMESTAMP_FORMAT).to_string(),
            row.source_id.clone(),
            row.category.clone(),
            row.value.clone(),
            format!("{:?}", row.numeric_value),
        ]);
    }
    w.finish()
}
