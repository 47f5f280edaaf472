use pipeline::{IngestionReport, Ingestor, RowOutcome, pacer_for};

use crate::cmd::{ledger, table};
use crate::config::{Effective, GlobalArgs, IngestArgs};
use crate::error::TrackerError;

pub async fn run(global: &GlobalArgs, args: IngestArgs) -> Result<(), TrackerError> {
    let eff = Effective::new(global)?;
    let rows = table::read_rows(&args.input, &eff.columns)?;
    tracing::info!(input = %args.input, rows = rows.len(), "loaded source rows");

    let client = ledger::open(&eff).await?;
    let pace_ms = args.pace_ms.unwrap_or(eff.ingest.pace_ms);

    let report = Ingestor::new(client, pacer_for(pace_ms))
        .with_cancellation(ledger::ctrl_c_token())
        .run(rows)
        .await?;

    print_rows(&report);
    print_summary(&report);

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json).map_err(|e| TrackerError::io(path.as_str(), e))?;
        tracing::info!(%path, "report written");
    }

    if report.is_complete() {
        Ok(())
    } else {
        Err(TrackerError::Incomplete(format!(
            "{} of {} rows not confirmed",
            report.entries.len() - report.succeeded(),
            report.entries.len()
        )))
    }
}

fn print_rows(report: &IngestionReport) {
    for entry in &report.entries {
        let row = &entry.row;
        match &entry.outcome {
            RowOutcome::Confirmed { confirmation } => println!(
                "#{:<5} ok       {} | {} | {}  tx {}",
                entry.position, row.source_id, row.category, row.value, confirmation.tx_id
            ),
            RowOutcome::Failed { kind, reason } => println!(
                "#{:<5} {:<8} {} | {} | {}  ({reason})",
                entry.position, kind.to_string(), row.source_id, row.category, row.value
            ),
            RowOutcome::NotAttempted => {}
        }
    }
}

fn print_summary(report: &IngestionReport) {
    println!();
    println!(
        "succeeded: {}  failed: {}  skipped: {}",
        report.succeeded(),
        report.failed(),
        report.skipped()
    );
    match report.count_after {
        Some(after) => println!("ledger count: {} -> {after}", report.count_before),
        None => println!("ledger count: {} -> unknown", report.count_before),
    }
    if let Some(halt) = &report.halted {
        println!("halted: {halt}");
    }
}
