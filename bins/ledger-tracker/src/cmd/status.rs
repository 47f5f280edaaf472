use crate::cmd::ledger;
use crate::config::{Effective, GlobalArgs};
use crate::error::TrackerError;

pub async fn run(global: &GlobalArgs) -> Result<(), TrackerError> {
    let eff = Effective::new(global)?;
    let client = ledger::open(&eff).await?;

    let count = client.count().await?;
    println!("ledger:  {}", client.name());
    println!("records: {count}");
    if count > 0 {
        let first = client.read_at(0).await?;
        println!(
            "first:   [{}] {} | {} | {}",
            pipeline::normalize::to_calendar(first.timestamp).format(pipeline::normalize::TIMESTAMP_FORMAT),
            first.source_id,
            first.category,
            first.value
        );
    }
    Ok(())
}
