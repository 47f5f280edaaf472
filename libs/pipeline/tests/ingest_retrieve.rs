use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use ledger_api::{ErrorKind, LedgerBackend, LedgerError, SourceRow};
use ledger_memory::MemoryLedger;
use pipeline::config::ClientTimeouts;
use pipeline::{
    Halt, Ingestor, LedgerClient, MinInterval, PipelineError, Retriever, RowOutcome, Unpaced,
    normalize,
};
use tokio_util::sync::CancellationToken;

fn sample_rows() -> Vec<SourceRow> {
    vec![
        SourceRow::new("D1", "Temp", "22.5C"),
        SourceRow::new("D2", "Temp", "19C"),
        SourceRow::new("D3", "Humidity", "55%"),
    ]
}

async fn connect(ledger: &Arc<MemoryLedger>) -> LedgerClient {
    LedgerClient::connect("mem", ledger.clone(), ClientTimeouts::default())
        .await
        .unwrap()
}

#[tokio::test]
async fn ingest_fetch_normalize_scenario() {
    let ledger = Arc::new(MemoryLedger::default());
    let client = connect(&ledger).await;

    let report = Ingestor::new(client.clone(), Unpaced)
        .run(sample_rows())
        .await
        .unwrap();
    assert!(report.is_complete());
    assert_eq!(report.count_before, 0);
    assert_eq!(report.count_after, Some(3));
    assert_eq!(client.count().await.unwrap(), 3);

    let records = Retriever::new(client).fetch_all().await.unwrap();
    let submitted: Vec<SourceRow> = records.iter().map(|r| r.row()).collect();
    assert_eq!(submitted, sample_rows());

    let numeric: Vec<f64> = normalize(&records).iter().map(|r| r.numeric_value).collect();
    assert_eq!(numeric, vec![22.5, 19.0, 55.0]);
}

#[tokio::test]
async fn count_grows_by_rows_submitted_on_non_empty_ledger() {
    let ledger = Arc::new(MemoryLedger::default());
    let client = connect(&ledger).await;
    ledger.append(&SourceRow::new("TEST001", "Temperature", "22.5°C")).await.unwrap();

    let report = Ingestor::new(client.clone(), Unpaced)
        .run(sample_rows())
        .await
        .unwrap();
    assert_eq!(report.count_before, 1);
    assert_eq!(report.count_after, Some(4));

    for (i, row) in sample_rows().iter().enumerate() {
        assert_eq!(&client.read_at(1 + i as u64).await.unwrap().row(), row);
    }
}

#[tokio::test]
async fn empty_input_yields_empty_report() {
    let ledger = Arc::new(MemoryLedger::default());
    let report = Ingestor::new(connect(&ledger).await, Unpaced)
        .run(Vec::new())
        .await
        .unwrap();
    assert!(report.entries.is_empty());
    assert_eq!(report.count_before, report.count_after.unwrap());
    assert_eq!((report.succeeded(), report.failed(), report.skipped()), (0, 0, 0));
}

#[tokio::test]
async fn connection_drop_halts_run_and_keeps_prior_rows() {
    let ledger = Arc::new(MemoryLedger::default());
    let client = connect(&ledger).await;
    ledger.disconnect_after(1);

    let report = Ingestor::new(client.clone(), Unpaced)
        .run(sample_rows())
        .await
        .unwrap();

    assert!(matches!(report.entries[0].outcome, RowOutcome::Confirmed { .. }));
    assert!(matches!(
        report.entries[1].outcome,
        RowOutcome::Failed { kind: ErrorKind::Submission, .. }
    ));
    assert_eq!(report.entries[2].outcome, RowOutcome::NotAttempted);
    assert!(matches!(report.halted, Some(Halt::ConnectionLost { .. })));
    assert_eq!(report.count_after, None);

    ledger.reconnect();
    assert_eq!(client.count().await.unwrap(), 1);
}

#[tokio::test]
async fn rejected_row_is_recorded_and_run_continues() {
    let ledger = Arc::new(MemoryLedger::default().with_validator(|row| {
        if row.value.is_empty() {
            Err("empty value".into())
        } else {
            Ok(())
        }
    }));
    let client = connect(&ledger).await;
    let rows = vec![
        SourceRow::new("D1", "Temp", "22.5C"),
        SourceRow::new("D2", "Temp", ""),
        SourceRow::new("D3", "Humidity", "55%"),
    ];

    let report = Ingestor::new(client, Unpaced).run(rows).await.unwrap();
    assert_eq!(report.halted, None);
    assert_eq!((report.succeeded(), report.failed(), report.skipped()), (2, 1, 0));
    assert_eq!(
        report.entries[1].outcome,
        RowOutcome::Failed {
            kind: ErrorKind::Rejected,
            reason: "empty value".into()
        }
    );
    assert_eq!(report.count_after, Some(2));
}

#[tokio::test]
async fn unreachable_ledger_at_start_is_an_error() {
    let ledger = Arc::new(MemoryLedger::default());
    let client = connect(&ledger).await;
    ledger.disconnect();

    let err = Ingestor::new(client, Unpaced).run(sample_rows()).await.unwrap_err();
    assert!(matches!(err, PipelineError::Ledger(LedgerError::Connection(_))));
}

#[tokio::test(start_paused = true)]
async fn paces_between_rows_but_not_after_last() {
    let ledger = Arc::new(MemoryLedger::default());
    let client = connect(&ledger).await;

    let start = tokio::time::Instant::now();
    let report = Ingestor::new(client, MinInterval::new(Duration::from_secs(1)))
        .run(sample_rows())
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert!(report.is_complete());
    assert!(elapsed >= Duration::from_secs(2), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "elapsed {elapsed:?}");
}

#[tokio::test]
async fn cancelled_run_reports_remaining_rows_as_not_attempted() {
    let ledger = Arc::new(MemoryLedger::default());
    let client = connect(&ledger).await;
    let token = CancellationToken::new();
    token.cancel();

    let report = Ingestor::new(client, Unpaced)
        .with_cancellation(token)
        .run(sample_rows())
        .await
        .unwrap();
    assert_eq!(report.halted, Some(Halt::Cancelled));
    assert_eq!(report.skipped(), 3);
    assert_eq!(report.count_after, Some(0));
}

#[tokio::test]
async fn fetch_all_on_empty_ledger_is_empty() {
    let ledger = Arc::new(MemoryLedger::default());
    let records = Retriever::new(connect(&ledger).await).fetch_all().await.unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn fetch_all_is_deterministic_on_stable_ledger() {
    let ledger = Arc::new(MemoryLedger::default());
    let client = connect(&ledger).await;
    Ingestor::new(client.clone(), Unpaced).run(sample_rows()).await.unwrap();

    let retriever = Retriever::new(client);
    let first = retriever.fetch_all().await.unwrap();
    let second = retriever.fetch_all().await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn unreadable_record_fails_whole_retrieval() {
    let ledger = Arc::new(MemoryLedger::default());
    let client = connect(&ledger).await;
    Ingestor::new(client.clone(), Unpaced).run(sample_rows()).await.unwrap();
    ledger.mark_unreadable(1);

    let err = Retriever::new(client).fetch_all().await.unwrap_err();
    match err {
        PipelineError::Retrieval { index, source } => {
            assert_eq!(index, 1);
            assert_eq!(source.kind(), ErrorKind::Unreadable);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn identical_timestamps_keep_index_order() {
    let ledger = Arc::new(MemoryLedger::default().with_clock(|| 1_700_000_000));
    let client = connect(&ledger).await;
    Ingestor::new(client.clone(), Unpaced).run(sample_rows()).await.unwrap();

    let records = Retriever::new(client).fetch_all().await.unwrap();
    assert!(records.iter().all(|r| r.timestamp == 1_700_000_000));
    let ids: Vec<&str> = records.iter().map(|r| r.source_id.as_str()).collect();
    assert_eq!(ids, ["D1", "D2", "D3"]);
}

#[tokio::test]
async fn snapshot_ignores_records_appended_during_scan() {
    // Every read triggers one concurrent append; the scan must stop at the
    // count observed when it started.
    struct GrowingLedger {
        inner: MemoryLedger,
        reads: AtomicU64,
    }

    impl LedgerBackend for GrowingLedger {
        fn ping(
            &self,
        ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), LedgerError>> + Send + '_>>
        {
            self.inner.ping()
        }

        fn append(
            &self,
            row: &SourceRow,
        ) -> std::pin::Pin<
            Box<dyn std::future::Future<Output = Result<ledger_api::Confirmation, LedgerError>> + Send + '_>,
        > {
            self.inner.append(row)
        }

        fn count(
            &self,
        ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<u64, LedgerError>> + Send + '_>>
        {
            self.inner.count()
        }

        fn read_at(
            &self,
            index: u64,
        ) -> std::pin::Pin<
            Box<dyn std::future::Future<Output = Result<ledger_api::LedgerRecord, LedgerError>> + Send + '_>,
        > {
            Box::pin(async move {
                let n = self.reads.fetch_add(1, Ordering::SeqCst);
                self.inner
                    .append(&SourceRow::new(format!("late{n}"), "Temp", "1C"))
                    .await?;
                self.inner.read_at(index).await
            })
        }
    }

    let ledger = Arc::new(GrowingLedger {
        inner: MemoryLedger::default(),
        reads: AtomicU64::new(0),
    });
    for row in sample_rows() {
        ledger.inner.append(&row).await.unwrap();
    }
    let client = LedgerClient::connect("growing", ledger.clone(), ClientTimeouts::default())
        .await
        .unwrap();

    let records = Retriever::new(client.clone()).fetch_all().await.unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(client.count().await.unwrap(), 6);
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_pacing_stops_before_next_row() {
    let ledger = Arc::new(MemoryLedger::default());
    let client = connect(&ledger).await;
    let token = CancellationToken::new();

    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });

    let start = tokio::time::Instant::now();
    let report = Ingestor::new(client.clone(), MinInterval::new(Duration::from_secs(1)))
        .with_cancellation(token)
        .run(sample_rows())
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert!(matches!(report.entries[0].outcome, RowOutcome::Confirmed { .. }));
    assert_eq!(report.entries[1].outcome, RowOutcome::NotAttempted);
    assert_eq!(report.entries[2].outcome, RowOutcome::NotAttempted);
    assert_eq!(report.halted, Some(Halt::Cancelled));
    assert_eq!(report.count_after, Some(1));
    assert!(elapsed < Duration::from_secs(1), "elapsed {elapsed:?}");
    assert_eq!(client.count().await.unwrap(), 1);
}

#[tokio::test]
async fn cancelled_retrieval_returns_no_partial_result() {
    let ledger = Arc::new(MemoryLedger::default());
    let client = connect(&ledger).await;
    Ingestor::new(client.clone(), Unpaced).run(sample_rows()).await.unwrap();

    let token = CancellationToken::new();
    token.cancel();
    let err = Retriever::new(client)
        .with_cancellation(token)
        .fetch_all()
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled));
}
