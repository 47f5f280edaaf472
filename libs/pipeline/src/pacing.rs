use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::Instant;

/// Throughput policy between consecutive submissions.
///
/// The ingestor calls `submitted` right after each confirmed append and
/// awaits `ready` before the next one. Ordering never depends on the
/// pacer (appends are already sequential); it only protects the
/// backing service from overload.
pub trait Pacer: Send {
    /// Record that a submission just completed.
    fn submitted(&mut self);

    /// Resolve once the next submission may start.
    fn ready(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// No delay at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unpaced;

impl Pacer for Unpaced {
    fn submitted(&mut self) {}

    fn ready(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async {})
    }
}

/// At least `interval` between the end of one submission and the start of
/// the next. Time spent elsewhere (reading input, logging) counts towards
/// the gap.
#[derive(Debug, Clone)]
pub struct MinInterval {
    interval: Duration,
    last: Option<Instant>,
}

impl MinInterval {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }
}

impl Pacer for MinInterval {
    fn submitted(&mut self) {
        self.last = Some(Instant::now());
    }

    fn ready(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        let deadline = self.last.map(|t| t + self.interval);
        Box::pin(async move {
            if let Some(deadline) = deadline {
                tokio::time::sleep_until(deadline).await;
            }
        })
    }
}

/// `MinInterval` for a non-zero millisecond gap, otherwise `Unpaced`.
pub fn pacer_for(pace_ms: u64) -> Box<dyn Pacer> {
    if pace_ms == 0 {
        Box::new(Unpaced)
    } else {
        Box::new(MinInterval::new(Duration::from_millis(pace_ms)))
    }
}

impl Pacer for Box<dyn Pacer> {
    fn submitted(&mut self) {
        (**self).submitted()
    }

    fn ready(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        (**self).ready()
    }
}
