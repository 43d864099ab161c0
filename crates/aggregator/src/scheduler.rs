//! Round scheduler
//!
//! Fires one round per tick. A round runs to completion before the next
//! tick is awaited, and a tick that falls due mid-round is delayed rather
//! than bursted.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::processor::RoundProcessor;

pub struct RoundScheduler {
    processor: Arc<RoundProcessor>,
    interval: Duration,
}

impl RoundScheduler {
    pub fn new(processor: Arc<RoundProcessor>, interval: Duration) -> Self {
        Self {
            processor,
            interval,
        }
    }

    /// Run rounds until `shutdown` is cancelled. Returns the number of
    /// rounds started.
    ///
    /// A failed round is logged by the processor and never stops the loop.
    pub async fn run(&self, shutdown: CancellationToken) -> u64 {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = self.interval.as_secs_f64(),
            quote = self.processor.quote(),
            "Round scheduler started"
        );

        let mut rounds = 0u64;
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    rounds += 1;
                    debug!(round = rounds, "Round starting");
                    // outcome already logged and recorded
                    let _ = self.processor.run_round().await;
                }
            }
        }

        info!(rounds, "Round scheduler stopped");
        rounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::MapStage;
    use crate::reduce::ReduceStage;
    use crate::sealer::ChainSealer;
    use crate::sink::BroadcastSink;
    use crate::sources::testing::{Behavior, ScriptedSource};
    use crate::sources::PriceSource;
    use common::ServiceMarker;
    use std::sync::atomic::Ordering;
    use storage::{Ledger, MemoryBackend};

    fn create_test_scheduler(source: Arc<ScriptedSource>, quorum: usize) -> RoundScheduler {
        let marker = ServiceMarker::new("scheduler-test-marker").unwrap();
        let ledger = Ledger::new(Arc::new(MemoryBackend::new()));
        let sources = vec![source as Arc<dyn PriceSource>];
        let processor = RoundProcessor::new(
            "USD",
            MapStage::new(sources, Duration::from_secs(1), marker.clone()),
            ReduceStage::new(quorum),
            Arc::new(ChainSealer::new(ledger, marker, "node-1")),
            Arc::new(BroadcastSink::new(4)),
        );
        RoundScheduler::new(Arc::new(processor), Duration::from_secs(10))
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_round_per_tick_until_cancelled() {
        let source = Arc::new(ScriptedSource::new("a", Behavior::Quote(100.0, 1.0)));
        let scheduler = create_test_scheduler(Arc::clone(&source), 1);

        let shutdown = CancellationToken::new();
        let stopper = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(35)).await;
            stopper.cancel();
        });

        // ticks at 0s, 10s, 20s and 30s
        let rounds = scheduler.run(shutdown).await;
        assert_eq!(rounds, 4);
        assert_eq!(source.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_rounds_do_not_stop_the_loop() {
        let source = Arc::new(ScriptedSource::new("a", Behavior::Fail));
        let scheduler = create_test_scheduler(Arc::clone(&source), 1);

        let shutdown = CancellationToken::new();
        let stopper = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(25)).await;
            stopper.cancel();
        });

        assert_eq!(scheduler.run(shutdown).await, 3);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_runs_nothing() {
        let source = Arc::new(ScriptedSource::new("a", Behavior::Quote(1.0, 1.0)));
        let scheduler = create_test_scheduler(Arc::clone(&source), 1);

        let shutdown = CancellationToken::new();
        shutdown.cancel();

        assert_eq!(scheduler.run(shutdown).await, 0);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }
}
