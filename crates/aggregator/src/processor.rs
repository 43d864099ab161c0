//! Round processor
//!
//! One round is map, reduce, seal, persist and publish, in that order.
//! After every round a short status record is written to the ledger's raw
//! namespace under [`ROUND_STATUS_KEY`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{now_millis, Block};
use observability::RoundMetrics;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::error::{AggregationError, Result};
use crate::map::MapStage;
use crate::reduce::ReduceStage;
use crate::sealer::ChainSealer;
use crate::sink::PublishSink;

/// Raw ledger key holding the last round's [`RoundStatus`]
pub const ROUND_STATUS_KEY: &str = storage::keys::ROUND_STATUS_SLOT;

/// Outcome of the most recent round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundStatus {
    pub started_at: u64,
    /// `sealed`, or the failure kind
    pub outcome: String,
    pub height: Option<u64>,
    pub successes: usize,
    pub failures: usize,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct RoundProcessor {
    quote: String,
    map: MapStage,
    reduce: ReduceStage,
    sealer: Arc<ChainSealer>,
    sink: Arc<dyn PublishSink>,
    metrics: RoundMetrics,
}

impl RoundProcessor {
    pub fn new(
        quote: impl Into<String>,
        map: MapStage,
        reduce: ReduceStage,
        sealer: Arc<ChainSealer>,
        sink: Arc<dyn PublishSink>,
    ) -> Self {
        Self {
            quote: quote.into(),
            map,
            reduce,
            sealer,
            sink,
            metrics: RoundMetrics::new(),
        }
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    pub fn sealer(&self) -> &Arc<ChainSealer> {
        &self.sealer
    }

    /// Run one round stamped with the current time
    pub async fn run_round(&self) -> Result<Block> {
        self.run_round_at(now_millis()).await
    }

    /// Run one round stamped with `started_at` (Unix milliseconds)
    #[instrument(skip(self), fields(quote = %self.quote))]
    pub async fn run_round_at(&self, started_at: u64) -> Result<Block> {
        let clock = Instant::now();

        let reports = self.map.run(&self.quote).await?;
        let failures = reports.iter().filter(|r| r.has_error).count();
        let successes = reports.len() - failures;
        for failed in reports.iter().filter(|r| r.has_error) {
            self.metrics.source_failed(&failed.source);
        }

        let result = match self.reduce.reduce(&self.quote, started_at, reports) {
            Ok(candidate) => self.sealer.seal(candidate).await,
            Err(e) => Err(e),
        };
        let elapsed = clock.elapsed();

        match &result {
            Ok(block) => {
                info!(
                    height = block.height,
                    hash = %block.hash,
                    price = block.payload.price,
                    successes,
                    failures,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Block sealed"
                );
                self.metrics.round_sealed(block.height, elapsed);
                self.sink.deliver(block.summary());
            }
            Err(
                e @ (AggregationError::QuorumNotMet { .. }
                | AggregationError::UnusableAggregate { .. }),
            ) => {
                warn!(error = %e, successes, failures, "Round produced no block");
                self.metrics.round_failed(e.outcome(), elapsed);
            }
            Err(e) => {
                error!(error = %e, successes, failures, "Round failed");
                self.metrics.round_failed(e.outcome(), elapsed);
            }
        }

        self.record_status(started_at, &result, successes, failures, elapsed)
            .await;
        result
    }

    async fn record_status(
        &self,
        started_at: u64,
        result: &Result<Block>,
        successes: usize,
        failures: usize,
        elapsed: Duration,
    ) {
        let status = RoundStatus {
            started_at,
            outcome: match result {
                Ok(_) => "sealed".to_string(),
                Err(e) => e.outcome().to_string(),
            },
            height: result.as_ref().ok().map(|b| b.height),
            successes,
            failures,
            elapsed_ms: elapsed.as_millis() as u64,
            error: result.as_ref().err().map(|e| e.to_string()),
        };

        let body = match serde_json::to_vec(&status) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Could not encode round status");
                return;
            }
        };
        if let Err(e) = self.sealer.ledger().put_raw(ROUND_STATUS_KEY, &body).await {
            warn!(error = %e, "Could not record round status");
        }
    }
}
