//! Prometheus metrics
//!
//! Metric handles are cheap to clone. Without an installed recorder every
//! update is a no-op, so tests and tools can use these types freely.

use metrics::{counter, gauge, histogram, Counter, Gauge, Histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Initialize the Prometheus metrics exporter
///
/// This starts an HTTP server on the specified port that exposes metrics
/// at the `/metrics` endpoint.
///
/// ```ignore
/// observability::metrics::init_metrics(9090)?;
/// // Metrics available at http://localhost:9090/metrics
/// ```
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    tracing::info!(%addr, "Metrics server listening");
    Ok(())
}

/// Aggregation round metrics
///
/// * `oracle_rounds_total{outcome}` - rounds by outcome (`sealed`, `quorum`, `storage`, ...)
/// * `oracle_source_failures_total{source}` - failed source reports
/// * `oracle_chain_height` - height of the last sealed block
/// * `oracle_round_duration_seconds` - wall time of a round, map to publish
#[derive(Clone)]
pub struct RoundMetrics {
    rounds_sealed: Counter,
    chain_height: Gauge,
    round_duration: Histogram,
}

impl RoundMetrics {
    pub fn new() -> Self {
        Self {
            rounds_sealed: counter!("oracle_rounds_total", "outcome" => "sealed"),
            chain_height: gauge!("oracle_chain_height"),
            round_duration: histogram!("oracle_round_duration_seconds"),
        }
    }

    pub fn round_sealed(&self, height: u64, elapsed: Duration) {
        self.rounds_sealed.increment(1);
        self.chain_height.set(height as f64);
        self.round_duration.record(elapsed.as_secs_f64());
    }

    pub fn round_failed(&self, outcome: &'static str, elapsed: Duration) {
        counter!("oracle_rounds_total", "outcome" => outcome).increment(1);
        self.round_duration.record(elapsed.as_secs_f64());
    }

    pub fn source_failed(&self, source: &str) {
        counter!("oracle_source_failures_total", "source" => source.to_string()).increment(1);
    }
}

impl Default for RoundMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Live feed metrics
///
/// * `feed_subscribers` - connected WebSocket subscribers
/// * `feed_messages_total` - summaries written to subscribers
/// * `feed_lagged_total` - summaries dropped for slow subscribers
#[derive(Clone)]
pub struct FeedMetrics {
    subscribers: Gauge,
    messages: Counter,
    lagged: Counter,
}

impl FeedMetrics {
    pub fn new() -> Self {
        Self {
            subscribers: gauge!("feed_subscribers"),
            messages: counter!("feed_messages_total"),
            lagged: counter!("feed_lagged_total"),
        }
    }

    /// Call when a subscriber connects
    pub fn subscriber_joined(&self) {
        self.subscribers.increment(1.0);
    }

    /// Call when a subscriber disconnects
    pub fn subscriber_left(&self) {
        self.subscribers.decrement(1.0);
    }

    pub fn message_sent(&self) {
        self.messages.increment(1);
    }

    pub fn messages_lagged(&self, skipped: u64) {
        self.lagged.increment(skipped);
    }
}

impl Default for FeedMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_without_recorder_are_noops() {
        let rounds = RoundMetrics::new();
        rounds.round_sealed(3, Duration::from_millis(20));
        rounds.round_failed("quorum", Duration::from_millis(5));
        rounds.source_failed("alpha");

        let feed = FeedMetrics::default();
        feed.subscriber_joined();
        feed.message_sent();
        feed.messages_lagged(2);
        feed.subscriber_left();
    }
}
