//! Map stage: concurrent fan-out to every source
//!
//! One task per source, each bounded by the same deadline. Results land in
//! a slot per source, so the report list always has the configured order
//! and length no matter how sources finish.

use std::sync::Arc;
use std::time::Duration;

use common::{now_millis, ServiceMarker, SourceReport};
use futures::future::join_all;
use tracing::{debug, warn};

use crate::error::{Result, SourceError};
use crate::sources::{PriceSource, SourceReading};

pub struct MapStage {
    sources: Vec<Arc<dyn PriceSource>>,
    timeout: Duration,
    marker: ServiceMarker,
}

impl MapStage {
    pub fn new(sources: Vec<Arc<dyn PriceSource>>, timeout: Duration, marker: ServiceMarker) -> Self {
        Self {
            sources,
            timeout,
            marker,
        }
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Query every source for `quote` and return one sealed report per source.
    ///
    /// Errors, timeouts and panics become failed reports. A slow source is
    /// cancelled once its deadline passes.
    pub async fn run(&self, quote: &str) -> Result<Vec<SourceReport>> {
        let handles: Vec<_> = self
            .sources
            .iter()
            .map(|source| {
                let source = Arc::clone(source);
                let quote = quote.to_string();
                let deadline = self.timeout;
                tokio::spawn(async move {
                    match tokio::time::timeout(deadline, source.fetch(&quote)).await {
                        Ok(result) => result,
                        Err(_) => Err(SourceError::Timeout(deadline)),
                    }
                })
            })
            .collect();

        let outcomes = join_all(handles).await;

        let mut reports = Vec::with_capacity(outcomes.len());
        for (source, outcome) in self.sources.iter().zip(outcomes) {
            let result = outcome.unwrap_or_else(|join_error| {
                let reason = if join_error.is_panic() {
                    "panicked".to_string()
                } else {
                    join_error.to_string()
                };
                Err(SourceError::Crashed(reason))
            });

            let mut report = self.to_report(source.name(), quote, result)?;
            report.seal(&self.marker)?;
            reports.push(report);
        }

        Ok(reports)
    }

    fn to_report(
        &self,
        source: &str,
        quote: &str,
        result: std::result::Result<SourceReading, SourceError>,
    ) -> Result<SourceReport> {
        let report = match result {
            Ok(reading) => {
                let mut report =
                    SourceReport::success(source, quote, reading.payload, reading.timestamp);
                if report.quote().is_none() {
                    warn!(source, "Source payload is not a usable quote");
                    report.mark_failed(&self.marker)?;
                } else {
                    debug!(source, "Source reported");
                }
                report
            }
            Err(error) => {
                warn!(source, %error, "Source failed");
                SourceReport::failure(source, quote, now_millis())
            }
        };
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::testing::{Behavior, ScriptedSource};
    use common::PriceQuote;

    fn marker() -> ServiceMarker {
        ServiceMarker::new("map-test-marker").unwrap()
    }

    fn create_test_stage(sources: Vec<Arc<dyn PriceSource>>) -> MapStage {
        MapStage::new(sources, Duration::from_secs(1), marker())
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_report_per_source_in_order() {
        let stage = create_test_stage(vec![
            ScriptedSource::shared("slow", Behavior::Sleep(Duration::from_millis(500), 101.0)),
            ScriptedSource::shared("fast", Behavior::Quote(100.0, 2.0)),
            ScriptedSource::shared("broken", Behavior::Fail),
        ]);

        let reports = stage.run("USD").await.unwrap();

        let names: Vec<&str> = reports.iter().map(|r| r.source.as_str()).collect();
        assert_eq!(names, vec!["slow", "fast", "broken"]);
        assert!(!reports[0].has_error);
        assert!(!reports[1].has_error);
        assert!(reports[2].has_error);
        assert_eq!(reports[1].quote(), Some(PriceQuote::new(100.0, 2.0)));
        assert!(reports.iter().all(|r| r.ticker == "USD"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_becomes_failed_report() {
        let stage = create_test_stage(vec![
            ScriptedSource::shared("stuck", Behavior::Sleep(Duration::from_secs(30), 1.0)),
            ScriptedSource::shared("ok", Behavior::Quote(1.0, 1.0)),
        ]);

        let started = tokio::time::Instant::now();
        let reports = stage.run("USD").await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(reports[0].has_error);
        assert!(reports[0].payload.is_empty());
        assert!(!reports[1].has_error);
    }

    #[tokio::test]
    async fn test_panicking_source_becomes_failed_report() {
        let stage = create_test_stage(vec![
            ScriptedSource::shared("boom", Behavior::Panic),
            ScriptedSource::shared("ok", Behavior::Quote(1.0, 1.0)),
        ]);

        let reports = stage.run("USD").await.unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports[0].has_error);
        assert!(!reports[1].has_error);
    }

    #[tokio::test]
    async fn test_undecodable_payload_counts_as_failure() {
        let stage = create_test_stage(vec![ScriptedSource::shared("junk", Behavior::Garbage)]);
        let reports = stage.run("USD").await.unwrap();
        assert!(reports[0].has_error);
        assert!(reports[0].payload.is_empty());
    }

    #[tokio::test]
    async fn test_reports_are_sealed() {
        let stage = create_test_stage(vec![
            ScriptedSource::shared("a", Behavior::Quote(1.0, 1.0)),
            ScriptedSource::shared("b", Behavior::Fail),
        ]);
        let reports = stage.run("USD").await.unwrap();
        for report in &reports {
            assert!(report.is_sealed());
            assert_eq!(report.hash, report.compute_hash(&marker()).unwrap());
        }
    }
}
