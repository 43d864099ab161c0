//! Price source capabilities
//!
//! A source answers one question: given a quote currency, what is the
//! current price and volume? Each market gets one implementation.

mod fixed;
mod http;

pub use self::fixed::FixedSource;
pub use self::http::HttpJsonSource;

use std::sync::Arc;

use async_trait::async_trait;
use common::PriceQuote;
use config::{SourceConfig, SourceKind};
use tracing::info;

use crate::error::{AggregationError, SourceError};

/// Raw reading returned by a source
#[derive(Debug, Clone, PartialEq)]
pub struct SourceReading {
    /// Encoded [`PriceQuote`]
    pub payload: Vec<u8>,
    /// Observation time, Unix milliseconds
    pub timestamp: u64,
}

impl SourceReading {
    pub fn from_quote(quote: PriceQuote, timestamp: u64) -> Result<Self, SourceError> {
        let payload = quote
            .to_payload()
            .map_err(|e| SourceError::Decode(e.to_string()))?;
        Ok(Self { payload, timestamp })
    }
}

/// Trait for price source clients
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Source identifier recorded in every report
    fn name(&self) -> &str;

    /// Fetch one reading for `quote`
    async fn fetch(&self, quote: &str) -> Result<SourceReading, SourceError>;
}

/// Build the enabled sources from configuration, preserving order
pub fn build_sources(
    configs: &[SourceConfig],
) -> Result<Vec<Arc<dyn PriceSource>>, AggregationError> {
    let mut sources: Vec<Arc<dyn PriceSource>> = Vec::new();

    for config in configs.iter().filter(|c| c.enabled) {
        let invalid = |message: &str| AggregationError::InvalidSource {
            name: config.name.clone(),
            message: message.to_string(),
        };

        match config.kind {
            SourceKind::Http => {
                let url = config.url.clone().ok_or_else(|| invalid("missing url"))?;
                let price_pointer = config
                    .price_pointer
                    .clone()
                    .ok_or_else(|| invalid("missing price_pointer"))?;
                let source = HttpJsonSource::new(
                    &config.name,
                    url,
                    price_pointer,
                    config.volume_pointer.clone(),
                )
                .map_err(|e| invalid(&e.to_string()))?;
                sources.push(Arc::new(source));
            }
            SourceKind::Fixed => {
                let price = config.price.ok_or_else(|| invalid("missing price"))?;
                let quote = PriceQuote::new(price, config.volume.unwrap_or(0.0));
                sources.push(Arc::new(FixedSource::new(&config.name, quote)));
            }
        }
        info!(source = %config.name, kind = %config.kind, "Source registered");
    }

    if sources.is_empty() {
        return Err(AggregationError::NoSources);
    }
    Ok(sources)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted sources for pipeline tests

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    pub enum Behavior {
        Quote(f64, f64),
        Fail,
        Garbage,
        Sleep(Duration, f64),
        Panic,
    }

    pub struct ScriptedSource {
        name: String,
        behavior: Behavior,
        pub calls: AtomicUsize,
    }

    impl ScriptedSource {
        pub fn new(name: &str, behavior: Behavior) -> Self {
            Self {
                name: name.to_string(),
                behavior,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn shared(name: &str, behavior: Behavior) -> Arc<dyn PriceSource> {
            Arc::new(Self::new(name, behavior))
        }
    }

    #[async_trait]
    impl PriceSource for ScriptedSource {
        fn name(&self) -> &str {
            &self.name
        }

        async fn fetch(&self, _quote: &str) -> Result<SourceReading, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Quote(price, volume) => {
                    SourceReading::from_quote(PriceQuote::new(price, volume), 1_000)
                }
                Behavior::Fail => Err(SourceError::Request("scripted failure".to_string())),
                Behavior::Garbage => Ok(SourceReading {
                    payload: b"<html>".to_vec(),
                    timestamp: 1_000,
                }),
                Behavior::Sleep(delay, price) => {
                    tokio::time::sleep(delay).await;
                    SourceReading::from_quote(PriceQuote::new(price, 1.0), 1_000)
                }
                Behavior::Panic => panic!("scripted panic"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(name: &str, kind: SourceKind) -> SourceConfig {
        SourceConfig {
            name: name.to_string(),
            kind,
            url: None,
            price_pointer: None,
            volume_pointer: None,
            price: None,
            volume: None,
            enabled: true,
        }
    }

    #[test]
    fn test_build_sources_keeps_order_and_skips_disabled() {
        let mut http = source("http", SourceKind::Http);
        http.url = Some("https://example.com/{quote}".to_string());
        http.price_pointer = Some("/price".to_string());

        let mut fixed = source("fixed", SourceKind::Fixed);
        fixed.price = Some(10.0);

        let mut disabled = source("off", SourceKind::Fixed);
        disabled.price = Some(1.0);
        disabled.enabled = false;

        let sources = build_sources(&[fixed, disabled, http]).unwrap();
        let names: Vec<&str> = sources.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["fixed", "http"]);
    }

    #[test]
    fn test_build_sources_rejects_incomplete_config() {
        let http = source("http", SourceKind::Http);
        assert!(matches!(
            build_sources(&[http]),
            Err(AggregationError::InvalidSource { name, .. }) if name == "http"
        ));

        assert!(matches!(build_sources(&[]), Err(AggregationError::NoSources)));
    }
}
