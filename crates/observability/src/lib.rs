//! Observability infrastructure for PriceChain
//!
//! This crate provides:
//! - Structured logging via tracing
//! - Prometheus metrics for aggregation rounds and the live feed
//!
//! # Quick Start
//!
//! ```ignore
//! use observability::{init_logging, LogFormat};
//!
//! init_logging("pricechain", LogFormat::Pretty)?;
//! observability::metrics::init_metrics(9090)?;
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat};
pub use metrics::{init_metrics, FeedMetrics, RoundMetrics};
