//! Price aggregation for PriceChain
//!
//! Turns independent, unreliable price sources into one sealed block per
//! round.
//!
//! # Core Components
//!
//! - [`sources`] - Price source capabilities (HTTP JSON, fixed)
//! - [`map`] - Concurrent fan-out with a per-source deadline
//! - [`reduce`] - Quorum check and order-independent aggregation
//! - [`sealer`] - Serialized link, seal and persist against the chain head
//! - [`sink`] - Fire-and-forget publication of sealed blocks
//! - [`processor`] - One full round, map to publish
//! - [`scheduler`] - Interval-driven round loop
//!
//! # Key Invariants
//!
//! - Every configured source yields exactly one report per round
//! - A failed source never aborts a round; a missed quorum produces no block
//! - Heights are unique and contiguous even when rounds overlap
//! - Nothing is published before it is persisted

pub mod error;
pub mod map;
pub mod processor;
pub mod reduce;
pub mod scheduler;
pub mod sealer;
pub mod sink;
pub mod sources;

pub use error::{AggregationError, Result, SourceError};
pub use map::MapStage;
pub use processor::{RoundProcessor, RoundStatus, ROUND_STATUS_KEY};
pub use reduce::{aggregate, ReduceStage};
pub use scheduler::RoundScheduler;
pub use sealer::ChainSealer;
pub use sink::{BroadcastSink, PublishSink};
pub use sources::{build_sources, FixedSource, HttpJsonSource, PriceSource, SourceReading};
