//! Aggregation error types

use std::time::Duration;

use storage::StorageError;
use thiserror::Error;

/// Why a single source produced no reading
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Source task crashed: {0}")]
    Crashed(String),
}

/// Errors that end a round without a block
#[derive(Error, Debug)]
pub enum AggregationError {
    /// Fewer successful reports than the configured quorum
    #[error("Quorum not met: {available} of {required} required reports")]
    QuorumNotMet { required: usize, available: usize },

    /// Survivors were individually valid but their aggregate is not finite
    #[error("Aggregate is not a finite number: price={price} volume={volume}")]
    UnusableAggregate { price: f64, volume: f64 },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Hashing error: {0}")]
    Hashing(#[from] common::Error),

    #[error("Source '{name}': {message}")]
    InvalidSource { name: String, message: String },

    #[error("No enabled sources")]
    NoSources,
}

impl AggregationError {
    /// Short label used for the round outcome metric
    pub fn outcome(&self) -> &'static str {
        match self {
            AggregationError::QuorumNotMet { .. } => "quorum",
            AggregationError::UnusableAggregate { .. } => "aggregate",
            AggregationError::Storage(_) => "storage",
            AggregationError::Hashing(_) => "hashing",
            AggregationError::InvalidSource { .. } | AggregationError::NoSources => "config",
        }
    }
}

pub type Result<T> = std::result::Result<T, AggregationError>;
