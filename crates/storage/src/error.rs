//! Storage error types

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend could not be reached or opened
    #[error("Connection error: {0}")]
    Connection(String),

    /// A read or scan failed inside the backend
    #[error("Backend error: {0}")]
    Backend(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A block with the same hash, height or timestamp already exists
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// Batch write failed; nothing was applied
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Stored bytes do not decode, or a block does not match its key
    #[error("Corrupted record: {0}")]
    Corrupted(String),

    /// Hash or predecessor link mismatch found while walking the chain
    #[error("Chain broken at height {height}: {message}")]
    ChainBroken { height: u64, message: String },

    /// Block rejected before writing
    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}
