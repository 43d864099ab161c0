//! Block ledger and key-value backends for PriceChain
//!
//! The [`Ledger`] persists sealed blocks and answers point lookups by hash,
//! timestamp and height. It runs on any [`KvBackend`]; an in-memory backend
//! and a Redis backend are provided.
//!
//! # Modules
//!
//! - [`backend`] - Backend trait, memory and Redis implementations
//! - [`keys`] - Key layout
//! - [`ledger`] - Block ledger
//! - [`error`] - Storage errors

pub mod backend;
pub mod error;
pub mod keys;
pub mod ledger;

pub use backend::{open_backend, KvBackend, MemoryBackend, RedisBackend, StorageResult, WriteBatch};
pub use error::StorageError;
pub use ledger::Ledger;
