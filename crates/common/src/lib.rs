//! Common types and utilities for PriceChain
//!
//! This crate holds the data model shared by every other crate in the
//! workspace: the per-source report, the sealed block, and the hashing
//! protocol that links blocks into a tamper-evident chain.
//!
//! # Modules
//!
//! - [`error`] - Common error types
//! - [`types`] - Reports, blocks, price quotes and summaries
//! - [`hashing`] - Service marker and double-hash protocol

pub mod error;
pub mod hashing;
pub mod types;

pub use error::{Error, Result};
pub use hashing::{double_hash, ServiceMarker, BLOCK_HASH_MARKER};
pub use types::*;
