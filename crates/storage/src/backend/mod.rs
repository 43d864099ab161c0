//! Key-value backends for the ledger
//!
//! This module provides the backend trait and its implementations.

mod memory;
mod redis;
mod traits;

pub use self::memory::MemoryBackend;
pub use self::redis::RedisBackend;
pub use self::traits::*;

use std::sync::Arc;

use config::{LedgerBackend, LedgerConfig};
use tracing::info;

use crate::error::StorageError;

/// Open the backend selected in the ledger configuration.
///
/// A Redis backend that cannot connect is an error; callers treat it as fatal.
pub async fn open_backend(config: &LedgerConfig) -> StorageResult<Arc<dyn KvBackend>> {
    match config.backend {
        LedgerBackend::Memory => {
            info!("Creating in-memory ledger backend");
            Ok(Arc::new(MemoryBackend::new()))
        }
        LedgerBackend::Redis => {
            let redis_config = config.redis.as_ref().ok_or_else(|| {
                StorageError::Config("Redis config required for Redis backend".to_string())
            })?;
            info!("Creating Redis ledger backend");
            let backend = RedisBackend::new(redis_config).await?;
            Ok(Arc::new(backend))
        }
    }
}
