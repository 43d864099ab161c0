//! Redis key-value backend
//!
//! Batches are sent as one `MULTI`/`EXEC` pipeline so Redis applies them
//! atomically. Keys are namespaced so the ledger can share a database.

use async_trait::async_trait;
use redis::AsyncCommands;
use std::sync::Arc;
use tracing::{debug, info};

use crate::backend::traits::{KvBackend, StorageResult, WriteBatch};
use crate::error::StorageError;
use config::RedisConfig;

const KEY_NAMESPACE: &[u8] = b"pricechain:";

/// Persistent backend on a Redis server
pub struct RedisBackend {
    redis: Arc<tokio::sync::Mutex<redis::aio::ConnectionManager>>,
}

impl RedisBackend {
    /// Connect to Redis. Fails if the server is unreachable.
    pub async fn new(config: &RedisConfig) -> StorageResult<Self> {
        info!(host = %config.host, port = config.port, db = config.db_index, "Connecting to Redis");

        let client = redis::Client::open(config.connection_url())
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let connection_manager = client
            .get_connection_manager()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(Self {
            redis: Arc::new(tokio::sync::Mutex::new(connection_manager)),
        })
    }

    fn namespaced(key: &[u8]) -> Vec<u8> {
        let mut full = Vec::with_capacity(KEY_NAMESPACE.len() + key.len());
        full.extend_from_slice(KEY_NAMESPACE);
        full.extend_from_slice(key);
        full
    }

    /// `SCAN MATCH` pattern for a prefix, escaping glob metacharacters
    fn match_pattern(prefix: &[u8]) -> Vec<u8> {
        let mut pattern = Vec::with_capacity(KEY_NAMESPACE.len() + prefix.len() * 2 + 1);
        for &byte in KEY_NAMESPACE.iter().chain(prefix) {
            if matches!(byte, b'*' | b'?' | b'[' | b']' | b'\\') {
                pattern.push(b'\\');
            }
            pattern.push(byte);
        }
        pattern.push(b'*');
        pattern
    }
}

#[async_trait]
impl KvBackend for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let mut redis = self.redis.lock().await;
        redis
            .get::<_, Option<Vec<u8>>>(Self::namespaced(key))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    async fn commit(&self, batch: WriteBatch) -> StorageResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let writes = batch.len();

        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value) in batch.into_ops() {
            pipe.set(Self::namespaced(&key), value).ignore();
        }

        let mut redis = self.redis.lock().await;
        pipe.query_async::<_, ()>(&mut *redis)
            .await
            .map_err(|e| StorageError::Transaction(e.to_string()))?;

        debug!(writes, "Batch committed to Redis");
        Ok(())
    }

    async fn scan_prefix_rev(
        &self,
        prefix: &[u8],
        limit: usize,
    ) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut redis = self.redis.lock().await;

        let mut keys: Vec<Vec<u8>> = Vec::new();
        {
            let mut iter = redis
                .scan_match::<_, Vec<u8>>(Self::match_pattern(prefix))
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }

        keys.sort_unstable_by(|a, b| b.cmp(a));
        keys.dedup();
        keys.truncate(limit);
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let values: Vec<Option<Vec<u8>>> = redis
            .mget(&keys)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(keys
            .into_iter()
            .zip(values)
            .filter_map(|(key, value)| {
                let value = value?;
                Some((key[KEY_NAMESPACE.len()..].to_vec(), value))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaced_key() {
        assert_eq!(RedisBackend::namespaced(&[3, 0]), b"pricechain:\x03\x00".to_vec());
    }

    #[test]
    fn test_match_pattern_escapes_glob_bytes() {
        assert_eq!(RedisBackend::match_pattern(&[3]), b"pricechain:\x03*".to_vec());
        assert_eq!(RedisBackend::match_pattern(b"a*"), b"pricechain:a\\**".to_vec());
    }
}
