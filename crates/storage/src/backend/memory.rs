//! In-memory key-value backend

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::ops::Bound;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::backend::traits::{KvBackend, StorageResult, WriteBatch};
use crate::error::StorageError;
use crate::keys::prefix_upper_bound;

/// Ordered in-memory map guarded by an async read-write lock
///
/// Fast but non-persistent; data is lost on restart. Commits apply writes
/// one at a time under the write lock and undo them if the batch fails, so
/// readers only ever see the state before or after a whole batch.
pub struct MemoryBackend {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    /// Fail the next commit after this many writes were applied
    fail_after: Mutex<Option<usize>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            fail_after: Mutex::new(None),
        }
    }

    /// Make the next commit fail after `writes` of its writes were applied.
    ///
    /// Used to exercise rollback of interrupted batches.
    pub fn fail_next_commit_after(&self, writes: usize) {
        *self.fail_after.lock() = Some(writes);
    }

    /// Number of stored keys
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn commit(&self, batch: WriteBatch) -> StorageResult<()> {
        let mut entries = self.entries.write().await;
        let fail_after = self.fail_after.lock().take();
        let total = batch.len();

        let mut undo: Vec<(Vec<u8>, Option<Vec<u8>>)> = Vec::with_capacity(total);
        for (applied, (key, value)) in batch.into_ops().into_iter().enumerate() {
            if fail_after == Some(applied) {
                for (key, previous) in undo.into_iter().rev() {
                    match previous {
                        Some(previous) => entries.insert(key, previous),
                        None => entries.remove(&key),
                    };
                }
                warn!(applied, total, "Batch interrupted, rolled back");
                return Err(StorageError::Transaction(format!(
                    "batch interrupted after {} of {} writes",
                    applied, total
                )));
            }
            let previous = entries.insert(key.clone(), value);
            undo.push((key, previous));
        }

        debug!(writes = total, "Batch committed");
        Ok(())
    }

    async fn scan_prefix_rev(
        &self,
        prefix: &[u8],
        limit: usize,
    ) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let entries = self.entries.read().await;
        let upper = match prefix_upper_bound(prefix) {
            Some(bound) => Bound::Excluded(bound),
            None => Bound::Unbounded,
        };

        Ok(entries
            .range((Bound::Included(prefix.to_vec()), upper))
            .rev()
            .take(limit)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
