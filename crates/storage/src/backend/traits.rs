//! Key-value backend trait
//!
//! The ledger only needs point reads, all-or-nothing batch writes and a
//! reverse prefix scan. Every backend implements this trait.

use async_trait::async_trait;

use crate::error::StorageError;

pub type StorageResult<T> = Result<T, StorageError>;

/// Ordered set of writes applied atomically by [`KvBackend::commit`]
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<(Vec<u8>, Vec<u8>)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> &mut Self {
        self.ops.push((key, value));
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.ops
    }
}

/// Byte-keyed storage with atomic batches
///
/// Readers never observe a partially applied batch.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Read one key
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Apply every write in `batch`, or none of them
    async fn commit(&self, batch: WriteBatch) -> StorageResult<()>;

    /// Up to `limit` entries whose key starts with `prefix`, greatest key first
    async fn scan_prefix_rev(
        &self,
        prefix: &[u8],
        limit: usize,
    ) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>>;
}
