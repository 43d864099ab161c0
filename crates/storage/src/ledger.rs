//! Block ledger
//!
//! Stores each sealed block under its hash and indexes it by timestamp and
//! height. All three entries go into one batch, so a block is either fully
//! indexed or absent.

use std::sync::Arc;

use common::{Block, ServiceMarker};
use tracing::{debug, info, instrument};

use crate::backend::{KvBackend, StorageResult, WriteBatch};
use crate::error::StorageError;
use crate::keys;

/// Write-once store of sealed blocks
#[derive(Clone)]
pub struct Ledger {
    backend: Arc<dyn KvBackend>,
}

impl Ledger {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Persist a sealed block under all three indexes in one batch.
    ///
    /// Rejects unsealed blocks, blocks whose stored form would not read back,
    /// and blocks whose hash, height or timestamp is already taken. On
    /// failure nothing is written.
    ///
    /// Linkage to the head is not checked here. The chain sealer is the only
    /// writer that assigns heights and predecessors; [`Ledger::verify_chain`]
    /// reports gaps and forks written any other way.
    #[instrument(skip(self, block), fields(height = block.height, hash = %block.hash))]
    pub async fn put(&self, block: &Block) -> StorageResult<()> {
        if !block.is_sealed() {
            return Err(StorageError::InvalidBlock(format!(
                "block at height {} is not sealed",
                block.height
            )));
        }

        let block_key = keys::block_key(&block.hash);
        let timestamp_key = keys::timestamp_key(block.timestamp);
        let height_key = keys::height_key(block.height);

        for (key, what) in [
            (&block_key, format!("hash {}", block.hash)),
            (&timestamp_key, format!("timestamp {}", block.timestamp)),
            (&height_key, format!("height {}", block.height)),
        ] {
            if self.backend.get(key).await?.is_some() {
                return Err(StorageError::Duplicate(what));
            }
        }

        let body = serde_json::to_vec(block)
            .map_err(|e| StorageError::InvalidBlock(e.to_string()))?;
        // non-finite floats serialize as null and would never decode again
        serde_json::from_slice::<Block>(&body).map_err(|e| {
            StorageError::InvalidBlock(format!("block {} does not read back: {}", block.hash, e))
        })?;

        let mut batch = WriteBatch::new();
        batch
            .put(block_key, body)
            .put(timestamp_key, block.hash.as_bytes().to_vec())
            .put(height_key, block.hash.as_bytes().to_vec());
        self.backend.commit(batch).await?;

        debug!("Block persisted");
        Ok(())
    }

    /// Block stored under `hash`
    ///
    /// Checks only that the record decodes and carries the hash it is stored
    /// under. Use [`Ledger::get_verified`] or [`Ledger::verify_chain`] to
    /// check content and links.
    pub async fn get_by_hash(&self, hash: &str) -> StorageResult<Block> {
        let body = self
            .backend
            .get(&keys::block_key(hash))
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("block {}", hash)))?;

        let block: Block = serde_json::from_slice(&body)
            .map_err(|e| StorageError::Corrupted(format!("block {}: {}", hash, e)))?;

        if block.hash != hash {
            return Err(StorageError::Corrupted(format!(
                "block stored under {} carries hash {}",
                hash, block.hash
            )));
        }
        Ok(block)
    }

    pub async fn get_by_timestamp(&self, timestamp: u64) -> StorageResult<Block> {
        let hash = self
            .resolve_index(&keys::timestamp_key(timestamp), || {
                format!("block at timestamp {}", timestamp)
            })
            .await?;
        self.get_by_hash(&hash).await
    }

    pub async fn get_by_height(&self, height: u64) -> StorageResult<Block> {
        let hash = self
            .resolve_index(&keys::height_key(height), || format!("block at height {}", height))
            .await?;
        self.get_by_hash(&hash).await
    }

    /// Block stored under `hash`, with its content hash recomputed and its
    /// predecessor link checked against the block one height below.
    pub async fn get_verified(&self, hash: &str, marker: &ServiceMarker) -> StorageResult<Block> {
        let block = self.get_by_hash(hash).await?;

        let valid = block
            .verify_hash(marker)
            .map_err(|e| StorageError::Corrupted(e.to_string()))?;
        if !valid {
            return Err(StorageError::ChainBroken {
                height: block.height,
                message: format!("hash {} does not match content", block.hash),
            });
        }

        if block.height == 0 {
            if !block.previous_hash.is_empty() {
                return Err(StorageError::ChainBroken {
                    height: 0,
                    message: "genesis block has a predecessor".to_string(),
                });
            }
            return Ok(block);
        }

        let predecessor = self.get_by_height(block.height - 1).await?;
        if block.previous_hash != predecessor.hash {
            return Err(StorageError::ChainBroken {
                height: block.height,
                message: format!(
                    "previous hash {} does not match {}",
                    block.previous_hash, predecessor.hash
                ),
            });
        }
        Ok(block)
    }

    async fn resolve_index(
        &self,
        key: &[u8],
        describe: impl Fn() -> String,
    ) -> StorageResult<String> {
        let raw = self
            .backend
            .get(key)
            .await?
            .ok_or_else(|| StorageError::NotFound(describe()))?;
        String::from_utf8(raw)
            .map_err(|e| StorageError::Corrupted(format!("index for {}: {}", describe(), e)))
    }

    /// Up to `n` blocks ordered by descending height
    pub async fn get_latest(&self, n: usize) -> StorageResult<Vec<Block>> {
        if n == 0 {
            return Ok(Vec::new());
        }

        let entries = self
            .backend
            .scan_prefix_rev(&[keys::HEIGHT_PREFIX], n)
            .await?;

        let mut blocks = Vec::with_capacity(entries.len());
        for (key, raw_hash) in entries {
            let hash = String::from_utf8(raw_hash).map_err(|e| {
                StorageError::Corrupted(format!(
                    "height index {:?}: {}",
                    keys::decode_u64(&key),
                    e
                ))
            })?;
            blocks.push(self.get_by_hash(&hash).await?);
        }
        Ok(blocks)
    }

    /// Block with the greatest height, if any
    pub async fn head(&self) -> StorageResult<Option<Block>> {
        Ok(self.get_latest(1).await?.into_iter().next())
    }

    /// Opaque value stored with [`Ledger::put_raw`]
    pub async fn get_raw(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.backend
            .get(&keys::raw_key(key))
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("raw key {}", key)))
    }

    /// Store an opaque value outside the block namespace, overwriting any previous one
    pub async fn put_raw(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        let mut batch = WriteBatch::new();
        batch.put(keys::raw_key(key), value.to_vec());
        self.backend.commit(batch).await
    }

    /// Walk back up to `depth` blocks from the head, recomputing each hash
    /// and checking predecessor links. Returns the number of blocks checked.
    #[instrument(skip(self, marker))]
    pub async fn verify_chain(&self, marker: &ServiceMarker, depth: usize) -> StorageResult<usize> {
        let blocks = self.get_latest(depth).await?;

        for block in &blocks {
            let valid = block
                .verify_hash(marker)
                .map_err(|e| StorageError::Corrupted(e.to_string()))?;
            if !valid {
                return Err(StorageError::ChainBroken {
                    height: block.height,
                    message: format!("hash {} does not match content", block.hash),
                });
            }
        }

        for pair in blocks.windows(2) {
            let (newer, older) = (&pair[0], &pair[1]);
            if newer.height != older.height + 1 {
                return Err(StorageError::ChainBroken {
                    height: newer.height,
                    message: format!("gap below height {} (next is {})", newer.height, older.height),
                });
            }
            if newer.previous_hash != older.hash {
                return Err(StorageError::ChainBroken {
                    height: newer.height,
                    message: format!(
                        "previous hash {} does not match {}",
                        newer.previous_hash, older.hash
                    ),
                });
            }
        }

        if let Some(oldest) = blocks.last() {
            if oldest.height == 0 && !oldest.previous_hash.is_empty() {
                return Err(StorageError::ChainBroken {
                    height: 0,
                    message: "genesis block has a predecessor".to_string(),
                });
            }
        }

        info!(verified = blocks.len(), "Chain verified");
        Ok(blocks.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use assert_matches::assert_matches;
    use common::{PriceIndex, PriceQuote, SourceReport};

    fn marker() -> ServiceMarker {
        ServiceMarker::new("ledger-test-marker").unwrap()
    }

    fn create_test_ledger() -> (Ledger, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        (Ledger::new(backend.clone()), backend)
    }

    fn create_test_block(head: Option<&Block>, timestamp: u64, price: f64) -> Block {
        let payload = PriceQuote::new(price, 1.0).to_payload().unwrap();
        let mut report = SourceReport::success("alpha", "USD", payload, timestamp);
        report.seal(&marker()).unwrap();

        let index = PriceIndex {
            quote: "USD".to_string(),
            price,
            volume: 1.0,
            sources: 1,
        };
        let mut block = Block::candidate(timestamp, index, vec![report]);
        block.link(head, "node-1");
        block.seal(&marker()).unwrap();
        block
    }

    async fn create_test_chain(ledger: &Ledger, len: usize) -> Vec<Block> {
        let mut chain: Vec<Block> = Vec::new();
        for i in 0..len {
            let block = create_test_block(chain.last(), 1_000 * (i as u64 + 1), 100.0 + i as f64);
            ledger.put(&block).await.unwrap();
            chain.push(block);
        }
        chain
    }

    #[tokio::test]
    async fn test_lookup_by_every_index() {
        let (ledger, _) = create_test_ledger();
        let block = create_test_block(None, 42_000, 100.0);
        ledger.put(&block).await.unwrap();

        assert_eq!(ledger.get_by_hash(&block.hash).await.unwrap(), block);
        assert_eq!(ledger.get_by_timestamp(42_000).await.unwrap(), block);
        assert_eq!(ledger.get_by_height(0).await.unwrap(), block);
    }

    #[tokio::test]
    async fn test_missing_entries_are_not_found() {
        let (ledger, _) = create_test_ledger();
        assert_matches!(ledger.get_by_hash("dd00abc").await, Err(StorageError::NotFound(_)));
        assert_matches!(ledger.get_by_timestamp(1).await, Err(StorageError::NotFound(_)));
        assert_matches!(ledger.get_by_height(0).await, Err(StorageError::NotFound(_)));
        assert_matches!(ledger.get_raw("nothing").await, Err(StorageError::NotFound(_)));
        assert!(ledger.head().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupted_entry_is_distinct_from_missing() {
        let (ledger, backend) = create_test_ledger();
        let mut batch = WriteBatch::new();
        batch
            .put(keys::block_key("dd00bad"), b"{not json".to_vec())
            .put(keys::height_key(0), b"dd00bad".to_vec());
        backend.commit(batch).await.unwrap();

        assert_matches!(ledger.get_by_hash("dd00bad").await, Err(StorageError::Corrupted(_)));
        assert_matches!(ledger.get_by_height(0).await, Err(StorageError::Corrupted(_)));
    }

    #[tokio::test]
    async fn test_block_under_wrong_key_is_corrupted() {
        let (ledger, backend) = create_test_ledger();
        let block = create_test_block(None, 1_000, 100.0);
        let mut batch = WriteBatch::new();
        batch.put(keys::block_key("dd00other"), serde_json::to_vec(&block).unwrap());
        backend.commit(batch).await.unwrap();

        assert_matches!(ledger.get_by_hash("dd00other").await, Err(StorageError::Corrupted(_)));
    }

    #[tokio::test]
    async fn test_put_rejects_unsealed_and_duplicates() {
        let (ledger, backend) = create_test_ledger();

        let unsealed = Block::candidate(1_000, PriceIndex::default(), vec![]);
        assert_matches!(ledger.put(&unsealed).await, Err(StorageError::InvalidBlock(_)));

        let block = create_test_block(None, 1_000, 100.0);
        ledger.put(&block).await.unwrap();
        assert_matches!(ledger.put(&block).await, Err(StorageError::Duplicate(_)));

        // same height, different content
        let rival = create_test_block(None, 2_000, 101.0);
        assert_matches!(ledger.put(&rival).await, Err(StorageError::Duplicate(_)));

        // same timestamp, next height
        let same_time = create_test_block(Some(&block), 1_000, 102.0);
        assert_matches!(ledger.put(&same_time).await, Err(StorageError::Duplicate(_)));

        assert_eq!(backend.len().await, 3);
    }

    #[tokio::test]
    async fn test_interrupted_put_leaves_nothing() {
        let (ledger, backend) = create_test_ledger();
        let genesis = create_test_chain(&ledger, 1).await.remove(0);
        let block = create_test_block(Some(&genesis), 5_000, 100.0);

        backend.fail_next_commit_after(2);
        assert_matches!(ledger.put(&block).await, Err(StorageError::Transaction(_)));

        assert_matches!(ledger.get_by_hash(&block.hash).await, Err(StorageError::NotFound(_)));
        assert_matches!(ledger.get_by_timestamp(5_000).await, Err(StorageError::NotFound(_)));
        assert_matches!(ledger.get_by_height(1).await, Err(StorageError::NotFound(_)));
        assert_eq!(ledger.head().await.unwrap(), Some(genesis));
    }

    #[tokio::test]
    async fn test_get_latest_orders_by_height() {
        let (ledger, _) = create_test_ledger();
        let chain = create_test_chain(&ledger, 5).await;

        let latest = ledger.get_latest(3).await.unwrap();
        let heights: Vec<u64> = latest.iter().map(|b| b.height).collect();
        assert_eq!(heights, vec![4, 3, 2]);
        assert_eq!(latest[0], chain[4]);

        assert_eq!(ledger.get_latest(10).await.unwrap().len(), 5);
        assert!(ledger.get_latest(0).await.unwrap().is_empty());
        assert_eq!(ledger.head().await.unwrap(), Some(chain[4].clone()));
    }

    #[tokio::test]
    async fn test_get_latest_is_idempotent() {
        let (ledger, _) = create_test_ledger();
        create_test_chain(&ledger, 4).await;

        let first = ledger.get_latest(4).await.unwrap();
        let second = ledger.get_latest(4).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_raw_values() {
        let (ledger, _) = create_test_ledger();
        ledger.put_raw("round:last", b"one").await.unwrap();
        ledger.put_raw("round:last", b"two").await.unwrap();
        assert_eq!(ledger.get_raw("round:last").await.unwrap(), b"two".to_vec());

        // raw keys never show up as blocks
        assert!(ledger.head().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_verify_chain() {
        let (ledger, _) = create_test_ledger();
        create_test_chain(&ledger, 6).await;

        assert_eq!(ledger.verify_chain(&marker(), 100).await.unwrap(), 6);
        assert_eq!(ledger.verify_chain(&marker(), 3).await.unwrap(), 3);

        let other = ServiceMarker::new("someone-else").unwrap();
        assert_matches!(
            ledger.verify_chain(&other, 2).await,
            Err(StorageError::ChainBroken { height: 5, .. })
        );
    }

    #[tokio::test]
    async fn test_verify_chain_detects_broken_link() {
        let (ledger, _) = create_test_ledger();
        let chain = create_test_chain(&ledger, 2).await;

        // sealed correctly but linked to the wrong predecessor
        let mut forged = create_test_block(None, 9_000, 100.0);
        forged.hash.clear();
        forged.height = 2;
        forged.previous_hash = chain[0].hash.clone();
        forged.seal(&marker()).unwrap();
        ledger.put(&forged).await.unwrap();

        assert_matches!(
            ledger.verify_chain(&marker(), 10).await,
            Err(StorageError::ChainBroken { height: 2, .. })
        );
    }

    #[tokio::test]
    async fn test_put_rejects_block_that_would_not_read_back() {
        let (ledger, backend) = create_test_ledger();
        let mut block = Block::candidate(
            1_000,
            PriceIndex {
                quote: "USD".to_string(),
                price: 100.0,
                volume: f64::INFINITY,
                sources: 2,
            },
            vec![],
        );
        block.link(None, "node-1");
        block.seal(&marker()).unwrap();

        assert_matches!(ledger.put(&block).await, Err(StorageError::InvalidBlock(_)));
        assert!(backend.is_empty().await);
        assert!(ledger.head().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_verified_lookup() {
        let (ledger, _) = create_test_ledger();
        let chain = create_test_chain(&ledger, 3).await;

        assert_eq!(ledger.get_verified(&chain[0].hash, &marker()).await.unwrap(), chain[0]);
        assert_eq!(ledger.get_verified(&chain[2].hash, &marker()).await.unwrap(), chain[2]);

        let other = ServiceMarker::new("someone-else").unwrap();
        assert_matches!(
            ledger.get_verified(&chain[1].hash, &other).await,
            Err(StorageError::ChainBroken { height: 1, .. })
        );
        assert_matches!(
            ledger.get_verified("dd00missing", &marker()).await,
            Err(StorageError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn test_verified_lookup_detects_wrong_predecessor() {
        let (ledger, _) = create_test_ledger();
        let chain = create_test_chain(&ledger, 2).await;

        // plain lookup accepts it, verified lookup does not
        let mut forged = create_test_block(None, 9_000, 100.0);
        forged.hash.clear();
        forged.height = 2;
        forged.previous_hash = chain[0].hash.clone();
        forged.seal(&marker()).unwrap();
        ledger.put(&forged).await.unwrap();

        assert_eq!(ledger.get_by_hash(&forged.hash).await.unwrap(), forged);
        assert_matches!(
            ledger.get_verified(&forged.hash, &marker()).await,
            Err(StorageError::ChainBroken { height: 2, .. })
        );
    }

    #[tokio::test]
    async fn test_gap_written_outside_the_sealer_is_reported() {
        let (ledger, _) = create_test_ledger();
        let chain = create_test_chain(&ledger, 2).await;

        let mut skipped = create_test_block(Some(&chain[1]), 9_000, 100.0);
        skipped.hash.clear();
        skipped.height = 3;
        skipped.seal(&marker()).unwrap();
        ledger.put(&skipped).await.unwrap();

        assert_matches!(
            ledger.verify_chain(&marker(), 10).await,
            Err(StorageError::ChainBroken { height: 3, .. })
        );
    }
}
