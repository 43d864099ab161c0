//! Chain sealer
//!
//! Linking, hashing and persisting a block happen under one async mutex.
//! Two rounds can never read the same head, so heights stay unique and
//! contiguous even when rounds overlap.

use common::{Block, ServiceMarker};
use storage::Ledger;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;

pub struct ChainSealer {
    ledger: Ledger,
    marker: ServiceMarker,
    address: String,
    write_lock: Mutex<()>,
}

impl ChainSealer {
    pub fn new(ledger: Ledger, marker: ServiceMarker, address: impl Into<String>) -> Self {
        Self {
            ledger,
            marker,
            address: address.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Link `candidate` to the current head, seal it and persist it.
    ///
    /// If persisting fails the head does not move and the error is returned.
    pub async fn seal(&self, mut candidate: Block) -> Result<Block> {
        let _guard = self.write_lock.lock().await;

        let head = self.ledger.head().await?;
        candidate.link(head.as_ref(), self.address.as_str());
        candidate.seal(&self.marker)?;
        self.ledger.put(&candidate).await?;

        debug!(height = candidate.height, hash = %candidate.hash, "Block linked");
        Ok(candidate)
    }
}
