//! Publish sink for sealed blocks
//!
//! Delivery is fire-and-forget. A round never waits on subscribers.

use common::BlockSummary;
use tokio::sync::broadcast;
use tracing::trace;

/// Receives the summary of every sealed block
pub trait PublishSink: Send + Sync {
    fn deliver(&self, summary: BlockSummary);
}

/// Fan-out over a broadcast channel
///
/// Subscribers that fall more than `capacity` summaries behind lose the
/// oldest ones instead of slowing the sealer down.
#[derive(Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<BlockSummary>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BlockSummary> {
        self.tx.subscribe()
    }

    /// Sender half, for components that subscribe their own receivers
    pub fn sender(&self) -> broadcast::Sender<BlockSummary> {
        self.tx.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl PublishSink for BroadcastSink {
    fn deliver(&self, summary: BlockSummary) {
        if self.tx.send(summary).is_err() {
            trace!("No live subscribers");
        }
    }
}
