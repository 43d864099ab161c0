//! Reduce stage: survivors to candidate block

use common::{Block, PriceIndex, PriceQuote, SourceReport};
use tracing::debug;

use crate::error::{AggregationError, Result};

pub struct ReduceStage {
    quorum: usize,
    memo: String,
}

impl ReduceStage {
    /// A quorum of 0 is treated as 1; a block always needs a price.
    pub fn new(quorum: usize) -> Self {
        Self {
            quorum: quorum.max(1),
            memo: String::new(),
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    pub fn quorum(&self) -> usize {
        self.quorum
    }

    /// Build the round's candidate block.
    ///
    /// Every report goes into the evidence list; only reports with a
    /// usable quote contribute to the aggregate. Fails when fewer than
    /// `quorum` reports survive, or when the aggregate overflows.
    pub fn reduce(
        &self,
        quote: &str,
        started_at: u64,
        reports: Vec<SourceReport>,
    ) -> Result<Block> {
        let survivors: Vec<PriceQuote> = reports.iter().filter_map(SourceReport::quote).collect();

        if survivors.len() < self.quorum {
            return Err(AggregationError::QuorumNotMet {
                required: self.quorum,
                available: survivors.len(),
            });
        }

        let index = aggregate(quote, &survivors);
        // finite inputs can still sum past f64::MAX; JSON would store null
        if !index.price.is_finite() || !index.volume.is_finite() {
            return Err(AggregationError::UnusableAggregate {
                price: index.price,
                volume: index.volume,
            });
        }
        debug!(
            price = index.price,
            volume = index.volume,
            survivors = survivors.len(),
            total = reports.len(),
            "Round reduced"
        );

        Ok(Block::candidate(started_at, index, reports).with_memo(self.memo.clone()))
    }
}

/// Mean price and total volume of `quotes`.
///
/// Inputs are sorted before summation, so the result depends only on the
/// multiset of quotes and never on the order sources finished in.
pub fn aggregate(quote: &str, quotes: &[PriceQuote]) -> PriceIndex {
    let mut prices: Vec<f64> = quotes.iter().map(|q| q.price).collect();
    let mut volumes: Vec<f64> = quotes.iter().map(|q| q.volume).collect();
    prices.sort_by(f64::total_cmp);
    volumes.sort_by(f64::total_cmp);

    let price = if prices.is_empty() {
        0.0
    } else {
        prices.iter().sum::<f64>() / prices.len() as f64
    };

    PriceIndex {
        quote: quote.to_string(),
        price,
        volume: volumes.iter().sum(),
        sources: quotes.len() as u32,
    }
}
