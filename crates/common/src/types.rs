//! Common types used across PriceChain
//!
//! A round produces one [`SourceReport`] per configured source. The reports
//! that carry a decodable [`PriceQuote`] are reduced into a [`PriceIndex`],
//! which becomes the payload of a [`Block`]. Blocks are linked by hash and
//! height; [`BlockSummary`] is the compact form pushed to live subscribers.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hashing::{self, ServiceMarker};

/// Current wall-clock time as Unix milliseconds
pub fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}

/// A single price/volume observation from one source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price: f64,
    pub volume: f64,
}

impl PriceQuote {
    pub fn new(price: f64, volume: f64) -> Self {
        Self { price, volume }
    }

    /// A quote is usable when both figures are finite, the price is
    /// positive and the volume is not negative.
    pub fn is_valid(&self) -> bool {
        self.price.is_finite() && self.volume.is_finite() && self.price > 0.0 && self.volume >= 0.0
    }

    /// Encode as the raw payload carried by a [`SourceReport`]
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a raw payload; invalid figures are rejected
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        let quote: Self = serde_json::from_slice(payload)?;
        if !quote.is_valid() {
            return Err(Error::invalid_input(format!(
                "unusable quote: price={} volume={}",
                quote.price, quote.volume
            )));
        }
        Ok(quote)
    }
}

/// One source's report for a round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReport {
    /// Source identifier
    #[serde(rename = "name")]
    pub source: String,
    /// Raw payload bytes, hex-encoded on the wire
    #[serde(rename = "data", with = "hex")]
    pub payload: Vec<u8>,
    pub has_error: bool,
    /// Observation time, Unix milliseconds
    pub timestamp: u64,
    pub ticker: String,
    pub hash: String,
}

impl SourceReport {
    /// Report carrying a fetched payload
    pub fn success(
        source: impl Into<String>,
        ticker: impl Into<String>,
        payload: Vec<u8>,
        timestamp: u64,
    ) -> Self {
        Self {
            source: source.into(),
            payload,
            has_error: false,
            timestamp,
            ticker: ticker.into(),
            hash: String::new(),
        }
    }

    /// Report for a source that errored, timed out or crashed
    pub fn failure(source: impl Into<String>, ticker: impl Into<String>, timestamp: u64) -> Self {
        Self {
            source: source.into(),
            payload: Vec::new(),
            has_error: true,
            timestamp,
            ticker: ticker.into(),
            hash: String::new(),
        }
    }

    pub fn is_sealed(&self) -> bool {
        !self.hash.is_empty()
    }

    /// Decoded quote, or `None` if the report failed or the payload is unusable
    pub fn quote(&self) -> Option<PriceQuote> {
        if self.has_error {
            return None;
        }
        PriceQuote::from_payload(&self.payload).ok()
    }

    /// Content hash over the report with its hash field cleared
    pub fn compute_hash(&self, marker: &ServiceMarker) -> Result<String> {
        let unsealed = Self {
            hash: String::new(),
            ..self.clone()
        };
        hashing::double_hash(marker, &unsealed)
    }

    /// (Re)compute and store the content hash
    pub fn seal(&mut self, marker: &ServiceMarker) -> Result<()> {
        self.hash = self.compute_hash(marker)?;
        Ok(())
    }

    /// Flag the report as failed and drop its payload.
    ///
    /// A sealed report is re-hashed so its hash keeps covering its content.
    pub fn mark_failed(&mut self, marker: &ServiceMarker) -> Result<()> {
        let was_sealed = self.is_sealed();
        self.has_error = true;
        self.payload.clear();
        if was_sealed {
            self.seal(marker)?;
        }
        Ok(())
    }
}

/// Aggregate of a round's surviving quotes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceIndex {
    /// Quote currency ticker, e.g. `USD`
    pub quote: String,
    /// Arithmetic mean of surviving prices
    pub price: f64,
    /// Sum of surviving volumes
    pub volume: f64,
    /// Number of reports that contributed
    pub sources: u32,
}

/// One sealed round outcome, the unit of storage and of the hash chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub hash: String,
    pub height: u64,
    /// Round start, Unix milliseconds
    pub timestamp: u64,
    #[serde(rename = "data")]
    pub payload: PriceIndex,
    pub previous_hash: String,
    /// Address of the node that sealed this block
    pub address: String,
    pub previous_address: String,
    pub memo: String,
    /// Every report of the round, failures included, in source order
    pub evidence: Vec<SourceReport>,
}

impl Block {
    /// Unlinked, unsealed block built from a round's outcome
    pub fn candidate(timestamp: u64, payload: PriceIndex, evidence: Vec<SourceReport>) -> Self {
        Self {
            hash: String::new(),
            height: 0,
            timestamp,
            payload,
            previous_hash: String::new(),
            address: String::new(),
            previous_address: String::new(),
            memo: String::new(),
            evidence,
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    pub fn is_sealed(&self) -> bool {
        !self.hash.is_empty()
    }

    pub fn is_genesis(&self) -> bool {
        self.height == 0 && self.previous_hash.is_empty()
    }

    /// Attach the block to `head`, or make it the genesis block.
    ///
    /// Sets height, predecessor hash, predecessor address and the sealing
    /// node's address.
    pub fn link(&mut self, head: Option<&Block>, address: impl Into<String>) {
        match head {
            Some(head) => {
                self.height = head.height + 1;
                self.previous_hash = head.hash.clone();
                self.previous_address = head.address.clone();
            }
            None => {
                self.height = 0;
                self.previous_hash = String::new();
                self.previous_address = String::new();
            }
        }
        self.address = address.into();
    }

    /// Content hash with the `dd<ss>` prefix, computed with the hash field cleared
    pub fn compute_hash(&self, marker: &ServiceMarker) -> Result<String> {
        let unsealed = Self {
            hash: String::new(),
            ..self.clone()
        };
        let base = hashing::double_hash(marker, &unsealed)?;
        Ok(hashing::prefix_block_hash(self.timestamp, &base))
    }

    /// Compute and store the hash. A block can only be sealed once.
    pub fn seal(&mut self, marker: &ServiceMarker) -> Result<()> {
        if self.is_sealed() {
            return Err(Error::AlreadySealed(self.hash.clone()));
        }
        self.hash = self.compute_hash(marker)?;
        Ok(())
    }

    /// Whether the stored hash still matches the content
    pub fn verify_hash(&self, marker: &ServiceMarker) -> Result<bool> {
        Ok(self.is_sealed() && self.compute_hash(marker)? == self.hash)
    }

    pub fn successes(&self) -> usize {
        self.evidence.iter().filter(|r| !r.has_error).count()
    }

    pub fn failures(&self) -> usize {
        self.evidence.len() - self.successes()
    }

    pub fn summary(&self) -> BlockSummary {
        BlockSummary {
            hash: self.hash.clone(),
            height: self.height,
            timestamp: self.timestamp,
            quote: self.payload.quote.clone(),
            price: self.payload.price,
            volume: self.payload.volume,
            sources: self.payload.sources,
            address: self.address.clone(),
        }
    }
}

/// Compact view of a sealed block for live delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSummary {
    pub hash: String,
    pub height: u64,
    pub timestamp: u64,
    pub quote: String,
    pub price: f64,
    pub volume: f64,
    pub sources: u32,
    #[serde(rename = "nodeAddress")]
    pub address: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker() -> ServiceMarker {
        ServiceMarker::new("unit-test-marker").unwrap()
    }

    fn create_test_report(source: &str, price: f64) -> SourceReport {
        let payload = PriceQuote::new(price, 2.0).to_payload().unwrap();
        let mut report = SourceReport::success(source, "USD", payload, 1_700_000_000_000);
        report.seal(&marker()).unwrap();
        report
    }

    fn create_test_block() -> Block {
        let index = PriceIndex {
            quote: "USD".to_string(),
            price: 100.5,
            volume: 4.0,
            sources: 2,
        };
        Block::candidate(
            1_700_000_007_250,
            index,
            vec![create_test_report("alpha", 100.0), create_test_report("beta", 101.0)],
        )
        .with_memo("test")
    }

    #[test]
    fn test_quote_payload() {
        let quote = PriceQuote::new(42.5, 1.25);
        let decoded = PriceQuote::from_payload(&quote.to_payload().unwrap()).unwrap();
        assert_eq!(decoded, quote);

        assert!(PriceQuote::from_payload(b"not json").is_err());
        let negative = PriceQuote::new(-1.0, 1.0).to_payload().unwrap();
        assert!(PriceQuote::from_payload(&negative).is_err());
    }

    #[test]
    fn test_report_wire_names() {
        let report = create_test_report("alpha", 10.0);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["name"], "alpha");
        assert_eq!(json["hasError"], false);
        assert_eq!(json["ticker"], "USD");
        assert!(json["data"].as_str().unwrap().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_mark_failed_rehashes() {
        let mut report = create_test_report("alpha", 10.0);
        let before = report.hash.clone();

        report.mark_failed(&marker()).unwrap();

        assert!(report.has_error);
        assert!(report.payload.is_empty());
        assert_ne!(report.hash, before);
        assert_eq!(report.hash, report.compute_hash(&marker()).unwrap());
        assert!(report.quote().is_none());
    }

    #[test]
    fn test_block_hash_is_reproducible() {
        let mut a = create_test_block();
        let mut b = create_test_block();
        a.seal(&marker()).unwrap();
        b.seal(&marker()).unwrap();

        assert_eq!(a.hash, b.hash);
        assert!(a.hash.starts_with("dd27"));
        assert_eq!(a.hash.len(), 2 + 2 + 64);
        assert!(a.verify_hash(&marker()).unwrap());
    }

    #[test]
    fn test_block_hash_covers_every_field() {
        let base = create_test_block().compute_hash(&marker()).unwrap();

        let mutations: Vec<Box<dyn Fn(&mut Block)>> = vec![
            Box::new(|b: &mut Block| b.height += 1),
            Box::new(|b: &mut Block| b.timestamp += 1),
            Box::new(|b: &mut Block| b.payload.price += 0.01),
            Box::new(|b: &mut Block| b.payload.volume += 1.0),
            Box::new(|b: &mut Block| b.payload.quote = "EUR".into()),
            Box::new(|b: &mut Block| b.previous_hash = "dd00abc".into()),
            Box::new(|b: &mut Block| b.address = "node-x".into()),
            Box::new(|b: &mut Block| b.previous_address = "node-y".into()),
            Box::new(|b: &mut Block| b.memo = "other".into()),
            Box::new(|b: &mut Block| b.evidence[0].has_error = true),
            Box::new(|b: &mut Block| {
                b.evidence.pop();
            }),
        ];

        for mutate in mutations {
            let mut block = create_test_block();
            mutate(&mut block);
            assert_ne!(block.compute_hash(&marker()).unwrap(), base);
        }
    }

    #[test]
    fn test_block_seals_once() {
        let mut block = create_test_block();
        block.seal(&marker()).unwrap();
        assert!(matches!(block.seal(&marker()), Err(Error::AlreadySealed(_))));
    }

    #[test]
    fn test_tampered_block_fails_verification() {
        let mut block = create_test_block();
        block.seal(&marker()).unwrap();
        block.payload.price = 1.0;
        assert!(!block.verify_hash(&marker()).unwrap());
    }

    #[test]
    fn test_link() {
        let mut genesis = create_test_block();
        genesis.link(None, "node-a");
        genesis.seal(&marker()).unwrap();
        assert!(genesis.is_genesis());

        let mut next = create_test_block();
        next.link(Some(&genesis), "node-b");
        assert_eq!(next.height, 1);
        assert_eq!(next.previous_hash, genesis.hash);
        assert_eq!(next.previous_address, "node-a");
        assert_eq!(next.address, "node-b");
    }

    #[test]
    fn test_block_json_round_trip() {
        let mut block = create_test_block();
        block.seal(&marker()).unwrap();

        let json = serde_json::to_string(&block).unwrap();
        assert!(json.contains("\"previousHash\""));
        assert!(json.contains("\"evidence\""));

        let decoded: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, block);
        assert!(decoded.verify_hash(&marker()).unwrap());
    }
}
