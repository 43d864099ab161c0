//! Ledger key layout
//!
//! | prefix | body                    | value            |
//! |--------|-------------------------|------------------|
//! | `0x01` | block hash (utf-8)      | block JSON       |
//! | `0x02` | timestamp, 8 bytes BE   | block hash       |
//! | `0x03` | height, 8 bytes BE      | block hash       |
//! | `0xFF` | arbitrary string key    | opaque bytes     |
//!
//! Numeric bodies are big-endian so byte order equals numeric order and a
//! reverse prefix scan over `0x03` walks the chain from the head down.

pub const BLOCK_PREFIX: u8 = 0x01;
pub const TIMESTAMP_PREFIX: u8 = 0x02;
pub const HEIGHT_PREFIX: u8 = 0x03;
pub const RAW_PREFIX: u8 = 0xFF;

/// Raw slot holding the outcome of the most recent round
pub const ROUND_STATUS_SLOT: &str = "round:last";
/// Raw slot holding the node's last start time, Unix milliseconds
pub const NODE_STARTED_SLOT: &str = "node:started_at";

fn prefixed(prefix: u8, body: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + body.len());
    key.push(prefix);
    key.extend_from_slice(body);
    key
}

pub fn block_key(hash: &str) -> Vec<u8> {
    prefixed(BLOCK_PREFIX, hash.as_bytes())
}

pub fn timestamp_key(timestamp: u64) -> Vec<u8> {
    prefixed(TIMESTAMP_PREFIX, &timestamp.to_be_bytes())
}

pub fn height_key(height: u64) -> Vec<u8> {
    prefixed(HEIGHT_PREFIX, &height.to_be_bytes())
}

pub fn raw_key(key: &str) -> Vec<u8> {
    prefixed(RAW_PREFIX, key.as_bytes())
}

/// Numeric body of a timestamp or height key
pub fn decode_u64(key: &[u8]) -> Option<u64> {
    let body: [u8; 8] = key.get(1..)?.try_into().ok()?;
    Some(u64::from_be_bytes(body))
}

/// Smallest key greater than every key starting with `prefix`.
///
/// `None` when the prefix is all `0xFF` bytes and no such key exists.
pub fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut bound = prefix.to_vec();
    while let Some(last) = bound.pop() {
        if last < u8::MAX {
            bound.push(last + 1);
            return Some(bound);
        }
    }
    None
}
