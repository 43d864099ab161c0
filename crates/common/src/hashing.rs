//! Double-hash protocol
//!
//! Every hashed object is serialized to JSON with its hash field empty,
//! prefixed with the service marker and a colon, then hashed twice with
//! SHA-256. The second round hashes the lowercase hex string of the first.
//! Blocks additionally carry a `dd<ss>` prefix where `ss` is the
//! zero-padded seconds-of-minute of the round timestamp.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Protocol marker prepended to every block hash.
pub const BLOCK_HASH_MARKER: &str = "dd";

/// Process-wide secret mixed into every content hash.
///
/// Two nodes only produce identical hashes for identical content when they
/// share the same marker. The value is redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceMarker(String);

impl ServiceMarker {
    /// Create a marker, rejecting empty values
    pub fn new(marker: impl Into<String>) -> Result<Self> {
        let marker = marker.into();
        if marker.trim().is_empty() {
            return Err(Error::invalid_input("service marker must not be empty"));
        }
        Ok(Self(marker))
    }

    /// Raw marker string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ServiceMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ServiceMarker(..)")
    }
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Double hash of an already-serialized body.
pub fn double_hash_bytes(marker: &ServiceMarker, body: &[u8]) -> String {
    let mut raw = Vec::with_capacity(marker.as_str().len() + 1 + body.len());
    raw.extend_from_slice(marker.as_str().as_bytes());
    raw.push(b':');
    raw.extend_from_slice(body);

    let first = sha256_hex(&raw);
    sha256_hex(first.as_bytes())
}

/// Serialize `value` as JSON and double-hash it.
///
/// Callers are responsible for clearing the value's own hash field first.
pub fn double_hash<T: Serialize>(marker: &ServiceMarker, value: &T) -> Result<String> {
    let body = serde_json::to_vec(value)?;
    Ok(double_hash_bytes(marker, &body))
}

/// Seconds-of-minute (0..=59) of a millisecond Unix timestamp.
pub fn seconds_of_minute(timestamp_ms: u64) -> u64 {
    (timestamp_ms / 1000) % 60
}

/// Apply the block prefix to a base hash.
pub fn prefix_block_hash(timestamp_ms: u64, base: &str) -> String {
    format!(
        "{}{:02}{}",
        BLOCK_HASH_MARKER,
        seconds_of_minute(timestamp_ms),
        base
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Sample {
        name: &'static str,
        value: u32,
    }

    fn marker() -> ServiceMarker {
        ServiceMarker::new("test-marker").unwrap()
    }

    #[test]
    fn test_empty_marker_rejected() {
        assert!(ServiceMarker::new("").is_err());
        assert!(ServiceMarker::new("   ").is_err());
    }

    #[test]
    fn test_marker_debug_is_redacted() {
        let rendered = format!("{:?}", marker());
        assert!(!rendered.contains("test-marker"));
    }

    #[test]
    fn test_double_hash_matches_manual_computation() {
        let sample = Sample { name: "a", value: 1 };
        let body = serde_json::to_string(&sample).unwrap();
        let first = sha256_hex(format!("test-marker:{}", body).as_bytes());
        let expected = sha256_hex(first.as_bytes());

        assert_eq!(double_hash(&marker(), &sample).unwrap(), expected);
        assert_eq!(expected.len(), 64);
    }

    #[test]
    fn test_marker_changes_hash() {
        let sample = Sample { name: "a", value: 1 };
        let other = ServiceMarker::new("other-marker").unwrap();
        assert_ne!(
            double_hash(&marker(), &sample).unwrap(),
            double_hash(&other, &sample).unwrap()
        );
    }

    #[test]
    fn test_block_prefix_zero_pads_seconds() {
        assert_eq!(prefix_block_hash(5_000, "abc"), "dd05abc");
        assert_eq!(prefix_block_hash(59_999, "abc"), "dd59abc");
        assert_eq!(prefix_block_hash(60_000, "abc"), "dd00abc");
    }
}
