//! Shamir secret sharing for PriceChain key custody
//!
//! A secret of `n` bytes is split into shares of `n + 1` bytes: one
//! polynomial evaluation per secret byte, followed by the share's x
//! coordinate. Any `threshold` shares rebuild the secret; fewer reveal
//! nothing about it.
//!
//! ```
//! let shares = shamir::split(b"node signing key", 5, 3).unwrap();
//! let secret = shamir::combine(&shares[1..4]).unwrap();
//! assert_eq!(secret, b"node signing key");
//! ```

mod gf256;

use rand::seq::SliceRandom;
use rand::{thread_rng, RngCore};
use std::collections::HashSet;
use thiserror::Error;

/// Bytes a share adds on top of the secret
pub const SHARE_OVERHEAD: usize = 1;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ShamirError {
    #[error("parts ({parts}) cannot be less than threshold ({threshold})")]
    PartsBelowThreshold { parts: usize, threshold: usize },

    #[error("parts cannot exceed 255")]
    TooManyParts,

    #[error("threshold must be at least 2")]
    ThresholdTooSmall,

    #[error("cannot split an empty secret")]
    EmptySecret,

    #[error("at least two shares are required")]
    NotEnoughShares,

    #[error("shares must be at least two bytes")]
    ShareTooShort,

    #[error("all shares must be the same length")]
    LengthMismatch,

    #[error("duplicate share for x = {0}")]
    DuplicateShare(u8),
}

pub type Result<T> = std::result::Result<T, ShamirError>;

/// Split `secret` into `parts` shares, any `threshold` of which recover it
pub fn split(secret: &[u8], parts: usize, threshold: usize) -> Result<Vec<Vec<u8>>> {
    if parts < threshold {
        return Err(ShamirError::PartsBelowThreshold { parts, threshold });
    }
    if parts > 255 {
        return Err(ShamirError::TooManyParts);
    }
    if threshold < 2 {
        return Err(ShamirError::ThresholdTooSmall);
    }
    if secret.is_empty() {
        return Err(ShamirError::EmptySecret);
    }

    let mut rng = thread_rng();

    // x = 0 would hand out the secret itself
    let mut xs: Vec<u8> = (1..=255).collect();
    xs.shuffle(&mut rng);
    xs.truncate(parts);

    let mut shares: Vec<Vec<u8>> = xs
        .iter()
        .map(|&x| {
            let mut share = vec![0u8; secret.len() + SHARE_OVERHEAD];
            share[secret.len()] = x;
            share
        })
        .collect();

    let mut coefficients = vec![0u8; threshold];
    for (idx, &byte) in secret.iter().enumerate() {
        coefficients[0] = byte;
        rng.fill_bytes(&mut coefficients[1..]);
        for (share, &x) in shares.iter_mut().zip(&xs) {
            share[idx] = gf256::evaluate(&coefficients, x);
        }
    }
    coefficients.fill(0);

    Ok(shares)
}

/// Rebuild a secret from shares produced by [`split`]
///
/// Passing fewer shares than the split threshold yields a wrong secret
/// rather than an error; the shares carry no threshold.
pub fn combine<S: AsRef<[u8]>>(shares: &[S]) -> Result<Vec<u8>> {
    if shares.len() < 2 {
        return Err(ShamirError::NotEnoughShares);
    }

    let share_len = shares[0].as_ref().len();
    if share_len < 2 {
        return Err(ShamirError::ShareTooShort);
    }
    if shares.iter().any(|s| s.as_ref().len() != share_len) {
        return Err(ShamirError::LengthMismatch);
    }

    let secret_len = share_len - SHARE_OVERHEAD;
    let mut seen = HashSet::with_capacity(shares.len());
    let mut xs = Vec::with_capacity(shares.len());
    for share in shares {
        let x = share.as_ref()[secret_len];
        if !seen.insert(x) {
            return Err(ShamirError::DuplicateShare(x));
        }
        xs.push(x);
    }

    let mut ys = vec![0u8; shares.len()];
    let secret = (0..secret_len)
        .map(|idx| {
            for (y, share) in ys.iter_mut().zip(shares) {
                *y = share.as_ref()[idx];
            }
            gf256::interpolate_at_zero(&xs, &ys)
        })
        .collect();

    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_any_threshold_subset_recovers() {
        let secret = b"0123456789abcdef-service-marker";
        let shares = split(secret, 5, 3).unwrap();

        assert_eq!(shares.len(), 5);
        assert!(shares.iter().all(|s| s.len() == secret.len() + SHARE_OVERHEAD));

        for a in 0..5 {
            for b in (a + 1)..5 {
                for c in (b + 1)..5 {
                    let subset = [&shares[a], &shares[b], &shares[c]];
                    assert_eq!(combine(&subset).unwrap(), secret);
                }
            }
        }
        assert_eq!(combine(&shares).unwrap(), secret);
    }

    #[test]
    fn test_x_coordinates_are_distinct_and_nonzero() {
        let shares = split(b"k", 255, 2).unwrap();
        let xs: HashSet<u8> = shares.iter().map(|s| s[1]).collect();
        assert_eq!(xs.len(), 255);
        assert!(!xs.contains(&0));
    }

    #[test]
    fn test_below_threshold_does_not_recover() {
        // with 16 bytes a chance match is 2^-128
        let secret = [0x5au8; 16];
        let shares = split(&secret, 4, 3).unwrap();
        assert_ne!(combine(&shares[..2]).unwrap(), secret);
    }

    #[test]
    fn test_split_rejects_bad_parameters() {
        assert_matches!(
            split(b"s", 2, 3),
            Err(ShamirError::PartsBelowThreshold { parts: 2, threshold: 3 })
        );
        assert_matches!(split(b"s", 256, 3), Err(ShamirError::TooManyParts));
        assert_matches!(split(b"s", 3, 1), Err(ShamirError::ThresholdTooSmall));
        assert_matches!(split(b"", 3, 2), Err(ShamirError::EmptySecret));
    }

    #[test]
    fn test_combine_rejects_bad_shares() {
        let shares = split(b"secret", 3, 2).unwrap();

        assert_matches!(combine(&shares[..1]), Err(ShamirError::NotEnoughShares));
        assert_matches!(combine(&[vec![1u8], vec![2u8]]), Err(ShamirError::ShareTooShort));
        assert_matches!(
            combine(&[shares[0].clone(), shares[1][..3].to_vec()]),
            Err(ShamirError::LengthMismatch)
        );
        assert_matches!(
            combine(&[shares[0].clone(), shares[0].clone()]),
            Err(ShamirError::DuplicateShare(_))
        );
    }
}
