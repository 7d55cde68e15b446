//! Minimum-width big-endian sequence keys.
//!
//! The vault log and the contact history are append-only `seq -> value`
//! namespaces. A sequence number is stored as its big-endian bytes with
//! leading zeros stripped, so numeric order is `(length, lexicographic)`
//! order rather than plain lexicographic order. The vault additionally
//! reuses a sequence as an SK-box nonce by zero-extending it to 24 bytes.

use std::cmp::Ordering;

use shadowfax_crypto::{Nonce, NONCE_SIZE};

use crate::{Result, StoreError};

/// Encode a sequence number as minimum-width big-endian bytes.
///
/// `0` encodes to an empty slice; stored sequences start at 1.
pub fn encode(seq: u64) -> Vec<u8> {
    let bytes = seq.to_be_bytes();
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}

/// Decode a minimum-width big-endian sequence key.
///
/// # Errors
///
/// Returns `StoreError::InvalidSequence` if the key is wider than 8 bytes
/// or carries a leading zero.
pub fn decode(bytes: &[u8]) -> Result<u64> {
    if bytes.len() > 8 || bytes.first() == Some(&0) {
        return Err(StoreError::InvalidSequence);
    }
    let mut out = 0u64;
    for &b in bytes {
        out = out << 8 | u64::from(b);
    }
    Ok(out)
}

/// Compare two minimum-width sequence keys numerically.
///
/// Shorter keys are smaller; equal-length keys compare lexicographically.
pub fn cmp(a: &[u8], b: &[u8]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Zero-extend a sequence key to a 24-byte nonce (big-endian padding).
///
/// Safe as a nonce only because each vault has a distinct symmetric key and
/// sequences never repeat under single-writer discipline.
///
/// # Errors
///
/// Returns `StoreError::InvalidSequence` if the key is wider than 24 bytes.
pub fn nonce(seq_bytes: &[u8]) -> Result<Nonce> {
    if seq_bytes.len() > NONCE_SIZE {
        return Err(StoreError::InvalidSequence);
    }
    let mut padded = [0u8; NONCE_SIZE];
    padded[NONCE_SIZE - seq_bytes.len()..].copy_from_slice(seq_bytes);
    Ok(Nonce::from_bytes(&padded)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_minimum_width() {
        assert_eq!(encode(0), Vec::<u8>::new());
        assert_eq!(encode(1), vec![1]);
        assert_eq!(encode(255), vec![255]);
        assert_eq!(encode(256), vec![1, 0]);
        assert_eq!(encode(0x0102_0304), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_decode_roundtrip() {
        for seq in [1u64, 2, 255, 256, 65535, 65536, u64::MAX] {
            assert_eq!(decode(&encode(seq)).unwrap(), seq);
        }
    }

    #[test]
    fn test_decode_rejects_leading_zero() {
        assert!(decode(&[0, 1]).is_err());
    }

    #[test]
    fn test_decode_rejects_overwide() {
        assert!(decode(&[1u8; 9]).is_err());
    }

    #[test]
    fn test_numeric_order() {
        // 256 encodes longer than 2, so plain lexicographic order would
        // put it first; numeric comparison must not.
        assert_eq!(cmp(&encode(2), &encode(256)), std::cmp::Ordering::Less);
        assert_eq!(cmp(&encode(256), &encode(257)), std::cmp::Ordering::Less);
        assert_eq!(cmp(&encode(5), &encode(5)), std::cmp::Ordering::Equal);
    }

    #[test]
    fn test_nonce_padding() {
        let n = nonce(&encode(1)).unwrap();
        let mut expected = [0u8; NONCE_SIZE];
        expected[NONCE_SIZE - 1] = 1;
        assert_eq!(n.as_bytes(), &expected);

        // Sequences 1 and 256 must map to distinct nonces
        assert_ne!(nonce(&encode(1)).unwrap(), nonce(&encode(256)).unwrap());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn roundtrip(seq in 1u64..) {
            prop_assert_eq!(decode(&encode(seq)).unwrap(), seq);
        }

        #[test]
        fn order_matches_numeric(a in 1u64.., b in 1u64..) {
            prop_assert_eq!(cmp(&encode(a), &encode(b)), a.cmp(&b));
        }

        #[test]
        fn distinct_nonces(a in 1u64.., b in 1u64..) {
            prop_assume!(a != b);
            prop_assert_ne!(
                nonce(&encode(a)).unwrap(),
                nonce(&encode(b)).unwrap()
            );
        }
    }
}
