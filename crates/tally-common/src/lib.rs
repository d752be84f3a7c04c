//! Common utilities for tally decoders
//!
//! Provides the conversions between raw log words (topics and data) and typed
//! values, plus the asset descriptors and resolver used to normalize amounts.

pub mod asset;
pub mod serde_hex;

use std::str::FromStr;

use bigdecimal::num_bigint::{BigInt, Sign};
use bigdecimal::BigDecimal;
use primitive_types::{H160, U256};
use tiny_keccak::{Hasher, Keccak};

pub use asset::{AssetDescriptor, AssetResolver, InMemoryAssetResolver};

/// Size of a single ABI word (topic or data slot).
pub const WORD_SIZE: usize = 32;

/// Size of an address once extracted from its word.
pub const ADDRESS_SIZE: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("malformed log data: {field} expected {expected} bytes, got {actual}")]
    MalformedLogData {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

// ===== Word conversions =====

/// Extract an address from a 32-byte word (low 20 bytes, big-endian)
///
/// This is how indexed address parameters are laid out in log topics.
pub fn address_from_word(word: &[u8]) -> Result<H160, CodecError> {
    if word.len() != WORD_SIZE {
        return Err(CodecError::MalformedLogData {
            field: "address word",
            expected: WORD_SIZE,
            actual: word.len(),
        });
    }
    Ok(H160::from_slice(&word[WORD_SIZE - ADDRESS_SIZE..]))
}

/// Parse a big-endian unsigned integer of at most 32 bytes
pub fn integer_from_bytes(bytes: &[u8]) -> Result<U256, CodecError> {
    if bytes.is_empty() || bytes.len() > WORD_SIZE {
        return Err(CodecError::MalformedLogData {
            field: "integer",
            expected: WORD_SIZE,
            actual: bytes.len(),
        });
    }
    Ok(U256::from_big_endian(bytes))
}

/// Encode an integer as a 32-byte big-endian word (inverse of [`integer_from_bytes`])
pub fn word_from_integer(value: U256) -> [u8; WORD_SIZE] {
    value.to_big_endian()
}

/// Borrow the `index`-th 32-byte word of a log's data section
pub fn data_word(data: &[u8], index: usize) -> Result<&[u8], CodecError> {
    let start = index * WORD_SIZE;
    let end = start + WORD_SIZE;
    data.get(start..end).ok_or(CodecError::MalformedLogData {
        field: "data",
        expected: end,
        actual: data.len(),
    })
}

/// Render an address in its EIP-55 mixed-case checksum form.
///
/// A hex letter is upper-cased when the matching nibble of the keccak-256
/// hash of the lower-case address is 8 or more.
pub fn checksum_address(address: &H160) -> String {
    let lower = hex::encode(address.as_bytes());

    let mut hash = [0u8; 32];
    let mut keccak = Keccak::v256();
    keccak.update(lower.as_bytes());
    keccak.finalize(&mut hash);

    let mut out = String::with_capacity(2 + lower.len());
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = if i % 2 == 0 {
            hash[i / 2] >> 4
        } else {
            hash[i / 2] & 0x0f
        };
        if nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

// ===== Amount normalization =====

/// Divide a raw token integer by `10^decimals`, exactly.
pub fn normalized_amount(raw: U256, decimals: u8) -> BigDecimal {
    let unscaled = BigInt::from_bytes_be(Sign::Plus, &raw.to_big_endian());
    BigDecimal::new(unscaled, i64::from(decimals))
}

/// Render an amount without trailing zeros, always keeping one fractional digit.
///
/// `1000` becomes `"1000.0"`, `0.50` becomes `"0.5"`.
pub fn format_amount(amount: &BigDecimal) -> String {
    let plain = amount.normalized().to_plain_string();
    if plain.contains('.') {
        plain
    } else {
        format!("{plain}.0")
    }
}

/// Parse a decimal string into an amount, used by fixtures and tests.
pub fn parse_amount(value: &str) -> Option<BigDecimal> {
    BigDecimal::from_str(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word_with_tail(tail: &[u8]) -> [u8; WORD_SIZE] {
        let mut word = [0u8; WORD_SIZE];
        word[WORD_SIZE - tail.len()..].copy_from_slice(tail);
        word
    }

    #[test]
    fn test_address_from_word_takes_low_bytes() {
        let addr = [0x11u8; ADDRESS_SIZE];
        let mut word = word_with_tail(&addr);
        // Garbage in the high bytes is ignored
        word[0] = 0xff;

        assert_eq!(address_from_word(&word).unwrap(), H160::from(addr));
    }

    #[test]
    fn test_address_from_word_rejects_short_input() {
        let err = address_from_word(&[0u8; 20]).unwrap_err();
        assert_eq!(
            err,
            CodecError::MalformedLogData {
                field: "address word",
                expected: 32,
                actual: 20
            }
        );
    }

    #[test]
    fn test_integer_from_bytes() {
        let word = word_with_tail(&[0x01, 0x00]);
        assert_eq!(integer_from_bytes(&word).unwrap(), U256::from(256u64));
        assert_eq!(integer_from_bytes(&[0x2a]).unwrap(), U256::from(42u64));
        assert!(integer_from_bytes(&[]).is_err());
        assert!(integer_from_bytes(&[0u8; 33]).is_err());
    }

    #[test]
    fn test_word_from_integer_is_big_endian() {
        let value = U256::from_dec_str("1000000000000000000000").unwrap();
        let word = word_from_integer(value);
        assert_eq!(&word[..22], &[0u8; 22][..]);
        assert_eq!(integer_from_bytes(&word).unwrap(), value);
        assert_eq!(word_from_integer(U256::from(1u64))[31], 1);
    }

    #[test]
    fn test_data_word_bounds() {
        let data = [7u8; 64];
        assert_eq!(data_word(&data, 1).unwrap(), &[7u8; 32][..]);
        assert!(data_word(&data, 2).is_err());
        assert!(data_word(&[0u8; 31], 0).is_err());
    }

    #[test]
    fn test_checksum_address_eip55_vectors() {
        for expected in [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0x6B175474E89094C44Da98b954EedeAC495271d0F",
            "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
        ] {
            let address = H160::from_slice(&hex::decode(&expected[2..]).unwrap());
            assert_eq!(checksum_address(&address), expected);
        }
    }

    #[test]
    fn test_checksum_address_digits_only_upper_cases_letters() {
        let address = H160::repeat_byte(0x0a);
        assert_eq!(
            checksum_address(&address),
            "0x0A0A0a0a0a0a0a0A0a0a0A0a0A0A0A0a0a0a0a0a"
        );
        assert_eq!(
            checksum_address(&H160::zero()),
            "0x0000000000000000000000000000000000000000"
        );
    }

    #[test]
    fn test_normalized_amount_eighteen_decimals() {
        let raw = U256::from_dec_str("1000000000000000000000").unwrap();
        let amount = normalized_amount(raw, 18);

        assert_eq!(amount, parse_amount("1000").unwrap());
        assert_eq!(format_amount(&amount), "1000.0");
    }

    #[test]
    fn test_normalized_amount_fractional() {
        let amount = normalized_amount(U256::from(1_500_000u64), 6);
        assert_eq!(amount, parse_amount("1.5").unwrap());
        assert_eq!(format_amount(&amount), "1.5");

        let zero = normalized_amount(U256::zero(), 18);
        assert_eq!(format_amount(&zero), "0.0");
    }

    #[test]
    fn test_normalized_amount_full_width_word() {
        let amount = normalized_amount(U256::MAX, 0);
        assert_eq!(
            amount.to_plain_string(),
            "115792089237316195423570985008687907853269984665640564039457584007913129639935"
        );
        assert_eq!(
            normalized_amount(
                U256::from_dec_str("340282366920938463463374607431768211456").unwrap(),
                2
            ),
            parse_amount("3402823669209384634633746074317682114.56").unwrap()
        );
    }
}
