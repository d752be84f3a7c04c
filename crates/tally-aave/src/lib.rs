//! Aave v1 decoder for tally
//!
//! Recognizes `Deposit` and `RedeemUnderlying` logs of the Aave v1 lending
//! pool and turns the matching transfers into deposit/withdrawal pairs that
//! downstream accounting treats as a non-taxable swap.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tally::{AccountingContext, DecodingPipeline, InMemoryAssetResolver};
//! use tally_aave::{AaveV1Decoder, AaveV1Tokens};
//!
//! let mut resolver = InMemoryAssetResolver::new();
//! AaveV1Tokens::seed(&mut resolver);
//!
//! let decoder = Arc::new(AaveV1Decoder::new(Arc::new(resolver)));
//! let pipeline = DecodingPipeline::build(vec![decoder], &AccountingContext::default())?;
//! ```

pub mod decoder;
pub mod tokens;

use hex_literal::hex;
use primitive_types::{H160, H256};

pub use decoder::AaveV1Decoder;
pub use tokens::{AaveV1Token, AaveV1Tokens};

/// Counterparty stamped on every event this crate reclassifies.
pub const CPT_AAVE_V1: &str = "aave-v1";

/// Protocol version used for derivative (aToken) lookups.
pub const AAVE_V1_VERSION: u8 = 1;

pub const AAVE_V1_LENDING_POOL: H160 = H160(hex!("398eC7346DcD622eDc5ae82352F02bE94C62d119"));

/// `Deposit(address indexed reserve, address indexed user, uint256 amount, uint16 indexed referral, uint256 timestamp)`
pub const DEPOSIT_TOPIC: H256 = H256(hex!(
    "c12c57b1c73a2c3a2ea4613e9476abb3d8d146857aab7329e24243fb59710c82"
));

/// `RedeemUnderlying(address indexed reserve, address indexed user, uint256 amount, uint256 timestamp)`
pub const REDEEM_UNDERLYING_TOPIC: H256 = H256(hex!(
    "9c4ed599cd8555b9c1e8cd7643240d7d71eb76b792948c49fcb4d411f7b6b3c6"
));
