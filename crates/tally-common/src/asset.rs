//! Fungible asset descriptors and the resolver used to look them up.
//!
//! Resolution is a cheap, local lookup: everything a decoder needs must be
//! loaded before decoding starts, so resolvers never perform I/O.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use primitive_types::{H160, U256};
use serde::{Deserialize, Serialize};

use crate::normalized_amount;

/// Known fungible asset (symbol, decimals) identified by its contract address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetDescriptor {
    pub address: H160,
    pub symbol: String,
    pub decimals: u8,
}

impl AssetDescriptor {
    pub fn new(address: H160, symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            address,
            symbol: symbol.into(),
            decimals,
        }
    }

    /// Normalize a raw on-chain integer by this asset's decimals.
    pub fn normalize(&self, raw: U256) -> BigDecimal {
        normalized_amount(raw, self.decimals)
    }
}

impl fmt::Display for AssetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#x})", self.symbol, self.address)
    }
}

/// Maps contract addresses to asset descriptors, and reserves to their
/// protocol-specific derivative token.
///
/// Implementations are shared read-only across concurrent decodings.
pub trait AssetResolver: Send + Sync {
    /// Resolve an asset by contract address.
    fn resolve_asset(&self, address: &H160) -> Option<Arc<AssetDescriptor>>;

    /// Resolve the derivative (wrapped, interest bearing) token a protocol
    /// issues for `asset` at the given protocol version.
    fn derivative_token_for(
        &self,
        asset: &AssetDescriptor,
        protocol_version: u8,
    ) -> Option<Arc<AssetDescriptor>>;
}

/// HashMap-backed resolver, filled once at session start.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAssetResolver {
    assets: HashMap<H160, Arc<AssetDescriptor>>,
    derivatives: HashMap<(H160, u8), Arc<AssetDescriptor>>,
}

impl InMemoryAssetResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) an asset, returning the shared descriptor.
    pub fn insert_asset(&mut self, asset: AssetDescriptor) -> Arc<AssetDescriptor> {
        let asset = Arc::new(asset);
        self.assets.insert(asset.address, asset.clone());
        asset
    }

    /// Record `derivative` as the token issued for `reserve` at `protocol_version`.
    ///
    /// Both assets become resolvable by address.
    pub fn insert_derivative(
        &mut self,
        reserve: AssetDescriptor,
        protocol_version: u8,
        derivative: AssetDescriptor,
    ) {
        let reserve = self.insert_asset(reserve);
        let derivative = self.insert_asset(derivative);
        tracing::trace!(
            target: "tally_common::asset",
            reserve = %reserve,
            derivative = %derivative,
            protocol_version,
            "registered derivative token"
        );
        self.derivatives
            .insert((reserve.address, protocol_version), derivative);
    }

    pub fn with_asset(mut self, asset: AssetDescriptor) -> Self {
        self.insert_asset(asset);
        self
    }

    pub fn with_derivative(
        mut self,
        reserve: AssetDescriptor,
        protocol_version: u8,
        derivative: AssetDescriptor,
    ) -> Self {
        self.insert_derivative(reserve, protocol_version, derivative);
        self
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl AssetResolver for InMemoryAssetResolver {
    fn resolve_asset(&self, address: &H160) -> Option<Arc<AssetDescriptor>> {
        self.assets.get(address).cloned()
    }

    fn derivative_token_for(
        &self,
        asset: &AssetDescriptor,
        protocol_version: u8,
    ) -> Option<Arc<AssetDescriptor>> {
        self.derivatives
            .get(&(asset.address, protocol_version))
            .cloned()
    }
}
