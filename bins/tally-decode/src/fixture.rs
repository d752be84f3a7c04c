//! JSON inputs of the decoder: transactions and asset tables.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use primitive_types::H160;
use serde::{Deserialize, Serialize};
use tally::{AssetDescriptor, InMemoryAssetResolver, TransactionInput};

/// Derivative token issued by a protocol for a reserve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivativeEntry {
    pub reserve: H160,
    pub protocol_version: u8,
    pub derivative: H160,
}

/// Asset table loaded on top of the built-in tokens.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetFile {
    #[serde(default)]
    pub assets: Vec<AssetDescriptor>,
    #[serde(default)]
    pub derivatives: Vec<DerivativeEntry>,
}

impl AssetFile {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read asset file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid asset file {}", path.display()))
    }

    /// Add the assets and derivative links to `resolver`.
    ///
    /// Both sides of a derivative link must be listed in `assets` or already
    /// known to the resolver.
    pub fn apply(&self, resolver: &mut InMemoryAssetResolver) -> Result<()> {
        for asset in &self.assets {
            resolver.insert_asset(asset.clone());
        }

        for entry in &self.derivatives {
            let reserve = self
                .find(&entry.reserve, resolver)
                .with_context(|| format!("Unknown reserve {:#x}", entry.reserve))?;
            let derivative = self
                .find(&entry.derivative, resolver)
                .with_context(|| format!("Unknown derivative {:#x}", entry.derivative))?;
            resolver.insert_derivative(reserve, entry.protocol_version, derivative);
        }

        tracing::info!(
            target: "tally_decode::fixture",
            assets = self.assets.len(),
            derivatives = self.derivatives.len(),
            "Loaded asset file"
        );
        Ok(())
    }

    fn find(&self, address: &H160, resolver: &InMemoryAssetResolver) -> Option<AssetDescriptor> {
        use tally::AssetResolver;

        self.assets
            .iter()
            .find(|asset| &asset.address == address)
            .cloned()
            .or_else(|| resolver.resolve_asset(address).map(|asset| (*asset).clone()))
    }
}

pub fn load_transactions(path: &Path) -> Result<Vec<TransactionInput>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read transactions {}", path.display()))?;
    let transactions: Vec<TransactionInput> = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid transactions file {}", path.display()))?;

    tracing::info!(
        target: "tally_decode::fixture",
        transactions = transactions.len(),
        "Loaded transactions"
    );
    Ok(transactions)
}
