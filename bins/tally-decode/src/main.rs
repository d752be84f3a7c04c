//! Tally decode - EVM transaction decoder
//!
//! Runs the protocol decoders over transaction fixtures and prints the
//! ordered, annotated accounting events.
//!
//! # Usage
//!
//! ```bash
//! # Decode with the built-in Aave v1 tokens
//! tally-decode --transactions txs.json --pretty
//!
//! # Extra assets, no gas accounting, single worker
//! tally-decode --transactions txs.json --assets assets.json \
//!     --include-gas-costs false --workers 1
//! ```

mod config;
mod fixture;

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use config::Config;
use fixture::{load_transactions, AssetFile};
use tally::{Decoder, DecodingDiagnostics, DecodingPipeline, InMemoryAssetResolver};
use tally_aave::{AaveV1Decoder, AaveV1Tokens};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let config = Config::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting tally decoder");
    tracing::info!("Transactions: {}", config.transactions.display());
    tracing::info!("Workers: {}", config.workers);

    // Assets are resolved before any decoding starts
    let mut resolver = InMemoryAssetResolver::new();
    AaveV1Tokens::seed(&mut resolver);
    if let Some(path) = &config.assets {
        AssetFile::load(path)?.apply(&mut resolver)?;
    }
    let resolver = Arc::new(resolver);

    let decoders: Vec<Arc<dyn Decoder>> = vec![Arc::new(AaveV1Decoder::new(resolver))];
    let pipeline = Arc::new(
        DecodingPipeline::build(decoders, &config.accounting_context())
            .context("Failed to build decoding pipeline")?,
    );
    tracing::info!(
        "Pipeline ready: {} decoders, {} settings",
        pipeline.registry().len(),
        pipeline.settings().len()
    );

    let transactions = load_transactions(&config.transactions)?;
    let decoded = pipeline
        .decode_batch(transactions, config.workers)
        .await?;

    let mut totals = DecodingDiagnostics::default();
    for tx in &decoded {
        totals.merge(&tx.diagnostics);
    }
    tracing::info!(
        transactions = decoded.len(),
        logs = totals.logs_processed,
        malformed_logs = totals.malformed_logs,
        dropped_action_items = totals.dropped_action_items,
        unresolved_settings = totals.unresolved_settings_keys.len(),
        take_mismatches = totals.take_mismatches.len(),
        "Decoding complete"
    );

    let json = if config.pretty {
        serde_json::to_string_pretty(&decoded)?
    } else {
        serde_json::to_string(&decoded)?
    };

    match &config.output {
        Some(path) => fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{json}"),
    }

    Ok(())
}
