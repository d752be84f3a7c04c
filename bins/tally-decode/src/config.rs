//! Configuration for the transaction decoder

use std::path::PathBuf;

use clap::Parser;
use tally::AccountingContext;

/// Decode EVM transactions into accounting events
///
/// Reads transaction fixtures (logs plus the generic transfer events derived
/// from them), runs the registered protocol decoders and prints the ordered,
/// annotated events as JSON.
#[derive(Parser, Debug)]
#[command(name = "tally-decode")]
#[command(about = "Decode EVM transactions into accounting events", long_about = None)]
pub struct Config {
    /// JSON file holding an array of transactions
    #[arg(long)]
    pub transactions: PathBuf,

    /// JSON file with extra assets and derivative tokens
    ///
    /// Known Aave v1 reserves and aTokens are always loaded.
    #[arg(long)]
    pub assets: Option<PathBuf>,

    /// Whether crypto to crypto trades are accounted
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub include_crypto2crypto: bool,

    /// Whether gas costs are accounted
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub include_gas_costs: bool,

    /// Number of transactions decoded concurrently
    #[arg(long, default_value = "4")]
    pub workers: usize,

    /// Write the result here instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pub pretty: bool,
}

impl Config {
    pub fn accounting_context(&self) -> AccountingContext {
        AccountingContext {
            include_crypto2crypto: self.include_crypto2crypto,
            include_gas_costs: self.include_gas_costs,
        }
    }
}
