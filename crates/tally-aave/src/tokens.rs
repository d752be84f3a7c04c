//! Known Aave v1 reserves and the aTokens issued for them.

use hex_literal::hex;
use primitive_types::H160;
use tally_common::{AssetDescriptor, InMemoryAssetResolver};

use crate::AAVE_V1_VERSION;

/// One reserve and its v1 aToken. Both share the reserve's decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AaveV1Token {
    pub symbol: &'static str,
    pub reserve: H160,
    pub decimals: u8,
    pub atoken_symbol: &'static str,
    pub atoken: H160,
}

impl AaveV1Token {
    const fn new(
        symbol: &'static str,
        reserve: [u8; 20],
        decimals: u8,
        atoken_symbol: &'static str,
        atoken: [u8; 20],
    ) -> Self {
        Self {
            symbol,
            reserve: H160(reserve),
            decimals,
            atoken_symbol,
            atoken: H160(atoken),
        }
    }

    pub fn reserve_descriptor(&self) -> AssetDescriptor {
        AssetDescriptor::new(self.reserve, self.symbol, self.decimals)
    }

    pub fn atoken_descriptor(&self) -> AssetDescriptor {
        AssetDescriptor::new(self.atoken, self.atoken_symbol, self.decimals)
    }
}

const TOKENS: &[AaveV1Token] = &[
    // ETH is represented by the usual 0xeee... pseudo address
    AaveV1Token::new(
        "ETH",
        hex!("EeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE"),
        18,
        "aETH",
        hex!("3a3A65aAb0dd2A17E3F1947bA16138cd37d08c04"),
    ),
    AaveV1Token::new(
        "DAI",
        hex!("6B175474E89094C44Da98b954EedeAC495271d0F"),
        18,
        "aDAI",
        hex!("fC1E690f61EFd961294b3e1Ce3313fBD8aa4f85d"),
    ),
    AaveV1Token::new(
        "USDC",
        hex!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
        6,
        "aUSDC",
        hex!("9bA00D6856a4eDF4665BcA2C2309936572473B7E"),
    ),
    AaveV1Token::new(
        "USDT",
        hex!("dAC17F958D2ee523a2206206994597C13D831ec7"),
        6,
        "aUSDT",
        hex!("71fc860F7D3A592A4a98740e39dB31d25db65ae8"),
    ),
    AaveV1Token::new(
        "LINK",
        hex!("514910771AF9Ca656af840dff83E8264EcF986CA"),
        18,
        "aLINK",
        hex!("A64BD6C70Cb9051F6A9ba1F163Fdc07E0DfB5F84"),
    ),
    AaveV1Token::new(
        "WBTC",
        hex!("2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599"),
        8,
        "aWBTC",
        hex!("FC4B8ED459e00e5400be803A9BB3954234FD50e3"),
    ),
];

/// Static reserve → aToken table.
pub struct AaveV1Tokens;

impl AaveV1Tokens {
    pub fn all() -> &'static [AaveV1Token] {
        TOKENS
    }

    /// Register every reserve, its aToken and the derivative link.
    pub fn seed(resolver: &mut InMemoryAssetResolver) {
        for token in TOKENS {
            resolver.insert_derivative(
                token.reserve_descriptor(),
                AAVE_V1_VERSION,
                token.atoken_descriptor(),
            );
        }
        tracing::debug!(
            target: "tally_aave::tokens",
            reserves = TOKENS.len(),
            "Seeded aave-v1 tokens"
        );
    }
}
