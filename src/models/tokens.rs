use std::fmt;

use num_bigint::BigUint;
use num_traits::ToPrimitive;

/// Immutable token metadata as supplied by external token providers. The
/// cache only reads it; equality is by value with the address normalized to
/// lowercase at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub chain_id: u64,
    pub address: String,
    pub decimals: u8,
    pub symbol: Option<String>,
    pub name: Option<String>,
    /// Fee-on-transfer basis points, present only for taxed tokens.
    pub buy_fee_bps: Option<u64>,
    pub sell_fee_bps: Option<u64>,
}

impl Token {
    pub fn new(chain_id: u64, address: &str, decimals: u8) -> Self {
        Token {
            chain_id,
            address: address.to_ascii_lowercase(),
            decimals,
            symbol: None,
            name: None,
            buy_fee_bps: None,
            sell_fee_bps: None,
        }
    }

    pub fn with_symbol(mut self, symbol: &str) -> Self {
        self.symbol = Some(symbol.to_string());
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_transfer_fees(mut self, buy_fee_bps: u64, sell_fee_bps: u64) -> Self {
        self.buy_fee_bps = Some(buy_fee_bps);
        self.sell_fee_bps = Some(sell_fee_bps);
        self
    }

    /// Identity comparison. Metadata such as symbol or name never affects
    /// whether two tokens are the same asset.
    pub fn equals(&self, other: &Token) -> bool {
        self.chain_id == other.chain_id && self.address == other.address
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.symbol {
            Some(symbol) => write!(f, "{} ({})", symbol, self.address),
            None => f.write_str(&self.address),
        }
    }
}

/// A raw on-chain amount of a specific token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyAmount {
    pub currency: Token,
    pub raw: BigUint,
}

impl CurrencyAmount {
    pub fn new(currency: Token, raw: BigUint) -> Self {
        CurrencyAmount { currency, raw }
    }

    /// Human-unit view of the raw amount. Loses precision for very large
    /// amounts, which is acceptable for bucket classification and the
    /// fill-flag rows where this is used.
    pub fn decimal(&self) -> f64 {
        let raw = self.raw.to_f64().unwrap_or(f64::MAX);
        raw / 10f64.powi(self.currency.decimals as i32)
    }
}

impl fmt::Display for CurrencyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.raw, self.currency)
    }
}
