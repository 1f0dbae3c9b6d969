use serde::{Deserialize, Serialize};

use crate::models::tokens::Token;

/// Symbol/name stand-in for tokens stored before metadata was known.
/// Consumers must never see a missing label null-propagate.
const UNKNOWN_LABEL: &str = "Unknown";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarshalledToken {
    pub chain_id: u64,
    pub address: String,
    pub decimals: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buy_fee_bps: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sell_fee_bps: Option<u64>,
}

pub fn marshal(token: &Token) -> MarshalledToken {
    MarshalledToken {
        chain_id: token.chain_id,
        address: token.address.clone(),
        decimals: token.decimals,
        symbol: token.symbol.clone(),
        name: token.name.clone(),
        buy_fee_bps: token.buy_fee_bps,
        sell_fee_bps: token.sell_fee_bps,
    }
}

pub fn unmarshal(marshalled: MarshalledToken) -> Token {
    Token {
        chain_id: marshalled.chain_id,
        address: marshalled.address.to_ascii_lowercase(),
        decimals: marshalled.decimals,
        symbol: Some(
            marshalled
                .symbol
                .unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
        ),
        name: Some(marshalled.name.unwrap_or_else(|| UNKNOWN_LABEL.to_string())),
        buy_fee_bps: marshalled.buy_fee_bps,
        sell_fee_bps: marshalled.sell_fee_bps,
    }
}
