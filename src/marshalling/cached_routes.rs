use serde::{Deserialize, Serialize};

use crate::marshalling::cached_route::{self, MarshalledCachedRoute};
use crate::marshalling::token::{self, MarshalledToken};
use crate::marshalling::MarshalError;
use crate::models::pools::Protocol;
use crate::models::routes::CachedRoutes;
use crate::models::trade::TradeType;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarshalledCachedRoutes {
    pub routes: Vec<MarshalledCachedRoute>,
    pub token_in: MarshalledToken,
    pub token_out: MarshalledToken,
    pub protocols_covered: Vec<String>,
    pub block_number: u64,
    pub trade_type: String,
    pub original_amount: String,
    pub blocks_to_live: u64,
}

pub fn marshal(cached_routes: &CachedRoutes) -> MarshalledCachedRoutes {
    MarshalledCachedRoutes {
        routes: cached_routes.routes.iter().map(cached_route::marshal).collect(),
        token_in: token::marshal(&cached_routes.token_in),
        token_out: token::marshal(&cached_routes.token_out),
        protocols_covered: cached_routes
            .protocols_covered
            .iter()
            .map(|protocol| protocol.as_str().to_string())
            .collect(),
        block_number: cached_routes.block_number,
        trade_type: cached_routes.trade_type.as_str().to_string(),
        original_amount: cached_routes.original_amount.clone(),
        blocks_to_live: cached_routes.blocks_to_live,
    }
}

pub fn unmarshal(marshalled: MarshalledCachedRoutes) -> Result<CachedRoutes, MarshalError> {
    let routes = marshalled
        .routes
        .into_iter()
        .map(cached_route::unmarshal)
        .collect::<Result<Vec<_>, _>>()?;
    let protocols_covered = marshalled
        .protocols_covered
        .into_iter()
        .map(|tag| Protocol::from_str(&tag).ok_or(MarshalError::UnknownProtocol(tag)))
        .collect::<Result<Vec<_>, _>>()?;
    let trade_type = TradeType::from_str(&marshalled.trade_type)
        .ok_or_else(|| MarshalError::UnknownTradeType(marshalled.trade_type.clone()))?;

    Ok(CachedRoutes {
        routes,
        token_in: token::unmarshal(marshalled.token_in),
        token_out: token::unmarshal(marshalled.token_out),
        protocols_covered,
        block_number: marshalled.block_number,
        trade_type,
        original_amount: marshalled.original_amount,
        blocks_to_live: marshalled.blocks_to_live,
    })
}
