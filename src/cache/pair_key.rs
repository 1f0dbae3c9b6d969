use std::fmt;

use crate::cache::RouteCacheRequest;
use crate::models::routes::CachedRoutes;
use crate::models::trade::TradeType;

/// Partition key shared by the route table and the fill-flag table. The
/// rendered form is a literal storage key, so it must be stable across
/// process restarts and collision-free for distinct
/// (tokenIn, tokenOut, tradeType) triples.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairTradeTypeChainId {
    pub token_in: String,
    pub token_out: String,
    pub trade_type: TradeType,
    pub chain_id: u64,
}

impl PairTradeTypeChainId {
    pub fn new(token_in: &str, token_out: &str, trade_type: TradeType, chain_id: u64) -> Self {
        PairTradeTypeChainId {
            token_in: token_in.to_ascii_uppercase(),
            token_out: token_out.to_ascii_uppercase(),
            trade_type,
            chain_id,
        }
    }

    /// Key for a lookup, after trade-type orientation.
    pub fn from_request(request: &RouteCacheRequest) -> Self {
        let (token_in, token_out) = request.token_pair();
        Self::new(
            &token_in.address,
            &token_out.address,
            request.trade_type,
            token_in.chain_id,
        )
    }

    /// Key for a write. The stored object already carries its own
    /// orientation, so no re-orientation happens here.
    pub fn from_cached_routes(cached_routes: &CachedRoutes) -> Self {
        Self::new(
            &cached_routes.token_in.address,
            &cached_routes.token_out.address,
            cached_routes.trade_type,
            cached_routes.token_in.chain_id,
        )
    }
}

impl fmt::Display for PairTradeTypeChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // "/" never appears in hex addresses, so the parts cannot bleed
        // into each other; the trade type is rendered as its index, not a
        // free-form string.
        write!(
            f,
            "{}/{}/{}/{}",
            self.token_in,
            self.token_out,
            self.chain_id,
            self.trade_type.index()
        )
    }
}
