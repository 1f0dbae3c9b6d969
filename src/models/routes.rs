use std::fmt;

use crate::models::pools::{Pool, Protocol};
use crate::models::tokens::Token;
use crate::models::trade::TradeType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    EmptyPath,
    InputNotInFirstPool(String),
    OutputNotInLastPool(String),
    DisconnectedHop { position: usize },
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::EmptyPath => f.write_str("route has no pools"),
            RouteError::InputNotInFirstPool(address) => {
                write!(f, "first pool does not contain input token {}", address)
            }
            RouteError::OutputNotInLastPool(address) => {
                write!(f, "last pool does not contain output token {}", address)
            }
            RouteError::DisconnectedHop { position } => {
                write!(f, "pools {} and {} share no common token", position, position + 1)
            }
        }
    }
}

impl std::error::Error for RouteError {}

/// An ordered sequence of pools forming one path from an input token to an
/// output token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub protocol: Protocol,
    pub input: Token,
    pub output: Token,
    pub pools: Vec<Pool>,
}

impl Route {
    /// Validates the path invariant: the first pool contains the input
    /// token, the last pool contains the output token, and adjacent pools
    /// share a common token.
    pub fn new(
        protocol: Protocol,
        input: Token,
        output: Token,
        pools: Vec<Pool>,
    ) -> Result<Self, RouteError> {
        let first = pools.first().ok_or(RouteError::EmptyPath)?;
        if !first.involves(&input) {
            return Err(RouteError::InputNotInFirstPool(input.address.clone()));
        }
        let last = pools.last().ok_or(RouteError::EmptyPath)?;
        if !last.involves(&output) {
            return Err(RouteError::OutputNotInLastPool(output.address.clone()));
        }
        for (position, window) in pools.windows(2).enumerate() {
            let shared = window[0].involves(&window[1].token0) || window[0].involves(&window[1].token1);
            if !shared {
                return Err(RouteError::DisconnectedHop { position });
            }
        }
        Ok(Route {
            protocol,
            input,
            output,
            pools,
        })
    }

    /// Deterministic stringification of the path. Stored rows use this as
    /// their dedup key, so the format must stay stable across restarts.
    pub fn route_id(&self) -> String {
        let hops: Vec<String> = self.pools.iter().map(|pool| pool.to_string()).collect();
        format!("[{}]{}", self.protocol.as_str(), hops.join("->"))
    }
}

/// One route plus the share of the total traded amount it carries. Several
/// entries with distinct percents together describe a split-route trade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedRoute {
    pub route: Route,
    /// Share of the total amount, 0-100.
    pub percent: u32,
}

impl CachedRoute {
    pub fn new(route: Route, percent: u32) -> Self {
        CachedRoute { route, percent }
    }

    pub fn route_id(&self) -> String {
        self.route.route_id()
    }

    pub fn protocol(&self) -> Protocol {
        self.route.protocol
    }
}

/// The unit of cache storage and retrieval: a set of routes plus the
/// metadata needed to judge their freshness and applicability. Never
/// mutated after construction; updates are new objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedRoutes {
    pub routes: Vec<CachedRoute>,
    pub token_in: Token,
    pub token_out: Token,
    pub protocols_covered: Vec<Protocol>,
    /// Chain height at computation time.
    pub block_number: u64,
    pub trade_type: TradeType,
    /// Free-form diagnostic string; never consulted by lookups.
    pub original_amount: String,
    /// Freshness window in blocks.
    pub blocks_to_live: u64,
}

impl CachedRoutes {
    pub fn blocks_difference(&self, current_block_number: u64) -> u64 {
        current_block_number.saturating_sub(self.block_number)
    }

    pub fn not_expired(&self, current_block_number: u64) -> bool {
        self.blocks_difference(current_block_number) <= self.blocks_to_live
    }
}
