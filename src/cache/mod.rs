//! The route cache proper: partition keys, bucketing strategy, the provider
//! contract, and the table-backed provider implementation.

pub mod pair_key;
pub mod provider;
pub mod strategy;

use std::fmt;

use async_trait::async_trait;

use crate::models::pools::Protocol;
use crate::models::routes::CachedRoutes;
use crate::models::tokens::{CurrencyAmount, Token};
use crate::models::trade::TradeType;

/// How a cached answer may be used for a given pair and trade size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Populate the cache but never serve from it.
    Darkmode,
    /// Serve cached routes.
    Livemode,
    /// Serve live routes while comparing them against the cache.
    Tapcompare,
}

impl CacheMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheMode::Darkmode => "darkmode",
            CacheMode::Livemode => "livemode",
            CacheMode::Tapcompare => "tapcompare",
        }
    }
}

impl fmt::Display for CacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a lookup needs. `amount.currency` and `quote_token` are the
/// unoriented pair; `token_pair` applies the trade-type orientation used by
/// both the read and write paths.
#[derive(Debug, Clone)]
pub struct RouteCacheRequest {
    pub amount: CurrencyAmount,
    pub quote_token: Token,
    pub trade_type: TradeType,
    pub protocols: Vec<Protocol>,
    pub current_block_number: u64,
    /// When set, the provider may trigger background fill-ahead population.
    pub optimistic: bool,
}

impl RouteCacheRequest {
    /// Oriented (tokenIn, tokenOut). Exact-input trades sell the amount's
    /// currency; exact-output trades buy it.
    pub fn token_pair(&self) -> (&Token, &Token) {
        match self.trade_type {
            TradeType::ExactInput => (&self.amount.currency, &self.quote_token),
            TradeType::ExactOutput => (&self.quote_token, &self.amount.currency),
        }
    }
}

/// Provider contract for route caches. `get_cached_route` and
/// `set_cached_route` are the public surface; `lookup`, `store` and
/// `blocks_to_live` are the per-backend customization points, and
/// `filter_expired` is a hook a backend may override when staleness should
/// be observational rather than a hard filter.
#[async_trait]
pub trait RouteCachingProvider: Send + Sync {
    async fn get_cached_route(&self, request: &RouteCacheRequest) -> Option<CachedRoutes> {
        let cached = self.lookup(request).await?;
        self.filter_expired(cached, request.current_block_number)
    }

    /// Stamps the freshness window onto the routes, then persists them.
    /// Returns false on failure; a failed write silently erodes future hit
    /// rates, so callers may want to react.
    async fn set_cached_route(
        &self,
        mut cached_routes: CachedRoutes,
        amount: &CurrencyAmount,
    ) -> bool {
        cached_routes.blocks_to_live = self.blocks_to_live(&cached_routes, amount);
        self.store(cached_routes).await
    }

    fn get_cache_mode(
        &self,
        amount: &CurrencyAmount,
        quote_token: &Token,
        trade_type: TradeType,
    ) -> CacheMode;

    async fn lookup(&self, request: &RouteCacheRequest) -> Option<CachedRoutes>;

    async fn store(&self, cached_routes: CachedRoutes) -> bool;

    fn blocks_to_live(&self, cached_routes: &CachedRoutes, amount: &CurrencyAmount) -> u64;

    fn filter_expired(
        &self,
        cached_routes: CachedRoutes,
        current_block_number: u64,
    ) -> Option<CachedRoutes> {
        if cached_routes.not_expired(current_block_number) {
            Some(cached_routes)
        } else {
            None
        }
    }
}
