use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use num_bigint::BigUint;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::cache::pair_key::PairTradeTypeChainId;
use crate::cache::strategy::{CachedRoutesBucket, CachedRoutesStrategy};
use crate::cache::{CacheMode, RouteCacheRequest, RouteCachingProvider};
use crate::config::CacheConfig;
use crate::marshalling::cached_routes::{self, MarshalledCachedRoutes};
use crate::marshalling::MarshalError;
use crate::metrics::{self, FillOutcome, LookupOutcome};
use crate::models::pools::Protocol;
use crate::models::routes::{CachedRoute, CachedRoutes};
use crate::models::tokens::{CurrencyAmount, Token};
use crate::models::trade::TradeType;
use crate::storage::{
    epoch_seconds_now, FillFlagRow, FillFlagStore, FillQueryParams, FillRequestPayload,
    InvokeError, PeerInvoker, RouteRow, RouteTableStore, StorageError, INTENT_CACHING,
};

/// Golden-ratio surrogate built from two consecutive Fibonacci numbers.
/// Repeatedly applying it to fill amounts forms a geometric ladder of
/// speculative trade sizes without floating-point transcendentals.
const FILL_RATIO_NUMERATOR: u64 = 2_178_309;
const FILL_RATIO_DENOMINATOR: u64 = 1_346_269;

const DEFAULT_CACHE_MODE: CacheMode = CacheMode::Livemode;

/// The table-backed route cache: reads, merges, judges staleness, writes,
/// and triggers fill-ahead population. All I/O goes through the injected
/// store and invoker seams.
pub struct TableRouteCachingProvider {
    routes: Arc<dyn RouteTableStore>,
    flags: Arc<dyn FillFlagStore>,
    invoker: Arc<dyn PeerInvoker>,
    config: CacheConfig,
    strategies: HashMap<String, CachedRoutesStrategy>,
}

impl TableRouteCachingProvider {
    pub fn new(
        routes: Arc<dyn RouteTableStore>,
        flags: Arc<dyn FillFlagStore>,
        invoker: Arc<dyn PeerInvoker>,
        config: CacheConfig,
    ) -> Self {
        TableRouteCachingProvider {
            routes,
            flags,
            invoker,
            config,
            strategies: HashMap::new(),
        }
    }

    /// Install per-pair caching policies. A strategy's pair label must be
    /// the oriented token addresses joined by "/" (uppercasing is applied
    /// on both sides of the lookup).
    pub fn with_strategies(mut self, strategies: Vec<CachedRoutesStrategy>) -> Self {
        for strategy in strategies {
            self.strategies.insert(strategy.key(), strategy);
        }
        self
    }

    fn bucket_for(
        &self,
        token_in: &Token,
        token_out: &Token,
        trade_type: TradeType,
        amount: &CurrencyAmount,
    ) -> Option<&CachedRoutesBucket> {
        let key = format!(
            "{}/{}/{}",
            token_in.address.to_ascii_uppercase(),
            token_out.address.to_ascii_uppercase(),
            trade_type.index()
        );
        self.strategies.get(&key)?.get_caching_bucket(amount.decimal())
    }

    /// Decode the surviving rows and merge them into one answer: dedup by
    /// route id with the newest row winning, keep insertion order for
    /// consumers, and track the maximum block seen. Metadata comes from the
    /// first (newest) decoded row.
    fn merge_rows(&self, rows: Vec<RouteRow>, request: &RouteCacheRequest) -> Option<CachedRoutes> {
        let requested: HashSet<Protocol> = request.protocols.iter().copied().collect();

        let mut rows: Vec<RouteRow> = rows
            .into_iter()
            .filter(|row| match &row.protocol {
                // Legacy rows predate the protocol column and pass as-is.
                None => true,
                Some(tag) => Protocol::from_str(tag)
                    .map(|protocol| requested.contains(&protocol))
                    .unwrap_or(false),
            })
            .collect();
        rows.sort_by(|a, b| b.block_number.cmp(&a.block_number));
        rows.truncate(self.config.max_rows_merged);

        let mut decoded: Vec<CachedRoutes> = Vec::with_capacity(rows.len());
        for row in &rows {
            match decode_row(&row.item) {
                Ok(single) => decoded.push(single),
                Err(err) => {
                    // One bad row must not abort the lookup; skip it and
                    // keep merging the rest.
                    warn!(
                        partition_key = %row.partition_key,
                        route_id = %row.route_id,
                        error = %err,
                        "Skipping undecodable cached route row"
                    );
                    metrics::emit_row_decode_failure();
                }
            }
        }

        let first = decoded.first()?.clone();
        let mut max_block_number = 0u64;
        let mut seen: HashSet<String> = HashSet::new();
        let mut merged_routes: Vec<CachedRoute> = Vec::new();
        for single in &decoded {
            max_block_number = max_block_number.max(single.block_number);
            for cached_route in &single.routes {
                if !requested.contains(&cached_route.protocol()) {
                    continue;
                }
                if seen.insert(cached_route.route_id()) {
                    merged_routes.push(cached_route.clone());
                }
            }
        }

        if merged_routes.is_empty() {
            return None;
        }

        Some(CachedRoutes {
            routes: merged_routes,
            token_in: first.token_in,
            token_out: first.token_out,
            protocols_covered: first.protocols_covered,
            block_number: max_block_number,
            trade_type: first.trade_type,
            original_amount: first.original_amount,
            blocks_to_live: first.blocks_to_live,
        })
    }

    fn schedule_cache_fill(&self, request: &RouteCacheRequest, partition_key: &PairTradeTypeChainId) {
        let flags = Arc::clone(&self.flags);
        let invoker = Arc::clone(&self.invoker);
        let flag_ttl = self.config.flag_ttl;
        let fill_timeout = self.config.fill_timeout;
        let request = request.clone();
        let partition_key = partition_key.clone();

        // Fire and forget. The task owns its timeout and drains its own
        // errors; nothing on this path can fail or delay the read that
        // triggered it.
        tokio::spawn(async move {
            let attempt = timeout(
                fill_timeout,
                trigger_cache_fill(flags, invoker, &request, &partition_key, flag_ttl),
            )
            .await;
            match attempt {
                Ok(Ok(outcome)) => metrics::emit_cache_fill(outcome),
                Ok(Err(err)) => {
                    warn!(partition_key = %partition_key, error = %err, "Cache fill attempt failed");
                    metrics::emit_cache_fill(FillOutcome::Failed);
                }
                Err(_) => {
                    warn!(
                        partition_key = %partition_key,
                        timeout_ms = fill_timeout.as_millis() as u64,
                        "Cache fill attempt timed out"
                    );
                    metrics::emit_cache_fill(FillOutcome::Failed);
                }
            }
        });
    }
}

#[async_trait]
impl RouteCachingProvider for TableRouteCachingProvider {
    async fn lookup(&self, request: &RouteCacheRequest) -> Option<CachedRoutes> {
        let partition_key = PairTradeTypeChainId::from_request(request);
        let key = partition_key.to_string();

        let rows = match timeout(self.config.read_timeout, self.routes.query_routes(&key)).await {
            Ok(Ok(rows)) => rows,
            Ok(Err(err)) => {
                // Cache lookups always soft-fail; the caller falls through
                // to live computation.
                warn!(partition_key = %key, error = %err, "Route table query failed; treating as miss");
                metrics::emit_cache_lookup(LookupOutcome::Error);
                return None;
            }
            Err(_) => {
                warn!(
                    partition_key = %key,
                    timeout_ms = self.config.read_timeout.as_millis() as u64,
                    "Route table query timed out; treating as miss"
                );
                metrics::emit_cache_lookup(LookupOutcome::Error);
                return None;
            }
        };

        if rows.is_empty() {
            debug!(partition_key = %key, "No cached routes for pair");
            metrics::emit_cache_lookup(LookupOutcome::Miss);
            return None;
        }

        let merged = match self.merge_rows(rows, request) {
            Some(merged) => merged,
            None => {
                debug!(partition_key = %key, "No cached rows survived filtering");
                metrics::emit_cache_lookup(LookupOutcome::Miss);
                return None;
            }
        };

        let blocks_difference = merged.blocks_difference(request.current_block_number);
        let outcome = if merged.not_expired(request.current_block_number) {
            LookupOutcome::HitFresh
        } else {
            LookupOutcome::HitStale
        };
        metrics::emit_cache_lookup(outcome);
        info!(
            partition_key = %key,
            routes = merged.routes.len(),
            block_number = merged.block_number,
            blocks_difference,
            blocks_to_live = merged.blocks_to_live,
            "Serving merged cached routes"
        );

        if request.optimistic {
            self.schedule_cache_fill(request, &partition_key);
        }

        Some(merged)
    }

    async fn store(&self, cached_routes: CachedRoutes) -> bool {
        if cached_routes.routes.is_empty() {
            // The storage layer must never see an empty batch.
            warn!("Refusing to cache a quote that produced no routes");
            metrics::emit_cache_write(false);
            return false;
        }

        let partition_key = PairTradeTypeChainId::from_cached_routes(&cached_routes).to_string();
        let ttl = epoch_seconds_now() + self.config.routes_ttl.as_secs();

        // One row per route, each carrying a single-route CachedRoutes, so
        // later lookups can merge partial answers across many quotes.
        let mut batch = Vec::with_capacity(cached_routes.routes.len());
        for cached_route in &cached_routes.routes {
            let individual = CachedRoutes {
                routes: vec![cached_route.clone()],
                token_in: cached_routes.token_in.clone(),
                token_out: cached_routes.token_out.clone(),
                protocols_covered: cached_routes.protocols_covered.clone(),
                block_number: cached_routes.block_number,
                trade_type: cached_routes.trade_type,
                original_amount: format!(
                    "{} | {}% of it",
                    cached_routes.original_amount, cached_route.percent
                ),
                blocks_to_live: cached_routes.blocks_to_live,
            };
            let item = match serde_json::to_vec(&cached_routes::marshal(&individual)) {
                Ok(bytes) => bytes,
                Err(err) => {
                    error!(partition_key = %partition_key, error = %err, "Failed to encode cached route");
                    metrics::emit_cache_write(false);
                    return false;
                }
            };
            batch.push(RouteRow {
                partition_key: partition_key.clone(),
                block_number: individual.block_number,
                route_id: cached_route.route_id(),
                protocol: Some(cached_route.protocol().as_str().to_string()),
                item,
                ttl,
            });
        }

        match self.routes.batch_write_routes(batch).await {
            Ok(()) => {
                info!(
                    partition_key = %partition_key,
                    routes = cached_routes.routes.len(),
                    block_number = cached_routes.block_number,
                    "Cached routes persisted"
                );
                metrics::emit_cache_write(true);
                true
            }
            Err(err) => {
                // Reported, unlike read misses: repeated write failures
                // erode hit rate with no other signal.
                error!(partition_key = %partition_key, error = %err, "Failed to persist cached routes");
                metrics::emit_cache_write(false);
                false
            }
        }
    }

    fn blocks_to_live(&self, cached_routes: &CachedRoutes, amount: &CurrencyAmount) -> u64 {
        self.bucket_for(
            &cached_routes.token_in,
            &cached_routes.token_out,
            cached_routes.trade_type,
            amount,
        )
        .and_then(|bucket| bucket.blocks_to_live)
        .unwrap_or(self.config.default_blocks_to_live)
    }

    fn get_cache_mode(
        &self,
        amount: &CurrencyAmount,
        quote_token: &Token,
        trade_type: TradeType,
    ) -> CacheMode {
        let (token_in, token_out) = match trade_type {
            TradeType::ExactInput => (&amount.currency, quote_token),
            TradeType::ExactOutput => (quote_token, &amount.currency),
        };
        self.bucket_for(token_in, token_out, trade_type, amount)
            .map(|bucket| bucket.cache_mode)
            .unwrap_or(DEFAULT_CACHE_MODE)
    }

    /// Staleness is observational here: stale-but-present beats a miss,
    /// and the next write supersedes stale rows anyway. Expiry is reported
    /// through metrics in `lookup`, never used to drop a result.
    fn filter_expired(
        &self,
        cached_routes: CachedRoutes,
        _current_block_number: u64,
    ) -> Option<CachedRoutes> {
        Some(cached_routes)
    }
}

fn decode_row(item: &[u8]) -> Result<CachedRoutes, MarshalError> {
    let marshalled: MarshalledCachedRoutes = serde_json::from_slice(item)?;
    cached_routes::unmarshal(marshalled)
}

fn fill_ratio_amount(raw: &BigUint) -> BigUint {
    raw.clone() * BigUint::from(FILL_RATIO_NUMERATOR) / BigUint::from(FILL_RATIO_DENOMINATOR)
}

#[derive(Debug)]
enum CacheFillError {
    Storage(StorageError),
    Invoke(InvokeError),
}

impl fmt::Display for CacheFillError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheFillError::Storage(err) => write!(f, "flag table: {}", err),
            CacheFillError::Invoke(err) => write!(f, "peer invoke: {}", err),
        }
    }
}

impl From<StorageError> for CacheFillError {
    fn from(err: StorageError) -> Self {
        CacheFillError::Storage(err)
    }
}

impl From<InvokeError> for CacheFillError {
    fn from(err: InvokeError) -> Self {
        CacheFillError::Invoke(err)
    }
}

/// Ask the peer compute process to warm the cache for a slightly larger
/// amount than was just requested, unless a fill for a nearby amount is
/// already in flight.
async fn trigger_cache_fill(
    flags: Arc<dyn FillFlagStore>,
    invoker: Arc<dyn PeerInvoker>,
    request: &RouteCacheRequest,
    partition_key: &PairTradeTypeChainId,
    flag_ttl: Duration,
) -> Result<FillOutcome, CacheFillError> {
    let key = partition_key.to_string();
    let requested_amount = request.amount.decimal();
    let ratio_amount =
        requested_amount * (FILL_RATIO_NUMERATOR as f64 / FILL_RATIO_DENOMINATOR as f64);

    let in_flight = flags
        .query_flags_in_range(&key, requested_amount, ratio_amount)
        .await?;
    // A flag from an older block does not suppress a new fill even if that
    // fill is still in flight. One duplicate per block advance is an
    // accepted load characteristic; tightening this would change the load
    // profile on the peer compute function.
    if in_flight
        .iter()
        .any(|flag| flag.block_number >= request.current_block_number)
    {
        debug!(partition_key = %key, "Cache fill already in flight; debounced");
        return Ok(FillOutcome::Debounced);
    }

    let (token_in, token_out) = request.token_pair();
    let protocols = Protocol::ALL
        .iter()
        .map(|protocol| protocol.as_lowercase())
        .collect::<Vec<_>>()
        .join(",");
    let payload = FillRequestPayload {
        query_string_parameters: FillQueryParams {
            token_in_address: token_in.address.clone(),
            token_out_address: token_out.address.clone(),
            amount: fill_ratio_amount(&request.amount.raw).to_string(),
            trade_type: request.trade_type.as_str().to_string(),
            protocols,
            intent: INTENT_CACHING.to_string(),
        },
    };

    // The caching intent makes the peer run its own cache lookup with
    // optimistic=false. Without that, the peer's lookup would schedule
    // another fill, which would invoke another peer, recursing without
    // bound. Nothing else guards against that loop.
    invoker.invoke(payload).await?;

    // Written before the peer's computation could possibly complete, so
    // concurrent nearby requests see the debounce above instead of
    // double-invoking.
    flags
        .put_flag(FillFlagRow {
            partition_key: key.clone(),
            amount: requested_amount,
            block_number: request.current_block_number,
            ttl: epoch_seconds_now() + flag_ttl.as_secs(),
        })
        .await?;

    info!(
        partition_key = %key,
        amount = requested_amount,
        block_number = request.current_block_number,
        "Requested speculative cache fill"
    );
    Ok(FillOutcome::Invoked)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::models::pools::Pool;
    use crate::models::routes::Route;
    use crate::storage::memory::{InMemoryFillFlagTable, InMemoryRouteTable};

    const WETH: &str = "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2";
    const USDC: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";
    const USDT: &str = "0xdac17f958d2ee523a2206206994597c13d831ec7";

    struct RecordingInvoker {
        calls: Mutex<Vec<FillRequestPayload>>,
    }

    impl RecordingInvoker {
        fn new() -> Self {
            RecordingInvoker {
                calls: Mutex::new(Vec::new()),
            }
        }

        fn count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn last(&self) -> FillRequestPayload {
            self.calls.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl PeerInvoker for RecordingInvoker {
        async fn invoke(&self, payload: FillRequestPayload) -> Result<(), InvokeError> {
            self.calls.lock().unwrap().push(payload);
            Ok(())
        }
    }

    struct FailingRouteTable;

    #[async_trait]
    impl RouteTableStore for FailingRouteTable {
        async fn query_routes(&self, _partition_key: &str) -> Result<Vec<RouteRow>, StorageError> {
            Err(StorageError::Unavailable("simulated outage".to_string()))
        }

        async fn batch_write_routes(&self, _rows: Vec<RouteRow>) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("simulated outage".to_string()))
        }
    }

    struct Harness {
        provider: TableRouteCachingProvider,
        routes: Arc<InMemoryRouteTable>,
        flags: Arc<InMemoryFillFlagTable>,
        invoker: Arc<RecordingInvoker>,
    }

    fn harness() -> Harness {
        let routes = Arc::new(InMemoryRouteTable::new());
        let flags = Arc::new(InMemoryFillFlagTable::new());
        let invoker = Arc::new(RecordingInvoker::new());
        let provider = TableRouteCachingProvider::new(
            Arc::clone(&routes) as Arc<dyn RouteTableStore>,
            Arc::clone(&flags) as Arc<dyn FillFlagStore>,
            Arc::clone(&invoker) as Arc<dyn PeerInvoker>,
            CacheConfig::default(),
        );
        Harness {
            provider,
            routes,
            flags,
            invoker,
        }
    }

    fn token(address: &str, symbol: &str, decimals: u8) -> Token {
        Token::new(1, address, decimals)
            .with_symbol(symbol)
            .with_name(symbol)
    }

    fn weth() -> Token {
        token(WETH, "WETH", 18)
    }

    fn usdc() -> Token {
        token(USDC, "USDC", 6)
    }

    fn pool(a: &Token, b: &Token, fee: u32) -> Pool {
        Pool::new(
            a.clone(),
            b.clone(),
            fee,
            BigUint::from(79_228_162u64),
            BigUint::from(1_000_000u64),
            0,
        )
    }

    fn direct_route() -> Route {
        Route::new(
            Protocol::V3,
            weth(),
            usdc(),
            vec![pool(&weth(), &usdc(), 3000)],
        )
        .unwrap()
    }

    fn via_usdt_route() -> Route {
        let usdt = token(USDT, "USDT", 6);
        Route::new(
            Protocol::V3,
            weth(),
            usdc(),
            vec![pool(&weth(), &usdt, 500), pool(&usdt, &usdc(), 100)],
        )
        .unwrap()
    }

    fn cached(routes: Vec<(Route, u32)>, block_number: u64) -> CachedRoutes {
        CachedRoutes {
            routes: routes
                .into_iter()
                .map(|(route, percent)| CachedRoute::new(route, percent))
                .collect(),
            token_in: weth(),
            token_out: usdc(),
            protocols_covered: vec![Protocol::V3],
            block_number,
            trade_type: TradeType::ExactInput,
            original_amount: "1000000000000000000".to_string(),
            blocks_to_live: 0,
        }
    }

    fn request(raw: u64, current_block_number: u64, optimistic: bool) -> RouteCacheRequest {
        RouteCacheRequest {
            amount: CurrencyAmount::new(weth(), BigUint::from(raw)),
            quote_token: usdc(),
            trade_type: TradeType::ExactInput,
            protocols: vec![Protocol::V3],
            current_block_number,
            optimistic,
        }
    }

    fn one_ether() -> u64 {
        1_000_000_000_000_000_000
    }

    #[tokio::test]
    async fn write_then_read_merges_split_routes() {
        let harness = harness();
        let amount = CurrencyAmount::new(weth(), BigUint::from(one_ether()));
        let stored = cached(vec![(direct_route(), 60), (via_usdt_route(), 40)], 100);

        assert!(harness.provider.set_cached_route(stored, &amount).await);
        let key = PairTradeTypeChainId::new(WETH, USDC, TradeType::ExactInput, 1).to_string();
        assert_eq!(harness.routes.row_count(&key).await, 2);

        let merged = harness
            .provider
            .get_cached_route(&request(one_ether(), 110, false))
            .await
            .unwrap();
        assert_eq!(merged.routes.len(), 2);
        assert_eq!(merged.block_number, 100);
        assert_eq!(merged.blocks_difference(110), 10);
        // Freshness window stamped by set_cached_route from the default.
        assert_eq!(merged.blocks_to_live, CacheConfig::default().default_blocks_to_live);
    }

    #[tokio::test]
    async fn stale_results_are_served_not_filtered() {
        let harness = harness();
        let amount = CurrencyAmount::new(weth(), BigUint::from(one_ether()));
        assert!(
            harness
                .provider
                .set_cached_route(cached(vec![(direct_route(), 100)], 100), &amount)
                .await
        );

        let merged = harness
            .provider
            .get_cached_route(&request(one_ether(), 500, false))
            .await
            .unwrap();
        assert!(!merged.not_expired(500));
        assert_eq!(merged.blocks_difference(500), 400);
    }

    #[tokio::test]
    async fn merge_dedups_by_route_id_keeping_the_newer_row() {
        let harness = harness();
        let amount = CurrencyAmount::new(weth(), BigUint::from(one_ether()));
        assert!(
            harness
                .provider
                .set_cached_route(cached(vec![(direct_route(), 100)], 100), &amount)
                .await
        );
        assert!(
            harness
                .provider
                .set_cached_route(cached(vec![(direct_route(), 100)], 105), &amount)
                .await
        );

        let merged = harness
            .provider
            .get_cached_route(&request(one_ether(), 106, false))
            .await
            .unwrap();
        assert_eq!(merged.routes.len(), 1);
        assert_eq!(merged.block_number, 105);
    }

    #[tokio::test]
    async fn merge_spans_rows_from_different_quotes() {
        let harness = harness();
        let amount = CurrencyAmount::new(weth(), BigUint::from(one_ether()));
        assert!(
            harness
                .provider
                .set_cached_route(cached(vec![(direct_route(), 100)], 100), &amount)
                .await
        );
        assert!(
            harness
                .provider
                .set_cached_route(cached(vec![(via_usdt_route(), 100)], 105), &amount)
                .await
        );

        let merged = harness
            .provider
            .get_cached_route(&request(one_ether(), 106, false))
            .await
            .unwrap();
        assert_eq!(merged.routes.len(), 2);
        assert_eq!(merged.block_number, 105);
    }

    #[tokio::test]
    async fn rows_tagged_with_unrequested_protocols_are_excluded() {
        let harness = harness();
        let amount = CurrencyAmount::new(weth(), BigUint::from(one_ether()));
        assert!(
            harness
                .provider
                .set_cached_route(cached(vec![(direct_route(), 100)], 100), &amount)
                .await
        );

        let key = PairTradeTypeChainId::new(WETH, USDC, TradeType::ExactInput, 1).to_string();
        let mut rows = harness.routes.query_routes(&key).await.unwrap();
        // Retag one generation as a protocol this caller does not request,
        // and strip the tag from another to simulate a legacy row.
        let mut foreign = rows[0].clone();
        foreign.protocol = Some("V9".to_string());
        foreign.route_id = "foreign".to_string();
        let mut legacy = rows.remove(0);
        legacy.protocol = None;
        legacy.route_id = "legacy".to_string();
        harness
            .routes
            .batch_write_routes(vec![foreign, legacy])
            .await
            .unwrap();

        let merged = harness
            .provider
            .get_cached_route(&request(one_ether(), 101, false))
            .await
            .unwrap();
        // The original row and the untagged legacy copy decode to the same
        // route id, so the merge keeps one entry; the foreign-tagged row
        // contributed nothing.
        assert_eq!(merged.routes.len(), 1);
    }

    #[tokio::test]
    async fn storage_failures_read_as_cache_misses() {
        let flags = Arc::new(InMemoryFillFlagTable::new());
        let invoker = Arc::new(RecordingInvoker::new());
        let provider = TableRouteCachingProvider::new(
            Arc::new(FailingRouteTable),
            flags,
            invoker,
            CacheConfig::default(),
        );

        let result = provider
            .get_cached_route(&request(one_ether(), 100, false))
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn undecodable_rows_are_skipped_not_fatal() {
        let harness = harness();
        let amount = CurrencyAmount::new(weth(), BigUint::from(one_ether()));
        assert!(
            harness
                .provider
                .set_cached_route(cached(vec![(direct_route(), 100)], 100), &amount)
                .await
        );

        let key = PairTradeTypeChainId::new(WETH, USDC, TradeType::ExactInput, 1).to_string();
        harness
            .routes
            .batch_write_routes(vec![RouteRow {
                partition_key: key,
                block_number: 105,
                route_id: "corrupted".to_string(),
                protocol: Some("V3".to_string()),
                item: b"not json".to_vec(),
                ttl: epoch_seconds_now() + 3600,
            }])
            .await
            .unwrap();

        let merged = harness
            .provider
            .get_cached_route(&request(one_ether(), 106, false))
            .await
            .unwrap();
        assert_eq!(merged.routes.len(), 1);
        // The corrupted newer row no longer influences the merged block.
        assert_eq!(merged.block_number, 100);
    }

    #[tokio::test]
    async fn exact_output_writes_are_readable_with_exact_output_requests() {
        let harness = harness();
        let amount = CurrencyAmount::new(usdc(), BigUint::from(1_000_000u64));
        let mut stored = cached(vec![(direct_route(), 100)], 100);
        stored.trade_type = TradeType::ExactOutput;
        assert!(harness.provider.set_cached_route(stored, &amount).await);

        // Exact-output orientation: the amount is denominated in the token
        // being bought, the quote token is the one being sold.
        let request = RouteCacheRequest {
            amount: CurrencyAmount::new(usdc(), BigUint::from(1_000_000u64)),
            quote_token: weth(),
            trade_type: TradeType::ExactOutput,
            protocols: vec![Protocol::V3],
            current_block_number: 101,
            optimistic: false,
        };
        assert!(harness.provider.get_cached_route(&request).await.is_some());
    }

    #[tokio::test]
    async fn refuses_to_write_an_empty_route_set() {
        let harness = harness();
        let amount = CurrencyAmount::new(weth(), BigUint::from(one_ether()));
        assert!(
            !harness
                .provider
                .set_cached_route(cached(Vec::new(), 100), &amount)
                .await
        );
        let key = PairTradeTypeChainId::new(WETH, USDC, TradeType::ExactInput, 1).to_string();
        assert_eq!(harness.routes.row_count(&key).await, 0);
    }

    #[tokio::test]
    async fn fill_requests_debounce_within_a_block() {
        let harness = harness();
        let request = request(one_ether(), 100, true);
        let partition_key = PairTradeTypeChainId::from_request(&request);

        let first = trigger_cache_fill(
            Arc::clone(&harness.flags) as Arc<dyn FillFlagStore>,
            Arc::clone(&harness.invoker) as Arc<dyn PeerInvoker>,
            &request,
            &partition_key,
            Duration::from_secs(120),
        )
        .await
        .unwrap();
        let second = trigger_cache_fill(
            Arc::clone(&harness.flags) as Arc<dyn FillFlagStore>,
            Arc::clone(&harness.invoker) as Arc<dyn PeerInvoker>,
            &request,
            &partition_key,
            Duration::from_secs(120),
        )
        .await
        .unwrap();

        assert_eq!(first, FillOutcome::Invoked);
        assert_eq!(second, FillOutcome::Debounced);
        assert_eq!(harness.invoker.count(), 1);
        assert_eq!(harness.flags.flag_count(&partition_key.to_string()).await, 1);
    }

    #[tokio::test]
    async fn a_newer_block_reopens_the_debounce_window() {
        let harness = harness();
        let partition_key =
            PairTradeTypeChainId::from_request(&request(one_ether(), 100, true));

        for (block, expected) in [
            (100, FillOutcome::Invoked),
            (100, FillOutcome::Debounced),
            (101, FillOutcome::Invoked),
        ] {
            let outcome = trigger_cache_fill(
                Arc::clone(&harness.flags) as Arc<dyn FillFlagStore>,
                Arc::clone(&harness.invoker) as Arc<dyn PeerInvoker>,
                &request(one_ether(), block, true),
                &partition_key,
                Duration::from_secs(120),
            )
            .await
            .unwrap();
            assert_eq!(outcome, expected);
        }
        assert_eq!(harness.invoker.count(), 2);
    }

    #[tokio::test]
    async fn an_expired_flag_no_longer_debounces() {
        let harness = harness();
        let request = request(one_ether(), 100, true);
        let partition_key = PairTradeTypeChainId::from_request(&request);

        for _ in 0..2 {
            trigger_cache_fill(
                Arc::clone(&harness.flags) as Arc<dyn FillFlagStore>,
                Arc::clone(&harness.invoker) as Arc<dyn PeerInvoker>,
                &request,
                &partition_key,
                Duration::from_secs(120),
            )
            .await
            .unwrap();
        }
        assert_eq!(harness.invoker.count(), 1);

        harness.flags.expire_all(&partition_key.to_string()).await;
        let outcome = trigger_cache_fill(
            Arc::clone(&harness.flags) as Arc<dyn FillFlagStore>,
            Arc::clone(&harness.invoker) as Arc<dyn PeerInvoker>,
            &request,
            &partition_key,
            Duration::from_secs(120),
        )
        .await
        .unwrap();
        assert_eq!(outcome, FillOutcome::Invoked);
        assert_eq!(harness.invoker.count(), 2);
    }

    #[tokio::test]
    async fn fill_payload_carries_the_caching_intent_and_ratio_amount() {
        let harness = harness();
        // Choosing the denominator as the raw amount makes the widened
        // amount exactly the numerator.
        let request = request(FILL_RATIO_DENOMINATOR, 100, true);
        let partition_key = PairTradeTypeChainId::from_request(&request);

        trigger_cache_fill(
            Arc::clone(&harness.flags) as Arc<dyn FillFlagStore>,
            Arc::clone(&harness.invoker) as Arc<dyn PeerInvoker>,
            &request,
            &partition_key,
            Duration::from_secs(120),
        )
        .await
        .unwrap();

        let payload = harness.invoker.last().query_string_parameters;
        assert_eq!(payload.intent, "caching");
        assert_eq!(payload.trade_type, "exactIn");
        assert_eq!(payload.protocols, "v3");
        assert_eq!(payload.token_in_address, WETH);
        assert_eq!(payload.token_out_address, USDC);
        assert_eq!(payload.amount, FILL_RATIO_NUMERATOR.to_string());
    }

    #[tokio::test]
    async fn optimistic_reads_schedule_a_background_fill() {
        let harness = harness();
        let amount = CurrencyAmount::new(weth(), BigUint::from(one_ether()));
        assert!(
            harness
                .provider
                .set_cached_route(cached(vec![(direct_route(), 100)], 100), &amount)
                .await
        );

        assert!(
            harness
                .provider
                .get_cached_route(&request(one_ether(), 101, false))
                .await
                .is_some()
        );
        assert_eq!(harness.invoker.count(), 0);

        assert!(
            harness
                .provider
                .get_cached_route(&request(one_ether(), 101, true))
                .await
                .is_some()
        );
        for _ in 0..100 {
            if harness.invoker.count() == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(harness.invoker.count(), 1);
    }

    #[tokio::test]
    async fn strategy_buckets_drive_cache_mode_and_freshness_window() {
        let harness = harness();
        let pair = format!(
            "{}/{}",
            WETH.to_ascii_uppercase(),
            USDC.to_ascii_uppercase()
        );
        let strategy = CachedRoutesStrategy::new(
            &pair,
            TradeType::ExactInput,
            vec![
                CachedRoutesBucket::new(1.0, CacheMode::Tapcompare).with_blocks_to_live(4),
                CachedRoutesBucket::new(5.0, CacheMode::Livemode),
            ],
        );
        let provider = harness.provider.with_strategies(vec![strategy]);

        let small = CurrencyAmount::new(weth(), BigUint::from(one_ether() / 2));
        let large = CurrencyAmount::new(weth(), BigUint::from(3 * one_ether()));
        let huge = CurrencyAmount::new(weth(), BigUint::from(10 * one_ether()));

        assert_eq!(
            provider.get_cache_mode(&small, &usdc(), TradeType::ExactInput),
            CacheMode::Tapcompare
        );
        assert_eq!(
            provider.get_cache_mode(&large, &usdc(), TradeType::ExactInput),
            CacheMode::Livemode
        );
        // Beyond the largest bucket there is no policy; the constant
        // default applies.
        assert_eq!(
            provider.get_cache_mode(&huge, &usdc(), TradeType::ExactInput),
            CacheMode::Livemode
        );

        let stored = cached(vec![(direct_route(), 100)], 100);
        assert_eq!(provider.blocks_to_live(&stored, &small), 4);
        assert_eq!(
            provider.blocks_to_live(&stored, &large),
            CacheConfig::default().default_blocks_to_live
        );
    }
}
