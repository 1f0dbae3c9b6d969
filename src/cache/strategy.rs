use crate::cache::CacheMode;
use crate::models::trade::TradeType;

/// Sentinel upper bound for the last bucket range: no upper limit.
pub const NO_UPPER_BOUND: f64 = -1.0;

/// One caching bucket: trades up to `bucket` (inclusive) human units share
/// this behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedRoutesBucket {
    pub bucket: f64,
    pub cache_mode: CacheMode,
    /// Overrides the provider-wide freshness window when set.
    pub blocks_to_live: Option<u64>,
}

impl CachedRoutesBucket {
    pub fn new(bucket: f64, cache_mode: CacheMode) -> Self {
        CachedRoutesBucket {
            bucket,
            cache_mode,
            blocks_to_live: None,
        }
    }

    pub fn with_blocks_to_live(mut self, blocks_to_live: u64) -> Self {
        self.blocks_to_live = Some(blocks_to_live);
        self
    }
}

/// Per-pair caching policy: which trade sizes are cacheable and how. Routes
/// are only reused for amounts close to the amount they were computed for,
/// so each amount is rounded up to the nearest configured bucket.
#[derive(Debug, Clone)]
pub struct CachedRoutesStrategy {
    pub pair: String,
    pub trade_type: TradeType,
    buckets: Vec<CachedRoutesBucket>,
}

impl CachedRoutesStrategy {
    pub fn new(pair: &str, trade_type: TradeType, mut buckets: Vec<CachedRoutesBucket>) -> Self {
        // Numeric ascending sort. A lexicographic ordering would interleave
        // e.g. 100 between 10 and 50 and break bucket scanning.
        buckets.sort_by(|a, b| a.bucket.total_cmp(&b.bucket));
        CachedRoutesStrategy {
            pair: pair.to_ascii_uppercase(),
            trade_type,
            buckets,
        }
    }

    /// Lookup key in the provider's strategy table.
    pub fn key(&self) -> String {
        format!("{}/{}", self.pair, self.trade_type.index())
    }

    /// The [low, high) ranges the thresholds imply: the first range starts
    /// at 0 and the last extends to the no-upper-bound sentinel.
    pub fn bucket_pairs(&self) -> Vec<(f64, f64)> {
        let mut pairs = Vec::with_capacity(self.buckets.len() + 1);
        let mut low = 0.0;
        for bucket in &self.buckets {
            pairs.push((low, bucket.bucket));
            low = bucket.bucket;
        }
        pairs.push((low, NO_UPPER_BOUND));
        pairs
    }

    /// First bucket whose threshold is >= the amount; an amount exactly on
    /// a threshold belongs to that threshold's bucket. Amounts beyond the
    /// largest bucket are too large to benefit from caching and get none.
    pub fn get_caching_bucket(&self, amount: f64) -> Option<&CachedRoutesBucket> {
        self.buckets.iter().find(|candidate| candidate.bucket >= amount)
    }
}
