mod logging;
pub use logging::init_logging;

use std::time::Duration;

pub fn load_config() -> CacheConfig {
    dotenv::dotenv().ok();

    let routes_table = std::env::var("ROUTES_TABLE_NAME").unwrap_or_else(|_| "RouteCachingDB".to_string());
    let flag_table = std::env::var("CACHING_REQUEST_FLAG_TABLE_NAME")
        .unwrap_or_else(|_| "CachingRequestFlagDB".to_string());
    let fill_function = std::env::var("CACHING_QUOTE_FUNCTION_NAME")
        .unwrap_or_else(|_| "CachingQuoteFunction".to_string());
    let chain_id: u64 = std::env::var("CHAIN_ID")
        .unwrap_or_else(|_| "1".to_string())
        .parse()
        .expect("Invalid CHAIN_ID");

    // Reads sit on the request's critical path; keep the timeout aggressive
    // so a slow cache degrades to a miss instead of blocking the caller.
    let read_timeout_ms: u64 = std::env::var("CACHE_READ_TIMEOUT_MS")
        .unwrap_or_else(|_| "100".to_string())
        .parse()
        .expect("Invalid CACHE_READ_TIMEOUT_MS");
    let fill_timeout_ms: u64 = std::env::var("CACHE_FILL_TIMEOUT_MS")
        .unwrap_or_else(|_| "2000".to_string())
        .parse()
        .expect("Invalid CACHE_FILL_TIMEOUT_MS");

    let routes_ttl_secs: u64 = std::env::var("ROUTES_TTL_SECS")
        .unwrap_or_else(|_| "86400".to_string())
        .parse()
        .expect("Invalid ROUTES_TTL_SECS");
    let flag_ttl_secs: u64 = std::env::var("CACHING_REQUEST_FLAG_TTL_SECS")
        .unwrap_or_else(|_| "120".to_string())
        .parse()
        .expect("Invalid CACHING_REQUEST_FLAG_TTL_SECS");

    let max_rows_merged: usize = std::env::var("CACHE_MAX_ROWS_MERGED")
        .unwrap_or_else(|_| "8".to_string())
        .parse()
        .expect("Invalid CACHE_MAX_ROWS_MERGED");
    let default_blocks_to_live: u64 = std::env::var("CACHE_DEFAULT_BLOCKS_TO_LIVE")
        .unwrap_or_else(|_| "2".to_string())
        .parse()
        .expect("Invalid CACHE_DEFAULT_BLOCKS_TO_LIVE");

    assert!(read_timeout_ms > 0, "CACHE_READ_TIMEOUT_MS must be > 0");
    assert!(fill_timeout_ms > 0, "CACHE_FILL_TIMEOUT_MS must be > 0");
    assert!(routes_ttl_secs > 0, "ROUTES_TTL_SECS must be > 0");
    assert!(flag_ttl_secs > 0, "CACHING_REQUEST_FLAG_TTL_SECS must be > 0");
    assert!(max_rows_merged > 0, "CACHE_MAX_ROWS_MERGED must be > 0");

    CacheConfig {
        routes_table,
        flag_table,
        fill_function,
        chain_id,
        read_timeout: Duration::from_millis(read_timeout_ms),
        fill_timeout: Duration::from_millis(fill_timeout_ms),
        routes_ttl: Duration::from_secs(routes_ttl_secs),
        flag_ttl: Duration::from_secs(flag_ttl_secs),
        max_rows_merged,
        default_blocks_to_live,
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Route table name; consumed by the storage adapter wiring.
    pub routes_table: String,
    /// Fill-flag table name.
    pub flag_table: String,
    /// Identifier of the peer compute function invoked for cache fills.
    pub fill_function: String,
    pub chain_id: u64,
    pub read_timeout: Duration,
    pub fill_timeout: Duration,
    /// Retention window stamped onto route rows (storage-engine TTL).
    pub routes_ttl: Duration,
    /// Lease window for fill-flag rows; minutes, not hours.
    pub flag_ttl: Duration,
    /// Upper bound on rows decoded and merged per lookup.
    pub max_rows_merged: usize,
    /// Freshness window when no bucket override applies.
    pub default_blocks_to_live: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            routes_table: "RouteCachingDB".to_string(),
            flag_table: "CachingRequestFlagDB".to_string(),
            fill_function: "CachingQuoteFunction".to_string(),
            chain_id: 1,
            read_timeout: Duration::from_millis(100),
            fill_timeout: Duration::from_millis(2000),
            routes_ttl: Duration::from_secs(86_400),
            flag_ttl: Duration::from_secs(120),
            max_rows_merged: 8,
            default_blocks_to_live: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_env_free_load() {
        let config = CacheConfig::default();
        assert_eq!(config.max_rows_merged, 8);
        assert_eq!(config.routes_ttl, Duration::from_secs(86_400));
        assert!(config.flag_ttl < Duration::from_secs(3600));
    }
}
