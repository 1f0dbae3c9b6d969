//! Storage and invocation seams. The provider talks to its two tables and
//! the peer compute process exclusively through these traits, so the
//! concrete backend (a managed key-value store in deployment, the in-memory
//! adapters locally and in tests) is injected at construction.

pub mod memory;

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One persisted route: a single-route `CachedRoutes` blob plus the columns
/// lookups filter and sort on. One row is written per `CachedRoute`, which
/// is what makes partial reads and merges across quotes possible.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRow {
    pub partition_key: String,
    pub block_number: u64,
    pub route_id: String,
    /// Absent on legacy rows written before the column existed; such rows
    /// pass protocol filtering unconditionally.
    pub protocol: Option<String>,
    /// Marshalled-then-JSON-encoded single-route `CachedRoutes`.
    pub item: Vec<u8>,
    /// Absolute epoch seconds; the storage engine deletes the row itself.
    pub ttl: u64,
}

/// Debounce marker for an in-flight speculative cache fill. Short-lived; the
/// TTL is the lease, not a lock.
#[derive(Debug, Clone, PartialEq)]
pub struct FillFlagRow {
    pub partition_key: String,
    pub amount: f64,
    pub block_number: u64,
    pub ttl: u64,
}

#[derive(Debug)]
pub enum StorageError {
    Unavailable(String),
    Timeout(Duration),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Unavailable(message) => write!(f, "storage unavailable: {}", message),
            StorageError::Timeout(duration) => {
                write!(f, "storage call timed out after {} ms", duration.as_millis())
            }
        }
    }
}

impl std::error::Error for StorageError {}

#[derive(Debug)]
pub enum InvokeError {
    Rejected(String),
}

impl fmt::Display for InvokeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvokeError::Rejected(message) => write!(f, "peer invocation rejected: {}", message),
        }
    }
}

impl std::error::Error for InvokeError {}

#[async_trait]
pub trait RouteTableStore: Send + Sync {
    /// Full recent history for a pair in one query; no range condition.
    async fn query_routes(&self, partition_key: &str) -> Result<Vec<RouteRow>, StorageError>;

    /// Persist all rows in one batched call. Never invoked with an empty
    /// batch.
    async fn batch_write_routes(&self, rows: Vec<RouteRow>) -> Result<(), StorageError>;
}

#[async_trait]
pub trait FillFlagStore: Send + Sync {
    /// Flags for the partition whose amount lies in `[low, high]`, both ends
    /// inclusive.
    async fn query_flags_in_range(
        &self,
        partition_key: &str,
        low: f64,
        high: f64,
    ) -> Result<Vec<FillFlagRow>, StorageError>;

    async fn put_flag(&self, row: FillFlagRow) -> Result<(), StorageError>;
}

/// Wire shape of the fire-and-forget request sent to the peer compute
/// process. Mirrors the query string the peer's request handler parses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillRequestPayload {
    pub query_string_parameters: FillQueryParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillQueryParams {
    pub token_in_address: String,
    pub token_out_address: String,
    /// Raw amount as a decimal string.
    pub amount: String,
    #[serde(rename = "type")]
    pub trade_type: String,
    /// Comma-joined lowercase protocol tags.
    pub protocols: String,
    pub intent: String,
}

/// Intent marker for peer requests issued by the cache itself. The peer must
/// treat such requests as non-optimistic lookups; see the invoke call site
/// in the provider for why.
pub const INTENT_CACHING: &str = "caching";

#[async_trait]
pub trait PeerInvoker: Send + Sync {
    /// Asynchronous invocation: implementations hand the payload to the
    /// compute process and return without awaiting its result.
    async fn invoke(&self, payload: FillRequestPayload) -> Result<(), InvokeError>;
}

pub fn epoch_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}
