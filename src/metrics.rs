use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Map, Value};
use tracing::warn;

const METRIC_NAMESPACE: &str = "SwapRouter/RouteCache";
const METRIC_CACHE_LOOKUP: &str = "RouteCacheLookup";
const METRIC_CACHE_WRITE: &str = "RouteCacheWrite";
const METRIC_ROW_DECODE_FAILURE: &str = "RouteCacheRowDecodeFailure";
const METRIC_CACHE_FILL: &str = "CacheFillRequest";
const DIM_OUTCOME: &str = "Outcome";
const DIM_STATUS: &str = "Status";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutcome {
    /// Merged result within its freshness window.
    HitFresh,
    /// Merged result past its freshness window; still served.
    HitStale,
    Miss,
    Error,
}

impl LookupOutcome {
    fn as_str(self) -> &'static str {
        match self {
            Self::HitFresh => "hit_fresh",
            Self::HitStale => "hit_stale",
            Self::Miss => "miss",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    Invoked,
    Debounced,
    Failed,
}

impl FillOutcome {
    fn as_str(self) -> &'static str {
        match self {
            Self::Invoked => "invoked",
            Self::Debounced => "debounced",
            Self::Failed => "failed",
        }
    }
}

pub fn emit_cache_lookup(outcome: LookupOutcome) {
    emit_count_metric(METRIC_CACHE_LOOKUP, &[(DIM_OUTCOME, json!(outcome.as_str()))]);
}

pub fn emit_cache_write(success: bool) {
    emit_count_metric(
        METRIC_CACHE_WRITE,
        &[(DIM_STATUS, json!(if success { "success" } else { "failure" }))],
    );
}

pub fn emit_row_decode_failure() {
    emit_count_metric(METRIC_ROW_DECODE_FAILURE, &[]);
}

pub fn emit_cache_fill(outcome: FillOutcome) {
    emit_count_metric(METRIC_CACHE_FILL, &[(DIM_OUTCOME, json!(outcome.as_str()))]);
}

fn emit_count_metric(metric_name: &str, dimensions: &[(&str, Value)]) {
    // Emit CloudWatch Embedded Metric Format as a raw JSON log line.
    // Tracing's JSON wrapper would prevent EMF extraction, so we write
    // directly to stdout.
    let timestamp_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as i64)
        .unwrap_or(0);

    let dimension_names: Vec<&str> = dimensions.iter().map(|(name, _)| *name).collect();
    let aws = json!({
        "Timestamp": timestamp_ms,
        "CloudWatchMetrics": [{
            "Namespace": METRIC_NAMESPACE,
            "Dimensions": [dimension_names],
            "Metrics": [{
                "Name": metric_name,
                "Unit": "Count",
            }],
        }],
    });

    let mut event = Map::new();
    event.insert("_aws".to_string(), aws);
    event.insert(metric_name.to_string(), json!(1));
    for (name, value) in dimensions {
        event.insert((*name).to_string(), value.clone());
    }

    match serde_json::to_string(&Value::Object(event)) {
        Ok(line) => println!("{line}"),
        Err(err) => warn!(error = %err, metric = metric_name, "Failed to serialize EMF metric"),
    }
}
