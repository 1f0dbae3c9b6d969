//! In-memory table adapters backing the storage traits for local runs and
//! tests. Rows live in `RwLock`-guarded maps keyed by partition key; TTL is
//! honored at read time the way the managed store honors it at deletion
//! time.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::storage::{
    epoch_seconds_now, FillFlagRow, FillFlagStore, RouteRow, RouteTableStore, StorageError,
};

pub struct InMemoryRouteTable {
    rows: RwLock<HashMap<String, Vec<RouteRow>>>,
}

impl InMemoryRouteTable {
    pub fn new() -> Self {
        InMemoryRouteTable {
            rows: RwLock::new(HashMap::new()),
        }
    }

    pub async fn row_count(&self, partition_key: &str) -> usize {
        self.rows
            .read()
            .await
            .get(partition_key)
            .map(|rows| rows.len())
            .unwrap_or(0)
    }
}

impl Default for InMemoryRouteTable {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RouteTableStore for InMemoryRouteTable {
    async fn query_routes(&self, partition_key: &str) -> Result<Vec<RouteRow>, StorageError> {
        let now = epoch_seconds_now();
        let rows = self.rows.read().await;
        Ok(rows
            .get(partition_key)
            .map(|rows| {
                rows.iter()
                    .filter(|row| row.ttl > now)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default())
    }

    async fn batch_write_routes(&self, batch: Vec<RouteRow>) -> Result<(), StorageError> {
        let mut rows = self.rows.write().await;
        for row in batch {
            let partition = rows.entry(row.partition_key.clone()).or_default();
            // Same key semantics as the managed table: a row with the same
            // route id replaces the previous generation.
            if let Some(existing) = partition
                .iter_mut()
                .find(|existing| existing.route_id == row.route_id)
            {
                *existing = row;
            } else {
                partition.push(row);
            }
        }
        Ok(())
    }
}

pub struct InMemoryFillFlagTable {
    rows: RwLock<HashMap<String, Vec<FillFlagRow>>>,
}

impl InMemoryFillFlagTable {
    pub fn new() -> Self {
        InMemoryFillFlagTable {
            rows: RwLock::new(HashMap::new()),
        }
    }

    pub async fn flag_count(&self, partition_key: &str) -> usize {
        self.rows
            .read()
            .await
            .get(partition_key)
            .map(|rows| rows.len())
            .unwrap_or(0)
    }

    /// Test hook: force-expire every flag in the partition, simulating the
    /// storage engine reclaiming leased rows.
    pub async fn expire_all(&self, partition_key: &str) {
        if let Some(rows) = self.rows.write().await.get_mut(partition_key) {
            for row in rows.iter_mut() {
                row.ttl = 0;
            }
        }
    }
}

impl Default for InMemoryFillFlagTable {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FillFlagStore for InMemoryFillFlagTable {
    async fn query_flags_in_range(
        &self,
        partition_key: &str,
        low: f64,
        high: f64,
    ) -> Result<Vec<FillFlagRow>, StorageError> {
        let now = epoch_seconds_now();
        let rows = self.rows.read().await;
        Ok(rows
            .get(partition_key)
            .map(|rows| {
                rows.iter()
                    .filter(|row| row.ttl > now && row.amount >= low && row.amount <= high)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default())
    }

    async fn put_flag(&self, row: FillFlagRow) -> Result<(), StorageError> {
        debug!(
            partition_key = %row.partition_key,
            amount = row.amount,
            block_number = row.block_number,
            "Recording fill flag"
        );
        let mut rows = self.rows.write().await;
        let partition = rows.entry(row.partition_key.clone()).or_default();
        if let Some(existing) = partition
            .iter_mut()
            .find(|existing| existing.amount == row.amount)
        {
            *existing = row;
        } else {
            partition.push(row);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route_row(partition_key: &str, route_id: &str, block_number: u64, ttl: u64) -> RouteRow {
        RouteRow {
            partition_key: partition_key.to_string(),
            block_number,
            route_id: route_id.to_string(),
            protocol: Some("V3".to_string()),
            item: b"{}".to_vec(),
            ttl,
        }
    }

    #[tokio::test]
    async fn rewriting_a_route_replaces_the_row() {
        let table = InMemoryRouteTable::new();
        let far_future = epoch_seconds_now() + 3600;
        table
            .batch_write_routes(vec![route_row("PAIR", "route-a", 100, far_future)])
            .await
            .unwrap();
        table
            .batch_write_routes(vec![route_row("PAIR", "route-a", 105, far_future)])
            .await
            .unwrap();

        let rows = table.query_routes("PAIR").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].block_number, 105);
    }

    #[tokio::test]
    async fn expired_route_rows_are_invisible() {
        let table = InMemoryRouteTable::new();
        table
            .batch_write_routes(vec![route_row("PAIR", "route-a", 100, 1)])
            .await
            .unwrap();
        assert!(table.query_routes("PAIR").await.unwrap().is_empty());
        assert_eq!(table.row_count("PAIR").await, 1);
    }

    #[tokio::test]
    async fn flag_range_query_is_inclusive_on_both_ends() {
        let table = InMemoryFillFlagTable::new();
        let far_future = epoch_seconds_now() + 3600;
        for amount in [1.0, 1.6, 2.0] {
            table
                .put_flag(FillFlagRow {
                    partition_key: "PAIR".to_string(),
                    amount,
                    block_number: 100,
                    ttl: far_future,
                })
                .await
                .unwrap();
        }

        let rows = table.query_flags_in_range("PAIR", 1.0, 2.0).await.unwrap();
        assert_eq!(rows.len(), 3);
        let rows = table.query_flags_in_range("PAIR", 1.1, 1.9).await.unwrap();
        assert_eq!(rows.len(), 1);
    }
}
