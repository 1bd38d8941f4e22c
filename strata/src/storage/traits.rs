//! Trait definitions for record storage in Strata

use async_trait::async_trait;
use std::fmt::Debug;

use crate::models::{MemoryRecord, Metadata, PartitionKey};
use crate::storage::errors::StorageError;

/// Record table partitioned by tenant and memory type.
///
/// Every call names its [`PartitionKey`]; implementations must never return or
/// modify a record of another partition, so layers of different tenants or
/// types can share one store. Writers to one partition are serialized and
/// `update` rejects stale versions.
#[async_trait]
pub trait RecordStore: Send + Sync + Debug + 'static {
    /// Check if the store is healthy and available
    async fn health_check(&self) -> Result<bool, StorageError>;

    /// Insert a new record under the partition of its tenant and type
    async fn insert(&self, record: MemoryRecord) -> Result<MemoryRecord, StorageError>;

    /// Get a record without touching its access statistics
    async fn get(&self, key: &PartitionKey, id: &str) -> Result<Option<MemoryRecord>, StorageError>;

    /// Get a record and count the read (`access_count`, `last_accessed`)
    async fn record_access(
        &self,
        key: &PartitionKey,
        id: &str,
    ) -> Result<Option<MemoryRecord>, StorageError>;

    /// Fetch several records, skipping unknown ids, preserving the order of `ids`
    async fn get_many(
        &self,
        key: &PartitionKey,
        ids: &[String],
    ) -> Result<Vec<MemoryRecord>, StorageError>;

    /// Replace a record in the partition of its tenant and type.
    ///
    /// Fails with `NotFound` when the record lives elsewhere and with
    /// `Conflict` when `record.version` is older than the stored version; on
    /// success the stored version is incremented.
    async fn update(&self, record: MemoryRecord) -> Result<MemoryRecord, StorageError>;

    /// Write a new decay factor if the record's version still equals
    /// `expected_version`. Returns false when the record moved on or is gone.
    async fn update_decay(
        &self,
        key: &PartitionKey,
        id: &str,
        decay_factor: f64,
        expected_version: u64,
    ) -> Result<bool, StorageError>;

    /// Delete a record by its ID
    async fn delete(&self, key: &PartitionKey, id: &str) -> Result<bool, StorageError>;

    /// List records in insertion order with optional exact-match metadata filtering
    async fn list(
        &self,
        key: &PartitionKey,
        filter: Option<&Metadata>,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Vec<MemoryRecord>, StorageError>;

    /// Count records of a partition
    async fn count(&self, key: &PartitionKey) -> Result<usize, StorageError>;

    /// Remove every record of a partition, returning how many were removed
    async fn clear(&self, key: &PartitionKey) -> Result<usize, StorageError>;
}
