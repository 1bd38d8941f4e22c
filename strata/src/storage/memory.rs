//! In-memory record store partitioned by tenant and memory type

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use crate::config::StorageConfig;
use crate::models::{MemoryRecord, Metadata, PartitionKey};
use crate::storage::errors::StorageError;
use crate::storage::traits::RecordStore;

#[derive(Debug, Clone)]
struct StoredRecord {
    seq: u64,
    record: MemoryRecord,
}

#[derive(Debug, Default)]
struct Partition {
    records: HashMap<String, StoredRecord>,
}

impl Partition {
    fn ordered(&self) -> Vec<&StoredRecord> {
        let mut entries: Vec<&StoredRecord> = self.records.values().collect();
        entries.sort_by_key(|entry| entry.seq);
        entries
    }
}

/// Record store keeping every tenant and layer in its own lock-guarded partition.
///
/// The outer map is only write-locked to create a partition; writers of one
/// partition never block readers or writers of another.
#[derive(Debug)]
pub struct InMemoryRecordStore {
    partitions: RwLock<HashMap<PartitionKey, Arc<RwLock<Partition>>>>,
    max_records_per_tenant: Option<usize>,
    next_seq: AtomicU64,
}

impl InMemoryRecordStore {
    /// Create an unbounded store
    pub fn new() -> Self {
        Self::with_config(&StorageConfig::default())
    }

    /// Create a store honouring the configured quota, applied per tenant and layer
    pub fn with_config(config: &StorageConfig) -> Self {
        Self {
            partitions: RwLock::new(HashMap::new()),
            max_records_per_tenant: config.max_records_per_tenant,
            next_seq: AtomicU64::new(0),
        }
    }

    async fn partition(&self, key: &PartitionKey) -> Option<Arc<RwLock<Partition>>> {
        self.partitions.read().await.get(key).cloned()
    }

    async fn partition_or_create(&self, key: PartitionKey) -> Arc<RwLock<Partition>> {
        if let Some(partition) = self.partition(&key).await {
            return partition;
        }
        let mut partitions = self.partitions.write().await;
        partitions
            .entry(key)
            .or_insert_with(|| Arc::new(RwLock::new(Partition::default())))
            .clone()
    }

    fn check_tenant(tenant_id: &str) -> Result<(), StorageError> {
        if tenant_id.trim().is_empty() {
            return Err(StorageError::Validation(
                "tenant id cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn health_check(&self) -> Result<bool, StorageError> {
        Ok(true)
    }

    async fn insert(&self, record: MemoryRecord) -> Result<MemoryRecord, StorageError> {
        Self::check_tenant(&record.tenant_id)?;
        let key = PartitionKey::of(&record);
        let partition = self.partition_or_create(key.clone()).await;
        let mut partition = partition.write().await;

        if partition.records.contains_key(&record.id) {
            return Err(StorageError::AlreadyExists(format!(
                "record {} already exists",
                record.id
            )));
        }
        if let Some(max) = self.max_records_per_tenant
            && partition.records.len() >= max
        {
            return Err(StorageError::Capacity(format!(
                "partition {} holds the maximum of {} records",
                key, max
            )));
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        partition.records.insert(
            record.id.clone(),
            StoredRecord {
                seq,
                record: record.clone(),
            },
        );
        Ok(record)
    }

    async fn get(
        &self,
        key: &PartitionKey,
        id: &str,
    ) -> Result<Option<MemoryRecord>, StorageError> {
        let Some(partition) = self.partition(key).await else {
            return Ok(None);
        };
        let partition = partition.read().await;
        Ok(partition.records.get(id).map(|entry| entry.record.clone()))
    }

    async fn record_access(
        &self,
        key: &PartitionKey,
        id: &str,
    ) -> Result<Option<MemoryRecord>, StorageError> {
        let Some(partition) = self.partition(key).await else {
            return Ok(None);
        };
        let mut partition = partition.write().await;
        Ok(partition.records.get_mut(id).map(|entry| {
            entry.record.record_access();
            entry.record.clone()
        }))
    }

    async fn get_many(
        &self,
        key: &PartitionKey,
        ids: &[String],
    ) -> Result<Vec<MemoryRecord>, StorageError> {
        let Some(partition) = self.partition(key).await else {
            return Ok(Vec::new());
        };
        let partition = partition.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| partition.records.get(id).map(|entry| entry.record.clone()))
            .collect())
    }

    async fn update(&self, mut record: MemoryRecord) -> Result<MemoryRecord, StorageError> {
        let Some(partition) = self.partition(&PartitionKey::of(&record)).await else {
            return Err(StorageError::NotFound(format!("record {}", record.id)));
        };
        let mut partition = partition.write().await;
        let Some(entry) = partition.records.get_mut(&record.id) else {
            return Err(StorageError::NotFound(format!("record {}", record.id)));
        };

        if record.version < entry.record.version {
            return Err(StorageError::Conflict(format!(
                "record {} was modified concurrently (version {} < {})",
                record.id, record.version, entry.record.version
            )));
        }

        // Creation time is immutable
        record.created_at = entry.record.created_at;
        record.version = entry.record.version + 1;
        record.updated_at = Utc::now();
        record.set_decay_factor(record.decay_factor);

        entry.record = record.clone();
        Ok(record)
    }

    async fn update_decay(
        &self,
        key: &PartitionKey,
        id: &str,
        decay_factor: f64,
        expected_version: u64,
    ) -> Result<bool, StorageError> {
        let Some(partition) = self.partition(key).await else {
            return Ok(false);
        };
        let mut partition = partition.write().await;
        match partition.records.get_mut(id) {
            Some(entry) if entry.record.version == expected_version => {
                entry.record.set_decay_factor(decay_factor);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, key: &PartitionKey, id: &str) -> Result<bool, StorageError> {
        let Some(partition) = self.partition(key).await else {
            return Ok(false);
        };
        let mut partition = partition.write().await;
        Ok(partition.records.remove(id).is_some())
    }

    async fn list(
        &self,
        key: &PartitionKey,
        filter: Option<&Metadata>,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Vec<MemoryRecord>, StorageError> {
        let Some(partition) = self.partition(key).await else {
            return Ok(Vec::new());
        };
        let partition = partition.read().await;
        Ok(partition
            .ordered()
            .into_iter()
            .map(|entry| &entry.record)
            .filter(|record| filter.is_none_or(|f| record.matches_filters(f)))
            .skip(offset.unwrap_or(0))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn count(&self, key: &PartitionKey) -> Result<usize, StorageError> {
        let Some(partition) = self.partition(key).await else {
            return Ok(0);
        };
        let partition = partition.read().await;
        Ok(partition.records.len())
    }

    async fn clear(&self, key: &PartitionKey) -> Result<usize, StorageError> {
        let Some(partition) = self.partition(key).await else {
            return Ok(0);
        };
        let mut partition = partition.write().await;
        let removed = partition.records.len();
        partition.records.clear();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MemoryType;

    fn record(tenant: &str, content: &str) -> MemoryRecord {
        MemoryRecord::new(tenant, content, MemoryType::Semantic)
    }

    fn key(tenant: &str) -> PartitionKey {
        PartitionKey::new(tenant, MemoryType::Semantic)
    }

    #[tokio::test]
    async fn test_insert_get_and_isolation() {
        let store = InMemoryRecordStore::new();
        let a = store.insert(record("tenant-a", "alpha")).await.unwrap();

        assert_eq!(
            store.get(&key("tenant-a"), &a.id).await.unwrap().unwrap().content,
            "alpha"
        );
        assert!(store.get(&key("tenant-b"), &a.id).await.unwrap().is_none());
        assert!(!store.delete(&key("tenant-b"), &a.id).await.unwrap());
        assert_eq!(store.count(&key("tenant-a")).await.unwrap(), 1);
        assert_eq!(store.count(&key("tenant-b")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_and_empty_tenant_rejected() {
        let store = InMemoryRecordStore::new();
        let r = store.insert(record("t", "x")).await.unwrap();
        assert!(matches!(
            store.insert(r).await,
            Err(StorageError::AlreadyExists(_))
        ));
        assert!(matches!(
            store.insert(record("  ", "x")).await,
            Err(StorageError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_capacity_is_per_tenant() {
        let store = InMemoryRecordStore::with_config(&StorageConfig {
            max_records_per_tenant: Some(2),
        });
        store.insert(record("a", "1")).await.unwrap();
        store.insert(record("a", "2")).await.unwrap();
        assert!(matches!(
            store.insert(record("a", "3")).await,
            Err(StorageError::Capacity(_))
        ));
        // Other tenants have their own quota
        store.insert(record("b", "1")).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_rejects_stale_version() {
        let store = InMemoryRecordStore::new();
        let original = store.insert(record("t", "v0")).await.unwrap();

        let mut first = original.clone();
        first.content = "v1".to_string();
        let stored = store.update(first).await.unwrap();
        assert_eq!(stored.version, 1);

        let mut stale = original.clone();
        stale.content = "lost".to_string();
        assert!(matches!(
            store.update(stale).await,
            Err(StorageError::Conflict(_))
        ));

        let current = store.get(&key("t"), &original.id).await.unwrap().unwrap();
        assert_eq!(current.content, "v1");
        assert_eq!(current.created_at, original.created_at);
    }

    #[tokio::test]
    async fn test_update_decay_checks_version() {
        let store = InMemoryRecordStore::new();
        let r = store.insert(record("t", "x")).await.unwrap();

        assert!(store.update_decay(&key("t"), &r.id, 0.4, 0).await.unwrap());
        assert!(!store.update_decay(&key("t"), &r.id, 0.1, 7).await.unwrap());
        assert!(store.update_decay(&key("t"), &r.id, 3.0, 0).await.unwrap());

        let current = store.get(&key("t"), &r.id).await.unwrap().unwrap();
        assert_eq!(current.decay_factor, 1.0);
    }

    #[tokio::test]
    async fn test_list_keeps_insertion_order_and_filters() {
        let store = InMemoryRecordStore::new();
        for i in 0..5 {
            let mut r = record("t", &format!("item {i}"));
            r.metadata
                .insert("even".to_string(), serde_json::json!(i % 2 == 0));
            store.insert(r).await.unwrap();
        }

        let all = store.list(&key("t"), None, None, None).await.unwrap();
        let contents: Vec<_> = all.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, ["item 0", "item 1", "item 2", "item 3", "item 4"]);

        let mut filter = Metadata::new();
        filter.insert("even".to_string(), serde_json::json!(true));
        let evens = store.list(&key("t"), Some(&filter), Some(2), Some(1)).await.unwrap();
        let contents: Vec<_> = evens.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, ["item 2", "item 4"]);
    }

    #[tokio::test]
    async fn test_record_access_and_clear() {
        let store = InMemoryRecordStore::new();
        let r = store.insert(record("t", "x")).await.unwrap();
        store.insert(record("other", "y")).await.unwrap();

        let touched = store.record_access(&key("t"), &r.id).await.unwrap().unwrap();
        assert_eq!(touched.access_count, 1);
        assert!(touched.last_accessed.is_some());
        // Reads do not count as writes
        assert_eq!(touched.version, 0);

        assert_eq!(store.clear(&key("t")).await.unwrap(), 1);
        assert_eq!(store.count(&key("t")).await.unwrap(), 0);
        assert_eq!(store.count(&key("other")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_layers_of_one_tenant_are_separate() {
        let store = InMemoryRecordStore::with_config(&StorageConfig {
            max_records_per_tenant: Some(1),
        });
        let fact = store.insert(record("t", "fact")).await.unwrap();
        let event = store
            .insert(MemoryRecord::new("t", "event", MemoryType::Episodic))
            .await
            .unwrap();
        let episodic = PartitionKey::new("t", MemoryType::Episodic);

        assert!(store.get(&episodic, &fact.id).await.unwrap().is_none());
        assert!(!store.delete(&episodic, &fact.id).await.unwrap());
        assert_eq!(store.count(&episodic).await.unwrap(), 1);
        assert_eq!(store.list(&episodic, None, None, None).await.unwrap()[0].id, event.id);

        // a record cannot be moved to another layer by updating it
        let mut moved = fact.clone();
        moved.memory_type = MemoryType::Episodic;
        assert!(matches!(
            store.update(moved).await,
            Err(StorageError::NotFound(_))
        ));

        assert_eq!(store.clear(&episodic).await.unwrap(), 1);
        assert_eq!(store.count(&key("t")).await.unwrap(), 1);
    }
}
