//! Generic record layer

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{LayerStats, MemoryLayer, NewMemory};
use crate::config::{AccessTrackingConfig, StrataConfig};
use crate::models::record::validate_input;
use crate::models::{MemoryRecord, MemoryType, Metadata, PartitionKey, SearchQuery, SearchResult};
use crate::search::HybridSearchEngine;
use crate::storage::{InMemoryRecordStore, RecordStore};
use crate::{Result, StrataError};

/// A layer of plain records: store, search index and access tracking.
///
/// The specialised layers are built on top of it; on its own it serves
/// memory types without extra structure, such as procedural memory.
#[derive(Debug, Clone)]
pub struct RecordLayer {
    partition: PartitionKey,
    store: Arc<dyn RecordStore>,
    engine: Arc<HybridSearchEngine>,
    access_tracking: AccessTrackingConfig,
    default_limit: usize,
}

impl RecordLayer {
    /// Create a layer with its own in-memory store and search engine
    pub fn new(
        memory_type: MemoryType,
        tenant_id: impl Into<String>,
        config: &StrataConfig,
    ) -> Result<Self> {
        let store = Arc::new(InMemoryRecordStore::with_config(&config.storage));
        let engine = Arc::new(HybridSearchEngine::new(config.search.clone())?);
        Self::with_parts(memory_type, tenant_id, store, engine, config)
    }

    /// Create a layer over an existing store and engine.
    ///
    /// Both may be shared with other layers, of this tenant or another; each
    /// layer only sees the partition of its tenant and memory type.
    pub fn with_parts(
        memory_type: MemoryType,
        tenant_id: impl Into<String>,
        store: Arc<dyn RecordStore>,
        engine: Arc<HybridSearchEngine>,
        config: &StrataConfig,
    ) -> Result<Self> {
        let tenant_id = tenant_id.into();
        if tenant_id.trim().is_empty() {
            return Err(StrataError::Validation(
                "tenant id cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            partition: PartitionKey::new(tenant_id, memory_type),
            store,
            engine,
            access_tracking: config.access_tracking.clone(),
            default_limit: config.search.default_limit,
        })
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn engine(&self) -> &Arc<HybridSearchEngine> {
        &self.engine
    }

    pub fn partition(&self) -> &PartitionKey {
        &self.partition
    }

    /// Build an unsaved record of this layer's type and tenant
    pub(crate) fn build_record(&self, memory: NewMemory) -> Result<MemoryRecord> {
        validate_input(&memory.content, &memory.metadata)?;

        let partition = &self.partition;
        let mut builder =
            MemoryRecord::builder(&partition.tenant_id, memory.content, partition.memory_type)
                .importance(memory.importance)
                .sensitivity(memory.sensitivity)
                .metadata(memory.metadata);
        for tag in memory.tags {
            builder = builder.tag(tag);
        }
        if let Some(created_at) = memory.created_at {
            builder = builder.created_at(created_at);
        }
        if let Some(embedding) = memory.embedding {
            builder = builder.embedding(embedding);
        }
        Ok(builder.build())
    }

    /// Store and index a record, stamping it with this layer's tenant and type
    pub(crate) async fn insert_record(&self, mut record: MemoryRecord) -> Result<MemoryRecord> {
        record.tenant_id = self.partition.tenant_id.clone();
        record.memory_type = self.partition.memory_type;
        validate_input(&record.content, &record.metadata)?;

        let stored = self.store.insert(record).await?;
        if let Err(e) = self.engine.index_record(&stored).await {
            // Keep store and index consistent
            self.store.delete(&self.partition, &stored.id).await?;
            return Err(e);
        }

        debug!(
            partition = %self.partition,
            record_id = %stored.id,
            "Stored memory"
        );
        Ok(stored)
    }

    /// Fetch a record without counting an access
    pub async fn peek(&self, id: &str) -> Result<Option<MemoryRecord>> {
        Ok(self.store.get(&self.partition, id).await?)
    }

    /// Fetch a record, failing with `NotFound` when it does not exist
    pub(crate) async fn require(&self, id: &str) -> Result<MemoryRecord> {
        self.peek(id).await?.ok_or_else(|| {
            StrataError::NotFound(format!("{} memory {}", self.partition.memory_type, id))
        })
    }

    /// Records matching every metadata filter, in insertion order
    pub async fn find_by_metadata(&self, filters: &Metadata) -> Result<Vec<MemoryRecord>> {
        Ok(self
            .store
            .list(&self.partition, Some(filters), None, None)
            .await?)
    }

    /// Search with the configured default result limit
    pub async fn search_text(&self, text: &str) -> Result<Vec<SearchResult>> {
        self.search(&SearchQuery::new(text).limit(self.default_limit))
            .await
    }
}

#[async_trait]
impl MemoryLayer for RecordLayer {
    fn memory_type(&self) -> MemoryType {
        self.partition.memory_type
    }

    fn tenant_id(&self) -> &str {
        &self.partition.tenant_id
    }

    async fn add(&self, memory: NewMemory) -> Result<String> {
        let record = self.build_record(memory)?;
        Ok(self.insert_record(record).await?.id)
    }

    async fn get(&self, id: &str) -> Result<Option<MemoryRecord>> {
        if self.access_tracking.update_on_get {
            Ok(self.store.record_access(&self.partition, id).await?)
        } else {
            self.peek(id).await
        }
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>> {
        let hits = self.engine.search(&self.partition, query).await?;
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = hits.iter().map(|hit| hit.id.clone()).collect();
        let records = self.store.get_many(&self.partition, &ids).await?;
        let mut by_id: std::collections::HashMap<String, MemoryRecord> = records
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let Some(mut record) = by_id.remove(&hit.id) else {
                // Deleted between ranking and fetching
                continue;
            };
            if self.access_tracking.update_on_search
                && let Some(touched) = self.store.record_access(&self.partition, &hit.id).await?
            {
                record = touched;
            }
            results.push(SearchResult::new(record, hit.score).with_raw(hit.raw));
        }
        Ok(results)
    }

    async fn update(&self, mut record: MemoryRecord) -> Result<MemoryRecord> {
        if record.tenant_id != self.partition.tenant_id {
            return Err(StrataError::NotFound(format!(
                "{} memory {}",
                self.partition.memory_type, record.id
            )));
        }
        validate_input(&record.content, &record.metadata)?;
        record.memory_type = self.partition.memory_type;

        let updated = self.store.update(record).await?;
        self.engine.index_record(&updated).await?;
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let removed = self.store.delete(&self.partition, id).await?;
        self.engine.remove_record(&self.partition, id).await;
        Ok(removed)
    }

    async fn list_all(&self) -> Result<Vec<MemoryRecord>> {
        Ok(self.store.list(&self.partition, None, None, None).await?)
    }

    async fn clear(&self) -> Result<()> {
        let removed = self.store.clear(&self.partition).await?;
        self.engine.clear_partition(&self.partition).await;
        debug!(partition = %self.partition, removed, "Cleared layer");
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.store.count(&self.partition).await?)
    }

    async fn stats(&self) -> Result<LayerStats> {
        let records = self.list_all().await?;
        let indexed = self.engine.document_count(&self.partition).await;
        let average_decay = if records.is_empty() {
            1.0
        } else {
            records.iter().map(|r| r.decay_factor).sum::<f64>() / records.len() as f64
        };
        Ok(LayerStats::new(self.partition.memory_type, records.len())
            .with_detail("indexed_records", indexed)
            .with_detail("average_decay_factor", average_decay))
    }

    async fn reindex(&self, cancel: &CancellationToken) -> Result<usize> {
        // the snapshot is read only once the engine journals concurrent writes
        let indexed = self
            .engine
            .rebuild(&self.partition, self.list_all(), cancel)
            .await?;
        let stored = self.count().await?;
        if indexed != stored {
            warn!(
                partition = %self.partition,
                indexed,
                stored,
                "Reindexed partition does not match the store"
            );
        }
        Ok(indexed)
    }

    async fn apply_decay(&self, id: &str, factor: f64, expected_version: u64) -> Result<bool> {
        Ok(self
            .store
            .update_decay(&self.partition, id, factor, expected_version)
            .await?)
    }
}
