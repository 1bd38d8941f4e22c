//! Memory layers
//!
//! Every layer implements the narrow [`MemoryLayer`] contract on top of its own
//! record store and search engine. Layer-specific operations live on the
//! concrete types:
//!
//! - [`RecordLayer`]: the common capability, also used directly for procedural memory
//! - [`CoreMemory`]: agent identity, persistent context, state history and associations
//! - [`EpisodicMemory`]: timestamped events grouped into episodes
//! - [`SemanticMemory`]: facts, concepts and their relationships

pub mod core;
pub mod episodic;
pub mod record;
pub mod semantic;

pub use self::core::{AgentIdentity, CoreMemory};
pub use self::episodic::{EpisodicMemory, NewEvent};
pub use self::record::RecordLayer;
pub use self::semantic::{NewKnowledge, SemanticMemory};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::models::{
    Importance, MemoryRecord, MemoryType, Metadata, SearchQuery, SearchResult, Sensitivity,
};

/// Operations shared by every memory layer.
///
/// A layer is bound to one tenant; every record it creates is stamped with
/// that tenant and every read is restricted to it.
#[async_trait]
pub trait MemoryLayer: Send + Sync + Debug {
    /// Type of the records this layer holds
    fn memory_type(&self) -> MemoryType;

    /// Tenant this layer serves
    fn tenant_id(&self) -> &str;

    /// Store a new memory and return its id
    async fn add(&self, memory: NewMemory) -> Result<String>;

    /// Fetch a memory by id (counts as an access when configured)
    async fn get(&self, id: &str) -> Result<Option<MemoryRecord>>;

    /// Search this layer
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>>;

    /// Replace a memory; stale versions are rejected with `Conflict`
    async fn update(&self, record: MemoryRecord) -> Result<MemoryRecord>;

    /// Delete a memory, returning whether it existed
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Every memory of the layer in insertion order
    async fn list_all(&self) -> Result<Vec<MemoryRecord>>;

    /// Remove every memory of the layer
    async fn clear(&self) -> Result<()>;

    /// Number of memories held
    async fn count(&self) -> Result<usize>;

    /// Record count plus layer-specific details
    async fn stats(&self) -> Result<LayerStats>;

    /// Rebuild the search index from the store
    async fn reindex(&self, cancel: &CancellationToken) -> Result<usize>;

    /// Write a recomputed decay factor unless the record changed since `expected_version`
    async fn apply_decay(&self, id: &str, factor: f64, expected_version: u64) -> Result<bool>;
}

/// Input for [`MemoryLayer::add`]
#[derive(Debug, Clone, Default)]
pub struct NewMemory {
    pub content: String,
    pub importance: Importance,
    pub sensitivity: Sensitivity,
    pub metadata: Metadata,
    pub tags: Vec<String>,
    pub embedding: Option<Vec<f32>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl NewMemory {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn importance(mut self, importance: Importance) -> Self {
        self.importance = importance;
        self
    }

    pub fn sensitivity(mut self, sensitivity: Sensitivity) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Backdate the memory (defaults to now)
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// Statistics of a single layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayerStats {
    pub memory_type: MemoryType,
    pub total_records: usize,
    /// Layer-specific figures (episode counts, concept counts, ...)
    pub details: HashMap<String, serde_json::Value>,
}

impl LayerStats {
    pub fn new(memory_type: MemoryType, total_records: usize) -> Self {
        Self {
            memory_type,
            total_records,
            details: HashMap::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}
