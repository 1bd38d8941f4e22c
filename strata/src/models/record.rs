//! Record model representing a single stored memory

use crate::{Result, StrataError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Open, string-keyed metadata attached to a record
pub type Metadata = HashMap<String, serde_json::Value>;

/// Maximum accepted length of a metadata key
pub const MAX_METADATA_KEY_LEN: usize = 128;

/// Memory layers a record can belong to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    /// Agent identity, persistent context and state snapshots
    Core,
    /// Time-ordered events grouped into episodes
    Episodic,
    /// Facts, concepts and their relationships
    Semantic,
    /// Skills and procedures
    Procedural,
}

impl MemoryType {
    /// All memory types, in declaration order
    pub const ALL: [MemoryType; 4] = [
        MemoryType::Core,
        MemoryType::Episodic,
        MemoryType::Semantic,
        MemoryType::Procedural,
    ];

    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Episodic => "episodic",
            Self::Semantic => "semantic",
            Self::Procedural => "procedural",
        }
    }

    /// Rank used to break score ties when merging results across layers.
    /// Lower ranks come first.
    pub fn tie_break_rank(&self) -> u8 {
        match self {
            Self::Core => 0,
            Self::Semantic => 1,
            Self::Procedural => 2,
            Self::Episodic => 3,
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryType {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "core" => Ok(Self::Core),
            "episodic" => Ok(Self::Episodic),
            "semantic" => Ok(Self::Semantic),
            "procedural" => Ok(Self::Procedural),
            other => Err(StrataError::Validation(format!(
                "unknown memory type '{}'",
                other
            ))),
        }
    }
}

/// Tenant and layer a record lives under.
///
/// Stores and search engines key their partitions by it, so layers of one
/// tenant can share a store without seeing each other's records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionKey {
    pub tenant_id: String,
    pub memory_type: MemoryType,
}

impl PartitionKey {
    pub fn new(tenant_id: impl Into<String>, memory_type: MemoryType) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            memory_type,
        }
    }

    /// Partition a record belongs to
    pub fn of(record: &MemoryRecord) -> Self {
        Self::new(record.tenant_id.clone(), record.memory_type)
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant_id, self.memory_type)
    }
}

/// Importance levels, ordered `Low < Medium < High < Critical`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    /// Low importance memory
    Low = 0,

    /// Default importance
    Medium = 1,

    /// High importance memory
    High = 2,

    /// Critical importance memory, never suggested for cleanup
    Critical = 3,
}

impl Default for Importance {
    fn default() -> Self {
        Self::Medium
    }
}

impl Importance {
    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Importance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Importance {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" | "normal" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(StrataError::Validation(format!(
                "unknown importance '{}'",
                other
            ))),
        }
    }
}

/// Data sensitivity classification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    /// Safe to share
    Public,
    /// Internal to the tenant
    #[default]
    Internal,
    /// Confidential material
    Confidential,
    /// Restricted material
    Restricted,
}

impl FromStr for Sensitivity {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "internal" => Ok(Self::Internal),
            "confidential" => Ok(Self::Confidential),
            "restricted" => Ok(Self::Restricted),
            other => Err(StrataError::Validation(format!(
                "unknown sensitivity '{}'",
                other
            ))),
        }
    }
}

/// The atomic stored unit of every memory layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryRecord {
    /// Unique identifier within the tenant
    pub id: String,

    /// The actual content of the memory
    pub content: String,

    /// Open metadata
    pub metadata: Metadata,

    /// Tags associated with the record
    pub tags: Vec<String>,

    /// Owning tenant, stamped at write time
    pub tenant_id: String,

    /// When the record was created
    pub created_at: DateTime<Utc>,

    /// When the record was last written
    pub updated_at: DateTime<Utc>,

    /// Layer the record belongs to
    pub memory_type: MemoryType,

    /// Importance of the record
    pub importance: Importance,

    /// Sensitivity classification
    pub sensitivity: Sensitivity,

    /// How many times the record has been read
    pub access_count: u64,

    /// When the record was last read
    pub last_accessed: Option<DateTime<Utc>>,

    /// Retention score in `[0, 1]`
    pub decay_factor: f64,

    /// Write counter used to detect stale updates
    pub version: u64,

    /// Vector embedding if available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl MemoryRecord {
    /// Create a new record with default importance and a fresh id
    pub fn new(
        tenant_id: impl Into<String>,
        content: impl Into<String>,
        memory_type: MemoryType,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            metadata: Metadata::new(),
            tags: Vec::new(),
            tenant_id: tenant_id.into(),
            created_at: now,
            updated_at: now,
            memory_type,
            importance: Importance::default(),
            sensitivity: Sensitivity::default(),
            access_count: 0,
            last_accessed: None,
            decay_factor: 1.0,
            version: 0,
            embedding: None,
        }
    }

    /// Create a builder for more complex record creation
    pub fn builder(
        tenant_id: impl Into<String>,
        content: impl Into<String>,
        memory_type: MemoryType,
    ) -> RecordBuilder {
        RecordBuilder {
            record: Self::new(tenant_id, content, memory_type),
        }
    }

    /// Record a read of this memory
    pub fn record_access(&mut self) {
        self.last_accessed = Some(Utc::now());
        self.access_count = self.access_count.saturating_add(1);
    }

    /// Reset access tracking
    pub fn reset_access(&mut self) {
        self.access_count = 0;
        self.last_accessed = None;
    }

    /// Set the decay factor, clamped to `[0, 1]`. Non-finite values become 0.
    pub fn set_decay_factor(&mut self, factor: f64) {
        self.decay_factor = if factor.is_finite() {
            factor.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    /// Add a tag if it is not present yet
    pub fn add_tag(&mut self, tag: &str) {
        if !self.tags.iter().any(|t| t == tag) {
            self.tags.push(tag.to_string());
        }
    }

    /// Check whether a tag is present
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Read a string metadata value
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }

    /// Whether every filter entry matches a metadata value exactly
    pub fn matches_filters(&self, filters: &Metadata) -> bool {
        filters
            .iter()
            .all(|(key, expected)| self.metadata.get(key) == Some(expected))
    }

    /// Last time the record was touched by a reader, or its creation time
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_accessed.unwrap_or(self.created_at)
    }
}

/// Builder for creating `MemoryRecord` instances
pub struct RecordBuilder {
    record: MemoryRecord,
}

impl RecordBuilder {
    /// Set the importance
    pub fn importance(mut self, importance: Importance) -> Self {
        self.record.importance = importance;
        self
    }

    /// Set the sensitivity
    pub fn sensitivity(mut self, sensitivity: Sensitivity) -> Self {
        self.record.sensitivity = sensitivity;
        self
    }

    /// Replace the metadata map
    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.record.metadata = metadata;
        self
    }

    /// Set a single metadata entry
    pub fn meta(mut self, key: &str, value: serde_json::Value) -> Self {
        self.record.metadata.insert(key.to_string(), value);
        self
    }

    /// Add a tag
    pub fn tag<S: Into<String>>(mut self, tag: S) -> Self {
        let tag = tag.into();
        self.record.add_tag(&tag);
        self
    }

    /// Replace the tags
    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.record.tags = tags;
        self
    }

    /// Set the creation timestamp (also used as the initial update time)
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.record.created_at = created_at;
        self.record.updated_at = created_at;
        self
    }

    /// Set the embedding vector
    pub fn embedding(mut self, embedding: Vec<f32>) -> Self {
        self.record.embedding = Some(embedding);
        self
    }

    /// Build the final record
    pub fn build(self) -> MemoryRecord {
        self.record
    }
}

/// Validate content and metadata at the API boundary
pub fn validate_input(content: &str, metadata: &Metadata) -> Result<()> {
    if content.trim().is_empty() {
        return Err(StrataError::Validation(
            "memory content cannot be empty".to_string(),
        ));
    }
    validate_metadata(metadata)
}

/// Validate metadata keys
pub fn validate_metadata(metadata: &Metadata) -> Result<()> {
    for key in metadata.keys() {
        if key.trim().is_empty() {
            return Err(StrataError::Validation(
                "metadata keys cannot be empty".to_string(),
            ));
        }
        if key.len() > MAX_METADATA_KEY_LEN {
            return Err(StrataError::Validation(format!(
                "metadata key '{}…' exceeds {} characters",
                &key[..key.char_indices().nth(16).map(|(i, _)| i).unwrap_or(key.len())],
                MAX_METADATA_KEY_LEN
            )));
        }
    }
    Ok(())
}
