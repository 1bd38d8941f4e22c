//! # Strata
//!
//! Hierarchical memory for AI agents: Core, Episodic and Semantic layers over a
//! tenant-partitioned record store, fronted by a hybrid BM25 + vector search
//! engine and governed by a decay service that suggests (never performs)
//! eviction.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use strata::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ConfigBuilder::new().build()?;
//!     let manager = strata::init(config, "tenant-a").await?;
//!
//!     manager
//!         .add_memory("Paris is the capital of France", MemoryType::Semantic, Importance::High, Metadata::new())
//!         .await?;
//!
//!     let results = manager.search_all_layers("capital of France", QueryType::Bm25, 5).await?;
//!     for result in results {
//!         println!("{:.3} {}", result.score, result.record.content);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Layers**: each layer owns a record store and a derived search index
//! - **Manager**: per-instance registry routing adds and fanning out searches
//! - **Search**: BM25 inverted index, cosine vector index, weighted hybrid ranker
//! - **Decay**: deterministic retention model, statistics and cleanup advice
//!
//! Embeddings are brought by the caller through the [`search::Embedder`] trait;
//! persistence backends plug in behind [`storage::RecordStore`].

pub mod config;
pub mod decay;
pub mod layers;
pub mod logging;
pub mod manager;
pub mod models;
pub mod search;
pub mod storage;

/// The prelude re-exports commonly used types for convenience
pub mod prelude {
    pub use crate::init;

    pub use crate::config::{ConfigBuilder, ConfigLoader, LogLevel, StrataConfig};

    pub use crate::models::{
        Concept, Episode, EpisodeEvent, Importance, KnowledgeTriple, MemoryRecord, MemoryType,
        Metadata, NewConcept, PartitionKey, QueryType, SearchQuery, SearchResult, Sensitivity,
        TimeRange,
    };

    pub use crate::layers::{
        AgentIdentity, CoreMemory, EpisodicMemory, LayerStats, MemoryLayer, NewEvent,
        NewKnowledge, NewMemory, RecordLayer, SemanticMemory,
    };

    pub use crate::manager::{HierarchicalMemoryManager, RegisteredLayer};

    pub use crate::decay::{DecayAnalysis, DecayStatistics, DecaySweeper, MemoryDecayService};

    pub use crate::search::{Embedder, HybridSearchEngine};

    pub use crate::{Result, StrataError};
}

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error type for Strata operations
#[derive(Debug, thiserror::Error)]
pub enum StrataError {
    /// Malformed input: enums, queries, metadata or content
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown record, episode, concept or layer id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Tenant quota exceeded
    #[error("Capacity exceeded: {0}")]
    Capacity(String),

    /// Duplicate relationship, duplicate registration or stale write
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Search or decay computation failed
    #[error("Internal compute error: {0}")]
    InternalCompute(String),

    /// No layer registered for the requested memory type
    #[error(
        "No layer registered for memory type '{0}'. Register one with HierarchicalMemoryManager::register_layer"
    )]
    LayerNotRegistered(models::MemoryType),

    /// A cancellable batch job observed its cancellation token
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error raised by a record store backend
    #[error("Storage error: {0}")]
    Storage(String),

    /// Logging error
    #[error("Logging error: {0}")]
    Logging(#[from] crate::logging::LogError),
}

impl From<crate::config::ConfigError> for StrataError {
    fn from(err: crate::config::ConfigError) -> Self {
        StrataError::Configuration(err.to_string())
    }
}

/// Result type for Strata operations
pub type Result<T> = std::result::Result<T, StrataError>;

/// Initialize Strata with the provided configuration
///
/// Sets up logging and returns a manager for `tenant_id` with Core, Episodic
/// and Semantic layers registered, each backed by its own in-memory store and
/// search index. An already installed subscriber is kept; a failed logging
/// setup is reported on stderr and does not abort initialisation.
///
/// # Examples
///
/// ```rust,no_run
/// use strata::prelude::*;
///
/// async fn example() -> Result<()> {
///     let config = ConfigBuilder::new().with_log_level(LogLevel::Warn).build()?;
///     let manager = init(config, "agent-7").await?;
///     let core = manager.core().await.expect("core layer registered by init");
///     core.set_persistent_context("timezone", serde_json::json!("UTC")).await?;
///     Ok(())
/// }
/// ```
pub async fn init(
    config: config::StrataConfig,
    tenant_id: impl Into<String>,
) -> Result<manager::HierarchicalMemoryManager> {
    if let Err(e) = logging::init(&config.logging) {
        // the subscriber may not be installed, so stderr is the only sure channel
        eprintln!("strata: logging setup failed, continuing without it: {e}");
        tracing::warn!(error = %e, "Logging setup failed");
    }

    let tenant_id = tenant_id.into();
    let ranker =
        search::HybridRanker::try_new(&config.search.ranker).map_err(StrataError::Configuration)?;
    let manager = manager::HierarchicalMemoryManager::new(tenant_id.clone()).with_ranker(ranker);

    let core = layers::CoreMemory::new(tenant_id.clone(), &config)?;
    let episodic = layers::EpisodicMemory::new(tenant_id.clone(), &config)?;
    let semantic = layers::SemanticMemory::new(tenant_id.clone(), &config)?;

    manager
        .try_register_layer(
            models::MemoryType::Core,
            manager::RegisteredLayer::Core(std::sync::Arc::new(core)),
        )
        .await?;
    manager
        .try_register_layer(
            models::MemoryType::Episodic,
            manager::RegisteredLayer::Episodic(std::sync::Arc::new(episodic)),
        )
        .await?;
    manager
        .try_register_layer(
            models::MemoryType::Semantic,
            manager::RegisteredLayer::Semantic(std::sync::Arc::new(semantic)),
        )
        .await?;

    tracing::info!(tenant = %tenant_id, "Strata memory manager initialized");

    Ok(manager)
}
