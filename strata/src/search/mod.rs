//! Hybrid search module
//!
//! Every memory layer searches a partition of a [`HybridSearchEngine`] built from:
//! - a BM25 inverted index over regex-tokenized content
//! - a cosine similarity index over record embeddings
//! - a ranker that rescales both score sets and blends them with normalized weights
//!
//! # Example
//!
//! ```no_run
//! use strata::config::SearchConfig;
//! use strata::models::{MemoryRecord, MemoryType, PartitionKey, QueryType, SearchQuery};
//! use strata::search::HybridSearchEngine;
//!
//! # async fn example() -> strata::Result<()> {
//! let engine = HybridSearchEngine::new(SearchConfig::default())?;
//! let record = MemoryRecord::new("tenant", "Rust has no garbage collector", MemoryType::Semantic);
//! engine.index_record(&record).await?;
//!
//! let query = SearchQuery::new("garbage collector").query_type(QueryType::Bm25);
//! let partition = PartitionKey::of(&record);
//! for hit in engine.search(&partition, &query).await? {
//!     println!("{} {:.3}", hit.id, hit.score);
//! }
//! # Ok(())
//! # }
//! ```

pub mod bm25;
pub mod engine;
pub mod ranker;
pub mod tokenizer;
pub mod vector;

pub use bm25::Bm25Index;
pub use engine::{Embedder, HybridSearchEngine, SearchEngineStats, SearchHit};
pub use ranker::HybridRanker;
pub use vector::{VectorIndex, cosine_similarity};
