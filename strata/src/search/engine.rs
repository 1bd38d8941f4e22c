//! Hybrid search engine over BM25 and vector indexes partitioned by tenant and layer

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::SearchConfig;
use crate::models::{MemoryRecord, Metadata, PartitionKey, QueryType, RawScores, SearchQuery};
use crate::search::bm25::Bm25Index;
use crate::search::ranker::{HybridRanker, normalize_scores};
use crate::search::vector::VectorIndex;
use crate::{Result, StrataError};

/// Source of embeddings for records and queries.
///
/// Model choice is up to the caller; the engine only needs vectors of a
/// consistent dimension.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a piece of text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// A ranked record id
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    /// Score in `[0, 1]`, rescaled against the best hit of the partition
    pub score: f32,
    /// Backend scores before rescaling
    pub raw: RawScores,
}

/// Index statistics reported by [`HybridSearchEngine::get_stats`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchEngineStats {
    pub tenants: usize,
    pub partitions: usize,
    pub bm25_documents: usize,
    pub vector_documents: usize,
    pub vocabulary_size: usize,
    pub k1: f32,
    pub b: f32,
    pub bm25_weight: f32,
    pub vector_weight: f32,
}

#[derive(Debug, Clone)]
struct IndexedDoc {
    metadata: Metadata,
    created_at: DateTime<Utc>,
    version: u64,
    seq: u64,
}

#[derive(Debug)]
struct PartitionIndex {
    bm25: Bm25Index,
    vectors: VectorIndex,
    docs: HashMap<String, IndexedDoc>,
}

impl PartitionIndex {
    fn new(config: &SearchConfig) -> Self {
        Self {
            bm25: Bm25Index::new(config.bm25),
            vectors: VectorIndex::new(),
            docs: HashMap::new(),
        }
    }

    fn remove(&mut self, id: &str) -> bool {
        self.bm25.remove(id);
        self.vectors.remove(id);
        self.docs.remove(id).is_some()
    }
}

/// An index write made while a rebuild of the same partition was running
#[derive(Debug, Clone)]
enum PendingWrite {
    Index {
        record: MemoryRecord,
        embedding: Option<Vec<f32>>,
    },
    Remove(String),
    Clear,
}

/// Writes to replay onto a rebuilt partition before it is swapped in.
///
/// `active` counts the rebuilds of the partition in flight; the journal is
/// dropped when the last of them finishes.
#[derive(Debug, Default)]
struct RebuildJournal {
    active: usize,
    writes: Vec<PendingWrite>,
}

#[derive(Debug, Default)]
struct EngineState {
    indexes: HashMap<PartitionKey, PartitionIndex>,
    journals: HashMap<PartitionKey, RebuildJournal>,
}

impl EngineState {
    fn journal(&mut self, key: &PartitionKey, write: impl FnOnce() -> PendingWrite) {
        if let Some(journal) = self.journals.get_mut(key) {
            journal.writes.push(write());
        }
    }

    fn close_journal(&mut self, key: &PartitionKey) -> Vec<PendingWrite> {
        let Some(journal) = self.journals.get_mut(key) else {
            return Vec::new();
        };
        journal.active = journal.active.saturating_sub(1);
        if journal.active == 0 {
            self.journals
                .remove(key)
                .map(|journal| journal.writes)
                .unwrap_or_default()
        } else {
            journal.writes.clone()
        }
    }
}

/// Lexical + vector search engine.
///
/// The indexes are a derived view of a layer's store: they hold no content,
/// only terms, embeddings and the metadata needed for filtering, and can be
/// rebuilt from the store at any time. Partitions are keyed by tenant and
/// memory type, so one engine can serve several layers.
pub struct HybridSearchEngine {
    config: SearchConfig,
    ranker: HybridRanker,
    embedder: Option<Arc<dyn Embedder>>,
    state: RwLock<EngineState>,
    next_seq: AtomicU64,
}

impl std::fmt::Debug for HybridSearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridSearchEngine")
            .field("config", &self.config)
            .field("ranker", &self.ranker)
            .field("has_embedder", &self.embedder.is_some())
            .finish()
    }
}

impl HybridSearchEngine {
    /// Create an engine without an embedder (vector search only works for
    /// records and queries that carry their own embeddings)
    pub fn new(config: SearchConfig) -> Result<Self> {
        let ranker = HybridRanker::try_new(&config.ranker).map_err(StrataError::Configuration)?;
        Ok(Self {
            config,
            ranker,
            embedder: None,
            state: RwLock::new(EngineState::default()),
            next_seq: AtomicU64::new(0),
        })
    }

    /// Attach an embedder used for records and queries without embeddings
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn ranker(&self) -> &HybridRanker {
        &self.ranker
    }

    async fn record_embedding(&self, record: &MemoryRecord) -> Option<Vec<f32>> {
        if let Some(embedding) = &record.embedding {
            return Some(embedding.clone());
        }
        let embedder = self.embedder.as_ref()?;
        match embedder.embed(&record.content).await {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                warn!(record_id = %record.id, error = %e, "Embedding failed, indexing lexically only");
                None
            }
        }
    }

    /// Index (or re-index) a record under its tenant and memory type.
    ///
    /// A record older than the indexed version of the same id is ignored.
    pub async fn index_record(&self, record: &MemoryRecord) -> Result<()> {
        let embedding = self.record_embedding(record).await;
        let key = PartitionKey::of(record);

        let mut state = self.state.write().await;
        state.journal(&key, || PendingWrite::Index {
            record: record.clone(),
            embedding: embedding.clone(),
        });
        let index = state
            .indexes
            .entry(key)
            .or_insert_with(|| PartitionIndex::new(&self.config));
        Self::insert_into(index, record, embedding, &self.next_seq);
        Ok(())
    }

    fn insert_into(
        index: &mut PartitionIndex,
        record: &MemoryRecord,
        embedding: Option<Vec<f32>>,
        next_seq: &AtomicU64,
    ) {
        let seq = match index.docs.get(&record.id) {
            Some(doc) if doc.version > record.version => {
                debug!(
                    record_id = %record.id,
                    indexed = doc.version,
                    offered = record.version,
                    "Ignoring stale index write"
                );
                return;
            }
            Some(doc) => doc.seq,
            None => next_seq.fetch_add(1, Ordering::Relaxed),
        };

        index.bm25.add(&record.id, &record.content);
        match embedding {
            Some(embedding) => index.vectors.add(&record.id, embedding),
            None => {
                index.vectors.remove(&record.id);
            }
        }
        index.docs.insert(
            record.id.clone(),
            IndexedDoc {
                metadata: record.metadata.clone(),
                created_at: record.created_at,
                version: record.version,
                seq,
            },
        );
    }

    /// Remove a record from a partition
    pub async fn remove_record(&self, key: &PartitionKey, id: &str) -> bool {
        let mut state = self.state.write().await;
        state.journal(key, || PendingWrite::Remove(id.to_string()));
        state
            .indexes
            .get_mut(key)
            .is_some_and(|index| index.remove(id))
    }

    /// Drop every indexed document of a partition
    pub async fn clear_partition(&self, key: &PartitionKey) {
        let mut state = self.state.write().await;
        state.journal(key, || PendingWrite::Clear);
        state.indexes.remove(key);
    }

    /// Number of documents indexed in a partition
    pub async fn document_count(&self, key: &PartitionKey) -> usize {
        self.state
            .read()
            .await
            .indexes
            .get(key)
            .map_or(0, |index| index.docs.len())
    }

    /// Rebuild a partition from a snapshot of its records.
    ///
    /// Index writes to the partition are journaled from the start of the
    /// rebuild, before `snapshot` is awaited, and replayed onto the fresh
    /// index when it is swapped in, so writers running alongside are never
    /// lost. Records are embedded and indexed in batches of
    /// `index_batch_size`; the cancellation token is checked between batches.
    /// A cancelled rebuild leaves the previous index untouched.
    pub async fn rebuild<F>(
        &self,
        key: &PartitionKey,
        snapshot: F,
        cancel: &CancellationToken,
    ) -> Result<usize>
    where
        F: Future<Output = Result<Vec<MemoryRecord>>>,
    {
        self.state
            .write()
            .await
            .journals
            .entry(key.clone())
            .or_default()
            .active += 1;

        let built = self.build_partition(key, snapshot, cancel).await;

        let mut state = self.state.write().await;
        let pending = state.close_journal(key);
        let mut fresh = built?;

        let replayed = pending.len();
        for write in pending {
            match write {
                PendingWrite::Index { record, embedding } => {
                    Self::insert_into(&mut fresh, &record, embedding, &self.next_seq)
                }
                PendingWrite::Remove(id) => {
                    fresh.remove(&id);
                }
                PendingWrite::Clear => fresh = PartitionIndex::new(&self.config),
            }
        }

        let indexed = fresh.docs.len();
        state.indexes.insert(key.clone(), fresh);
        debug!(partition = %key, indexed, replayed, "Search index rebuilt");
        Ok(indexed)
    }

    async fn build_partition<F>(
        &self,
        key: &PartitionKey,
        snapshot: F,
        cancel: &CancellationToken,
    ) -> Result<PartitionIndex>
    where
        F: Future<Output = Result<Vec<MemoryRecord>>>,
    {
        let records = snapshot.await?;
        let mut fresh = PartitionIndex::new(&self.config);
        let batch_size = self.config.index_batch_size.max(1);

        for batch in records.chunks(batch_size) {
            if cancel.is_cancelled() {
                return Err(StrataError::Cancelled(format!(
                    "index rebuild for partition {}",
                    key
                )));
            }
            for record in batch
                .iter()
                .filter(|r| r.tenant_id == key.tenant_id && r.memory_type == key.memory_type)
            {
                let embedding = self.record_embedding(record).await;
                Self::insert_into(&mut fresh, record, embedding, &self.next_seq);
            }
            tokio::task::yield_now().await;
        }
        Ok(fresh)
    }

    async fn query_embedding(&self, query: &SearchQuery) -> Result<Option<Vec<f32>>> {
        if let Some(embedding) = &query.embedding {
            return Ok(Some(embedding.clone()));
        }
        match &self.embedder {
            Some(embedder) if !query.text.trim().is_empty() => {
                embedder.embed(&query.text).await.map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Rank a partition's documents against a query.
    ///
    /// Scores are in `[0, 1]`, rescaled against the best hit of this
    /// partition; each hit also carries the raw backend scores so results of
    /// several partitions can be put on one scale. Zero scores are dropped.
    /// Ties are broken by newer creation time first, then by earlier insertion.
    pub async fn search(&self, key: &PartitionKey, query: &SearchQuery) -> Result<Vec<SearchHit>> {
        query.validate()?;

        let mut strategy = query.query_type.resolve();
        let embedding = match strategy {
            QueryType::Vector => Some(self.query_embedding(query).await?.ok_or_else(|| {
                StrataError::Validation(
                    "vector search requires a query embedding or a configured embedder"
                        .to_string(),
                )
            })?),
            QueryType::Hybrid => match self.query_embedding(query).await {
                Ok(Some(embedding)) => Some(embedding),
                Ok(None) => {
                    debug!("No query embedding available, hybrid search falls back to BM25");
                    strategy = QueryType::Bm25;
                    None
                }
                Err(e) => {
                    warn!(error = %e, "Query embedding failed, hybrid search falls back to BM25");
                    strategy = QueryType::Bm25;
                    None
                }
            },
            _ => None,
        };

        let state = self.state.read().await;
        let Some(index) = state.indexes.get(key) else {
            return Ok(Vec::new());
        };

        let admitted = |id: &String| {
            index
                .docs
                .get(id)
                .is_some_and(|doc| doc.metadata_matches(&query.filters))
        };

        let lexical = if strategy == QueryType::Vector || query.text.trim().is_empty() {
            HashMap::new()
        } else {
            let mut scores = index.bm25.search(&query.text);
            scores.retain(|id, _| admitted(id));
            scores
        };
        let vector: HashMap<String, f32> = match embedding.as_deref() {
            Some(embedding) => index
                .vectors
                .search(embedding)
                .into_iter()
                .filter(|(id, _)| admitted(id))
                .map(|(id, score)| (id, score.max(0.0)))
                .collect(),
            None => HashMap::new(),
        };

        let scores = match strategy {
            QueryType::Vector => vector.clone(),
            QueryType::Hybrid => self.ranker.combine(&lexical, &vector),
            _ => normalize_scores(&lexical),
        };

        let min_score = query.min_score.unwrap_or(0.0);
        let mut hits = Vec::with_capacity(scores.len());
        for (id, score) in scores {
            if !score.is_finite() {
                return Err(StrataError::InternalCompute(format!(
                    "non-finite score for record {}",
                    id
                )));
            }
            if score > 0.0 && score >= min_score {
                let raw = RawScores {
                    bm25: lexical.get(&id).copied(),
                    vector: vector.get(&id).copied(),
                };
                hits.push(SearchHit {
                    id,
                    score: score.min(1.0),
                    raw,
                });
            }
        }

        hits.sort_by(|a, b| {
            let a_doc = &index.docs[&a.id];
            let b_doc = &index.docs[&b.id];
            b.score
                .total_cmp(&a.score)
                .then_with(|| b_doc.created_at.cmp(&a_doc.created_at))
                .then_with(|| a_doc.seq.cmp(&b_doc.seq))
        });
        hits.truncate(query.limit);
        Ok(hits)
    }

    /// Index statistics across every partition
    pub async fn get_stats(&self) -> SearchEngineStats {
        let state = self.state.read().await;
        let indexes = &state.indexes;
        SearchEngineStats {
            tenants: indexes
                .keys()
                .map(|key| key.tenant_id.as_str())
                .collect::<HashSet<_>>()
                .len(),
            partitions: indexes.len(),
            bm25_documents: indexes.values().map(|i| i.bm25.len()).sum(),
            vector_documents: indexes.values().map(|i| i.vectors.len()).sum(),
            vocabulary_size: indexes.values().map(|i| i.bm25.vocabulary_size()).sum(),
            k1: self.config.bm25.k1,
            b: self.config.bm25.b,
            bm25_weight: self.ranker.bm25_weight(),
            vector_weight: self.ranker.vector_weight(),
        }
    }
}

impl IndexedDoc {
    fn metadata_matches(&self, filters: &Metadata) -> bool {
        filters
            .iter()
            .all(|(key, expected)| self.metadata.get(key) == Some(expected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MemoryType;
    use chrono::Duration;

    fn engine() -> HybridSearchEngine {
        HybridSearchEngine::new(SearchConfig::default()).unwrap()
    }

    fn record(tenant: &str, content: &str) -> MemoryRecord {
        MemoryRecord::new(tenant, content, MemoryType::Semantic)
    }

    fn key(tenant: &str) -> PartitionKey {
        PartitionKey::new(tenant, MemoryType::Semantic)
    }

    async fn snapshot(records: &[MemoryRecord]) -> Result<Vec<MemoryRecord>> {
        Ok(records.to_vec())
    }

    #[tokio::test]
    async fn test_bm25_search_ranks_and_bounds_scores() {
        let engine = engine();
        let paris = record("t", "Paris is the capital of France");
        let berlin = record("t", "Berlin is the capital of Germany");
        let cats = record("t", "Cats sleep most of the day");
        for r in [&paris, &berlin, &cats] {
            engine.index_record(r).await.unwrap();
        }

        let query = SearchQuery::new("capital of France").query_type(QueryType::Bm25);
        let hits = engine.search(&key("t"), &query).await.unwrap();

        assert_eq!(hits[0].id, paris.id);
        assert_eq!(hits[0].score, 1.0);
        // the unscaled Okapi score travels with the hit
        assert!(hits[0].raw.bm25.is_some_and(|raw| raw > hits[1].raw.bm25.unwrap_or(0.0)));
        assert!(hits.iter().all(|h| h.score > 0.0 && h.score <= 1.0));
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_tenants_are_isolated() {
        let engine = engine();
        engine.index_record(&record("a", "shared secret")).await.unwrap();

        let query = SearchQuery::new("secret").query_type(QueryType::Bm25);
        assert_eq!(engine.search(&key("a"), &query).await.unwrap().len(), 1);
        assert!(engine.search(&key("b"), &query).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_filters_limit_and_min_score() {
        let engine = engine();
        for i in 0..6 {
            let mut r = record("t", &format!("rust note number {i}"));
            r.metadata
                .insert("topic".to_string(), serde_json::json!(if i < 4 { "lang" } else { "misc" }));
            engine.index_record(&r).await.unwrap();
        }

        let query = SearchQuery::new("rust")
            .query_type(QueryType::Bm25)
            .filter("topic", serde_json::json!("lang"))
            .limit(3);
        assert_eq!(engine.search(&key("t"), &query).await.unwrap().len(), 3);

        let query = SearchQuery::new("rust")
            .query_type(QueryType::Bm25)
            .filter("topic", serde_json::json!("misc"));
        assert_eq!(engine.search(&key("t"), &query).await.unwrap().len(), 2);

        let query = SearchQuery::new("rust number 5")
            .query_type(QueryType::Bm25)
            .min_score(0.99);
        assert_eq!(engine.search(&key("t"), &query).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ties_prefer_newer_records() {
        let engine = engine();
        let now = Utc::now();
        let old = MemoryRecord::builder("t", "same words", MemoryType::Episodic)
            .created_at(now - Duration::hours(2))
            .build();
        let new = MemoryRecord::builder("t", "same words", MemoryType::Episodic)
            .created_at(now)
            .build();
        engine.index_record(&old).await.unwrap();
        engine.index_record(&new).await.unwrap();

        let episodic = PartitionKey::new("t", MemoryType::Episodic);
        let hits = engine
            .search(&episodic, &SearchQuery::new("same").query_type(QueryType::Bm25))
            .await
            .unwrap();
        assert_eq!(hits[0].id, new.id);
        assert_eq!(hits[1].id, old.id);
    }

    #[tokio::test]
    async fn test_vector_search_requires_embedding() {
        let engine = engine();
        let r = MemoryRecord::builder("t", "north", MemoryType::Semantic)
            .embedding(vec![1.0, 0.0])
            .build();
        engine.index_record(&r).await.unwrap();

        let query = SearchQuery::new("north").query_type(QueryType::Vector);
        assert!(matches!(
            engine.search(&key("t"), &query).await,
            Err(StrataError::Validation(_))
        ));

        let query = SearchQuery::new("")
            .query_type(QueryType::Vector)
            .embedding(vec![0.9, 0.1]);
        let hits = engine.search(&key("t"), &query).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].score > 0.9);
    }

    #[tokio::test]
    async fn test_hybrid_without_embedding_degrades_to_bm25() {
        let engine = engine();
        engine.index_record(&record("t", "hybrid fallback")).await.unwrap();

        let hits = engine
            .search(&key("t"), &SearchQuery::new("fallback"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].score, 1.0);
        assert!(hits[0].raw.bm25.is_some());
        assert_eq!(hits[0].raw.vector, None);
    }

    #[tokio::test]
    async fn test_hybrid_uses_embedder() {
        let mut embedder = MockEmbedder::new();
        embedder.expect_embed().returning(|text| {
            Ok(if text.contains("ocean") {
                vec![1.0, 0.0]
            } else {
                vec![0.0, 1.0]
            })
        });
        let engine = engine().with_embedder(Arc::new(embedder));

        let sea = record("t", "the ocean is deep");
        let desert = record("t", "sand dunes everywhere");
        engine.index_record(&sea).await.unwrap();
        engine.index_record(&desert).await.unwrap();

        let hits = engine
            .search(&key("t"), &SearchQuery::new("ocean").query_type(QueryType::Hybrid))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, sea.id);
        assert!((hits[0].score - 1.0).abs() < 1e-6);

        let stats = engine.get_stats().await;
        assert_eq!(stats.vector_documents, 2);
        assert_eq!(stats.bm25_weight, 0.5);
    }

    #[tokio::test]
    async fn test_failing_embedder_falls_back() {
        let mut embedder = MockEmbedder::new();
        embedder
            .expect_embed()
            .returning(|_| Err(StrataError::InternalCompute("model offline".to_string())));
        let engine = engine().with_embedder(Arc::new(embedder));

        engine.index_record(&record("t", "still searchable")).await.unwrap();
        let hits = engine
            .search(&key("t"), &SearchQuery::new("searchable"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(engine.get_stats().await.vector_documents, 0);
    }

    #[tokio::test]
    async fn test_remove_clear_and_rebuild() {
        let engine = engine();
        let records: Vec<_> = (0..10)
            .map(|i| record("t", &format!("document {i}")))
            .collect();
        for r in &records {
            engine.index_record(r).await.unwrap();
        }

        assert!(engine.remove_record(&key("t"), &records[0].id).await);
        assert!(!engine.remove_record(&key("other"), &records[1].id).await);
        assert_eq!(engine.document_count(&key("t")).await, 9);

        engine.clear_partition(&key("t")).await;
        assert_eq!(engine.document_count(&key("t")).await, 0);

        let indexed = engine
            .rebuild(&key("t"), snapshot(&records), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(indexed, 10);

        let cancelled = CancellationToken::new();
        cancelled.cancel();
        assert!(matches!(
            engine.rebuild(&key("t"), snapshot(&records[..3]), &cancelled).await,
            Err(StrataError::Cancelled(_))
        ));
        assert_eq!(engine.document_count(&key("t")).await, 10);
    }

    #[tokio::test]
    async fn test_invalid_query_rejected() {
        let engine = engine();
        assert!(engine.search(&key("t"), &SearchQuery::new("")).await.is_err());
        assert!(
            engine.search(&key("t"), &SearchQuery::new("x").limit(0))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_layers_of_one_tenant_have_separate_partitions() {
        let engine = engine();
        engine.index_record(&record("t", "quarterly planning")).await.unwrap();
        let event = MemoryRecord::new("t", "quarterly planning meeting", MemoryType::Episodic);
        engine.index_record(&event).await.unwrap();
        let episodic = PartitionKey::new("t", MemoryType::Episodic);

        let query = SearchQuery::new("planning").query_type(QueryType::Bm25);
        let hits = engine.search(&episodic, &query).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, event.id);

        engine.clear_partition(&episodic).await;
        assert_eq!(engine.document_count(&key("t")).await, 1);

        let stats = engine.get_stats().await;
        assert_eq!(stats.tenants, 1);
        assert_eq!(stats.partitions, 1);
    }

    #[tokio::test]
    async fn test_older_version_does_not_overwrite_newer() {
        let engine = engine();
        let original = record("t", "draft wording");
        let mut revised = original.clone();
        revised.content = "final wording".to_string();
        revised.version = 1;

        // the second update finished indexing before the first
        engine.index_record(&revised).await.unwrap();
        engine.index_record(&original).await.unwrap();

        let query = SearchQuery::new("final").query_type(QueryType::Bm25);
        assert_eq!(engine.search(&key("t"), &query).await.unwrap().len(), 1);
        let query = SearchQuery::new("draft").query_type(QueryType::Bm25);
        assert!(engine.search(&key("t"), &query).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_writes_during_rebuild_survive_the_swap() {
        let engine = HybridSearchEngine::new(SearchConfig {
            index_batch_size: 1,
            ..SearchConfig::default()
        })
        .unwrap();
        let records: Vec<_> = (0..20)
            .map(|i| record("t", &format!("filler entry {i}")))
            .collect();
        for r in &records {
            engine.index_record(r).await.unwrap();
        }
        let zebra = record("t", "zebra sighting");

        let rebuild_key = key("t");
        let remove_key = key("t");
        let cancel = CancellationToken::new();
        let (rebuilt, indexed, removed) = tokio::join!(
            engine.rebuild(&rebuild_key, snapshot(&records), &cancel),
            engine.index_record(&zebra),
            engine.remove_record(&remove_key, &records[0].id),
        );
        assert_eq!(rebuilt.unwrap(), 20);
        indexed.unwrap();
        assert!(removed);

        let query = SearchQuery::new("zebra").query_type(QueryType::Bm25);
        let hits = engine.search(&key("t"), &query).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, zebra.id);
        assert_eq!(engine.document_count(&key("t")).await, 20);
    }
}
