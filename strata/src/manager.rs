//! Hierarchical memory manager
//!
//! The manager is the entry point for a single tenant. It keeps a registry of
//! layers keyed by [`MemoryType`], routes new memories to the right layer,
//! fans searches out across every registered layer and drives maintenance.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::decay::MemoryDecayService;
use crate::layers::{CoreMemory, EpisodicMemory, LayerStats, MemoryLayer, NewMemory, SemanticMemory};
use crate::models::{
    Importance, MemoryRecord, MemoryType, Metadata, QueryType, RawScores, SearchQuery,
    SearchResult,
};
use crate::search::HybridRanker;
use crate::{Result, StrataError};

/// A layer as held by the manager.
///
/// The specialised layers keep their concrete type so their extension
/// operations stay reachable; anything else goes in as [`RegisteredLayer::Generic`].
#[derive(Debug, Clone)]
pub enum RegisteredLayer {
    Core(Arc<CoreMemory>),
    Episodic(Arc<EpisodicMemory>),
    Semantic(Arc<SemanticMemory>),
    Generic(Arc<dyn MemoryLayer>),
}

impl RegisteredLayer {
    /// The layer through the common contract
    pub fn as_layer(&self) -> Arc<dyn MemoryLayer> {
        match self {
            Self::Core(layer) => layer.clone() as Arc<dyn MemoryLayer>,
            Self::Episodic(layer) => layer.clone() as Arc<dyn MemoryLayer>,
            Self::Semantic(layer) => layer.clone() as Arc<dyn MemoryLayer>,
            Self::Generic(layer) => layer.clone() as Arc<dyn MemoryLayer>,
        }
    }

    fn variant_name(&self) -> &'static str {
        match self {
            Self::Core(_) => "Core",
            Self::Episodic(_) => "Episodic",
            Self::Semantic(_) => "Semantic",
            Self::Generic(_) => "Generic",
        }
    }

    fn fits(&self, memory_type: MemoryType) -> bool {
        match self {
            Self::Core(_) => memory_type == MemoryType::Core,
            Self::Episodic(_) => memory_type == MemoryType::Episodic,
            Self::Semantic(_) => memory_type == MemoryType::Semantic,
            Self::Generic(_) => true,
        }
    }
}

/// Outcome of a decay sweep over one layer
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LayerSweep {
    /// Records whose new decay factor was written back
    pub updated: usize,
    /// Records changed or deleted while the sweep ran
    pub skipped: usize,
}

/// Outcome of [`HierarchicalMemoryManager::run_decay_sweep`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepReport {
    pub updated: usize,
    pub skipped: usize,
    pub per_layer: BTreeMap<String, LayerSweep>,
    /// Records below the cleanup threshold, most decayed first. Nothing is deleted.
    pub cleanup_candidates: Vec<MemoryRecord>,
}

/// Per-tenant registry of memory layers
#[derive(Debug)]
pub struct HierarchicalMemoryManager {
    tenant_id: String,
    layers: RwLock<HashMap<MemoryType, RegisteredLayer>>,
    ranker: HybridRanker,
}

impl HierarchicalMemoryManager {
    /// Create a manager with no layers registered
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            layers: RwLock::new(HashMap::new()),
            ranker: HybridRanker::default(),
        }
    }

    /// Use `ranker` to put results of different layers on one scale
    pub fn with_ranker(mut self, ranker: HybridRanker) -> Self {
        self.ranker = ranker;
        self
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    fn check_registration(&self, memory_type: MemoryType, layer: &RegisteredLayer) -> Result<()> {
        if !layer.fits(memory_type) {
            return Err(StrataError::Validation(format!(
                "a {} layer cannot be registered as {}",
                layer.variant_name(),
                memory_type
            )));
        }
        let inner = layer.as_layer();
        if inner.memory_type() != memory_type {
            return Err(StrataError::Validation(format!(
                "layer holds {} records but was registered as {}",
                inner.memory_type(),
                memory_type
            )));
        }
        if inner.tenant_id() != self.tenant_id {
            return Err(StrataError::Validation(format!(
                "layer belongs to tenant '{}', manager serves '{}'",
                inner.tenant_id(),
                self.tenant_id
            )));
        }
        Ok(())
    }

    /// Register a layer, replacing and returning any layer already registered for the type
    pub async fn register_layer(
        &self,
        memory_type: MemoryType,
        layer: RegisteredLayer,
    ) -> Result<Option<RegisteredLayer>> {
        self.check_registration(memory_type, &layer)?;
        let previous = self.layers.write().await.insert(memory_type, layer);
        if previous.is_some() {
            warn!(
                tenant = %self.tenant_id,
                memory_type = %memory_type,
                "Replacing already registered layer"
            );
        } else {
            debug!(tenant = %self.tenant_id, memory_type = %memory_type, "Layer registered");
        }
        Ok(previous)
    }

    /// Register a layer, failing with `Conflict` if the type is taken
    pub async fn try_register_layer(
        &self,
        memory_type: MemoryType,
        layer: RegisteredLayer,
    ) -> Result<()> {
        self.check_registration(memory_type, &layer)?;
        let mut layers = self.layers.write().await;
        if layers.contains_key(&memory_type) {
            return Err(StrataError::Conflict(format!(
                "a {} layer is already registered",
                memory_type
            )));
        }
        layers.insert(memory_type, layer);
        debug!(tenant = %self.tenant_id, memory_type = %memory_type, "Layer registered");
        Ok(())
    }

    /// Remove a layer from the registry
    pub async fn unregister_layer(&self, memory_type: MemoryType) -> Option<RegisteredLayer> {
        self.layers.write().await.remove(&memory_type)
    }

    /// Registered memory types in tie-break order
    pub async fn registered_types(&self) -> Vec<MemoryType> {
        let mut types: Vec<MemoryType> = self.layers.read().await.keys().copied().collect();
        types.sort_by_key(|t| t.tie_break_rank());
        types
    }

    pub async fn core(&self) -> Option<Arc<CoreMemory>> {
        match self.layers.read().await.get(&MemoryType::Core) {
            Some(RegisteredLayer::Core(layer)) => Some(layer.clone()),
            _ => None,
        }
    }

    pub async fn episodic(&self) -> Option<Arc<EpisodicMemory>> {
        match self.layers.read().await.get(&MemoryType::Episodic) {
            Some(RegisteredLayer::Episodic(layer)) => Some(layer.clone()),
            _ => None,
        }
    }

    pub async fn semantic(&self) -> Option<Arc<SemanticMemory>> {
        match self.layers.read().await.get(&MemoryType::Semantic) {
            Some(RegisteredLayer::Semantic(layer)) => Some(layer.clone()),
            _ => None,
        }
    }

    /// The layer registered for `memory_type`, through the common contract
    pub async fn get_layer(&self, memory_type: MemoryType) -> Option<Arc<dyn MemoryLayer>> {
        self.layers
            .read()
            .await
            .get(&memory_type)
            .map(RegisteredLayer::as_layer)
    }

    async fn require_layer(&self, memory_type: MemoryType) -> Result<Arc<dyn MemoryLayer>> {
        self.get_layer(memory_type)
            .await
            .ok_or(StrataError::LayerNotRegistered(memory_type))
    }

    /// Snapshot of the registry so no lock is held across layer calls
    async fn snapshot(&self) -> Vec<(MemoryType, Arc<dyn MemoryLayer>)> {
        let mut layers: Vec<(MemoryType, Arc<dyn MemoryLayer>)> = self
            .layers
            .read()
            .await
            .iter()
            .map(|(memory_type, layer)| (*memory_type, layer.as_layer()))
            .collect();
        layers.sort_by_key(|(memory_type, _)| memory_type.tie_break_rank());
        layers
    }

    /// Store a memory in the layer registered for `memory_type`
    #[instrument(skip(self, content, metadata), fields(tenant = %self.tenant_id))]
    pub async fn add_memory(
        &self,
        content: impl Into<String> + Send,
        memory_type: MemoryType,
        importance: Importance,
        metadata: Metadata,
    ) -> Result<String> {
        let layer = self.require_layer(memory_type).await?;
        let memory = NewMemory::new(content)
            .importance(importance)
            .metadata(metadata);
        layer.add(memory).await
    }

    /// Search every registered layer and merge the results
    pub async fn search_all_layers(
        &self,
        query: &str,
        query_type: QueryType,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let query = SearchQuery::new(query).query_type(query_type).limit(limit);
        self.search_all_layers_with(&query).await
    }

    /// Like [`Self::search_all_layers`] with full control over the query.
    ///
    /// Each layer ranks its own partition; the merged candidates are then
    /// rescaled against the best raw score across all layers, so a weak match
    /// in one layer cannot tie a strong match in another. Results are ordered
    /// by score, then Core > Semantic > Procedural > Episodic, then newest
    /// first, and truncated to `query.limit`.
    #[instrument(skip(self, query), fields(tenant = %self.tenant_id, query_type = %query.query_type, limit = query.limit))]
    pub async fn search_all_layers_with(&self, query: &SearchQuery) -> Result<Vec<SearchResult>> {
        query.validate()?;
        let layers = self.snapshot().await;

        let searches = layers.iter().map(|(_, layer)| layer.search(query));
        let outcomes = join_all(searches).await;

        let mut merged = Vec::new();
        for outcome in outcomes {
            merged.extend(outcome?);
        }

        let raw: Vec<RawScores> = merged.iter().map(|result| result.raw).collect();
        let rescaled = self.ranker.rescale(&raw, query.query_type);
        for (result, score) in merged.iter_mut().zip(rescaled) {
            if let Some(score) = score {
                result.score = score;
            }
        }
        let min_score = query.min_score.unwrap_or(0.0);
        merged.retain(|result| result.score > 0.0 && result.score >= min_score);

        merged.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| {
                    a.memory_type()
                        .tie_break_rank()
                        .cmp(&b.memory_type().tie_break_rank())
                })
                .then_with(|| b.record.created_at.cmp(&a.record.created_at))
        });
        merged.truncate(query.limit);

        debug!(results = merged.len(), layers = layers.len(), "Cross-layer search completed");
        Ok(merged)
    }

    /// Statistics of every registered layer, keyed by layer name.
    ///
    /// A layer whose statistics fail is left out with a warning.
    pub async fn get_memory_stats(&self) -> HashMap<String, LayerStats> {
        let layers = self.snapshot().await;
        let outcomes = join_all(layers.iter().map(|(_, layer)| layer.stats())).await;

        let mut stats = HashMap::with_capacity(layers.len());
        for ((memory_type, _), outcome) in layers.iter().zip(outcomes) {
            match outcome {
                Ok(layer_stats) => {
                    stats.insert(memory_type.as_str().to_string(), layer_stats);
                }
                Err(e) => warn!(memory_type = %memory_type, "Failed to collect layer stats: {}", e),
            }
        }
        stats
    }

    /// Recompute the decay factor of every record and write it back.
    ///
    /// Records updated or deleted since the sweep read them are skipped; the
    /// concurrent writer wins. Cleanup candidates are reported, never deleted.
    #[instrument(skip(self, service, cancel), fields(tenant = %self.tenant_id))]
    pub async fn run_decay_sweep(
        &self,
        service: &MemoryDecayService,
        cancel: &CancellationToken,
    ) -> Result<SweepReport> {
        let mut report = SweepReport::default();

        for (memory_type, layer) in self.snapshot().await {
            if cancel.is_cancelled() {
                return Err(StrataError::Cancelled(format!(
                    "decay sweep before {} layer",
                    memory_type
                )));
            }

            let mut records = layer.list_all().await?;
            let versions: HashMap<String, u64> = records
                .iter()
                .map(|r| (r.id.clone(), r.version))
                .collect();
            let factors = service
                .update_decay_factors_cancellable(&mut records, cancel)
                .await?;

            let mut layer_sweep = LayerSweep::default();
            for (id, factor) in &factors {
                let Some(version) = versions.get(id) else {
                    continue;
                };
                match layer.apply_decay(id, *factor, *version).await {
                    Ok(true) => layer_sweep.updated += 1,
                    Ok(false) => layer_sweep.skipped += 1,
                    Err(e) => {
                        warn!(memory_type = %memory_type, record_id = %id, "Decay write-back failed: {}", e);
                        layer_sweep.skipped += 1;
                    }
                }
            }

            report
                .cleanup_candidates
                .extend(service.suggest_cleanup_candidates(&records));
            report.updated += layer_sweep.updated;
            report.skipped += layer_sweep.skipped;
            report
                .per_layer
                .insert(memory_type.as_str().to_string(), layer_sweep);
        }

        report
            .cleanup_candidates
            .sort_by(|a, b| a.decay_factor.total_cmp(&b.decay_factor));

        info!(
            updated = report.updated,
            skipped = report.skipped,
            cleanup_candidates = report.cleanup_candidates.len(),
            "Decay sweep finished"
        );
        Ok(report)
    }

    /// Rebuild the search index of every layer from its store
    pub async fn reindex_all(&self, cancel: &CancellationToken) -> Result<HashMap<String, usize>> {
        let mut indexed = HashMap::new();
        for (memory_type, layer) in self.snapshot().await {
            let count = layer.reindex(cancel).await?;
            indexed.insert(memory_type.as_str().to_string(), count);
        }
        Ok(indexed)
    }
}
