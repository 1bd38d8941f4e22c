//! Semantic memory: facts, concepts and relationships between concepts

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use super::{LayerStats, MemoryLayer, NewMemory, RecordLayer};
use crate::config::StrataConfig;
use crate::models::{
    Concept, Importance, KnowledgeTriple, MemoryRecord, MemoryType, Metadata, NewConcept,
    SearchQuery, SearchResult,
};
use crate::{Result, StrataError};

const CONCEPT_TAG_PREFIX: &str = "concept:";

/// Input for [`SemanticMemory::add_knowledge`]
#[derive(Debug, Clone)]
pub struct NewKnowledge {
    pub content: String,
    /// Concepts the fact is about
    pub concepts: Vec<String>,
    pub knowledge_type: String,
    pub category: String,
    pub importance: Importance,
    pub metadata: Metadata,
    pub embedding: Option<Vec<f32>>,
}

impl NewKnowledge {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            concepts: Vec::new(),
            knowledge_type: "fact".to_string(),
            category: "general".to_string(),
            importance: Importance::default(),
            metadata: Metadata::new(),
            embedding: None,
        }
    }

    pub fn concept(mut self, concept: impl Into<String>) -> Self {
        self.concepts.push(concept.into());
        self
    }

    pub fn knowledge_type(mut self, knowledge_type: impl Into<String>) -> Self {
        self.knowledge_type = knowledge_type.into();
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn importance(mut self, importance: Importance) -> Self {
        self.importance = importance;
        self
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

fn concept_tag(name: &str) -> String {
    format!("{}{}", CONCEPT_TAG_PREFIX, Concept::key(name))
}

#[derive(Debug, Default)]
struct ConceptGraph {
    /// lowercase name -> concept
    concepts: HashMap<String, Concept>,
    /// edges in insertion order
    triples: Vec<KnowledgeTriple>,
}

impl ConceptGraph {
    /// The concept named `name`, created without details when unknown
    fn entry(&mut self, name: &str, now: DateTime<Utc>) -> &mut Concept {
        self.concepts
            .entry(Concept::key(name))
            .or_insert_with(|| Concept {
                name: name.to_string(),
                description: String::new(),
                category: String::new(),
                attributes: HashMap::new(),
                synonyms: Default::default(),
                created_at: now,
                updated_at: now,
            })
    }
}

fn concept_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StrataError::Validation(
            "concept name cannot be empty".to_string(),
        ));
    }
    Ok(name)
}

/// General knowledge about the world.
///
/// Facts are ordinary searchable records. Concepts and the directed,
/// labelled relationships between them live alongside; cycles are allowed
/// and traversal is single-hop.
#[derive(Debug)]
pub struct SemanticMemory {
    inner: RecordLayer,
    graph: RwLock<ConceptGraph>,
}

impl SemanticMemory {
    /// Create a semantic layer with its own store and search engine
    pub fn new(tenant_id: impl Into<String>, config: &StrataConfig) -> Result<Self> {
        Self::from_layer(RecordLayer::new(MemoryType::Semantic, tenant_id, config)?)
    }

    /// Wrap an existing record layer of type `Semantic`
    pub fn from_layer(inner: RecordLayer) -> Result<Self> {
        if inner.memory_type() != MemoryType::Semantic {
            return Err(StrataError::Validation(format!(
                "semantic memory needs a semantic record layer, got {}",
                inner.memory_type()
            )));
        }
        Ok(Self {
            inner,
            graph: RwLock::new(ConceptGraph::default()),
        })
    }

    pub fn records(&self) -> &RecordLayer {
        &self.inner
    }

    /// Store a fact, tagged with the concepts it mentions
    pub async fn add_knowledge(&self, knowledge: NewKnowledge) -> Result<String> {
        let mut memory = NewMemory::new(knowledge.content)
            .importance(knowledge.importance)
            .metadata(knowledge.metadata)
            .meta("knowledge_type", serde_json::json!(knowledge.knowledge_type))
            .meta("category", serde_json::json!(knowledge.category));
        for concept in knowledge.concepts.iter().filter(|c| !c.trim().is_empty()) {
            memory = memory.tag(concept_tag(concept));
        }
        if let Some(embedding) = knowledge.embedding {
            memory = memory.embedding(embedding);
        }
        self.inner.add(memory).await
    }

    /// Facts tagged with a concept, in insertion order
    pub async fn get_knowledge_for_concept(&self, name: &str) -> Result<Vec<MemoryRecord>> {
        let tag = concept_tag(name);
        Ok(self
            .inner
            .list_all()
            .await?
            .into_iter()
            .filter(|record| record.has_tag(&tag))
            .collect())
    }

    /// Create a concept or merge into the existing one with the same name
    pub async fn add_concept(&self, concept: NewConcept) -> Result<Concept> {
        let name = concept_name(&concept.name)?;

        let now = Utc::now();
        let mut graph = self.graph.write().await;
        let entry = graph.entry(name, now);

        if !concept.description.is_empty() {
            entry.description = concept.description;
        }
        if !concept.category.is_empty() {
            entry.category = concept.category;
        }
        entry.attributes.extend(concept.attributes);
        entry.synonyms.extend(
            concept
                .synonyms
                .into_iter()
                .filter(|s| !s.trim().is_empty()),
        );
        entry.updated_at = now;

        Ok(entry.clone())
    }

    pub async fn get_concept(&self, name: &str) -> Result<Option<Concept>> {
        Ok(self
            .graph
            .read()
            .await
            .concepts
            .get(&Concept::key(name))
            .cloned())
    }

    /// Add a directed edge between two concepts.
    ///
    /// Unknown subjects and objects are created as bare concepts, to be
    /// filled in later with [`Self::add_concept`].
    pub async fn add_relationship(
        &self,
        subject: &str,
        relationship_type: &str,
        object: &str,
    ) -> Result<KnowledgeTriple> {
        let relationship_type = relationship_type.trim();
        if relationship_type.is_empty() {
            return Err(StrataError::Validation(
                "relationship type cannot be empty".to_string(),
            ));
        }
        let subject = concept_name(subject)?;
        let object = concept_name(object)?;

        let now = Utc::now();
        let mut graph = self.graph.write().await;
        let subject_name = graph.entry(subject, now).name.clone();
        let object_name = graph.entry(object, now).name.clone();

        if graph
            .triples
            .iter()
            .any(|t| t.same_edge(&subject_name, relationship_type, &object_name))
        {
            return Err(StrataError::Conflict(format!(
                "relationship '{}' -[{}]-> '{}' already exists",
                subject_name, relationship_type, object_name
            )));
        }

        let triple = KnowledgeTriple {
            subject: subject_name,
            relationship_type: relationship_type.to_string(),
            object: object_name,
            created_at: Utc::now(),
        };
        graph.triples.push(triple.clone());
        Ok(triple)
    }

    /// Concepts reachable by one outgoing edge, optionally restricted to some
    /// relationship types
    pub async fn get_related_concepts(
        &self,
        name: &str,
        relationship_types: Option<&[&str]>,
    ) -> Result<Vec<Concept>> {
        let key = Concept::key(name);
        let graph = self.graph.read().await;
        if !graph.concepts.contains_key(&key) {
            return Err(StrataError::NotFound(format!("concept '{}'", name)));
        }

        let mut seen = HashSet::new();
        Ok(graph
            .triples
            .iter()
            .filter(|t| Concept::key(&t.subject) == key)
            .filter(|t| {
                relationship_types.is_none_or(|types| {
                    types
                        .iter()
                        .any(|ty| ty.eq_ignore_ascii_case(&t.relationship_type))
                })
            })
            .filter_map(|t| graph.concepts.get(&Concept::key(&t.object)))
            .filter(|c| seen.insert(Concept::key(&c.name)))
            .cloned()
            .collect())
    }

    /// Every edge starting or ending at a concept
    pub async fn get_relationships(&self, name: &str) -> Result<Vec<KnowledgeTriple>> {
        let key = Concept::key(name);
        let graph = self.graph.read().await;
        Ok(graph
            .triples
            .iter()
            .filter(|t| Concept::key(&t.subject) == key || Concept::key(&t.object) == key)
            .cloned()
            .collect())
    }

    /// Case-insensitive substring search over names, synonyms and descriptions.
    /// Name matches come first.
    pub async fn search_concepts(&self, query: &str, category: Option<&str>) -> Result<Vec<Concept>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Err(StrataError::Validation(
                "concept query cannot be empty".to_string(),
            ));
        }

        let graph = self.graph.read().await;
        let mut matches: Vec<(u8, &Concept)> = graph
            .concepts
            .values()
            .filter(|c| category.is_none_or(|cat| c.category.eq_ignore_ascii_case(cat)))
            .filter_map(|c| c.match_rank(&needle).map(|rank| (rank, c)))
            .collect();
        matches.sort_by(|(ra, a), (rb, b)| ra.cmp(rb).then_with(|| a.name.cmp(&b.name)));
        Ok(matches.into_iter().map(|(_, c)| c.clone()).collect())
    }

    /// Concepts of a category, sorted by name
    pub async fn get_concepts_by_category(&self, category: &str) -> Result<Vec<Concept>> {
        let graph = self.graph.read().await;
        let mut concepts: Vec<Concept> = graph
            .concepts
            .values()
            .filter(|c| c.category.eq_ignore_ascii_case(category))
            .cloned()
            .collect();
        concepts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(concepts)
    }
}

#[async_trait]
impl MemoryLayer for SemanticMemory {
    fn memory_type(&self) -> MemoryType {
        MemoryType::Semantic
    }

    fn tenant_id(&self) -> &str {
        self.inner.tenant_id()
    }

    async fn add(&self, memory: NewMemory) -> Result<String> {
        self.inner.add(memory).await
    }

    async fn get(&self, id: &str) -> Result<Option<MemoryRecord>> {
        self.inner.get(id).await
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>> {
        self.inner.search(query).await
    }

    async fn update(&self, record: MemoryRecord) -> Result<MemoryRecord> {
        self.inner.update(record).await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        self.inner.delete(id).await
    }

    async fn list_all(&self) -> Result<Vec<MemoryRecord>> {
        self.inner.list_all().await
    }

    async fn clear(&self) -> Result<()> {
        let mut graph = self.graph.write().await;
        self.inner.clear().await?;
        *graph = ConceptGraph::default();
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        self.inner.count().await
    }

    async fn stats(&self) -> Result<LayerStats> {
        let stats = self.inner.stats().await?;
        let graph = self.graph.read().await;
        Ok(stats
            .with_detail("concepts", graph.concepts.len())
            .with_detail("relationships", graph.triples.len()))
    }

    async fn reindex(&self, cancel: &CancellationToken) -> Result<usize> {
        self.inner.reindex(cancel).await
    }

    async fn apply_decay(&self, id: &str, factor: f64, expected_version: u64) -> Result<bool> {
        self.inner.apply_decay(id, factor, expected_version).await
    }
}
