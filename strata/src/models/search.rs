//! Search query and result types shared by layers and the search engine

use super::record::{MemoryRecord, MemoryType, Metadata};
use crate::{Result, StrataError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ranking strategy for a query
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    /// Hybrid ranking
    #[default]
    Default,
    /// BM25 lexical ranking only
    Bm25,
    /// Cosine similarity against a query embedding only
    Vector,
    /// Weighted combination of normalized BM25 and vector scores
    Hybrid,
}

impl QueryType {
    /// Collapse `Default` into the concrete strategy it stands for
    pub fn resolve(self) -> Self {
        match self {
            Self::Default => Self::Hybrid,
            other => other,
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Bm25 => write!(f, "bm25"),
            Self::Vector => write!(f, "vector"),
            Self::Hybrid => write!(f, "hybrid"),
        }
    }
}

impl FromStr for QueryType {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "default" => Ok(Self::Default),
            "bm25" | "text" | "keyword" => Ok(Self::Bm25),
            "vector" | "semantic" => Ok(Self::Vector),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(StrataError::Validation(format!(
                "unknown query type '{}'",
                other
            ))),
        }
    }
}

/// A ranked search request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchQuery {
    /// Free-text query
    pub text: String,

    /// Ranking strategy
    pub query_type: QueryType,

    /// Exact-match metadata predicates applied before ranking
    pub filters: Metadata,

    /// Maximum number of results
    pub limit: usize,

    /// Pre-computed query embedding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    /// Drop results scoring below this value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f32>,
}

impl SearchQuery {
    /// Default number of results when none is given
    pub const DEFAULT_LIMIT: usize = 10;

    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            query_type: QueryType::Default,
            filters: Metadata::new(),
            limit: Self::DEFAULT_LIMIT,
            embedding: None,
            min_score: None,
        }
    }

    pub fn query_type(mut self, query_type: QueryType) -> Self {
        self.query_type = query_type;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn filter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.filters.insert(key.into(), value);
        self
    }

    pub fn filters(mut self, filters: Metadata) -> Self {
        self.filters = filters;
        self
    }

    pub fn embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }

    /// Reject queries that cannot be answered
    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(StrataError::Validation(
                "search limit must be greater than 0".to_string(),
            ));
        }
        let needs_text = matches!(self.query_type.resolve(), QueryType::Bm25)
            || (self.embedding.is_none() && self.query_type.resolve() != QueryType::Vector);
        if needs_text && self.text.trim().is_empty() {
            return Err(StrataError::Validation(
                "search query cannot be empty".to_string(),
            ));
        }
        if let Some(min_score) = self.min_score
            && !(0.0..=1.0).contains(&min_score)
        {
            return Err(StrataError::Validation(format!(
                "min_score must be within [0, 1], got {}",
                min_score
            )));
        }
        Ok(())
    }
}

/// Backend scores behind a result before any rescaling.
///
/// `bm25` is the Okapi score of the record's own index; `vector` is the
/// cosine similarity clamped to `>= 0`. Both are comparable across indexes,
/// which lets results of several layers be rescaled against one maximum.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct RawScores {
    pub bm25: Option<f32>,
    pub vector: Option<f32>,
}

/// A record and its relevance score in `[0, 1]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub record: MemoryRecord,
    pub score: f32,
    #[serde(default)]
    pub raw: RawScores,
}

impl SearchResult {
    pub fn new(record: MemoryRecord, score: f32) -> Self {
        Self {
            record,
            score,
            raw: RawScores::default(),
        }
    }

    pub fn with_raw(mut self, raw: RawScores) -> Self {
        self.raw = raw;
        self
    }

    /// Layer the record came from
    pub fn memory_type(&self) -> MemoryType {
        self.record.memory_type
    }
}
