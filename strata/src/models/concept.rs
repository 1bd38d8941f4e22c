//! Concepts and knowledge triples held by semantic memory

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// A named concept. Names are unique per semantic layer, compared case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Concept {
    pub name: String,
    pub description: String,
    pub category: String,
    pub attributes: HashMap<String, serde_json::Value>,
    pub synonyms: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Concept {
    /// Normalized lookup key for a concept name
    pub fn key(name: &str) -> String {
        name.trim().to_lowercase()
    }

    /// Whether the concept matches a lowercase needle by name, description or synonym
    pub(crate) fn match_rank(&self, needle: &str) -> Option<u8> {
        if self.name.to_lowercase().contains(needle) {
            Some(0)
        } else if self.synonyms.iter().any(|s| s.to_lowercase().contains(needle)) {
            Some(1)
        } else if self.description.to_lowercase().contains(needle) {
            Some(2)
        } else {
            None
        }
    }
}

/// Input for creating or updating a concept
#[derive(Debug, Clone, Default)]
pub struct NewConcept {
    pub name: String,
    pub description: String,
    pub category: String,
    pub attributes: HashMap<String, serde_json::Value>,
    pub synonyms: Vec<String>,
}

impl NewConcept {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn synonym(mut self, synonym: impl Into<String>) -> Self {
        self.synonyms.push(synonym.into());
        self
    }
}

/// Directed, labelled edge between two concepts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct KnowledgeTriple {
    pub subject: String,
    pub relationship_type: String,
    pub object: String,
    pub created_at: DateTime<Utc>,
}

impl KnowledgeTriple {
    /// Whether two triples describe the same edge (case-insensitive)
    pub fn same_edge(&self, subject: &str, relationship_type: &str, object: &str) -> bool {
        Concept::key(&self.subject) == Concept::key(subject)
            && self.relationship_type.eq_ignore_ascii_case(relationship_type)
            && Concept::key(&self.object) == Concept::key(object)
    }
}
