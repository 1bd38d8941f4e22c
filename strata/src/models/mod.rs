//! Domain models for records, episodes, concepts and search

pub mod concept;
pub mod episode;
pub mod record;
pub mod search;

// Re-export important models
pub use concept::{Concept, KnowledgeTriple, NewConcept};
pub use episode::{Episode, EpisodeEvent};
pub use record::{
    Importance, MemoryRecord, MemoryType, Metadata, PartitionKey, RecordBuilder, Sensitivity,
};
pub use search::{QueryType, RawScores, SearchQuery, SearchResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Inclusive time range used by timeline and event queries
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Create a new time range
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Create a time range for the last N days
    pub fn last_days(days: i64) -> Self {
        let end = Utc::now();
        let start = end - chrono::Duration::days(days);
        Self { start, end }
    }

    /// Create a time range for the last N hours
    pub fn last_hours(hours: i64) -> Self {
        let end = Utc::now();
        let start = end - chrono::Duration::hours(hours);
        Self { start, end }
    }

    /// Check if a timestamp falls within this range
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}
