//! Episodes and the events they group

use super::record::Metadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single event inside an episode. The event id is the id of its backing record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EpisodeEvent {
    pub id: String,
    pub episode_id: String,
    pub event_type: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: Metadata,
}

/// A time-bounded cluster of related events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Episode {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub tags: Vec<String>,

    /// Events in ascending timestamp order
    pub events: Vec<EpisodeEvent>,

    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub closed: bool,
}

impl Episode {
    /// Create an empty, open episode
    pub fn new(id: String, title: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            title: title.into(),
            description: None,
            tags: Vec::new(),
            events: Vec::new(),
            started_at,
            ended_at: None,
            closed: false,
        }
    }

    /// Insert an event keeping chronological order. Events with equal
    /// timestamps keep their insertion order.
    pub fn insert_event(&mut self, event: EpisodeEvent) {
        let position = self
            .events
            .partition_point(|existing| existing.timestamp <= event.timestamp);
        if event.timestamp < self.started_at {
            self.started_at = event.timestamp;
        }
        self.events.insert(position, event);
    }

    /// Remove an event by id, returning whether it was present
    pub fn remove_event(&mut self, event_id: &str) -> bool {
        let before = self.events.len();
        self.events.retain(|e| e.id != event_id);
        before != self.events.len()
    }

    /// Timestamp of the chronologically last event
    pub fn last_event_at(&self) -> Option<DateTime<Utc>> {
        self.events.last().map(|e| e.timestamp)
    }

    /// Most recent activity: last event, else the start time
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_event_at().unwrap_or(self.started_at)
    }

    /// Close the episode at its last activity
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.ended_at = Some(self.last_activity());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn event(id: &str, at: DateTime<Utc>) -> EpisodeEvent {
        EpisodeEvent {
            id: id.to_string(),
            episode_id: "ep".to_string(),
            event_type: "click".to_string(),
            content: id.to_string(),
            timestamp: at,
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn test_events_stay_chronological() {
        let t0 = Utc::now();
        let mut episode = Episode::new("ep".into(), "test", t0);
        episode.insert_event(event("b", t0 + Duration::minutes(2)));
        episode.insert_event(event("a", t0 + Duration::minutes(1)));
        episode.insert_event(event("c", t0 + Duration::minutes(3)));

        let ids: Vec<_> = episode.events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(episode.last_event_at(), Some(t0 + Duration::minutes(3)));
    }

    #[test]
    fn test_close_sets_end() {
        let t0 = Utc::now();
        let mut episode = Episode::new("ep".into(), "test", t0);
        episode.insert_event(event("a", t0 + Duration::minutes(5)));
        episode.close();
        assert!(episode.closed);
        assert_eq!(episode.ended_at, Some(t0 + Duration::minutes(5)));
    }
}
