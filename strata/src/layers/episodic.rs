//! Episodic memory: timestamped events clustered into episodes

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use super::{LayerStats, MemoryLayer, NewMemory, RecordLayer};
use crate::config::StrataConfig;
use crate::models::{
    Episode, EpisodeEvent, Importance, MemoryRecord, MemoryType, Metadata, SearchQuery,
    SearchResult, TimeRange,
};
use crate::{Result, StrataError};

const EVENT_TYPE_KEY: &str = "event_type";
const EPISODE_ID_KEY: &str = "episode_id";

/// Event type used by [`MemoryLayer::add`]
pub const OBSERVATION_EVENT: &str = "observation";

/// Input for [`EpisodicMemory::add_event`]
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub event_type: String,
    pub content: String,
    /// When the event happened (defaults to now)
    pub timestamp: Option<DateTime<Utc>>,
    /// Attach to this episode instead of clustering by time
    pub episode_id: Option<String>,
    pub metadata: Metadata,
    pub importance: Importance,
    pub tags: Vec<String>,
}

impl NewEvent {
    pub fn new(event_type: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            content: content.into(),
            timestamp: None,
            episode_id: None,
            metadata: Metadata::new(),
            importance: Importance::default(),
            tags: Vec::new(),
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn in_episode(mut self, episode_id: impl Into<String>) -> Self {
        self.episode_id = Some(episode_id.into());
        self
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn importance(mut self, importance: Importance) -> Self {
        self.importance = importance;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

#[derive(Debug, Default)]
struct EpisodeBook {
    episodes: HashMap<String, Episode>,
    current: Option<String>,
    /// event id -> episode id
    event_index: HashMap<String, String>,
}

impl EpisodeBook {
    fn close_current(&mut self) {
        if let Some(current) = self.current.take()
            && let Some(episode) = self.episodes.get_mut(&current)
        {
            episode.close();
        }
    }

    fn open(&mut self, episode: Episode) -> String {
        self.close_current();
        let id = episode.id.clone();
        self.episodes.insert(id.clone(), episode);
        self.current = Some(id.clone());
        id
    }

    fn events(&self) -> impl Iterator<Item = &EpisodeEvent> {
        self.episodes.values().flat_map(|episode| episode.events.iter())
    }
}

/// Where a new event goes
enum Placement {
    Existing(String),
    Fresh(String),
}

/// Memory of what happened and when.
///
/// Events without an explicit episode join the current open episode when they
/// fall within the gap window of its last event; otherwise the open episode
/// is closed and a new one starts.
#[derive(Debug)]
pub struct EpisodicMemory {
    inner: RecordLayer,
    gap_window: chrono::Duration,
    book: Mutex<EpisodeBook>,
}

impl EpisodicMemory {
    /// Create an episodic layer with its own store and search engine
    pub fn new(tenant_id: impl Into<String>, config: &StrataConfig) -> Result<Self> {
        Self::from_layer(
            RecordLayer::new(MemoryType::Episodic, tenant_id, config)?,
            config,
        )
    }

    /// Wrap an existing record layer of type `Episodic`
    pub fn from_layer(inner: RecordLayer, config: &StrataConfig) -> Result<Self> {
        if inner.memory_type() != MemoryType::Episodic {
            return Err(StrataError::Validation(format!(
                "episodic memory needs an episodic record layer, got {}",
                inner.memory_type()
            )));
        }
        let gap_window = chrono::Duration::from_std(config.episodic.gap_window)
            .map_err(|e| StrataError::Configuration(format!("episode gap window: {}", e)))?;
        Ok(Self {
            inner,
            gap_window,
            book: Mutex::new(EpisodeBook::default()),
        })
    }

    pub fn records(&self) -> &RecordLayer {
        &self.inner
    }

    fn place(&self, book: &EpisodeBook, timestamp: DateTime<Utc>) -> Placement {
        if let Some(current) = &book.current
            && let Some(episode) = book.episodes.get(current)
            && !episode.closed
        {
            let joins = match episode.last_event_at() {
                Some(last) => (timestamp - last).abs() <= self.gap_window,
                None => true,
            };
            if joins {
                return Placement::Existing(current.clone());
            }
        }
        Placement::Fresh(Uuid::new_v4().to_string())
    }

    /// Record an event and return its id
    pub async fn add_event(&self, event: NewEvent) -> Result<String> {
        if event.event_type.trim().is_empty() {
            return Err(StrataError::Validation(
                "event type cannot be empty".to_string(),
            ));
        }
        let timestamp = event.timestamp.unwrap_or_else(Utc::now);

        let mut book = self.book.lock().await;
        let placement = match &event.episode_id {
            Some(id) if book.episodes.contains_key(id) => Placement::Existing(id.clone()),
            Some(id) => return Err(StrataError::NotFound(format!("episode {}", id))),
            None => self.place(&book, timestamp),
        };
        let episode_id = match &placement {
            Placement::Existing(id) | Placement::Fresh(id) => id.clone(),
        };

        let mut memory = NewMemory::new(event.content)
            .importance(event.importance)
            .metadata(event.metadata)
            .meta(EVENT_TYPE_KEY, serde_json::json!(event.event_type))
            .meta(EPISODE_ID_KEY, serde_json::json!(episode_id))
            .tag(event.event_type.clone())
            .created_at(timestamp);
        memory.tags.extend(event.tags);
        let record = self.inner.build_record(memory)?;
        let stored = self.inner.insert_record(record).await?;

        if let Placement::Fresh(id) = placement {
            debug!(tenant = %self.inner.tenant_id(), episode_id = %id, "Opened episode");
            let title = format!("Episode starting {}", timestamp.to_rfc3339());
            book.open(Episode::new(id, title, timestamp));
        }

        let event = EpisodeEvent {
            id: stored.id.clone(),
            episode_id: episode_id.clone(),
            event_type: event.event_type,
            content: stored.content.clone(),
            timestamp,
            metadata: stored.metadata.clone(),
        };
        if let Some(episode) = book.episodes.get_mut(&episode_id) {
            episode.insert_event(event);
        }
        book.event_index.insert(stored.id.clone(), episode_id);

        Ok(stored.id)
    }

    /// Open a new episode and make it current, closing the previous one
    pub async fn create_episode(
        &self,
        title: &str,
        description: Option<&str>,
        tags: Vec<String>,
    ) -> Result<String> {
        if title.trim().is_empty() {
            return Err(StrataError::Validation(
                "episode title cannot be empty".to_string(),
            ));
        }
        let mut episode = Episode::new(Uuid::new_v4().to_string(), title, Utc::now());
        episode.description = description.map(str::to_string);
        episode.tags = tags;

        let mut book = self.book.lock().await;
        Ok(book.open(episode))
    }

    /// Close an episode; later events start a new one
    pub async fn close_episode(&self, episode_id: &str) -> Result<()> {
        let mut book = self.book.lock().await;
        let episode = book
            .episodes
            .get_mut(episode_id)
            .ok_or_else(|| StrataError::NotFound(format!("episode {}", episode_id)))?;
        episode.close();
        if book.current.as_deref() == Some(episode_id) {
            book.current = None;
        }
        Ok(())
    }

    pub async fn get_episode(&self, episode_id: &str) -> Result<Option<Episode>> {
        Ok(self.book.lock().await.episodes.get(episode_id).cloned())
    }

    /// Episodes ordered by most recent activity
    pub async fn get_recent_episodes(&self, limit: usize) -> Result<Vec<Episode>> {
        let book = self.book.lock().await;
        let mut episodes: Vec<Episode> = book.episodes.values().cloned().collect();
        episodes.sort_by(|a, b| {
            b.last_activity()
                .cmp(&a.last_activity())
                .then_with(|| b.started_at.cmp(&a.started_at))
        });
        episodes.truncate(limit);
        Ok(episodes)
    }

    /// Events of one type in chronological order, optionally within a time range
    pub async fn search_events_by_type(
        &self,
        event_type: &str,
        range: Option<TimeRange>,
    ) -> Result<Vec<EpisodeEvent>> {
        let book = self.book.lock().await;
        let mut events: Vec<EpisodeEvent> = book
            .events()
            .filter(|e| e.event_type == event_type)
            .filter(|e| range.is_none_or(|r| r.contains(e.timestamp)))
            .cloned()
            .collect();
        events.sort_by_key(|e| e.timestamp);
        Ok(events)
    }

    /// Every event between `start` and `end` inclusive, chronologically
    pub async fn get_timeline(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EpisodeEvent>> {
        if start > end {
            return Err(StrataError::Validation(
                "timeline start must not be after its end".to_string(),
            ));
        }
        let range = TimeRange::new(start, end);
        let book = self.book.lock().await;
        let mut events: Vec<EpisodeEvent> = book
            .events()
            .filter(|e| range.contains(e.timestamp))
            .cloned()
            .collect();
        events.sort_by_key(|e| e.timestamp);
        Ok(events)
    }
}

#[async_trait]
impl MemoryLayer for EpisodicMemory {
    fn memory_type(&self) -> MemoryType {
        MemoryType::Episodic
    }

    fn tenant_id(&self) -> &str {
        self.inner.tenant_id()
    }

    async fn add(&self, memory: NewMemory) -> Result<String> {
        let mut event = NewEvent::new(OBSERVATION_EVENT, memory.content)
            .metadata(memory.metadata)
            .importance(memory.importance);
        event.tags = memory.tags;
        event.timestamp = memory.created_at;
        self.add_event(event).await
    }

    async fn get(&self, id: &str) -> Result<Option<MemoryRecord>> {
        self.inner.get(id).await
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>> {
        self.inner.search(query).await
    }

    async fn update(&self, record: MemoryRecord) -> Result<MemoryRecord> {
        let mut book = self.book.lock().await;
        let updated = self.inner.update(record).await?;
        if let Some(episode_id) = book.event_index.get(&updated.id).cloned()
            && let Some(episode) = book.episodes.get_mut(&episode_id)
            && let Some(event) = episode.events.iter_mut().find(|e| e.id == updated.id)
        {
            event.content = updated.content.clone();
            event.metadata = updated.metadata.clone();
        }
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut book = self.book.lock().await;
        let removed = self.inner.delete(id).await?;
        if let Some(episode_id) = book.event_index.remove(id)
            && let Some(episode) = book.episodes.get_mut(&episode_id)
        {
            episode.remove_event(id);
        }
        Ok(removed)
    }

    async fn list_all(&self) -> Result<Vec<MemoryRecord>> {
        self.inner.list_all().await
    }

    async fn clear(&self) -> Result<()> {
        let mut book = self.book.lock().await;
        self.inner.clear().await?;
        *book = EpisodeBook::default();
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        self.inner.count().await
    }

    async fn stats(&self) -> Result<LayerStats> {
        let stats = self.inner.stats().await?;
        let book = self.book.lock().await;
        let open = book.episodes.values().filter(|e| !e.closed).count();
        Ok(stats
            .with_detail("episodes", book.episodes.len())
            .with_detail("open_episodes", open)
            .with_detail("current_episode", book.current.clone()))
    }

    async fn reindex(&self, cancel: &CancellationToken) -> Result<usize> {
        self.inner.reindex(cancel).await
    }

    async fn apply_decay(&self, id: &str, factor: f64, expected_version: u64) -> Result<bool> {
        self.inner.apply_decay(id, factor, expected_version).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn episodic() -> EpisodicMemory {
        EpisodicMemory::new("tenant", &StrataConfig::default()).unwrap()
    }

    fn episode_of(record: &MemoryRecord) -> String {
        record.metadata_str(EPISODE_ID_KEY).unwrap().to_string()
    }

    #[tokio::test]
    async fn test_events_cluster_by_gap() {
        let memory = episodic();
        let t = Utc::now() - Duration::hours(5);

        let first = memory
            .add_event(NewEvent::new("message", "hello").at(t))
            .await
            .unwrap();
        let second = memory
            .add_event(NewEvent::new("message", "how are you").at(t + Duration::minutes(1)))
            .await
            .unwrap();
        let third = memory
            .add_event(NewEvent::new("message", "back again").at(t + Duration::hours(3)))
            .await
            .unwrap();

        let first = memory.records().peek(&first).await.unwrap().unwrap();
        let second = memory.records().peek(&second).await.unwrap().unwrap();
        let third = memory.records().peek(&third).await.unwrap().unwrap();
        assert_eq!(episode_of(&first), episode_of(&second));
        assert_ne!(episode_of(&first), episode_of(&third));

        let old = memory.get_episode(&episode_of(&first)).await.unwrap().unwrap();
        assert!(old.closed);
        assert_eq!(old.events.len(), 2);
        assert_eq!(old.ended_at, Some(t + Duration::minutes(1)));
    }

    #[tokio::test]
    async fn test_events_are_kept_in_timestamp_order() {
        let memory = episodic();
        let t = Utc::now();
        memory
            .add_event(NewEvent::new("step", "second").at(t))
            .await
            .unwrap();
        let id = memory
            .add_event(NewEvent::new("step", "first").at(t - Duration::minutes(5)))
            .await
            .unwrap();
        let record = memory.records().peek(&id).await.unwrap().unwrap();

        let episode = memory.get_episode(&episode_of(&record)).await.unwrap().unwrap();
        let contents: Vec<_> = episode.events.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, ["first", "second"]);
        assert_eq!(episode.started_at, t - Duration::minutes(5));
    }

    #[tokio::test]
    async fn test_explicit_episode_and_observations() {
        let memory = episodic();
        let episode = memory
            .create_episode("Debugging session", Some("flaky test"), vec!["work".to_string()])
            .await
            .unwrap();

        memory
            .add_event(NewEvent::new("action", "ran the suite").in_episode(&episode))
            .await
            .unwrap();
        memory.add(NewMemory::new("the test passed")).await.unwrap();

        let stored = memory.get_episode(&episode).await.unwrap().unwrap();
        assert_eq!(stored.events.len(), 2);
        assert_eq!(stored.events[1].event_type, OBSERVATION_EVENT);
        assert_eq!(stored.description.as_deref(), Some("flaky test"));

        assert!(matches!(
            memory
                .add_event(NewEvent::new("action", "x").in_episode("nope"))
                .await,
            Err(StrataError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_close_episode_starts_new_one() {
        let memory = episodic();
        let first = memory.create_episode("one", None, Vec::new()).await.unwrap();
        memory.close_episode(&first).await.unwrap();

        let id = memory.add(NewMemory::new("after closing")).await.unwrap();
        let record = memory.records().peek(&id).await.unwrap().unwrap();
        assert_ne!(episode_of(&record), first);

        assert!(matches!(
            memory.close_episode("missing").await,
            Err(StrataError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_type_search_timeline_and_recent() {
        let memory = episodic();
        let t = Utc::now() - Duration::days(1);
        for (offset, kind) in [(0, "tool_call"), (10, "message"), (20, "tool_call")] {
            memory
                .add_event(NewEvent::new(kind, format!("{kind} at {offset}")).at(t + Duration::minutes(offset)))
                .await
                .unwrap();
        }
        memory
            .add_event(NewEvent::new("tool_call", "much later").at(t + Duration::hours(6)))
            .await
            .unwrap();

        let calls = memory.search_events_by_type("tool_call", None).await.unwrap();
        assert_eq!(calls.len(), 3);
        assert!(calls.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

        let window = TimeRange::new(t, t + Duration::minutes(20));
        let calls = memory
            .search_events_by_type("tool_call", Some(window))
            .await
            .unwrap();
        assert_eq!(calls.len(), 2);

        let timeline = memory
            .get_timeline(t + Duration::minutes(10), t + Duration::minutes(20))
            .await
            .unwrap();
        assert_eq!(timeline.len(), 2);

        let recent = memory.get_recent_episodes(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].events[0].content, "much later");

        assert!(memory.get_timeline(t, t - Duration::hours(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_removes_event_from_episode() {
        let memory = episodic();
        let id = memory.add(NewMemory::new("forget me")).await.unwrap();
        let record = memory.records().peek(&id).await.unwrap().unwrap();

        assert!(memory.delete(&id).await.unwrap());
        let episode = memory.get_episode(&episode_of(&record)).await.unwrap().unwrap();
        assert!(episode.events.is_empty());

        memory.clear().await.unwrap();
        assert!(memory.get_recent_episodes(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_hundred_adds_count_hundred() {
        let memory = episodic();
        for i in 0..100 {
            memory
                .add(NewMemory::new(format!("event {i}")))
                .await
                .unwrap();
        }
        assert_eq!(memory.stats().await.unwrap().total_records, 100);
    }
}
