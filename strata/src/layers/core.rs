//! Core memory: agent identity, persistent context and state history

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{LayerStats, MemoryLayer, NewMemory, RecordLayer};
use crate::config::StrataConfig;
use crate::models::{Importance, MemoryRecord, MemoryType, Metadata, SearchQuery, SearchResult};
use crate::{Result, StrataError};

const KIND_KEY: &str = "core_kind";
const PROFILE_KIND: &str = "agent_profile";
const CONTEXT_KIND: &str = "context";
const STATE_KIND: &str = "agent_state";
const IDENTITY_KEY: &str = "identity";
const CONTEXT_KEY: &str = "context_key";
const CONTEXT_VALUE: &str = "value";

/// Who the agent is
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AgentIdentity {
    pub name: String,
    pub role: String,
    pub description: String,
    pub traits: Vec<String>,
    pub attributes: Metadata,
}

impl AgentIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_trait(mut self, agent_trait: impl Into<String>) -> Self {
        self.traits.push(agent_trait.into());
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Searchable text form of the identity
    fn summary(&self) -> String {
        let mut summary = format!("Agent {}", self.name);
        if !self.role.is_empty() {
            summary.push_str(&format!(", {}", self.role));
        }
        if !self.description.is_empty() {
            summary.push_str(&format!(". {}", self.description));
        }
        if !self.traits.is_empty() {
            summary.push_str(&format!(". Traits: {}", self.traits.join(", ")));
        }
        summary
    }
}

fn kind_filter(kind: &str) -> Metadata {
    let mut filter = Metadata::new();
    filter.insert(KIND_KEY.to_string(), serde_json::json!(kind));
    filter
}

/// Long-lived, slowly decaying memory about the agent itself.
///
/// The first use of a fresh layer creates a single agent-profile record; it is
/// the fixed slot that [`CoreMemory::set_agent_identity`] writes to.
#[derive(Debug)]
pub struct CoreMemory {
    inner: RecordLayer,
    profile_id: Mutex<Option<String>>,
    upsert_lock: Mutex<()>,
    associations: RwLock<HashMap<String, BTreeSet<String>>>,
}

impl CoreMemory {
    /// Create a core layer with its own store and search engine
    pub fn new(tenant_id: impl Into<String>, config: &StrataConfig) -> Result<Self> {
        Self::from_layer(RecordLayer::new(MemoryType::Core, tenant_id, config)?)
    }

    /// Wrap an existing record layer of type `Core`
    pub fn from_layer(inner: RecordLayer) -> Result<Self> {
        if inner.memory_type() != MemoryType::Core {
            return Err(StrataError::Validation(format!(
                "core memory needs a core record layer, got {}",
                inner.memory_type()
            )));
        }
        Ok(Self {
            inner,
            profile_id: Mutex::new(None),
            upsert_lock: Mutex::new(()),
            associations: RwLock::new(HashMap::new()),
        })
    }

    pub fn records(&self) -> &RecordLayer {
        &self.inner
    }

    /// Id of the agent-profile record, creating it on first use
    async fn ensure_profile(&self) -> Result<String> {
        let mut slot = self.profile_id.lock().await;
        if let Some(id) = slot.as_ref() {
            return Ok(id.clone());
        }

        let existing = self
            .inner
            .find_by_metadata(&kind_filter(PROFILE_KIND))
            .await?;
        let id = match existing.into_iter().next() {
            Some(record) => record.id,
            None => {
                let profile = self.inner.build_record(
                    NewMemory::new("Agent profile")
                        .importance(Importance::Critical)
                        .meta(KIND_KEY, serde_json::json!(PROFILE_KIND)),
                )?;
                let stored = self.inner.insert_record(profile).await?;
                debug!(tenant = %self.inner.tenant_id(), profile_id = %stored.id, "Created agent profile");
                stored.id
            }
        };

        *slot = Some(id.clone());
        Ok(id)
    }

    /// Write the agent identity into the profile slot; always returns the same id
    pub async fn set_agent_identity(&self, identity: AgentIdentity) -> Result<String> {
        if identity.name.trim().is_empty() {
            return Err(StrataError::Validation(
                "agent name cannot be empty".to_string(),
            ));
        }
        let profile_id = self.ensure_profile().await?;
        let value = serde_json::to_value(&identity)
            .map_err(|e| StrataError::InternalCompute(format!("identity encoding: {}", e)))?;

        let _guard = self.upsert_lock.lock().await;
        let mut record = self.inner.require(&profile_id).await?;
        record.content = identity.summary();
        record.importance = Importance::Critical;
        record.metadata.insert(IDENTITY_KEY.to_string(), value);
        self.inner.update(record).await?;

        Ok(profile_id)
    }

    /// The identity stored in the profile slot, if one was set
    pub async fn get_agent_identity(&self) -> Result<Option<AgentIdentity>> {
        let profile_id = self.ensure_profile().await?;
        let Some(record) = self.inner.peek(&profile_id).await? else {
            return Ok(None);
        };
        match record.metadata.get(IDENTITY_KEY) {
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| StrataError::InternalCompute(format!("identity decoding: {}", e))),
            None => Ok(None),
        }
    }

    async fn find_context(&self, key: &str) -> Result<Option<MemoryRecord>> {
        let mut filter = kind_filter(CONTEXT_KIND);
        filter.insert(CONTEXT_KEY.to_string(), serde_json::json!(key));
        Ok(self.inner.find_by_metadata(&filter).await?.into_iter().next())
    }

    /// Set a persistent context value, replacing any previous value of `key`
    pub async fn set_persistent_context(
        &self,
        key: &str,
        value: serde_json::Value,
    ) -> Result<String> {
        if key.trim().is_empty() {
            return Err(StrataError::Validation(
                "context key cannot be empty".to_string(),
            ));
        }
        self.ensure_profile().await?;

        let _guard = self.upsert_lock.lock().await;
        let content = format!("{}: {}", key, value);
        match self.find_context(key).await? {
            Some(mut record) => {
                record.content = content;
                record
                    .metadata
                    .insert(CONTEXT_VALUE.to_string(), value);
                Ok(self.inner.update(record).await?.id)
            }
            None => {
                let record = self.inner.build_record(
                    NewMemory::new(content)
                        .importance(Importance::High)
                        .meta(KIND_KEY, serde_json::json!(CONTEXT_KIND))
                        .meta(CONTEXT_KEY, serde_json::json!(key))
                        .meta(CONTEXT_VALUE, value),
                )?;
                Ok(self.inner.insert_record(record).await?.id)
            }
        }
    }

    pub async fn get_persistent_context(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self
            .find_context(key)
            .await?
            .and_then(|record| record.metadata.get(CONTEXT_VALUE).cloned()))
    }

    /// Every persistent context entry
    pub async fn get_all_context(&self) -> Result<HashMap<String, serde_json::Value>> {
        let records = self
            .inner
            .find_by_metadata(&kind_filter(CONTEXT_KIND))
            .await?;
        Ok(records
            .into_iter()
            .filter_map(|record| {
                let key = record.metadata_str(CONTEXT_KEY)?.to_string();
                let value = record.metadata.get(CONTEXT_VALUE)?.clone();
                Some((key, value))
            })
            .collect())
    }

    pub async fn remove_persistent_context(&self, key: &str) -> Result<bool> {
        let _guard = self.upsert_lock.lock().await;
        match self.find_context(key).await? {
            Some(record) => self.delete(&record.id).await,
            None => Ok(false),
        }
    }

    /// Append a timestamped snapshot of the agent's state
    pub async fn update_agent_state(&self, state: &str, description: &str) -> Result<String> {
        if state.trim().is_empty() {
            return Err(StrataError::Validation(
                "agent state cannot be empty".to_string(),
            ));
        }
        self.ensure_profile().await?;

        let content = if description.trim().is_empty() {
            state.to_string()
        } else {
            format!("{}: {}", state, description)
        };
        let record = self.inner.build_record(
            NewMemory::new(content)
                .meta(KIND_KEY, serde_json::json!(STATE_KIND))
                .meta("state", serde_json::json!(state))
                .meta("description", serde_json::json!(description)),
        )?;
        Ok(self.inner.insert_record(record).await?.id)
    }

    /// State snapshots, newest first
    pub async fn get_recent_states(&self, limit: usize) -> Result<Vec<MemoryRecord>> {
        let mut states = self
            .inner
            .find_by_metadata(&kind_filter(STATE_KIND))
            .await?;
        // Later insertions win ties on equal timestamps
        states.reverse();
        states.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        states.truncate(limit);
        Ok(states)
    }

    /// Link two core records both ways
    pub async fn add_association(&self, a: &str, b: &str) -> Result<()> {
        if a == b {
            return Err(StrataError::Validation(
                "a memory cannot be associated with itself".to_string(),
            ));
        }
        self.inner.require(a).await?;
        self.inner.require(b).await?;

        let mut associations = self.associations.write().await;
        associations
            .entry(a.to_string())
            .or_default()
            .insert(b.to_string());
        associations
            .entry(b.to_string())
            .or_default()
            .insert(a.to_string());
        Ok(())
    }

    /// Records associated with `id`
    pub async fn get_associations(&self, id: &str) -> Result<Vec<MemoryRecord>> {
        let ids: Vec<String> = self
            .associations
            .read()
            .await
            .get(id)
            .map(|linked| linked.iter().cloned().collect())
            .unwrap_or_default();
        Ok(self
            .inner
            .store()
            .get_many(self.inner.partition(), &ids)
            .await?)
    }
}

#[async_trait]
impl MemoryLayer for CoreMemory {
    fn memory_type(&self) -> MemoryType {
        MemoryType::Core
    }

    fn tenant_id(&self) -> &str {
        self.inner.tenant_id()
    }

    async fn add(&self, memory: NewMemory) -> Result<String> {
        self.ensure_profile().await?;
        self.inner.add(memory).await
    }

    async fn get(&self, id: &str) -> Result<Option<MemoryRecord>> {
        self.inner.get(id).await
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>> {
        self.ensure_profile().await?;
        self.inner.search(query).await
    }

    async fn update(&self, record: MemoryRecord) -> Result<MemoryRecord> {
        self.inner.update(record).await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let removed = self.inner.delete(id).await?;
        if removed {
            let mut associations = self.associations.write().await;
            if let Some(linked) = associations.remove(id) {
                for other in linked {
                    if let Some(set) = associations.get_mut(&other) {
                        set.remove(id);
                    }
                }
            }
            drop(associations);

            let mut slot = self.profile_id.lock().await;
            if slot.as_deref() == Some(id) {
                *slot = None;
            }
        }
        Ok(removed)
    }

    async fn list_all(&self) -> Result<Vec<MemoryRecord>> {
        self.ensure_profile().await?;
        self.inner.list_all().await
    }

    async fn clear(&self) -> Result<()> {
        let mut slot = self.profile_id.lock().await;
        self.inner.clear().await?;
        self.associations.write().await.clear();
        *slot = None;
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        self.ensure_profile().await?;
        self.inner.count().await
    }

    async fn stats(&self) -> Result<LayerStats> {
        self.ensure_profile().await?;
        let stats = self.inner.stats().await?;
        let context_entries = self.get_all_context().await?.len();
        let states = self
            .inner
            .find_by_metadata(&kind_filter(STATE_KIND))
            .await?
            .len();
        let associated = self.associations.read().await.len();
        Ok(stats
            .with_detail(
                "has_identity",
                self.get_agent_identity().await?.is_some(),
            )
            .with_detail("context_entries", context_entries)
            .with_detail("state_snapshots", states)
            .with_detail("associated_records", associated))
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

    fn core() -> CoreMemory {
        CoreMemory::new("tenant", &StrataConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_profile_created_on_first_use() {
        let core = core();
        for i in 0..100 {
            core.add(NewMemory::new(format!("core fact {i}")))
                .await
                .unwrap();
        }
        assert_eq!(core.count().await.unwrap(), 101);
        assert_eq!(core.stats().await.unwrap().total_records, 101);
    }

    #[tokio::test]
    async fn test_identity_uses_fixed_slot() {
        let core = core();
        assert!(core.get_agent_identity().await.unwrap().is_none());

        let first = core
            .set_agent_identity(AgentIdentity::new("Ada").role("researcher"))
            .await
            .unwrap();
        let second = core
            .set_agent_identity(
                AgentIdentity::new("Ada")
                    .role("reviewer")
                    .with_trait("careful"),
            )
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(core.count().await.unwrap(), 1);

        let identity = core.get_agent_identity().await.unwrap().unwrap();
        assert_eq!(identity.role, "reviewer");
        assert_eq!(identity.traits, ["careful"]);

        assert!(matches!(
            core.set_agent_identity(AgentIdentity::new(" ")).await,
            Err(StrataError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_persistent_context_upserts() {
        let core = core();
        let id = core
            .set_persistent_context("timezone", serde_json::json!("UTC"))
            .await
            .unwrap();
        let same = core
            .set_persistent_context("timezone", serde_json::json!("CET"))
            .await
            .unwrap();
        assert_eq!(id, same);
        core.set_persistent_context("language", serde_json::json!("en"))
            .await
            .unwrap();

        assert_eq!(
            core.get_persistent_context("timezone").await.unwrap(),
            Some(serde_json::json!("CET"))
        );
        assert_eq!(core.get_all_context().await.unwrap().len(), 2);

        assert!(core.remove_persistent_context("language").await.unwrap());
        assert!(!core.remove_persistent_context("language").await.unwrap());
        assert!(core.get_persistent_context("language").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recent_states_newest_first() {
        let core = core();
        core.update_agent_state("idle", "").await.unwrap();
        core.update_agent_state("planning", "drafting a plan")
            .await
            .unwrap();
        core.update_agent_state("executing", "running step 1")
            .await
            .unwrap();

        let states = core.get_recent_states(2).await.unwrap();
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].metadata_str("state"), Some("executing"));
        assert_eq!(states[1].metadata_str("state"), Some("planning"));
    }

    #[tokio::test]
    async fn test_associations() {
        let core = core();
        let a = core.add(NewMemory::new("likes tea")).await.unwrap();
        let b = core.add(NewMemory::new("lives in Leeds")).await.unwrap();

        core.add_association(&a, &b).await.unwrap();
        let linked = core.get_associations(&b).await.unwrap();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].id, a);

        assert!(matches!(
            core.add_association(&a, &a).await,
            Err(StrataError::Validation(_))
        ));
        assert!(matches!(
            core.add_association(&a, "missing").await,
            Err(StrataError::NotFound(_))
        ));

        core.delete(&a).await.unwrap();
        assert!(core.get_associations(&b).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_resets_profile() {
        let core = core();
        core.set_agent_identity(AgentIdentity::new("Ada"))
            .await
            .unwrap();
        core.clear().await.unwrap();

        assert!(core.get_agent_identity().await.unwrap().is_none());
        assert_eq!(core.count().await.unwrap(), 1);
    }

    #[test]
    fn test_from_layer_requires_core_type() {
        let layer =
            RecordLayer::new(MemoryType::Episodic, "tenant", &StrataConfig::default()).unwrap();
        assert!(CoreMemory::from_layer(layer).is_err());
    }
}
