use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::{AgentConfig, NewListing, StoredListing};

/// Errors that can occur at the storage boundary
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Uniqueness violation on `external_id`
    #[error("Listing already exists: {0}")]
    Duplicate(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Persistence collaborator for agents and matched listings
///
/// Implementations must enforce at most one listing row per `external_id`,
/// reporting a conflicting insert as [`StoreError::Duplicate`].
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert or refresh agent definitions
    async fn upsert_agents(&self, agents: &[AgentConfig]) -> Result<(), StoreError>;

    /// All agents currently enabled, in id order
    async fn enabled_agents(&self) -> Result<Vec<AgentConfig>, StoreError>;

    /// Look up a single agent by id
    async fn agent(&self, agent_id: &str) -> Result<Option<AgentConfig>, StoreError>;

    /// Whether a listing with this identity has been persisted
    async fn exists(&self, external_id: &str) -> Result<bool, StoreError>;

    /// Persist a newly matched listing
    async fn insert_listing(&self, listing: &NewListing) -> Result<StoredListing, StoreError>;

    /// Record a re-observation of a known listing
    async fn touch(&self, external_id: &str) -> Result<(), StoreError>;

    /// Flag listings as delivered to the client
    async fn mark_alerted(&self, ids: &[i64]) -> Result<(), StoreError>;

    /// Most recently seen listings for an agent
    async fn listings_for_agent(
        &self,
        agent_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredListing>, StoreError>;

    async fn health_check(&self) -> Result<bool, StoreError>;
}

#[derive(Default)]
struct MemoryState {
    agents: HashMap<String, AgentConfig>,
    listings: HashMap<String, StoredListing>,
    next_id: i64,
}

/// Process-local store, used when no database is configured and in tests
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted listings
    pub async fn listing_count(&self) -> usize {
        self.state.read().await.listings.len()
    }

    pub async fn listing(&self, external_id: &str) -> Option<StoredListing> {
        self.state.read().await.listings.get(external_id).cloned()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_agents(&self, agents: &[AgentConfig]) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        for agent in agents {
            state.agents.insert(agent.id.clone(), agent.clone());
        }
        Ok(())
    }

    async fn enabled_agents(&self) -> Result<Vec<AgentConfig>, StoreError> {
        let state = self.state.read().await;
        let mut agents: Vec<AgentConfig> = state
            .agents
            .values()
            .filter(|a| a.enabled)
            .cloned()
            .collect();
        agents.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(agents)
    }

    async fn agent(&self, agent_id: &str) -> Result<Option<AgentConfig>, StoreError> {
        Ok(self.state.read().await.agents.get(agent_id).cloned())
    }

    async fn exists(&self, external_id: &str) -> Result<bool, StoreError> {
        Ok(self.state.read().await.listings.contains_key(external_id))
    }

    async fn insert_listing(&self, new: &NewListing) -> Result<StoredListing, StoreError> {
        let mut state = self.state.write().await;
        let listing = &new.listing;

        if state.listings.contains_key(&listing.external_id) {
            return Err(StoreError::Duplicate(listing.external_id.clone()));
        }

        state.next_id += 1;
        let now = Utc::now();
        let stored = StoredListing {
            id: state.next_id,
            agent_id: new.agent_id.clone(),
            source: listing.source.clone(),
            external_id: listing.external_id.clone(),
            url: listing.url.clone(),
            title: listing.title.clone(),
            price: listing.price,
            mileage: listing.mileage,
            year: listing.year,
            make: listing.make.clone(),
            model: listing.model.clone(),
            raw_json: listing.raw.clone(),
            first_seen: now,
            last_seen: now,
            alerted: false,
            match_score: new.match_score,
        };

        state
            .listings
            .insert(stored.external_id.clone(), stored.clone());
        Ok(stored)
    }

    async fn touch(&self, external_id: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let listing = state
            .listings
            .get_mut(external_id)
            .ok_or_else(|| StoreError::NotFound(external_id.to_string()))?;
        listing.last_seen = Utc::now();
        Ok(())
    }

    async fn mark_alerted(&self, ids: &[i64]) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        for listing in state.listings.values_mut() {
            if ids.contains(&listing.id) {
                listing.alerted = true;
            }
        }
        Ok(())
    }

    async fn listings_for_agent(
        &self,
        agent_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredListing>, StoreError> {
        let state = self.state.read().await;
        let mut listings: Vec<StoredListing> = state
            .listings
            .values()
            .filter(|l| l.agent_id == agent_id)
            .cloned()
            .collect();
        listings.sort_by(|a, b| b.last_seen.cmp(&a.last_seen).then(b.id.cmp(&a.id)));
        listings.truncate(limit);
        Ok(listings)
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        Ok(true)
    }
}
