use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::models::{Listing, NewListing, StoredListing};
use crate::services::store::{Store, StoreError};

/// What the deduplicator decided for a matched listing
#[derive(Debug, Clone)]
pub enum DedupOutcome {
    /// First sighting: persisted and alertable
    New(StoredListing),
    /// Known `external_id`: `last_seen` refreshed, no alert
    AlreadySeen,
    /// Lost an insert race and the winner is still not visible; skipped silently
    Dropped,
}

impl DedupOutcome {
    pub fn is_new(&self) -> bool {
        matches!(self, DedupOutcome::New(_))
    }
}

/// Per-identity async locks
///
/// Entries expire after sitting idle. If one is evicted while held, the
/// storage uniqueness constraint still prevents a second row.
pub struct KeyLocks {
    locks: moka::future::Cache<String, Arc<Mutex<()>>>,
}

impl KeyLocks {
    pub fn new(capacity: u64, idle: Duration) -> Self {
        let locks = moka::future::CacheBuilder::new(capacity)
            .time_to_idle(idle)
            .build();

        Self { locks }
    }

    /// Wait for exclusive access to `key`
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .get_with(key.to_string(), async { Arc::new(Mutex::new(())) })
            .await;
        lock.lock_owned().await
    }
}

impl Default for KeyLocks {
    fn default() -> Self {
        Self::new(10_000, Duration::from_secs(300))
    }
}

/// Decides whether a matched listing is new or a re-observation
///
/// `external_id` is the only identity key and is global across agents. The
/// check-then-insert runs under a per-key lock; a uniqueness violation from
/// the store is treated as "already exists" after one re-check.
pub struct Deduplicator {
    store: Arc<dyn Store>,
    locks: KeyLocks,
}

impl Deduplicator {
    pub fn new(store: Arc<dyn Store>, locks: KeyLocks) -> Self {
        Self { store, locks }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub async fn admit(
        &self,
        agent_id: &str,
        listing: &Listing,
        score: f64,
    ) -> Result<DedupOutcome, StoreError> {
        let external_id = listing.external_id.as_str();
        let _guard = self.locks.acquire(external_id).await;

        if self.store.exists(external_id).await? {
            self.store.touch(external_id).await?;
            tracing::debug!("Listing {} already known, refreshed last_seen", external_id);
            return Ok(DedupOutcome::AlreadySeen);
        }

        let new = NewListing {
            agent_id: agent_id.to_string(),
            listing: listing.clone(),
            match_score: score,
        };

        match self.store.insert_listing(&new).await {
            Ok(stored) => Ok(DedupOutcome::New(stored)),
            Err(StoreError::Duplicate(_)) => {
                // Another writer won the race; re-check once
                if self.store.exists(external_id).await? {
                    self.store.touch(external_id).await?;
                    tracing::debug!("Listing {} inserted concurrently, treating as seen", external_id);
                    Ok(DedupOutcome::AlreadySeen)
                } else {
                    tracing::warn!("Dropping listing {} after unresolved insert race", external_id);
                    Ok(DedupOutcome::Dropped)
                }
            }
            Err(e) => Err(e),
        }
    }
}
