use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::Instrument;
use uuid::Uuid;

use crate::core::dedup::{DedupOutcome, Deduplicator, KeyLocks};
use crate::core::normalize::normalize;
use crate::core::Matcher;
use crate::models::{AgentConfig, Listing, ScoredListing, StoredListing};
use crate::services::notifier::{AlertBatch, Notifier};
use crate::services::sources::{ListingSource, SearchQuery};
use crate::services::store::Store;

/// Orchestration knobs for a run
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// Pause between consecutive searches against a paced source
    pub politeness_delay: Duration,
    /// Empty-or-failed searches in a row before a paced source is skipped for the run
    pub max_consecutive_empty: u32,
    /// Used when an agent has no recipients of its own
    pub default_recipients: Vec<String>,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            politeness_delay: Duration::from_secs(2),
            max_consecutive_empty: 10,
            default_recipients: Vec::new(),
        }
    }
}

/// Counters for one agent run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub agent_id: String,
    pub fetched: usize,
    pub matched: usize,
    pub new: usize,
    pub already_seen: usize,
    pub dropped: usize,
    pub failed: usize,
    pub alerted: usize,
}

impl RunSummary {
    fn new(agent_id: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            agent_id: agent_id.to_string(),
            fetched: 0,
            matched: 0,
            new: 0,
            already_seen: 0,
            dropped: 0,
            failed: 0,
            alerted: 0,
        }
    }
}

/// Runs agents end to end: fetch, match, dedup, alert
///
/// Agents run concurrently; searches within one source run sequentially.
/// Source failures never abort a run, they just contribute no listings.
pub struct AgentRunner {
    store: Arc<dyn Store>,
    matcher: Matcher,
    dedup: Deduplicator,
    sources: HashMap<String, Arc<dyn ListingSource>>,
    notifier: Arc<dyn Notifier>,
    settings: RunnerSettings,
}

impl AgentRunner {
    pub fn new(
        store: Arc<dyn Store>,
        matcher: Matcher,
        locks: KeyLocks,
        sources: Vec<Arc<dyn ListingSource>>,
        notifier: Arc<dyn Notifier>,
        settings: RunnerSettings,
    ) -> Self {
        let sources = sources
            .into_iter()
            .map(|s| (s.name().to_string(), s))
            .collect();

        Self {
            dedup: Deduplicator::new(store.clone(), locks),
            store,
            matcher,
            sources,
            notifier,
            settings,
        }
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Run every enabled agent once
    pub async fn run_all(&self) -> Vec<RunSummary> {
        let agents = match self.store.enabled_agents().await {
            Ok(agents) => agents,
            Err(e) => {
                tracing::error!("Failed to load enabled agents: {}", e);
                return vec![];
            }
        };

        tracing::info!("Starting run for {} agents", agents.len());
        let summaries = join_all(agents.iter().map(|agent| self.run_agent(agent))).await;
        tracing::info!("Finished run for {} agents", summaries.len());

        summaries
    }

    /// Run a single agent once
    pub async fn run_agent(&self, agent: &AgentConfig) -> RunSummary {
        let summary = RunSummary::new(&agent.id);
        let span = tracing::info_span!("agent_run", agent_id = %agent.id, run_id = %summary.run_id);

        self.run_agent_inner(agent, summary).instrument(span).await
    }

    async fn run_agent_inner(&self, agent: &AgentConfig, mut summary: RunSummary) -> RunSummary {
        tracing::info!("Running agent {}", agent.name);

        let listings = self.collect_listings(agent).await;
        summary.fetched = listings.len();

        // Best matches are admitted first
        let ranked = self.matcher.rank_matches(&agent.parameters, listings);
        summary.matched = ranked.len();

        let mut new_listings = Vec::new();
        for ScoredListing { listing, score } in ranked {
            tracing::debug!("Listing {} matched with score {}", listing.external_id, score);

            match self.dedup.admit(&agent.id, &listing, score).await {
                Ok(DedupOutcome::New(stored)) => {
                    summary.new += 1;
                    new_listings.push(stored);
                }
                Ok(DedupOutcome::AlreadySeen) => summary.already_seen += 1,
                Ok(DedupOutcome::Dropped) => summary.dropped += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!("Failed to persist listing {}: {}", listing.external_id, e);
                }
            }
        }

        if !new_listings.is_empty() {
            tracing::info!("Found {} new matches", new_listings.len());
            summary.alerted = self.deliver(agent, new_listings).await;
        }

        tracing::info!(
            fetched = summary.fetched,
            matched = summary.matched,
            new = summary.new,
            already_seen = summary.already_seen,
            "Agent run complete"
        );

        summary
    }

    /// Gather listings from every source the agent names, normalized
    async fn collect_listings(&self, agent: &AgentConfig) -> Vec<Listing> {
        let mut all = Vec::new();

        for source_name in &agent.sources {
            let Some(source) = self.sources.get(source_name) else {
                tracing::warn!("Unknown source {} for agent {}, skipping", source_name, agent.id);
                continue;
            };

            let queries = SearchQuery::for_profile(&agent.parameters, source.per_vehicle());
            let mut consecutive_empty = 0u32;

            for (index, query) in queries.iter().enumerate() {
                let found = match source.search(query).await {
                    Ok(found) => found,
                    Err(e) => {
                        tracing::error!("Search on {} for {} failed: {}", source_name, query.label(), e);
                        Vec::new()
                    }
                };

                // Zero results and a blocked source look the same from here
                if found.is_empty() {
                    consecutive_empty += 1;
                } else {
                    consecutive_empty = 0;
                }
                all.extend(found);

                if !source.paced() {
                    continue;
                }
                if consecutive_empty >= self.settings.max_consecutive_empty {
                    tracing::warn!("Source {} likely blocked, skipping remaining searches", source_name);
                    break;
                }
                if index + 1 < queries.len() && !self.settings.politeness_delay.is_zero() {
                    tokio::time::sleep(self.settings.politeness_delay).await;
                }
            }
        }

        let before = all.len();
        let cleaned: Vec<Listing> = all.into_iter().filter_map(normalize).collect();
        if cleaned.len() < before {
            tracing::debug!("Dropped {} listings without a title", before - cleaned.len());
        }

        cleaned
    }

    /// Hand new matches to the notifier; returns how many were marked alerted
    async fn deliver(&self, agent: &AgentConfig, listings: Vec<StoredListing>) -> usize {
        let recipients = if agent.notify_to.is_empty() {
            self.settings.default_recipients.clone()
        } else {
            agent.notify_to.clone()
        };

        let batch = AlertBatch::new(&agent.id, &agent.name, recipients, listings);

        if let Err(e) = self.notifier.notify(&batch).await {
            tracing::error!("Failed to deliver alerts for agent {}: {}", agent.id, e);
            return 0;
        }

        let ids: Vec<i64> = batch.listings.iter().map(|l| l.id).collect();
        if let Err(e) = self.store.mark_alerted(&ids).await {
            tracing::error!("Alerts sent but marking failed for agent {}: {}", agent.id, e);
            return 0;
        }

        ids.len()
    }
}

/// Run all agents on a fixed interval in the background
pub fn spawn_scheduler(
    runner: Arc<AgentRunner>,
    every: Duration,
    run_on_startup: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // The first tick fires immediately
        if !run_on_startup {
            ticker.tick().await;
        }

        tracing::info!("Scheduler started (every {}s)", every.as_secs());

        loop {
            ticker.tick().await;
            let summaries = runner.run_all().await;
            let new: usize = summaries.iter().map(|s| s.new).sum();
            tracing::info!("Scheduled run complete: {} agents, {} new listings", summaries.len(), new);
        }
    })
}
