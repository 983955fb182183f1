//! LuxeLink Agent - saved-search agents for collector and luxury vehicle listings
//!
//! Each agent carries a search profile. Listings pulled from marketplaces are
//! run through a fuzzy criteria matcher, deduplicated against everything seen
//! before, and the genuinely new matches are handed to a notifier.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{partial_ratio, Deduplicator, DedupOutcome, Matcher};
pub use crate::models::{AgentConfig, Listing, MatchPolicy, MatchResult, ScoredListing, SearchProfile, VehicleCriterion};
pub use crate::services::{AgentRunner, RunSummary, Store};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let matcher = Matcher::default();
        assert_eq!(matcher.policy().make_threshold, 90.0);
        assert_eq!(partial_ratio("Porsche", "Porsche 911"), 100.0);
    }
}
