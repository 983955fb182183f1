use crate::core::{
    filters::{matches_criterion, within_bounds, FieldResolver},
    scoring::score_shared_tail,
};
use crate::models::{Listing, MatchPolicy, MatchResult, ScoredListing, SearchProfile, VehicleCriterion, VehicleSelection};

/// Criteria matcher - decides whether a listing satisfies a search profile
///
/// # Pipeline Stages
/// 1. Vehicle selection (multi-vehicle OR, or flat make/model/year)
/// 2. Price and mileage bounds
/// 3. Exclude keywords
/// 4. Feature bonuses
///
/// Evaluation is pure and deterministic. The matcher holds only its policy,
/// so one instance can be shared freely across tasks.
#[derive(Debug, Clone)]
pub struct Matcher {
    policy: MatchPolicy,
}

impl Matcher {
    pub fn new(policy: MatchPolicy) -> Self {
        Self { policy }
    }

    pub fn with_default_policy() -> Self {
        Self {
            policy: MatchPolicy::default(),
        }
    }

    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    /// Evaluate one listing against one profile
    ///
    /// Any rejection yields `(false, 0.0)` regardless of the score accumulated
    /// before the failing test. Listings without a title are rejected outright.
    pub fn evaluate(&self, listing: &Listing, profile: &SearchProfile) -> MatchResult {
        if !listing.has_title() {
            return MatchResult::rejected();
        }

        let selection_score = match &profile.selection {
            VehicleSelection::Vehicles(criteria) => self.score_vehicles(listing, criteria),
            VehicleSelection::Flat {
                makes,
                models,
                year_min,
                year_max,
            } => self.score_flat(listing, makes, models, *year_min, *year_max),
        };

        let Some(selection_score) = selection_score else {
            return MatchResult::rejected();
        };

        match score_shared_tail(listing, profile, &self.policy) {
            Some(bonus) => MatchResult::admitted(selection_score + bonus),
            None => MatchResult::rejected(),
        }
    }

    /// Evaluate a batch and return admitted listings, best score first
    ///
    /// Ties keep their input order.
    pub fn rank_matches(&self, profile: &SearchProfile, listings: Vec<Listing>) -> Vec<ScoredListing> {
        let mut matches: Vec<ScoredListing> = listings
            .into_iter()
            .filter_map(|listing| {
                let result = self.evaluate(&listing, profile);
                result.is_match.then_some(ScoredListing {
                    listing,
                    score: result.score,
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        matches
    }

    /// Multi-vehicle mode: first satisfied criterion wins
    fn score_vehicles(&self, listing: &Listing, criteria: &[VehicleCriterion]) -> Option<f64> {
        criteria
            .iter()
            .any(|criterion| matches_criterion(listing, criterion, &self.policy))
            .then_some(self.policy.vehicle_score)
    }

    /// Flat mode: each configured test must pass and contributes its own bonus
    fn score_flat(
        &self,
        listing: &Listing,
        makes: &[String],
        models: &[String],
        year_min: Option<i32>,
        year_max: Option<i32>,
    ) -> Option<f64> {
        let mut score = 0.0;

        if !makes.is_empty() {
            if !FieldResolver::make(listing).matches_any(makes, self.policy.make_threshold) {
                return None;
            }
            score += self.policy.make_score;
        }

        if !models.is_empty() {
            if !FieldResolver::model(listing).matches_any(models, self.policy.model_threshold) {
                return None;
            }
            score += self.policy.model_score;
        }

        if let Some(year) = listing.year {
            if !within_bounds(year, year_min, year_max) {
                return None;
            }
            score += self.policy.year_score;
        }

        Some(score)
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::with_default_policy()
    }
}
