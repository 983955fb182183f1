use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Listing, SearchProfile, VehicleSelection};

/// Errors that can occur while fetching listings from a marketplace
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// One search request sent to a marketplace
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
}

impl SearchQuery {
    /// Build the searches a source should run for a profile
    ///
    /// Per-vehicle sources get one query per vehicle criterion. Sources that
    /// return their whole inventory get a single unconstrained query in
    /// multi-vehicle mode. Flat profiles always produce one query from the
    /// first make and model.
    pub fn for_profile(profile: &SearchProfile, per_vehicle: bool) -> Vec<SearchQuery> {
        match &profile.selection {
            VehicleSelection::Vehicles(criteria) if per_vehicle => criteria
                .iter()
                .map(|c| SearchQuery {
                    make: Some(c.make.clone()),
                    model: Some(c.model.clone()),
                    year_min: c.year_min,
                    year_max: c.year_max,
                })
                .collect(),
            VehicleSelection::Vehicles(_) => vec![SearchQuery::default()],
            VehicleSelection::Flat {
                makes,
                models,
                year_min,
                year_max,
            } => vec![SearchQuery {
                make: makes.first().cloned(),
                model: models.first().cloned(),
                year_min: *year_min,
                year_max: *year_max,
            }],
        }
    }

    /// Short label for logs
    pub fn label(&self) -> String {
        match (&self.make, &self.model) {
            (Some(make), Some(model)) => format!("{} {}", make, model),
            (Some(make), None) => make.clone(),
            (None, Some(model)) => model.clone(),
            (None, None) => "all".to_string(),
        }
    }
}

/// A marketplace adapter
///
/// Adapters return normalized listings. An empty result covers both "nothing
/// found" and "could not search"; callers do not distinguish the two.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Name agents use to refer to this source
    fn name(&self) -> &str;

    /// Whether the source needs one search per vehicle criterion
    fn per_vehicle(&self) -> bool {
        true
    }

    /// Whether searches should be spaced out and cut off after repeated empties
    fn paced(&self) -> bool {
        true
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Listing>, SourceError>;
}
