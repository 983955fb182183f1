use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

/// Normalized vehicle listing from a marketplace source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    /// Source-scoped identifier; falls back to URL or title when the source has none
    pub external_id: String,
    pub source: String,
    #[serde(default)]
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub mileage: Option<u32>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl Listing {
    /// A listing without a usable title must never reach the matcher
    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }
}

/// A single make/model target inside a multi-vehicle profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct VehicleCriterion {
    #[validate(length(min = 1))]
    pub make: String,
    #[validate(length(min = 1))]
    pub model: String,
    #[serde(default)]
    pub year_min: Option<i32>,
    #[serde(default)]
    pub year_max: Option<i32>,
}

impl VehicleCriterion {
    pub fn new(make: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            make: make.into(),
            model: model.into(),
            year_min: None,
            year_max: None,
        }
    }

    pub fn with_years(mut self, year_min: Option<i32>, year_max: Option<i32>) -> Self {
        self.year_min = year_min;
        self.year_max = year_max;
        self
    }
}

/// How a profile selects vehicles. The two modes never mix within one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum VehicleSelection {
    /// OR over criteria, each an AND of make, model and year bounds
    Vehicles(Vec<VehicleCriterion>),
    /// Legacy mode: any listed make AND any listed model, shared year bounds
    Flat {
        makes: Vec<String>,
        models: Vec<String>,
        year_min: Option<i32>,
        year_max: Option<i32>,
    },
}

impl Default for VehicleSelection {
    fn default() -> Self {
        VehicleSelection::Flat {
            makes: Vec::new(),
            models: Vec::new(),
            year_min: None,
            year_max: None,
        }
    }
}

/// A client's saved search criteria, fully resolved before evaluation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AgentParameters", into = "AgentParameters")]
pub struct SearchProfile {
    pub selection: VehicleSelection,
    pub price_max: Option<f64>,
    pub mileage_max: Option<u32>,
    pub exclude_keywords: Vec<String>,
    pub features_any: Vec<String>,
}

impl SearchProfile {
    pub fn vehicles(criteria: Vec<VehicleCriterion>) -> Self {
        Self {
            selection: VehicleSelection::Vehicles(criteria),
            ..Default::default()
        }
    }

    pub fn flat(makes: &[&str], models: &[&str]) -> Self {
        Self {
            selection: VehicleSelection::Flat {
                makes: makes.iter().map(|m| m.to_string()).collect(),
                models: models.iter().map(|m| m.to_string()).collect(),
                year_min: None,
                year_max: None,
            },
            ..Default::default()
        }
    }

    /// Set shared year bounds; only meaningful in flat mode
    pub fn with_years(mut self, min: Option<i32>, max: Option<i32>) -> Self {
        if let VehicleSelection::Flat {
            year_min, year_max, ..
        } = &mut self.selection
        {
            *year_min = min;
            *year_max = max;
        }
        self
    }

    pub fn with_price_max(mut self, price_max: f64) -> Self {
        self.price_max = Some(price_max);
        self
    }

    pub fn with_mileage_max(mut self, mileage_max: u32) -> Self {
        self.mileage_max = Some(mileage_max);
        self
    }

    pub fn with_exclude_keywords(mut self, keywords: &[&str]) -> Self {
        self.exclude_keywords = keywords.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn with_features_any(mut self, features: &[&str]) -> Self {
        self.features_any = features.iter().map(|f| f.to_string()).collect();
        self
    }
}

/// Errors raised while turning configured parameters into a profile
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("invalid vehicle criteria: {0}")]
    Invalid(#[from] validator::ValidationErrors),

    #[error("vehicle criterion #{index} has a blank {field}")]
    BlankField { index: usize, field: &'static str },
}

/// Configuration shape of a search profile, as written in agent files and stored as JSON
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AgentParameters {
    #[serde(default)]
    #[validate(nested)]
    pub vehicles: Vec<VehicleCriterion>,
    #[serde(default)]
    pub makes: Vec<String>,
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub year_min: Option<i32>,
    #[serde(default)]
    pub year_max: Option<i32>,
    #[serde(default)]
    pub price_max: Option<f64>,
    #[serde(default)]
    pub mileage_max: Option<u32>,
    #[serde(default)]
    pub exclude_keywords: Vec<String>,
    #[serde(default)]
    pub features_any: Vec<String>,
}

impl TryFrom<AgentParameters> for SearchProfile {
    type Error = ProfileError;

    fn try_from(params: AgentParameters) -> Result<Self, Self::Error> {
        params.validate()?;

        for (index, vehicle) in params.vehicles.iter().enumerate() {
            if vehicle.make.trim().is_empty() {
                return Err(ProfileError::BlankField { index, field: "make" });
            }
            if vehicle.model.trim().is_empty() {
                return Err(ProfileError::BlankField { index, field: "model" });
            }
        }

        // Any vehicle criterion switches the whole profile to multi-vehicle mode
        let selection = if params.vehicles.is_empty() {
            VehicleSelection::Flat {
                makes: params.makes,
                models: params.models,
                year_min: params.year_min,
                year_max: params.year_max,
            }
        } else {
            VehicleSelection::Vehicles(params.vehicles)
        };

        Ok(Self {
            selection,
            price_max: params.price_max,
            mileage_max: params.mileage_max,
            exclude_keywords: params.exclude_keywords,
            features_any: params.features_any,
        })
    }
}

impl From<SearchProfile> for AgentParameters {
    fn from(profile: SearchProfile) -> Self {
        let mut params = AgentParameters {
            price_max: profile.price_max,
            mileage_max: profile.mileage_max,
            exclude_keywords: profile.exclude_keywords,
            features_any: profile.features_any,
            ..Default::default()
        };

        match profile.selection {
            VehicleSelection::Vehicles(vehicles) => params.vehicles = vehicles,
            VehicleSelection::Flat {
                makes,
                models,
                year_min,
                year_max,
            } => {
                params.makes = makes;
                params.models = models;
                params.year_min = year_min;
                params.year_max = year_max;
            }
        }

        params
    }
}

/// Outcome of evaluating one listing against one profile
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub is_match: bool,
    pub score: f64,
}

impl MatchResult {
    /// Every rejection path goes through here, so a non-match always scores 0.0
    pub fn rejected() -> Self {
        Self {
            is_match: false,
            score: 0.0,
        }
    }

    pub fn admitted(score: f64) -> Self {
        Self {
            is_match: true,
            score,
        }
    }
}

/// Fuzzy thresholds and score increments used by the matcher
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchPolicy {
    pub make_threshold: f64,
    pub model_threshold: f64,
    pub vehicle_score: f64,
    pub make_score: f64,
    pub model_score: f64,
    pub year_score: f64,
    pub price_score: f64,
    pub mileage_score: f64,
    pub feature_score: f64,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            make_threshold: 90.0,
            model_threshold: 85.0,
            vehicle_score: 30.0,
            make_score: 10.0,
            model_score: 20.0,
            year_score: 5.0,
            price_score: 10.0,
            mileage_score: 5.0,
            feature_score: 5.0,
        }
    }
}

/// A listing admitted by the matcher together with its relevance score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredListing {
    pub listing: Listing,
    pub score: f64,
}

/// Saved search agent: profile plus where to look and whom to tell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub parameters: SearchProfile,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub notify_to: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// A matched listing about to be persisted for the first time
#[derive(Debug, Clone)]
pub struct NewListing {
    pub agent_id: String,
    pub listing: Listing,
    pub match_score: f64,
}

/// Persisted listing row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredListing {
    pub id: i64,
    pub agent_id: String,
    pub source: String,
    pub external_id: String,
    pub url: String,
    pub title: String,
    pub price: Option<f64>,
    pub mileage: Option<u32>,
    pub year: Option<i32>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub raw_json: serde_json::Value,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub alerted: bool,
    pub match_score: f64,
}
