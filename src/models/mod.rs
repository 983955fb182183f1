// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    AgentConfig, AgentParameters, Listing, MatchPolicy, MatchResult, NewListing, ProfileError,
    ScoredListing, SearchProfile, StoredListing, VehicleCriterion, VehicleSelection,
};
pub use requests::{EvaluateRequest, ListingsQuery};
pub use responses::{AgentSummary, ErrorResponse, EvaluateResponse, HealthResponse, ListingsResponse};
