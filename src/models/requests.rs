use serde::{Deserialize, Serialize};
use validator::Validate;
use crate::models::domain::Listing;

/// Dry-run evaluation of a listing against an agent's saved profile
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EvaluateRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "agentId", rename = "agent_id")]
    pub agent_id: String,
    pub listing: Listing,
}

/// Query parameters for listing lookups
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ListingsQuery {
    #[serde(default = "default_limit")]
    #[validate(range(min = 1))]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}
