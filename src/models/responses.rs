use serde::{Deserialize, Serialize};
use crate::models::domain::{MatchResult, StoredListing};

/// Response for the listings endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingsResponse {
    pub agent_id: String,
    pub listings: Vec<StoredListing>,
    pub total_results: usize,
}

/// Summary of a configured agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSummary {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub sources: Vec<String>,
}

/// Response for the dry-run evaluation endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateResponse {
    pub agent_id: String,
    pub external_id: String,
    #[serde(flatten)]
    pub result: MatchResult,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
