use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;
use validator::Validate;

use crate::models::{
    AgentConfig, AgentSummary, ErrorResponse, EvaluateRequest, EvaluateResponse, HealthResponse,
    ListingsQuery, ListingsResponse,
};
use crate::services::{AgentRunner, Store};

/// Upper bound on listings returned in one response
pub const MAX_LISTINGS_LIMIT: u32 = 500;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<AgentRunner>,
    pub store: Arc<dyn Store>,
}

impl AppState {
    pub fn new(runner: Arc<AgentRunner>) -> Self {
        Self {
            store: runner.store().clone(),
            runner,
        }
    }
}

/// Configure all agent-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/agents", web::get().to(list_agents))
        .route("/agents/{id}/listings", web::get().to(agent_listings))
        .route("/agents/{id}/run", web::post().to(run_agent))
        .route("/evaluate", web::post().to(evaluate));
}

fn not_found(agent_id: &str) -> HttpResponse {
    HttpResponse::NotFound().json(ErrorResponse {
        error: "Agent not found".to_string(),
        message: format!("No agent with id {}", agent_id),
        status_code: 404,
    })
}

fn storage_error(error: &str, e: impl std::fmt::Display) -> HttpResponse {
    HttpResponse::InternalServerError().json(ErrorResponse {
        error: error.to_string(),
        message: e.to_string(),
        status_code: 500,
    })
}

async fn find_agent(state: &AppState, agent_id: &str) -> Result<AgentConfig, HttpResponse> {
    match state.store.agent(agent_id).await {
        Ok(Some(agent)) => Ok(agent),
        Ok(None) => Err(not_found(agent_id)),
        Err(e) => {
            tracing::error!("Failed to load agent {}: {}", agent_id, e);
            Err(storage_error("Failed to load agent", e))
        }
    }
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let healthy = state.store.health_check().await.unwrap_or(false);

    let status = if healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// List active agents
///
/// GET /api/v1/agents
async fn list_agents(state: web::Data<AppState>) -> impl Responder {
    match state.store.enabled_agents().await {
        Ok(agents) => {
            let summaries: Vec<AgentSummary> = agents
                .into_iter()
                .map(|a| AgentSummary {
                    id: a.id,
                    name: a.name,
                    enabled: a.enabled,
                    sources: a.sources,
                })
                .collect();
            HttpResponse::Ok().json(summaries)
        }
        Err(e) => {
            tracing::error!("Failed to list agents: {}", e);
            storage_error("Failed to list agents", e)
        }
    }
}

/// Listings persisted for an agent, most recently seen first
///
/// GET /api/v1/agents/{id}/listings?limit=50
async fn agent_listings(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<ListingsQuery>,
) -> impl Responder {
    if let Err(errors) = query.validate() {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    let agent_id = path.into_inner();
    let limit = query.limit.min(MAX_LISTINGS_LIMIT) as usize;

    match state.store.listings_for_agent(&agent_id, limit).await {
        Ok(listings) => HttpResponse::Ok().json(ListingsResponse {
            total_results: listings.len(),
            agent_id,
            listings,
        }),
        Err(e) => {
            tracing::error!("Failed to fetch listings for {}: {}", agent_id, e);
            storage_error("Failed to fetch listings", e)
        }
    }
}

/// Run one agent immediately
///
/// POST /api/v1/agents/{id}/run
async fn run_agent(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let agent_id = path.into_inner();

    let agent = match find_agent(&state, &agent_id).await {
        Ok(agent) => agent,
        Err(response) => return response,
    };

    tracing::info!("Manual run requested for agent {}", agent_id);
    let summary = state.runner.run_agent(&agent).await;

    HttpResponse::Ok().json(summary)
}

/// Dry-run a listing against an agent's profile without persisting anything
///
/// POST /api/v1/evaluate
///
/// Request body:
/// ```json
/// {
///   "agent_id": "supercars",
///   "listing": { "external_id": "x1", "source": "manual", "url": "", "title": "1992 Ferrari F40" }
/// }
/// ```
async fn evaluate(state: web::Data<AppState>, req: web::Json<EvaluateRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for evaluate request: {:?}", errors);
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    let agent = match find_agent(&state, &req.agent_id).await {
        Ok(agent) => agent,
        Err(response) => return response,
    };

    let result = state.runner.matcher().evaluate(&req.listing, &agent.parameters);
    tracing::debug!(
        "Evaluated {} for {}: match={} score={}",
        req.listing.external_id,
        agent.id,
        result.is_match,
        result.score
    );

    HttpResponse::Ok().json(EvaluateResponse {
        agent_id: agent.id,
        external_id: req.listing.external_id.clone(),
        result,
    })
}
