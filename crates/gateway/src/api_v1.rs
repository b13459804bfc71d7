//! HTTP API v1 over the session service.
//!
//! Endpoints:
//!
//! - `GET  /v1/sessions`                 List stored sessions
//! - `POST /v1/sessions/{id}/messages`   Handle one user turn
//! - `POST /v1/sessions/{id}/route`      Dry-run routing, nothing runs or persists
//! - `GET  /v1/sessions/{id}`            Full session state
//! - `GET  /v1/sessions/{id}/decisions`  Decision log (entries + markdown)
//! - `POST /v1/sessions/{id}/reset`      Clear artifacts and phase

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use pmos_core::agent::AgentLabel;
use pmos_core::error::StoreError;
use pmos_core::session::{Decision, Session, SessionId};
use pmos_core::store::SessionSummary;
use pmos_router::{RouteDecision, RouterResponse, TurnRequest};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::SharedState;

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        .route("/sessions", get(list_sessions_handler))
        .route("/sessions/{id}", get(get_session_handler))
        .route("/sessions/{id}/messages", post(message_handler))
        .route("/sessions/{id}/route", post(route_handler))
        .route("/sessions/{id}/decisions", get(decisions_handler))
        .route("/sessions/{id}/reset", post(reset_handler))
        .with_state(state)
}

// ── Request / Response DTOs ───────────────────────────────────────────────

/// Body of `POST /v1/sessions/{id}/messages`.
///
/// `agent` and `chain` are mutually exclusive. `chain` is either a list of
/// agent names or the name of a configured chain.
#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub message: String,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub chain: Option<ChainSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ChainSpec {
    Named(String),
    Agents(Vec<String>),
}

impl MessageRequest {
    fn into_turn_request(self) -> Result<TurnRequest, String> {
        if self.message.trim().is_empty() {
            return Err("message must not be empty".into());
        }
        match (self.agent, self.chain) {
            (Some(_), Some(_)) => Err("specify either agent or chain, not both".into()),
            (Some(agent), None) => Ok(TurnRequest::agent(self.message, parse_agent(&agent)?)),
            (None, Some(ChainSpec::Named(name))) => Ok(TurnRequest::named_chain(self.message, name)),
            (None, Some(ChainSpec::Agents(names))) => {
                if names.is_empty() {
                    return Err("chain must name at least one agent".into());
                }
                let labels = names.iter().map(|n| parse_agent(n)).collect::<Result<Vec<_>, _>>()?;
                Ok(TurnRequest::chain(self.message, labels))
            }
            (None, None) => Ok(TurnRequest::classify(self.message)),
        }
    }
}

fn parse_agent(name: &str) -> Result<AgentLabel, String> {
    match name.parse::<AgentLabel>() {
        Ok(label) if label.is_agent() => Ok(label),
        _ => Err(format!(
            "unknown agent '{name}'; expected one of: {}",
            AgentLabel::AGENTS.map(|a| a.as_str()).join(", ")
        )),
    }
}

#[derive(Debug, Deserialize)]
pub struct RouteRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionSummary>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DecisionsResponse {
    pub session_id: SessionId,
    pub count: usize,
    pub decisions: Vec<Decision>,
    pub markdown: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: message.into() }))
}

fn store_error(e: StoreError) -> ApiError {
    let status = match e {
        StoreError::Io(_) | StoreError::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
        StoreError::MigrationFailed(_) | StoreError::Corrupt { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error!(error = %e, "Session store error");
    api_error(status, e.to_string())
}

fn not_found(id: &SessionId) -> ApiError {
    api_error(StatusCode::NOT_FOUND, format!("session '{id}' not found"))
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn message_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<MessageRequest>,
) -> Result<Json<RouterResponse>, ApiError> {
    let id = SessionId(id);
    let request = payload
        .into_turn_request()
        .map_err(|msg| api_error(StatusCode::BAD_REQUEST, msg))?;

    info!(session_id = %id, target = ?request.target, "v1/messages request");
    let response = state
        .service
        .handle_request(&id, request)
        .await
        .map_err(store_error)?;
    Ok(Json(response))
}

async fn route_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<RouteRequest>,
) -> Result<Json<RouteDecision>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "message must not be empty"));
    }
    let decision = state
        .service
        .route(&SessionId(id), &payload.message)
        .await
        .map_err(store_error)?;
    Ok(Json(decision))
}

async fn get_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    let id = SessionId(id);
    match state.service.get(&id).await.map_err(store_error)? {
        Some(session) => Ok(Json(session)),
        None => Err(not_found(&id)),
    }
}

async fn decisions_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<DecisionsResponse>, ApiError> {
    let id = SessionId(id);
    let log = state
        .service
        .decisions(&id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| not_found(&id))?;

    Ok(Json(DecisionsResponse {
        session_id: id,
        count: log.len(),
        markdown: log.to_markdown(),
        decisions: log.entries().to_vec(),
    }))
}

async fn reset_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    let id = SessionId(id);
    match state.service.reset(&id).await.map_err(store_error)? {
        Some(session) => Ok(Json(session)),
        None => Err(not_found(&id)),
    }
}

async fn list_sessions_handler(State(state): State<SharedState>) -> Result<Json<SessionListResponse>, ApiError> {
    let sessions = state.service.list().await.map_err(store_error)?;
    Ok(Json(SessionListResponse {
        count: sessions.len(),
        sessions,
    }))
}
