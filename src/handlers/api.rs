//! HTTP endpoints: health and the admin context channel.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub sessions: usize,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        sessions: state.registry.len().await,
    })
}

#[derive(Debug, Deserialize)]
pub struct ContextUpdateRequest {
    pub session_id: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ContextUpdateResponse {
    pub session_id: String,
    pub version: u32,
}

/// Replace a live session's dynamic instruction out of band.
pub async fn update_context(
    State(state): State<AppState>,
    Json(request): Json<ContextUpdateRequest>,
) -> AppResult<Json<ContextUpdateResponse>> {
    let id = Uuid::parse_str(&request.session_id)
        .map_err(|_| AppError::BadRequest("session_id is not a valid UUID".to_string()))?;

    let session = state
        .registry
        .get(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("no session {id}")))?;

    let version = session.set_dynamic_instruction(request.content);
    Ok(Json(ContextUpdateResponse {
        session_id: request.session_id,
        version,
    }))
}
