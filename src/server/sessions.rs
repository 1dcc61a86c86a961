//! REST endpoints for conversation sessions and debug inspection.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::AppState;
use crate::conversation::ConversationSession;
use crate::error::SessionError;

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({"error": message.into()}))).into_response()
}

fn session_error_response(err: &SessionError) -> Response {
    let status = match err {
        SessionError::NotFound { .. } => StatusCode::NOT_FOUND,
        SessionError::NoSuchOption { .. } => StatusCode::BAD_REQUEST,
        SessionError::Busy | SessionError::NotStarted => StatusCode::CONFLICT,
    };
    error_response(status, err.to_string())
}

async fn lookup(state: &AppState, id: &str) -> Result<Arc<ConversationSession>, Response> {
    let session_id = Uuid::parse_str(id)
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, "Invalid session ID"))?;
    state
        .registry
        .get(session_id)
        .await
        .map_err(|e| session_error_response(&e))
}

/// POST /api/sessions
pub(super) async fn create_session(State(state): State<AppState>) -> Response {
    let session = state.registry.create().await;
    let snapshot = session.snapshot().await;
    info!(session_id = %session.id(), "Session created via REST");
    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "session_id": session.id(),
            "current": snapshot.current,
            "entries": snapshot.entries,
        })),
    )
        .into_response()
}

/// GET /api/sessions/{id}
pub(super) async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match lookup(&state, &id).await {
        Ok(session) => Json(session.snapshot().await).into_response(),
        Err(resp) => resp,
    }
}

/// DELETE /api/sessions/{id}
pub(super) async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let session = match lookup(&state, &id).await {
        Ok(session) => session,
        Err(resp) => return resp,
    };
    session.close().await;
    state.registry.remove(session.id()).await;
    Json(serde_json::json!({"status": "deleted"})).into_response()
}

#[derive(Deserialize)]
pub(super) struct SelectRequest {
    index: usize,
}

/// POST /api/sessions/{id}/select
///
/// Returns the operations applied right away (echo + option removal). The
/// target's content shows up in the transcript after the typing delay.
pub(super) async fn select_option(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<SelectRequest>,
) -> Response {
    let session = match lookup(&state, &id).await {
        Ok(session) => session,
        Err(resp) => return resp,
    };

    match session.select(body.index).await {
        Ok(ops) => Json(serde_json::json!({"status": "selected", "ops": ops})).into_response(),
        Err(e) => session_error_response(&e),
    }
}

/// POST /api/sessions/{id}/reset
pub(super) async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match lookup(&state, &id).await {
        Ok(session) => {
            let ops = session.reset().await;
            Json(serde_json::json!({"status": "reset", "ops": ops})).into_response()
        }
        Err(resp) => resp,
    }
}

// ── Debug ───────────────────────────────────────────────────────────────

/// GET /api/sessions/{id}/debug
pub(super) async fn inspect_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match lookup(&state, &id).await {
        Ok(session) => Json(session.inspect().await).into_response(),
        Err(resp) => resp,
    }
}

/// GET /api/debug/tree
pub(super) async fn inspect_tree(State(state): State<AppState>) -> impl IntoResponse {
    match state.registry.tree() {
        Some(tree) => Json(serde_json::json!({
            "entry_point": state.registry.entry_point(),
            "states": tree.as_ref(),
        }))
        .into_response(),
        None => error_response(StatusCode::SERVICE_UNAVAILABLE, "Decision tree not loaded"),
    }
}
