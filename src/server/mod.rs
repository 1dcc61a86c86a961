//! HTTP + WebSocket surface for the chat.

pub mod protocol;
mod sessions;
mod ws;

use std::sync::Arc;

use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;

use crate::conversation::SessionRegistry;

pub use protocol::{ClientMessage, ServerMessage};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
}

/// Build the router with the chat WebSocket, session REST routes, and the
/// debug inspection routes.
pub fn chat_routes(registry: Arc<SessionRegistry>) -> Router {
    let state = AppState { registry };

    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(health))
        .route("/api/sessions", post(sessions::create_session))
        .route(
            "/api/sessions/{id}",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route("/api/sessions/{id}/select", post(sessions::select_option))
        .route("/api/sessions/{id}/reset", post(sessions::reset_session))
        .route("/api/sessions/{id}/debug", get(sessions::inspect_session))
        .route("/api/debug/tree", get(sessions::inspect_tree))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "decision-chat"
    }))
}
