//! Status server with JSON API endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::state::StateHandle;
use crate::store::StateStore;

/// Status server application state
#[derive(Clone)]
pub struct ServerState {
    pub store: Arc<StateStore>,
    pub cache_key: String,
    pub state: StateHandle,
}

/// Build the status server axum router
pub fn build_router(server_state: ServerState) -> Router {
    Router::new()
        .route("/api/status", get(status_handler))
        .route("/api/bot", get(bot_handler))
        .route("/api/history", get(history_handler))
        .route("/health", get(health_handler))
        .with_state(server_state)
}

/// The last snapshot published to the store by the poll cycle
async fn status_handler(State(server): State<ServerState>) -> Response {
    match server.store.cached_status(&server.cache_key).await {
        Some(snapshot) => axum::Json(snapshot).into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            axum::Json(serde_json::json!({ "error": "status not available yet" })),
        )
            .into_response(),
    }
}

async fn bot_handler(State(server): State<ServerState>) -> impl IntoResponse {
    let state = server.state.read().await;

    axum::Json(serde_json::json!({
        "store": server.store.backend(),
        "uptime_seconds": state.uptime_seconds(),
        "cycles": state.poll.cycles,
        "last_poll_epoch_ms": state.poll.last_poll_epoch_ms,
        "last_broken": state.poll.last_broken,
        "last_decision": state.poll.last_decision,
        "consecutive_fetch_errors": state.poll.consecutive_fetch_errors,
    }))
}

async fn history_handler(State(server): State<ServerState>) -> impl IntoResponse {
    let state = server.state.read().await;
    let history: Vec<_> = state.history.iter().cloned().collect();
    axum::Json(history)
}

async fn health_handler() -> impl IntoResponse {
    "OK"
}
