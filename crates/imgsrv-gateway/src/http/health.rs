use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health: liveness probe. Returns server and publisher metadata.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let oldest_viewer = state.viewers.iter().map(|v| v.connected_at).min();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "git_sha": env!("IMGSRV_GIT_SHA"),
        "state": state.session.state().as_str(),
        "armed": state.session.is_armed(),
        "viewers": state.viewers.len(),
        "oldest_viewer": oldest_viewer,
    }))
}
