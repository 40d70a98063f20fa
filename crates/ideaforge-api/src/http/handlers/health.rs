//! Health endpoint.
//!
//! GET /health - Liveness plus the number of builds still running.

use axum::extract::State;
use axum::Json;

use crate::state::AppState;

/// GET /health - No envelope; intended for load balancers.
pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "active_builds": state.builds.active_builds(),
    }))
}
