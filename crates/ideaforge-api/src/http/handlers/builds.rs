//! Build lifecycle handlers for the REST API.
//!
//! POST   /api/v1/builds       - Accept a build request (202 with handle).
//! GET    /api/v1/builds/{id}  - Poll build status.
//! DELETE /api/v1/builds/{id}  - Request cancellation.

use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use ideaforge_types::build::{BuildHandle, BuildRequest};

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

fn parse_handle(id: &str) -> Result<BuildHandle, AppError> {
    id.parse::<BuildHandle>()
        .map_err(|e| AppError::Validation(format!("invalid build id '{id}': {e}")))
}

fn build_links(resp: ApiResponse<serde_json::Value>, handle: &BuildHandle) -> ApiResponse<serde_json::Value> {
    let href = format!("/api/v1/builds/{handle}");
    resp.with_link("self", &href).with_link("cancel", &href)
}

/// POST /api/v1/builds - Start a build in the background.
pub async fn create_build(
    State(state): State<AppState>,
    Json(body): Json<BuildRequest>,
) -> Result<(StatusCode, Json<ApiResponse<serde_json::Value>>), AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let handle = state.builds.start_build(body).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let data = serde_json::json!({ "build_id": handle });
    let resp = build_links(ApiResponse::success(data, request_id, elapsed), &handle);

    Ok((StatusCode::ACCEPTED, Json(resp)))
}

/// GET /api/v1/builds/{id} - Current status, including the result once done.
pub async fn get_build(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let handle = parse_handle(&id)?;
    let status = state.builds.get_status(&handle).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let data = serde_json::to_value(&status)
        .map_err(|e| AppError::Validation(format!("unserializable build status: {e}")))?;
    let resp = build_links(ApiResponse::success(data, request_id, elapsed), &handle);

    Ok(Json(resp))
}

/// DELETE /api/v1/builds/{id} - Cancel a running build.
///
/// Cancellation is asynchronous: the build reaches `cancelled` at its next
/// phase or attempt boundary.
pub async fn cancel_build(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<ApiResponse<serde_json::Value>>), AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let handle = parse_handle(&id)?;
    state.builds.cancel_build(&handle).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let data = serde_json::json!({ "build_id": handle, "cancellation_requested": true });
    let resp = build_links(ApiResponse::success(data, request_id, elapsed), &handle);

    Ok((StatusCode::ACCEPTED, Json(resp)))
}
