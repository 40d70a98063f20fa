//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use ideaforge_types::error::BuildError;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Build lifecycle errors.
    Build(BuildError),
    /// Malformed path or body.
    Validation(String),
}

impl From<BuildError> for AppError {
    fn from(e: BuildError) -> Self {
        AppError::Build(e)
    }
}

impl AppError {
    /// Status code, machine-readable code, and message.
    pub fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Build(BuildError::InvalidRequest(e)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string())
            }
            AppError::Build(BuildError::NotFound(id)) => (
                StatusCode::NOT_FOUND,
                "BUILD_NOT_FOUND",
                format!("Build {id} not found or expired"),
            ),
            AppError::Build(BuildError::AlreadyFinished(id)) => (
                StatusCode::CONFLICT,
                "BUILD_ALREADY_FINISHED",
                format!("Build {id} has already finished"),
            ),
            AppError::Build(e @ BuildError::Store(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR", e.to_string())
            }
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::error!(code, message = %message, "request failed");
        }

        let body = json!({
            "data": null,
            "meta": {
                "request_id": "",
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "response_time_ms": 0
            },
            "errors": [{
                "code": code,
                "message": message,
            }]
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ideaforge_types::error::{RequestValidationError, StoreError};
    use uuid::Uuid;

    #[test]
    fn maps_build_errors_to_statuses() {
        let id = Uuid::now_v7();
        let cases = [
            (
                AppError::from(BuildError::InvalidRequest(RequestValidationError::EmptyIdea)),
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
            ),
            (AppError::from(BuildError::NotFound(id)), StatusCode::NOT_FOUND, "BUILD_NOT_FOUND"),
            (
                AppError::from(BuildError::AlreadyFinished(id)),
                StatusCode::CONFLICT,
                "BUILD_ALREADY_FINISHED",
            ),
            (
                AppError::from(BuildError::Store(StoreError::Backend("down".to_string()))),
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORE_ERROR",
            ),
        ];
        for (err, status, code) in cases {
            let (got_status, got_code, _) = err.parts();
            assert_eq!(got_status, status);
            assert_eq!(got_code, code);
        }
    }

    #[test]
    fn into_response_sets_status() {
        let response = AppError::Validation("bad id".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
