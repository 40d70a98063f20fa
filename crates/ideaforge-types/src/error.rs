use thiserror::Error;
use uuid::Uuid;

/// Reasons a build request is rejected at acceptance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestValidationError {
    #[error("idea description must not be empty")]
    EmptyIdea,

    #[error("idea description is too long: {actual} characters (max {max})")]
    IdeaTooLong { max: usize, actual: usize },

    #[error("target market must not be empty")]
    EmptyTargetMarket,

    #[error("target country, when given, must not be empty")]
    EmptyCountry,
}

/// Errors from the build-state store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Errors from the build service's external operations.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid build request: {0}")]
    InvalidRequest(#[from] RequestValidationError),

    #[error("build not found: {0}")]
    NotFound(Uuid),

    #[error("build {0} already finished")]
    AlreadyFinished(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}
