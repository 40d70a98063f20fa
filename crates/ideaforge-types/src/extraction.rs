//! Structured-output extraction result types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Why a model response could not be turned into a usable record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum ExtractionFailure {
    /// No `{ ... }` span in the text.
    #[error("no JSON object found in response")]
    NoJsonFound,

    /// A span was found but did not parse even after repair.
    #[error("JSON syntax invalid: {0}")]
    SyntaxInvalid(String),

    /// Parsed, but required fields are missing or mistyped.
    #[error("JSON schema invalid: {0}")]
    SchemaInvalid(String),
}

/// Outcome of extracting a record from raw model text.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionResult {
    Parsed(Map<String, Value>),
    Failed(ExtractionFailure),
}

impl ExtractionResult {
    pub fn is_parsed(&self) -> bool {
        matches!(self, ExtractionResult::Parsed(_))
    }

    /// Convert into a `Result`, the shape callers usually want.
    pub fn into_result(self) -> Result<Map<String, Value>, ExtractionFailure> {
        match self {
            ExtractionResult::Parsed(record) => Ok(record),
            ExtractionResult::Failed(reason) => Err(reason),
        }
    }
}
