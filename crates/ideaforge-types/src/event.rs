//! Event types for the IdeaForge build event bus.
//!
//! `BuildEvent` is broadcast while builds run. All variants are
//! Clone + Send + Sync for use with tokio broadcast channels, and every
//! variant carries the `build_id` so subscribers can filter one build out of
//! a shared bus.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::build::{BuildFailure, BuildPhase, BuildStage};

/// Events emitted during build execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BuildEvent {
    /// The build moved to a new stage or made progress within one.
    Progress {
        build_id: Uuid,
        stage: BuildStage,
        percent_complete: u8,
        message: String,
    },

    /// One attempt of an agent invocation failed and may be retried.
    AttemptFailed {
        build_id: Uuid,
        agent: String,
        attempt: u32,
        max_attempts: u32,
        error: String,
    },

    /// An agent exhausted its attempts and its fallback document was used.
    FallbackUsed { build_id: Uuid, agent: String },

    /// The build reached `Done`.
    Completed {
        build_id: Uuid,
        overall_score: u8,
        deployment_ready: bool,
        fallback_sections: Vec<String>,
        duration_ms: u64,
    },

    /// The build reached `Failed`.
    Failed { build_id: Uuid, failure: BuildFailure },

    /// The build was cancelled while `phase` was active.
    Cancelled {
        build_id: Uuid,
        phase: Option<BuildPhase>,
    },
}

impl BuildEvent {
    pub fn build_id(&self) -> Uuid {
        match self {
            BuildEvent::Progress { build_id, .. }
            | BuildEvent::AttemptFailed { build_id, .. }
            | BuildEvent::FallbackUsed { build_id, .. }
            | BuildEvent::Completed { build_id, .. }
            | BuildEvent::Failed { build_id, .. }
            | BuildEvent::Cancelled { build_id, .. } => *build_id,
        }
    }

    /// Whether this event ends the build's event stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BuildEvent::Completed { .. } | BuildEvent::Failed { .. } | BuildEvent::Cancelled { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::FailureKind;

    #[test]
    fn event_serializes_with_type_tag() {
        let event = BuildEvent::FallbackUsed {
            build_id: Uuid::now_v7(),
            agent: "schema_designer".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "fallback_used");
        assert_eq!(json["agent"], "schema_designer");
    }

    #[test]
    fn terminal_events() {
        let id = Uuid::now_v7();
        let failed = BuildEvent::Failed {
            build_id: id,
            failure: BuildFailure {
                phase: BuildPhase::Research,
                kind: FailureKind::PhaseFatal,
                cause: "x".to_string(),
            },
        };
        assert!(failed.is_terminal());
        assert_eq!(failed.build_id(), id);

        let progress = BuildEvent::Progress {
            build_id: id,
            stage: BuildStage::Planning,
            percent_complete: 30,
            message: "Planning".to_string(),
        };
        assert!(!progress.is_terminal());
    }
}
