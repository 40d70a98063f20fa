//! Build request, lifecycle, and result types.
//!
//! A build turns one `BuildRequest` into an `AggregateBuildResult` by running
//! four ordered phases. `BuildStatus` is the pollable view of a build in
//! flight; its `percent_complete` is a pure function of the active stage and
//! the fraction of that stage completed.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::artifacts::{ArtifactsOutput, GeneratedFile};
use crate::error::RequestValidationError;
use crate::quality::QualityOutput;
use crate::research::ResearchOutput;
use crate::strategy::StrategyOutput;

/// Maximum accepted length of an idea description, in characters.
pub const MAX_IDEA_CHARS: usize = 4_000;

// ---------------------------------------------------------------------------
// Tier
// ---------------------------------------------------------------------------

/// Subscription tier of the caller.
///
/// Gates which agents run and how much upstream data prompts receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Starter,
    Premium,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Free => write!(f, "free"),
            Tier::Starter => write!(f, "starter"),
            Tier::Premium => write!(f, "premium"),
        }
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free" => Ok(Tier::Free),
            "starter" => Ok(Tier::Starter),
            "premium" => Ok(Tier::Premium),
            other => Err(format!("invalid tier: '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// BuildRequest
// ---------------------------------------------------------------------------

/// A request to turn a product idea into build artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
    pub idea: String,
    pub target_market: String,
    #[serde(default)]
    pub tier: Tier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_country: Option<String>,
}

impl BuildRequest {
    pub fn new(idea: impl Into<String>, target_market: impl Into<String>, tier: Tier) -> Self {
        Self {
            idea: idea.into(),
            target_market: target_market.into(),
            tier,
            target_country: None,
        }
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.target_country = Some(country.into());
        self
    }

    /// Check the request before it is accepted.
    pub fn validate(&self) -> Result<(), RequestValidationError> {
        if self.idea.trim().is_empty() {
            return Err(RequestValidationError::EmptyIdea);
        }
        let idea_chars = self.idea.chars().count();
        if idea_chars > MAX_IDEA_CHARS {
            return Err(RequestValidationError::IdeaTooLong {
                max: MAX_IDEA_CHARS,
                actual: idea_chars,
            });
        }
        if self.target_market.trim().is_empty() {
            return Err(RequestValidationError::EmptyTargetMarket);
        }
        if self
            .target_country
            .as_deref()
            .is_some_and(|country| country.trim().is_empty())
        {
            return Err(RequestValidationError::EmptyCountry);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Phases and stages
// ---------------------------------------------------------------------------

/// One ordered stage of the build pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildPhase {
    Research,
    Planning,
    CodeGeneration,
    QualityAssurance,
}

impl BuildPhase {
    pub const ALL: [BuildPhase; 4] = [
        BuildPhase::Research,
        BuildPhase::Planning,
        BuildPhase::CodeGeneration,
        BuildPhase::QualityAssurance,
    ];

    pub fn stage(self) -> BuildStage {
        match self {
            BuildPhase::Research => BuildStage::Research,
            BuildPhase::Planning => BuildStage::Planning,
            BuildPhase::CodeGeneration => BuildStage::CodeGeneration,
            BuildPhase::QualityAssurance => BuildStage::QualityAssurance,
        }
    }
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildPhase::Research => write!(f, "Research"),
            BuildPhase::Planning => write!(f, "Planning"),
            BuildPhase::CodeGeneration => write!(f, "CodeGeneration"),
            BuildPhase::QualityAssurance => write!(f, "QualityAssurance"),
        }
    }
}

/// Externally visible lifecycle stage of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStage {
    Queued,
    Research,
    Planning,
    CodeGeneration,
    QualityAssurance,
    Finalizing,
    Done,
    Failed,
    Cancelled,
}

impl BuildStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, BuildStage::Done | BuildStage::Failed | BuildStage::Cancelled)
    }

    /// Percent range `[start, end]` covered by this stage.
    ///
    /// Breakpoints are 0/30/50/85/95/100. Terminal failure stages have no
    /// range of their own; they keep whatever percent was last reported.
    pub fn percent_range(self) -> Option<(u8, u8)> {
        match self {
            BuildStage::Queued => Some((0, 0)),
            BuildStage::Research => Some((0, 30)),
            BuildStage::Planning => Some((30, 50)),
            BuildStage::CodeGeneration => Some((50, 85)),
            BuildStage::QualityAssurance => Some((85, 95)),
            BuildStage::Finalizing => Some((95, 100)),
            BuildStage::Done => Some((100, 100)),
            BuildStage::Failed | BuildStage::Cancelled => None,
        }
    }

    /// Percent complete at `fraction` (clamped to `[0, 1]`) of this stage.
    pub fn percent_at(self, fraction: f32) -> Option<u8> {
        let (start, end) = self.percent_range()?;
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let span = f32::from(end - start);
        Some(start + (span * fraction).floor() as u8)
    }
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildStage::Queued => "queued",
            BuildStage::Research => "research",
            BuildStage::Planning => "planning",
            BuildStage::CodeGeneration => "code_generation",
            BuildStage::QualityAssurance => "quality_assurance",
            BuildStage::Finalizing => "finalizing",
            BuildStage::Done => "done",
            BuildStage::Failed => "failed",
            BuildStage::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Handle, failure, status
// ---------------------------------------------------------------------------

/// Opaque identifier returned by `start_build`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildHandle(pub Uuid);

impl BuildHandle {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn id(&self) -> Uuid {
        self.0
    }
}

impl Default for BuildHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BuildHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BuildHandle {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Category of a terminal build failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A mandatory step exhausted its retries and has no fallback.
    PhaseFatal,
    /// The build task itself died (panic or join error).
    Internal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::PhaseFatal => write!(f, "PhaseFatal"),
            FailureKind::Internal => write!(f, "Internal"),
        }
    }
}

/// Phase-attributed terminal failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildFailure {
    pub phase: BuildPhase,
    pub kind: FailureKind,
    /// Human-readable cause.
    pub cause: String,
}

impl fmt::Display for BuildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed ({}): {}", self.phase, self.kind, self.cause)
    }
}

/// Pollable view of a build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildStatus {
    pub build_id: Uuid,
    pub stage: BuildStage,
    pub percent_complete: u8,
    pub message: String,
    /// Generated files, available once Code Generation has completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_files: Option<Vec<GeneratedFile>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Box<AggregateBuildResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<BuildFailure>,
    /// Phase that was active when the build was cancelled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_in: Option<BuildPhase>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BuildStatus {
    /// Initial status of a freshly accepted build.
    pub fn queued(build_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            build_id,
            stage: BuildStage::Queued,
            percent_complete: 0,
            message: "Build queued".to_string(),
            partial_files: None,
            result: None,
            error: None,
            cancelled_in: None,
            started_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }
}

// ---------------------------------------------------------------------------
// Aggregate result
// ---------------------------------------------------------------------------

/// Wall-clock time spent in one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTiming {
    pub phase: BuildPhase,
    pub elapsed_ms: u64,
}

/// Provenance metadata for a finished build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildProvenance {
    /// Dotted section names that used fallback content, e.g. `artifacts.database`.
    pub fallback_sections: Vec<String>,
    pub phase_timings: Vec<PhaseTiming>,
}

impl BuildProvenance {
    pub fn used_fallback(&self, section: &str) -> bool {
        self.fallback_sections.iter().any(|s| s == section)
    }
}

/// Terminal value of a successful pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateBuildResult {
    pub build_id: Uuid,
    pub request: BuildRequest,
    pub research: ResearchOutput,
    pub strategy: StrategyOutput,
    pub artifacts: ArtifactsOutput,
    pub quality: QualityOutput,
    pub provenance: BuildProvenance,
    pub completed_at: DateTime<Utc>,
}
