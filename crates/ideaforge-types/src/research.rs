//! Research phase output types.
//!
//! Records produced by the Market Intelligence, Competitor Analysis, Review
//! Analysis, and strategic scoring agents. Required fields are plain types;
//! anything a model may legitimately omit is `Option<T>` or a defaulted `Vec`.

use serde::{Deserialize, Serialize};

use crate::provenance::Sourced;

// ---------------------------------------------------------------------------
// Market intelligence
// ---------------------------------------------------------------------------

/// A discoverable data source (competitor site, marketplace, forum, report).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Free-form category, e.g. "competitor", "forum", "report".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// An unmet need in the target market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketGap {
    pub description: String,
    #[serde(
        default,
        deserialize_with = "crate::score::deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub opportunity_score: Option<u8>,
}

/// Market Intelligence agent output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketIntelligence {
    /// Human-readable market size estimate, e.g. "$4.2B (2025)".
    pub market_size: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub growth_rate: Option<String>,
    #[serde(default)]
    pub target_audience: Vec<String>,
    #[serde(default)]
    pub market_gaps: Vec<MarketGap>,
    #[serde(default)]
    pub trends: Vec<String>,
    #[serde(default)]
    pub data_sources: Vec<DataSource>,
}

// ---------------------------------------------------------------------------
// Competitors
// ---------------------------------------------------------------------------

/// One analyzed competitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competitor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<String>,
}

/// Competitor Analysis agent output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompetitorAnalysis {
    #[serde(default)]
    pub competitors: Vec<Competitor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_positioning: Option<String>,
}

// ---------------------------------------------------------------------------
// Reviews
// ---------------------------------------------------------------------------

/// A recurring complaint found in competitor reviews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserComplaint {
    pub issue: String,
    /// How many reviews mention it (relative weight when exact counts are unknown).
    #[serde(default)]
    pub frequency: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competitor: Option<String>,
}

/// Review Analysis agent output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewAnalysis {
    #[serde(default)]
    pub complaints: Vec<UserComplaint>,
    #[serde(default)]
    pub praised_features: Vec<String>,
    /// Overall sentiment in `[-1.0, 1.0]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<f64>,
}

// ---------------------------------------------------------------------------
// Strategic scores
// ---------------------------------------------------------------------------

/// A 0-100 strategic score with the model's justification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategicScore {
    #[serde(deserialize_with = "crate::score::deserialize")]
    pub score: u8,
    pub rationale: String,
}

/// An agent the sequencer deliberately did not run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedAgent {
    pub agent: String,
    pub reason: String,
}

/// Accumulated Research phase output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchOutput {
    pub market: Sourced<MarketIntelligence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competitors: Option<Sourced<CompetitorAnalysis>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviews: Option<Sourced<ReviewAnalysis>>,
    pub starving_market: Sourced<StrategicScore>,
    pub uniqueness: Sourced<StrategicScore>,
    #[serde(default)]
    pub skipped: Vec<SkippedAgent>,
}

impl ResearchOutput {
    /// Competitors found during research, empty when the agent was skipped.
    pub fn competitor_list(&self) -> &[Competitor] {
        self.competitors
            .as_ref()
            .map(|c| c.competitors.as_slice())
            .unwrap_or_default()
    }

    /// Complaints found during research, empty when reviews were skipped.
    pub fn complaint_list(&self) -> &[UserComplaint] {
        self.reviews
            .as_ref()
            .map(|r| r.complaints.as_slice())
            .unwrap_or_default()
    }
}
