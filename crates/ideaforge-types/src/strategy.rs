//! Planning phase output types.

use serde::{Deserialize, Serialize};

use crate::provenance::Sourced;

/// Which research finding a competitive advantage was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvantageSource {
    MarketGap,
    UserComplaint,
}

/// A ranked competitive advantage, derived deterministically from research.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitiveAdvantage {
    /// 1-based rank.
    pub rank: u8,
    pub source: AdvantageSource,
    pub description: String,
}

/// One plan within a pricing strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingTier {
    pub name: String,
    /// Monthly price in the strategy's currency; 0 for free plans.
    pub price_monthly: f64,
    #[serde(default)]
    pub features: Vec<String>,
}

/// Pricing Strategy agent output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingStrategy {
    /// Pricing model name, e.g. "freemium", "usage-based".
    pub model: String,
    pub tiers: Vec<PricingTier>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// Accumulated Planning phase output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyOutput {
    pub advantages: Vec<CompetitiveAdvantage>,
    pub pricing: Sourced<PricingStrategy>,
}
