//! Configuration types for IdeaForge.
//!
//! `ForgeConfig` represents the top-level `config.toml` that controls retry
//! policy, model selection, per-tier limits, and build-state retention. Every
//! field has a default so an empty or missing file is a valid configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::build::Tier;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForgeConfig {
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub models: ModelSettings,
    #[serde(default)]
    pub tiers: TierSettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub provider: ProviderSettings,
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

/// Bounded fixed-delay retry settings for every remote call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Maximum transport calls per invocation (default 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Constant pause between attempts in milliseconds (default 2000).
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    /// Timeout applied to each individual remote call (default 120s).
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_delay_ms() -> u64 {
    2_000
}

fn default_call_timeout_secs() -> u64 {
    120
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            delay_ms: default_delay_ms(),
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// Models
// ---------------------------------------------------------------------------

/// Model identifiers, with optional per-agent overrides keyed by agent name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSettings {
    #[serde(default = "default_model")]
    pub default: String,
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            default: default_model(),
            overrides: HashMap::new(),
        }
    }
}

impl ModelSettings {
    /// Model to use for the named agent.
    pub fn model_for(&self, agent: &str) -> &str {
        self.overrides
            .get(agent)
            .map(String::as_str)
            .unwrap_or(&self.default)
    }
}

// ---------------------------------------------------------------------------
// Tiers
// ---------------------------------------------------------------------------

/// How much upstream data each agent sees for one tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierLimits {
    /// Data sources handed to Competitor Analysis.
    pub competitor_sources: usize,
    /// Competitors handed to Review Analysis.
    pub review_competitors: usize,
    /// Generated files handed to the Quality Auditor.
    pub audit_files: usize,
}

/// Limits for every tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSettings {
    #[serde(default = "free_limits")]
    pub free: TierLimits,
    #[serde(default = "starter_limits")]
    pub starter: TierLimits,
    #[serde(default = "premium_limits")]
    pub premium: TierLimits,
}

fn free_limits() -> TierLimits {
    TierLimits {
        competitor_sources: 3,
        review_competitors: 0,
        audit_files: 6,
    }
}

fn starter_limits() -> TierLimits {
    TierLimits {
        competitor_sources: 5,
        review_competitors: 3,
        audit_files: 12,
    }
}

fn premium_limits() -> TierLimits {
    TierLimits {
        competitor_sources: 8,
        review_competitors: 5,
        audit_files: 24,
    }
}

impl Default for TierSettings {
    fn default() -> Self {
        Self {
            free: free_limits(),
            starter: starter_limits(),
            premium: premium_limits(),
        }
    }
}

impl TierSettings {
    pub fn limits(&self, tier: Tier) -> &TierLimits {
        match tier {
            Tier::Free => &self.free,
            Tier::Starter => &self.starter,
            Tier::Premium => &self.premium,
        }
    }
}

// ---------------------------------------------------------------------------
// Store / provider
// ---------------------------------------------------------------------------

/// Retention of finished builds in the build-state store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Seconds a terminal build stays pollable (default 3600).
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_ttl_secs() -> u64 {
    3_600
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

/// Remote text-generation endpoint settings. The API key is never stored here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forge_config_default_values() {
        let config = ForgeConfig::default();
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.delay_ms, 2_000);
        assert_eq!(config.store.ttl_secs, 3_600);
        assert_eq!(config.models.default, "claude-sonnet-4-20250514");
        assert_eq!(config.tiers.limits(Tier::Free).competitor_sources, 3);
        assert_eq!(config.tiers.limits(Tier::Starter).competitor_sources, 5);
    }

    #[test]
    fn test_forge_config_deserialize_empty() {
        let config: ForgeConfig = toml::from_str("").unwrap();
        assert_eq!(config, ForgeConfig::default());
    }

    #[test]
    fn test_forge_config_deserialize_with_values() {
        let toml_str = r#"
[retry]
max_retries = 5
delay_ms = 250

[models]
default = "claude-haiku-4-20250514"

[models.overrides]
schema_designer = "claude-opus-4-20250514"

[tiers.premium]
competitor_sources = 10
review_competitors = 6
audit_files = 40
"#;
        let config: ForgeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.delay_ms, 250);
        assert_eq!(config.retry.call_timeout_secs, 120);
        assert_eq!(config.models.model_for("schema_designer"), "claude-opus-4-20250514");
        assert_eq!(config.models.model_for("pricing_strategy"), "claude-haiku-4-20250514");
        assert_eq!(config.tiers.premium.competitor_sources, 10);
        assert_eq!(config.tiers.free, TierSettings::default().free);
    }
}
