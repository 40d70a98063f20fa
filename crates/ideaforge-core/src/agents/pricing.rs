//! Pricing Strategy agent.

use ideaforge_types::build::BuildRequest;
use ideaforge_types::provenance::Sourced;
use ideaforge_types::research::Competitor;
use ideaforge_types::strategy::{CompetitiveAdvantage, PricingStrategy, PricingTier};

use super::{Agents, bullets, clean_strings, request_block};
use crate::invoker::{AgentOutput, Cancelled, InvokeScope};

pub const AGENT: &str = "pricing_strategy";

pub const PERSONA: &str = "You are a SaaS pricing strategist. You design simple plan ladders \
    that convert free users and anchor against competitor prices.";

const MAX_TOKENS: u32 = 2_048;

/// Upper bound on plans kept from one response.
pub const MAX_TIERS: usize = 5;

impl AgentOutput for PricingStrategy {
    fn validate(&self) -> Result<(), String> {
        if self.tiers.is_empty() {
            return Err("pricing strategy must define at least one tier".to_string());
        }
        if let Some(tier) = self
            .tiers
            .iter()
            .find(|t| !t.price_monthly.is_finite() || t.price_monthly < 0.0)
        {
            return Err(format!("tier '{}' has an invalid price", tier.name));
        }
        Ok(())
    }
}

/// Three-tier freemium plan.
pub fn fallback() -> PricingStrategy {
    let tier = |name: &str, price: f64, features: &[&str]| PricingTier {
        name: name.to_string(),
        price_monthly: price,
        features: features.iter().map(|f| f.to_string()).collect(),
    };
    PricingStrategy {
        model: "freemium".to_string(),
        tiers: vec![
            tier("Free", 0.0, &["Core features", "Single user", "Community support"]),
            tier("Pro", 19.0, &["Everything in Free", "Unlimited usage", "Email support"]),
            tier(
                "Business",
                49.0,
                &["Everything in Pro", "Team seats", "Priority support"],
            ),
        ],
        currency: "USD".to_string(),
        rationale: Some(
            "Default freemium ladder; pricing analysis was unavailable for this build.".to_string(),
        ),
    }
}

pub fn prompt(
    request: &BuildRequest,
    advantages: &[CompetitiveAdvantage],
    competitors: &[Competitor],
) -> String {
    let competitor_prices = competitors.iter().map(|c| match &c.pricing {
        Some(pricing) => format!("{}: {pricing}", c.name),
        None => format!("{}: unknown", c.name),
    });

    format!(
        "{request}\n\
         ## Competitive advantages\n{advantages}\n\n\
         ## Competitor pricing\n{prices}\n\n\
         ## Task\n\
         Design a pricing strategy for this product.\n\n\
         Return JSON with:\n\
         - model (string): e.g. \"freemium\", \"subscription\", \"usage-based\"\n\
         - tiers (array of {{\"name\": string, \"price_monthly\": number, \"features\": [string]}}, at least one)\n\
         - currency (ISO 4217 code)\n\
         - rationale (string)\n",
        request = request_block(request),
        advantages = bullets(advantages.iter().map(|a| &a.description)),
        prices = bullets(competitor_prices),
    )
}

/// Plans sorted by ascending price and capped; currency upper-cased.
pub fn shape(mut pricing: PricingStrategy) -> PricingStrategy {
    pricing.tiers.retain(|t| !t.name.trim().is_empty());
    pricing
        .tiers
        .sort_by(|a, b| a.price_monthly.total_cmp(&b.price_monthly));
    pricing.tiers.truncate(MAX_TIERS);
    for tier in &mut pricing.tiers {
        tier.features = clean_strings(std::mem::take(&mut tier.features));
    }
    pricing.currency = pricing.currency.trim().to_uppercase();
    if pricing.currency.is_empty() {
        pricing.currency = "USD".to_string();
    }
    pricing
}

impl Agents {
    /// Run Pricing Strategy; falls back to the freemium ladder.
    pub async fn pricing_strategy(
        &self,
        request: &BuildRequest,
        advantages: &[CompetitiveAdvantage],
        competitors: &[Competitor],
        scope: &InvokeScope,
    ) -> Result<Sourced<PricingStrategy>, Cancelled> {
        let mut invocation = self.invocation(
            AGENT,
            PERSONA,
            prompt(request, advantages, competitors),
            MAX_TOKENS,
        );
        let pricing = self.invoker().invoke(&mut invocation, fallback(), scope).await?;
        Ok(pricing.map(shape))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ideaforge_types::build::Tier;
    use ideaforge_types::strategy::AdvantageSource;

    #[test]
    fn fallback_is_valid_three_tier_freemium() {
        let fb = fallback();
        assert!(fb.validate().is_ok());
        assert_eq!(fb.model, "freemium");
        assert_eq!(fb.tiers.len(), 3);
        assert_eq!(fb.tiers[0].price_monthly, 0.0);
    }

    #[test]
    fn validate_rejects_empty_and_negative() {
        let mut pricing = fallback();
        pricing.tiers[1].price_monthly = -5.0;
        assert!(pricing.validate().unwrap_err().contains("Pro"));

        pricing.tiers.clear();
        assert!(pricing.validate().is_err());
    }

    #[test]
    fn shape_sorts_by_price_and_normalizes_currency() {
        let pricing: PricingStrategy = serde_json::from_str(
            r#"{
                "model": "subscription",
                "currency": " eur ",
                "tiers": [
                    {"name": "Team", "price_monthly": 30},
                    {"name": "Solo", "price_monthly": 9.5, "features": ["", "sync"]}
                ]
            }"#,
        )
        .unwrap();

        let shaped = shape(pricing);
        assert_eq!(shaped.currency, "EUR");
        assert_eq!(shaped.tiers[0].name, "Solo");
        assert_eq!(shaped.tiers[0].features, vec!["sync"]);
    }

    #[test]
    fn missing_currency_defaults_to_usd() {
        let pricing: PricingStrategy =
            serde_json::from_str(r#"{"model": "freemium", "tiers": [{"name": "Free", "price_monthly": 0}]}"#)
                .unwrap();
        assert_eq!(shape(pricing).currency, "USD");
    }

    #[test]
    fn prompt_lists_advantages_and_prices() {
        let advantages = vec![CompetitiveAdvantage {
            rank: 1,
            source: AdvantageSource::MarketGap,
            description: "offline-first".to_string(),
        }];
        let competitors = vec![Competitor {
            name: "Acme".to_string(),
            url: None,
            strengths: vec![],
            weaknesses: vec![],
            pricing: Some("$12/mo".to_string()),
        }];
        let prompt = prompt(&BuildRequest::new("x", "y", Tier::Free), &advantages, &competitors);
        assert!(prompt.contains("- offline-first"));
        assert!(prompt.contains("- Acme: $12/mo"));
    }
}
