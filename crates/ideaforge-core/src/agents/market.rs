//! Market Intelligence agent.
//!
//! The only mandatory agent: without a market picture there is nothing to
//! build on, so exhaustion is fatal for the Research phase.

use std::cmp::Reverse;

use ideaforge_types::build::BuildRequest;
use ideaforge_types::provenance::Sourced;
use ideaforge_types::research::MarketIntelligence;

use super::{Agents, clean_strings, request_block};
use crate::invoker::{AgentOutput, InvokeError, InvokeScope};

pub const AGENT: &str = "market_intelligence";

pub const PERSONA: &str = "You are a senior market research analyst. You size markets, \
    identify underserved needs, and name the concrete places where competitors and customers \
    can be found.";

const MAX_TOKENS: u32 = 4_096;

impl AgentOutput for MarketIntelligence {
    fn validate(&self) -> Result<(), String> {
        if self.market_size.trim().is_empty() {
            return Err("market_size must not be empty".to_string());
        }
        Ok(())
    }
}

pub fn prompt(request: &BuildRequest) -> String {
    format!(
        "{request}\n\
         ## Task\n\
         Research the market for this idea.\n\n\
         Return JSON with:\n\
         - market_size (string, required): estimated size with year, e.g. \"$4.2B (2025)\"\n\
         - growth_rate (string): annual growth, e.g. \"12% CAGR\"\n\
         - target_audience (array of strings)\n\
         - market_gaps (array of {{\"description\": string, \"opportunity_score\": 0-100}})\n\
         - trends (array of strings)\n\
         - data_sources (array of {{\"name\": string, \"url\": string, \"kind\": \"competitor\" | \"marketplace\" | \"forum\" | \"report\"}})\n",
        request = request_block(request),
    )
}

/// Market gaps ordered by opportunity (unscored last, stable), blanks dropped,
/// data sources de-duplicated by name.
pub fn shape(mut market: MarketIntelligence) -> MarketIntelligence {
    market.market_size = market.market_size.trim().to_string();
    market.target_audience = clean_strings(market.target_audience);
    market.trends = clean_strings(market.trends);

    market.market_gaps.retain(|g| !g.description.trim().is_empty());
    for gap in &mut market.market_gaps {
        gap.opportunity_score = gap.opportunity_score.map(|s| s.min(100));
    }
    market
        .market_gaps
        .sort_by_key(|g| Reverse(g.opportunity_score.map_or(-1, i16::from)));

    let mut seen = std::collections::HashSet::new();
    market
        .data_sources
        .retain(|s| !s.name.trim().is_empty() && seen.insert(s.name.trim().to_lowercase()));

    market
}

impl Agents {
    /// Run Market Intelligence. Exhaustion is returned to the caller.
    pub async fn market_intelligence(
        &self,
        request: &BuildRequest,
        scope: &InvokeScope,
    ) -> Result<Sourced<MarketIntelligence>, InvokeError> {
        let mut invocation = self.invocation(AGENT, PERSONA, prompt(request), MAX_TOKENS);
        let market = self
            .invoker()
            .invoke_required::<MarketIntelligence>(&mut invocation, scope)
            .await?;
        Ok(market.map(shape))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ideaforge_types::build::Tier;
    use ideaforge_types::research::{DataSource, MarketGap};

    fn gap(description: &str, score: Option<u8>) -> MarketGap {
        MarketGap {
            description: description.to_string(),
            opportunity_score: score,
        }
    }

    fn source(name: &str) -> DataSource {
        DataSource {
            name: name.to_string(),
            url: None,
            kind: None,
        }
    }

    #[test]
    fn validate_rejects_blank_market_size() {
        let market: MarketIntelligence = serde_json::from_str(r#"{"market_size": "  "}"#).unwrap();
        assert!(market.validate().is_err());

        let market: MarketIntelligence = serde_json::from_str(r#"{"market_size": "$1B"}"#).unwrap();
        assert!(market.validate().is_ok());
    }

    #[test]
    fn missing_market_size_is_a_schema_error() {
        let result = serde_json::from_str::<MarketIntelligence>(r#"{"trends": []}"#);
        assert!(result.is_err());
    }

    #[test]
    fn shape_orders_gaps_by_opportunity() {
        let market = MarketIntelligence {
            market_size: " $3B ".to_string(),
            growth_rate: None,
            target_audience: vec!["".to_string(), "founders".to_string()],
            market_gaps: vec![
                gap("unscored", None),
                gap("medium", Some(60)),
                gap("", Some(99)),
                gap("high", Some(90)),
                gap("also medium", Some(60)),
            ],
            trends: vec![],
            data_sources: vec![],
        };

        let shaped = shape(market);

        assert_eq!(shaped.market_size, "$3B");
        assert_eq!(shaped.target_audience, vec!["founders"]);
        let order: Vec<&str> = shaped.market_gaps.iter().map(|g| g.description.as_str()).collect();
        assert_eq!(order, vec!["high", "medium", "also medium", "unscored"]);
    }

    #[test]
    fn shape_dedupes_data_sources() {
        let market = MarketIntelligence {
            market_size: "$1B".to_string(),
            growth_rate: None,
            target_audience: vec![],
            market_gaps: vec![],
            trends: vec![],
            data_sources: vec![source("G2"), source("g2 "), source(""), source("Capterra")],
        };

        let shaped = shape(market);
        let names: Vec<&str> = shaped.data_sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["G2", "Capterra"]);
    }

    #[test]
    fn prompt_mentions_request_and_required_field() {
        let request = BuildRequest::new("AI meal planner", "busy parents", Tier::Free);
        let prompt = prompt(&request);
        assert!(prompt.contains("AI meal planner"));
        assert!(prompt.contains("market_size (string, required)"));
        assert!(prompt.contains("data_sources"));
    }
}
