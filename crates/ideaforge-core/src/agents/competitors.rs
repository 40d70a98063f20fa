//! Competitor Analysis agent.

use ideaforge_types::build::BuildRequest;
use ideaforge_types::config::TierLimits;
use ideaforge_types::provenance::Sourced;
use ideaforge_types::research::{CompetitorAnalysis, MarketIntelligence};

use super::{Agents, bullets, clean_strings, request_block};
use crate::invoker::{AgentOutput, Cancelled, InvokeScope};

pub const AGENT: &str = "competitor_analysis";

pub const PERSONA: &str = "You are a competitive intelligence analyst. You compare products \
    feature by feature and state their strengths, weaknesses, and pricing plainly.";

const MAX_TOKENS: u32 = 4_096;

/// Upper bound on competitors kept from one response.
pub const MAX_COMPETITORS: usize = 10;

impl AgentOutput for CompetitorAnalysis {}

pub fn fallback() -> CompetitorAnalysis {
    CompetitorAnalysis::default()
}

/// Prompt seeded with the first `limits.competitor_sources` data sources.
pub fn prompt(request: &BuildRequest, market: &MarketIntelligence, limits: &TierLimits) -> String {
    let sources = market
        .data_sources
        .iter()
        .take(limits.competitor_sources)
        .map(|s| match (&s.url, &s.kind) {
            (Some(url), Some(kind)) => format!("{} ({kind}): {url}", s.name),
            (Some(url), None) => format!("{}: {url}", s.name),
            (None, Some(kind)) => format!("{} ({kind})", s.name),
            (None, None) => s.name.clone(),
        });

    format!(
        "{request}\n\
         ## Market size\n{size}\n\n\
         ## Data sources\n{sources}\n\n\
         ## Task\n\
         Identify the direct competitors for this idea using the data sources above.\n\n\
         Return JSON with:\n\
         - competitors (array of {{\"name\": string, \"url\": string, \"strengths\": [string], \"weaknesses\": [string], \"pricing\": string}})\n\
         - market_positioning (string): where a new entrant could position itself\n",
        request = request_block(request),
        size = market.market_size,
        sources = bullets(sources),
    )
}

/// Drop unnamed and duplicate competitors, cap the list.
pub fn shape(mut analysis: CompetitorAnalysis) -> CompetitorAnalysis {
    let mut seen = std::collections::HashSet::new();
    analysis
        .competitors
        .retain(|c| !c.name.trim().is_empty() && seen.insert(c.name.trim().to_lowercase()));
    analysis.competitors.truncate(MAX_COMPETITORS);
    for competitor in &mut analysis.competitors {
        competitor.name = competitor.name.trim().to_string();
        competitor.strengths = clean_strings(std::mem::take(&mut competitor.strengths));
        competitor.weaknesses = clean_strings(std::mem::take(&mut competitor.weaknesses));
    }
    analysis
}

impl Agents {
    /// Run Competitor Analysis; falls back to an empty competitor list.
    pub async fn competitor_analysis(
        &self,
        request: &BuildRequest,
        market: &MarketIntelligence,
        limits: &TierLimits,
        scope: &InvokeScope,
    ) -> Result<Sourced<CompetitorAnalysis>, Cancelled> {
        let mut invocation =
            self.invocation(AGENT, PERSONA, prompt(request, market, limits), MAX_TOKENS);
        let analysis = self.invoker().invoke(&mut invocation, fallback(), scope).await?;
        Ok(analysis.map(shape))
    }
}
