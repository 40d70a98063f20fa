//! Strategic scoring agents: starving-market and uniqueness.
//!
//! Two independent best-effort invocations over the same research context.

use ideaforge_types::build::BuildRequest;
use ideaforge_types::provenance::Sourced;
use ideaforge_types::research::{Competitor, MarketIntelligence, StrategicScore, UserComplaint};

use super::{Agents, bullets, request_block};
use crate::invoker::{AgentOutput, Cancelled, InvokeScope};

pub const STARVING_MARKET_AGENT: &str = "starving_market_score";
pub const UNIQUENESS_AGENT: &str = "uniqueness_score";

pub const STARVING_MARKET_PERSONA: &str = "You are a venture analyst who judges demand. You \
    score how badly a market is starving for a better solution.";

pub const UNIQUENESS_PERSONA: &str = "You are a product strategist who judges differentiation. \
    You score how unique an idea is against the existing competition.";

const MAX_TOKENS: u32 = 1_024;

/// Neutral score used when an agent exhausts its attempts.
pub const FALLBACK_SCORE: u8 = 50;

impl AgentOutput for StrategicScore {}

pub fn fallback(what: &str) -> StrategicScore {
    StrategicScore {
        score: FALLBACK_SCORE,
        rationale: format!("{what} could not be assessed; a neutral default was applied."),
    }
}

/// What the scoring agents see from the research phase.
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub request: &'a BuildRequest,
    pub market: &'a MarketIntelligence,
    pub competitors: &'a [Competitor],
    pub complaints: &'a [UserComplaint],
}

fn context_block(ctx: &ScoringContext<'_>) -> String {
    format!(
        "{request}\n\
         ## Market size\n{size}\n\n\
         ## Market gaps\n{gaps}\n\n\
         ## Competitors\n{competitors}\n\n\
         ## Top user complaints\n{complaints}\n",
        request = request_block(ctx.request),
        size = ctx.market.market_size,
        gaps = bullets(ctx.market.market_gaps.iter().map(|g| &g.description)),
        competitors = bullets(ctx.competitors.iter().map(|c| &c.name)),
        complaints = bullets(ctx.complaints.iter().take(5).map(|c| &c.issue)),
    )
}

pub fn starving_market_prompt(ctx: &ScoringContext<'_>) -> String {
    format!(
        "{context}\n\
         ## Task\n\
         Score from 0 to 100 how starving this market is: unmet demand, frustration with \
         existing options, willingness to pay. 100 means customers are desperate for a solution.\n\n\
         Return JSON with:\n\
         - score (integer 0-100)\n\
         - rationale (string)\n",
        context = context_block(ctx),
    )
}

pub fn uniqueness_prompt(ctx: &ScoringContext<'_>) -> String {
    format!(
        "{context}\n\
         ## Task\n\
         Score from 0 to 100 how unique this idea is compared to the competitors listed. \
         100 means nothing comparable exists.\n\n\
         Return JSON with:\n\
         - score (integer 0-100)\n\
         - rationale (string)\n",
        context = context_block(ctx),
    )
}

pub fn shape(mut score: StrategicScore) -> StrategicScore {
    score.score = score.score.min(100);
    score.rationale = score.rationale.trim().to_string();
    score
}

impl Agents {
    pub async fn starving_market_score(
        &self,
        ctx: &ScoringContext<'_>,
        scope: &InvokeScope,
    ) -> Result<Sourced<StrategicScore>, Cancelled> {
        let mut invocation = self.invocation(
            STARVING_MARKET_AGENT,
            STARVING_MARKET_PERSONA,
            starving_market_prompt(ctx),
            MAX_TOKENS,
        );
        let score = self
            .invoker()
            .invoke(&mut invocation, fallback("Market demand"), scope)
            .await?;
        Ok(score.map(shape))
    }

    pub async fn uniqueness_score(
        &self,
        ctx: &ScoringContext<'_>,
        scope: &InvokeScope,
    ) -> Result<Sourced<StrategicScore>, Cancelled> {
        let mut invocation = self.invocation(
            UNIQUENESS_AGENT,
            UNIQUENESS_PERSONA,
            uniqueness_prompt(ctx),
            MAX_TOKENS,
        );
        let score = self
            .invoker()
            .invoke(&mut invocation, fallback("Uniqueness"), scope)
            .await?;
        Ok(score.map(shape))
    }
}
