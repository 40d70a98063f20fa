//! Review Analysis agent.

use std::cmp::Reverse;

use ideaforge_types::build::BuildRequest;
use ideaforge_types::config::TierLimits;
use ideaforge_types::provenance::Sourced;
use ideaforge_types::research::{Competitor, ReviewAnalysis};

use super::{Agents, bullets, clean_strings, request_block};
use crate::invoker::{AgentOutput, Cancelled, InvokeScope};

pub const AGENT: &str = "review_analysis";

pub const PERSONA: &str = "You are a customer insights researcher. You mine public reviews of \
    software products and summarize the recurring complaints and the features users love.";

const MAX_TOKENS: u32 = 4_096;

impl AgentOutput for ReviewAnalysis {
    fn validate(&self) -> Result<(), String> {
        if self.sentiment.is_some_and(|s| !s.is_finite()) {
            return Err("sentiment must be a finite number".to_string());
        }
        Ok(())
    }
}

/// Empty complaints with neutral sentiment.
pub fn fallback() -> ReviewAnalysis {
    ReviewAnalysis {
        complaints: Vec::new(),
        praised_features: Vec::new(),
        sentiment: Some(0.0),
    }
}

/// Prompt over the first `limits.review_competitors` competitors.
pub fn prompt(request: &BuildRequest, competitors: &[Competitor], limits: &TierLimits) -> String {
    let names = competitors
        .iter()
        .take(limits.review_competitors)
        .map(|c| match &c.url {
            Some(url) => format!("{} ({url})", c.name),
            None => c.name.clone(),
        });

    format!(
        "{request}\n\
         ## Competitors\n{names}\n\n\
         ## Task\n\
         Analyze user reviews of these competitors.\n\n\
         Return JSON with:\n\
         - complaints (array of {{\"issue\": string, \"frequency\": integer, \"competitor\": string}})\n\
         - praised_features (array of strings)\n\
         - sentiment (number between -1 and 1)\n",
        request = request_block(request),
        names = bullets(names),
    )
}

/// Complaints sorted by descending frequency, sentiment clamped to `[-1, 1]`.
pub fn shape(mut analysis: ReviewAnalysis) -> ReviewAnalysis {
    analysis.complaints.retain(|c| !c.issue.trim().is_empty());
    analysis.complaints.sort_by_key(|c| Reverse(c.frequency));
    analysis.praised_features = clean_strings(analysis.praised_features);
    analysis.sentiment = analysis.sentiment.map(|s| s.clamp(-1.0, 1.0));
    analysis
}

impl Agents {
    /// Run Review Analysis; falls back to no complaints, neutral sentiment.
    pub async fn review_analysis(
        &self,
        request: &BuildRequest,
        competitors: &[Competitor],
        limits: &TierLimits,
        scope: &InvokeScope,
    ) -> Result<Sourced<ReviewAnalysis>, Cancelled> {
        let mut invocation =
            self.invocation(AGENT, PERSONA, prompt(request, competitors, limits), MAX_TOKENS);
        let analysis = self.invoker().invoke(&mut invocation, fallback(), scope).await?;
        Ok(analysis.map(shape))
    }
}
