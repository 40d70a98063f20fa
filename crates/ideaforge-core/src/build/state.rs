//! PhaseState accumulator.
//!
//! Created empty when a build starts and owned exclusively by the sequencer.
//! Each completed phase fills exactly one slot; nothing is ever overwritten.
//! At the end of a successful run the state is converted into the
//! `AggregateBuildResult`, otherwise it is dropped.

use chrono::Utc;
use ideaforge_types::artifacts::ArtifactsOutput;
use ideaforge_types::build::{
    AggregateBuildResult, BuildPhase, BuildProvenance, BuildRequest, PhaseTiming,
};
use ideaforge_types::quality::QualityOutput;
use ideaforge_types::research::ResearchOutput;
use ideaforge_types::strategy::StrategyOutput;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct PhaseState {
    pub research: Option<ResearchOutput>,
    pub strategy: Option<StrategyOutput>,
    pub artifacts: Option<ArtifactsOutput>,
    pub quality: Option<QualityOutput>,
    timings: Vec<PhaseTiming>,
}

impl PhaseState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_timing(&mut self, phase: BuildPhase, elapsed_ms: u64) {
        self.timings.push(PhaseTiming { phase, elapsed_ms });
    }

    /// Dotted names of every section filled from a fallback document.
    pub fn fallback_sections(&self) -> Vec<String> {
        let mut sections = Vec::new();
        let mut mark = |name: &str, is_fallback: bool| {
            if is_fallback {
                sections.push(name.to_string());
            }
        };

        if let Some(research) = &self.research {
            mark("research.market", research.market.is_fallback());
            mark(
                "research.competitors",
                research.competitors.as_ref().is_some_and(|c| c.is_fallback()),
            );
            mark(
                "research.reviews",
                research.reviews.as_ref().is_some_and(|r| r.is_fallback()),
            );
            mark("research.starving_market", research.starving_market.is_fallback());
            mark("research.uniqueness", research.uniqueness.is_fallback());
        }
        if let Some(strategy) = &self.strategy {
            mark("strategy.pricing", strategy.pricing.is_fallback());
        }
        if let Some(artifacts) = &self.artifacts {
            mark("artifacts.database", artifacts.database.is_fallback());
            mark("artifacts.backend", artifacts.backend.is_fallback());
            mark("artifacts.frontend", artifacts.frontend.is_fallback());
        }
        if let Some(quality) = &self.quality {
            mark("quality.report", quality.report.is_fallback());
        }
        sections
    }

    /// Convert a fully populated state into the aggregate result.
    ///
    /// Returns the name of the first missing section otherwise.
    pub fn into_result(
        self,
        build_id: Uuid,
        request: BuildRequest,
    ) -> Result<AggregateBuildResult, &'static str> {
        let provenance = BuildProvenance {
            fallback_sections: self.fallback_sections(),
            phase_timings: self.timings,
        };
        Ok(AggregateBuildResult {
            build_id,
            request,
            research: self.research.ok_or("research")?,
            strategy: self.strategy.ok_or("strategy")?,
            artifacts: self.artifacts.ok_or("artifacts")?,
            quality: self.quality.ok_or("quality")?,
            provenance,
            completed_at: Utc::now(),
        })
    }
}
