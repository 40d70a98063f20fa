//! Phase sequencer.
//!
//! Runs the four build phases strictly in order on the calling task:
//!
//! ```text
//! Research -> Planning -> CodeGeneration -> QualityAssurance -> Done
//! ```
//!
//! Each phase reads the outputs accumulated so far in [`PhaseState`] and
//! fills its own slot. Two absorbing exits exist besides `Done`:
//!
//! - `Failed(phase, cause)`: only Market Intelligence exhaustion is fatal;
//!   every other agent degrades to its fallback document.
//! - `Cancelled(phase)`: the cancellation token fired at a phase boundary or
//!   inside an invocation. Outputs of the interrupted phase are discarded.
//!
//! No phase is retried or re-entered.

use std::time::Instant;

use ideaforge_types::artifacts::ArtifactsOutput;
use ideaforge_types::build::{
    AggregateBuildResult, BuildFailure, BuildPhase, BuildRequest, BuildStage, FailureKind, Tier,
};
use ideaforge_types::config::{TierLimits, TierSettings};
use ideaforge_types::quality::QualityOutput;
use ideaforge_types::research::{ResearchOutput, SkippedAgent};
use ideaforge_types::strategy::StrategyOutput;
use tracing::Instrument;
use uuid::Uuid;

use super::planning;
use super::progress::ProgressSink;
use super::state::PhaseState;
use crate::agents::scores::ScoringContext;
use crate::agents::{Agents, competitors, reviews};
use crate::invoker::{Cancelled, InvokeError, InvokeScope};

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Terminal outcome of one sequencer run.
#[derive(Debug, Clone)]
pub enum BuildOutcome {
    Done(Box<AggregateBuildResult>),
    Failed(BuildFailure),
    Cancelled { phase: BuildPhase },
}

impl BuildOutcome {
    pub fn stage(&self) -> BuildStage {
        match self {
            BuildOutcome::Done(_) => BuildStage::Done,
            BuildOutcome::Failed(_) => BuildStage::Failed,
            BuildOutcome::Cancelled { .. } => BuildStage::Cancelled,
        }
    }
}

/// Why a phase stopped early.
#[derive(Debug)]
enum PhaseError {
    Fatal(String),
    Internal(String),
    Cancelled,
}

impl From<Cancelled> for PhaseError {
    fn from(_: Cancelled) -> Self {
        PhaseError::Cancelled
    }
}

/// Borrow an earlier phase's output. Phase ordering guarantees presence;
/// absence is an internal error, never a panic.
fn require<'a, T>(slot: &'a Option<T>, name: &str) -> Result<&'a T, PhaseError> {
    slot.as_ref()
        .ok_or_else(|| PhaseError::Internal(format!("{name} output missing")))
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// PhaseSequencer
// ---------------------------------------------------------------------------

/// Runs builds. Shared read-only across all builds of a service.
#[derive(Debug, Clone)]
pub struct PhaseSequencer {
    agents: Agents,
    tiers: TierSettings,
}

impl PhaseSequencer {
    pub fn new(agents: Agents, tiers: TierSettings) -> Self {
        Self { agents, tiers }
    }

    /// Run all phases for one build.
    pub async fn run<P: ProgressSink>(
        &self,
        request: &BuildRequest,
        scope: &InvokeScope,
        progress: &P,
    ) -> BuildOutcome {
        let span = tracing::info_span!("build", build_id = %scope.build_id, tier = %request.tier);
        self.run_phases(request, scope, progress).instrument(span).await
    }

    async fn run_phases<P: ProgressSink>(
        &self,
        request: &BuildRequest,
        scope: &InvokeScope,
        progress: &P,
    ) -> BuildOutcome {
        let limits = self.tiers.limits(request.tier);
        let mut state = PhaseState::new();

        for phase in BuildPhase::ALL {
            if scope.cancel.is_cancelled() {
                tracing::info!(%phase, "build cancelled at phase boundary");
                return BuildOutcome::Cancelled { phase };
            }

            tracing::info!(%phase, "phase started");
            let started = Instant::now();

            let result = match phase {
                BuildPhase::Research => self
                    .research(request, limits, scope, progress)
                    .await
                    .map(|out| state.research = Some(out)),
                BuildPhase::Planning => match require(&state.research, "research") {
                    Ok(research) => self
                        .planning(request, research, scope, progress)
                        .await
                        .map(|out| state.strategy = Some(out)),
                    Err(e) => Err(e),
                },
                BuildPhase::CodeGeneration => {
                    match (
                        require(&state.research, "research"),
                        require(&state.strategy, "strategy"),
                    ) {
                        (Ok(research), Ok(strategy)) => self
                            .code_generation(request, research, strategy, scope, progress)
                            .await
                            .map(|out| state.artifacts = Some(out)),
                        (Err(e), _) | (_, Err(e)) => Err(e),
                    }
                }
                BuildPhase::QualityAssurance => match require(&state.artifacts, "artifacts") {
                    Ok(artifacts) => self
                        .quality_assurance(request, artifacts, limits, scope, progress)
                        .await
                        .map(|out| state.quality = Some(out)),
                    Err(e) => Err(e),
                },
            };

            let elapsed = elapsed_ms(started);
            match result {
                Ok(()) => {
                    tracing::info!(%phase, elapsed_ms = elapsed, "phase completed");
                    state.record_timing(phase, elapsed);
                }
                Err(PhaseError::Cancelled) => {
                    tracing::info!(%phase, "build cancelled during phase");
                    return BuildOutcome::Cancelled { phase };
                }
                Err(PhaseError::Fatal(cause)) => {
                    tracing::error!(%phase, cause = %cause, "phase failed");
                    return BuildOutcome::Failed(BuildFailure {
                        phase,
                        kind: FailureKind::PhaseFatal,
                        cause,
                    });
                }
                Err(PhaseError::Internal(cause)) => {
                    tracing::error!(%phase, cause = %cause, "internal sequencing error");
                    return BuildOutcome::Failed(BuildFailure {
                        phase,
                        kind: FailureKind::Internal,
                        cause,
                    });
                }
            }
        }

        progress
            .report(BuildStage::Finalizing, 0.0, "Assembling build result")
            .await;

        let fallback_sections = state.fallback_sections();
        match state.into_result(scope.build_id, request.clone()) {
            Ok(result) => {
                tracing::info!(
                    overall_score = result.quality.overall_score,
                    deployment_ready = result.quality.deployment_ready,
                    fallback_sections = ?fallback_sections,
                    "build finished"
                );
                BuildOutcome::Done(Box::new(result))
            }
            Err(missing) => BuildOutcome::Failed(BuildFailure {
                phase: BuildPhase::QualityAssurance,
                kind: FailureKind::Internal,
                cause: format!("{missing} output missing at finalization"),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Research
    // -----------------------------------------------------------------------

    async fn research<P: ProgressSink>(
        &self,
        request: &BuildRequest,
        limits: &TierLimits,
        scope: &InvokeScope,
        progress: &P,
    ) -> Result<ResearchOutput, PhaseError> {
        progress
            .report(BuildStage::Research, 0.0, "Researching the market")
            .await;

        let market = match self.agents.market_intelligence(request, scope).await {
            Ok(market) => market,
            Err(InvokeError::Cancelled) => return Err(PhaseError::Cancelled),
            Err(e @ InvokeError::Exhausted { .. }) => {
                return Err(PhaseError::Fatal(format!(
                    "market intelligence unavailable: {e}"
                )));
            }
        };

        let mut skipped = Vec::new();

        progress
            .report(BuildStage::Research, 0.3, "Analyzing competitors")
            .await;
        let competitors = if market.data_sources.is_empty() {
            skipped.push(SkippedAgent {
                agent: competitors::AGENT.to_string(),
                reason: "market intelligence returned no data sources".to_string(),
            });
            None
        } else {
            Some(
                self.agents
                    .competitor_analysis(request, &market, limits, scope)
                    .await?,
            )
        };

        let competitor_list = competitors
            .as_ref()
            .map(|c| c.competitors.as_slice())
            .unwrap_or_default();

        progress
            .report(BuildStage::Research, 0.55, "Analyzing user reviews")
            .await;
        let reviews = if request.tier == Tier::Free {
            skipped.push(SkippedAgent {
                agent: reviews::AGENT.to_string(),
                reason: "review analysis is not included in the free tier".to_string(),
            });
            None
        } else if competitor_list.is_empty() {
            skipped.push(SkippedAgent {
                agent: reviews::AGENT.to_string(),
                reason: "no competitors were found".to_string(),
            });
            None
        } else {
            Some(
                self.agents
                    .review_analysis(request, competitor_list, limits, scope)
                    .await?,
            )
        };

        for skip in &skipped {
            tracing::info!(agent = %skip.agent, reason = %skip.reason, "agent skipped");
        }

        progress
            .report(BuildStage::Research, 0.8, "Scoring the opportunity")
            .await;
        let complaints = reviews
            .as_ref()
            .map(|r| r.complaints.as_slice())
            .unwrap_or_default();
        let ctx = ScoringContext {
            request,
            market: &market,
            competitors: competitor_list,
            complaints,
        };
        let (starving_market, uniqueness) = tokio::join!(
            self.agents.starving_market_score(&ctx, scope),
            self.agents.uniqueness_score(&ctx, scope),
        );
        let starving_market = starving_market?;
        let uniqueness = uniqueness?;

        Ok(ResearchOutput {
            market,
            competitors,
            reviews,
            starving_market,
            uniqueness,
            skipped,
        })
    }

    // -----------------------------------------------------------------------
    // Planning
    // -----------------------------------------------------------------------

    async fn planning<P: ProgressSink>(
        &self,
        request: &BuildRequest,
        research: &ResearchOutput,
        scope: &InvokeScope,
        progress: &P,
    ) -> Result<StrategyOutput, PhaseError> {
        progress
            .report(BuildStage::Planning, 0.0, "Deriving competitive advantages")
            .await;
        let advantages = planning::derive_advantages(research);

        progress
            .report(BuildStage::Planning, 0.4, "Designing pricing strategy")
            .await;
        let pricing = self
            .agents
            .pricing_strategy(request, &advantages, research.competitor_list(), scope)
            .await?;

        Ok(StrategyOutput {
            advantages,
            pricing,
        })
    }

    // -----------------------------------------------------------------------
    // Code generation
    // -----------------------------------------------------------------------

    async fn code_generation<P: ProgressSink>(
        &self,
        request: &BuildRequest,
        research: &ResearchOutput,
        strategy: &StrategyOutput,
        scope: &InvokeScope,
        progress: &P,
    ) -> Result<ArtifactsOutput, PhaseError> {
        progress
            .report(BuildStage::CodeGeneration, 0.0, "Designing database schema")
            .await;
        let database = self
            .agents
            .schema_designer(request, &research.market, &strategy.advantages, scope)
            .await?;
        if database.is_fallback() {
            tracing::warn!("schema designer fell back to the default schema");
        }

        progress
            .report(
                BuildStage::CodeGeneration,
                0.35,
                "Generating backend and frontend",
            )
            .await;
        let (backend, frontend) = tokio::join!(
            self.agents.backend_generator(request, &database, scope),
            self.agents
                .frontend_generator(request, &strategy.advantages, &strategy.pricing, scope),
        );

        let artifacts = ArtifactsOutput {
            database,
            backend: backend?,
            frontend: frontend?,
        };
        progress.partial_files(artifacts.all_files()).await;
        Ok(artifacts)
    }

    // -----------------------------------------------------------------------
    // Quality assurance
    // -----------------------------------------------------------------------

    async fn quality_assurance<P: ProgressSink>(
        &self,
        request: &BuildRequest,
        artifacts: &ArtifactsOutput,
        limits: &TierLimits,
        scope: &InvokeScope,
        progress: &P,
    ) -> Result<QualityOutput, PhaseError> {
        progress
            .report(BuildStage::QualityAssurance, 0.0, "Auditing generated code")
            .await;
        let files = artifacts.all_files();
        let audited = &files[..files.len().min(limits.audit_files)];

        let report = self
            .agents
            .quality_auditor(request, audited, scope)
            .await?;

        Ok(QualityOutput::from_report(report, audited.len()))
    }
}
