//! End-to-end pipeline runs against a scripted provider.
//!
//! The provider recognizes each agent by the persona its system prompt
//! starts with and replies from a per-agent script.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ideaforge_core::agents::{
    Agents, codegen, competitors, market, pricing, quality, reviews, schema, scores,
};
use ideaforge_core::build::progress::NullProgress;
use ideaforge_core::build::{BuildOutcome, PhaseSequencer};
use ideaforge_core::event::EventBus;
use ideaforge_core::invoker::{InvokeScope, NoopSleeper, ResilientInvoker, RetryPolicy};
use ideaforge_core::llm::box_provider::BoxLlmProvider;
use ideaforge_core::llm::provider::LlmProvider;
use ideaforge_types::build::{AggregateBuildResult, BuildPhase, BuildRequest, FailureKind, Tier};
use ideaforge_types::config::{ModelSettings, TierSettings};
use ideaforge_types::llm::{CompletionRequest, CompletionResponse, LlmError, StopReason, Usage};
use ideaforge_types::provenance::Provenance;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const MAX_RETRIES: u32 = 3;

// ---------------------------------------------------------------------------
// Scripted provider
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum Reply {
    Json(String),
    AlwaysFail,
}

const AGENTS: [(&str, &str); 10] = [
    (market::AGENT, market::PERSONA),
    (competitors::AGENT, competitors::PERSONA),
    (reviews::AGENT, reviews::PERSONA),
    (scores::STARVING_MARKET_AGENT, scores::STARVING_MARKET_PERSONA),
    (scores::UNIQUENESS_AGENT, scores::UNIQUENESS_PERSONA),
    (pricing::AGENT, pricing::PERSONA),
    (schema::AGENT, schema::PERSONA),
    (codegen::BACKEND_AGENT, codegen::BACKEND_PERSONA),
    (codegen::FRONTEND_AGENT, codegen::FRONTEND_PERSONA),
    (quality::AGENT, quality::PERSONA),
];

#[derive(Default)]
struct ScriptedLlm {
    script: HashMap<&'static str, Reply>,
    calls: Mutex<HashMap<&'static str, u32>>,
    prompts: Mutex<HashMap<&'static str, String>>,
}

impl ScriptedLlm {
    fn happy() -> Self {
        let mut script = HashMap::new();
        script.insert(market::AGENT, Reply::Json(market_json(true)));
        script.insert(
            competitors::AGENT,
            Reply::Json(
                r#"Here is the analysis:
```json
{
  "competitors": [
    {"name": "Mealime", "url": "https://mealime.com", "strengths": ["simple"], "weaknesses": ["no family sharing"], "pricing": "$5.99/mo"},
    {"name": "Paprika", "strengths": ["recipe import"], "weaknesses": ["dated UI"], "pricing": "$4.99 one-time"},
  ],
  "market_positioning": "family-first planning"
}
```"#
                    .to_string(),
            ),
        );
        script.insert(
            reviews::AGENT,
            Reply::Json(
                r#"{"complaints": [
                    {"issue": "sync breaks", "frequency": 12, "competitor": "Paprika"},
                    {"issue": "no family accounts", "frequency": 40, "competitor": "Mealime"}
                ], "praised_features": ["grocery lists"], "sentiment": 0.2}"#
                    .to_string(),
            ),
        );
        script.insert(
            scores::STARVING_MARKET_AGENT,
            Reply::Json(r#"{"score": 78, "rationale": "Parents are underserved."}"#.to_string()),
        );
        script.insert(
            scores::UNIQUENESS_AGENT,
            Reply::Json("{\u{201C}score\u{201D}: \u{201C}64\u{201D}, \u{201C}rationale\u{201D}: \u{201C}Family angle is new.\u{201D}}".to_string()),
        );
        script.insert(
            pricing::AGENT,
            Reply::Json(
                r#"{"model": "freemium", "currency": "usd", "tiers": [
                    {"name": "Family", "price_monthly": 7.99, "features": ["5 members"]},
                    {"name": "Free", "price_monthly": 0, "features": ["1 member"]}
                ], "rationale": "Undercut Mealime."}"#
                    .to_string(),
            ),
        );
        script.insert(
            schema::AGENT,
            Reply::Json(
                r#"{"tables": [
                    {"name": "families", "columns": [{"name": "id", "type": "uuid", "primary_key": true}]},
                    {"name": "meals", "columns": [
                        {"name": "id", "type": "uuid", "primary_key": true},
                        {"name": "family_id", "type": "uuid", "references": "families.id"}
                    ]}
                ], "relationships": ["meals.family_id -> families.id"]}"#
                    .to_string(),
            ),
        );
        script.insert(codegen::BACKEND_AGENT, Reply::Json(files_json("api", 2)));
        script.insert(codegen::FRONTEND_AGENT, Reply::Json(files_json("web", 2)));
        script.insert(quality::AGENT, Reply::Json(quality_json(82)));
        Self {
            script,
            ..Self::default()
        }
    }

    fn with(mut self, agent: &'static str, reply: Reply) -> Self {
        self.script.insert(agent, reply);
        self
    }

    fn calls(&self, agent: &str) -> u32 {
        self.calls.lock().unwrap().get(agent).copied().unwrap_or(0)
    }

    fn prompt(&self, agent: &str) -> Option<String> {
        self.prompts.lock().unwrap().get(agent).cloned()
    }

    fn identify(request: &CompletionRequest) -> &'static str {
        let system = request.system.as_deref().unwrap_or_default();
        AGENTS
            .iter()
            .find(|(_, persona)| system.starts_with(persona))
            .map(|(agent, _)| *agent)
            .expect("request from an unknown agent")
    }
}

/// Local newtype so the shared script can implement the foreign trait
/// (orphan rules forbid `impl LlmProvider for Arc<ScriptedLlm>` here).
struct SharedLlm(Arc<ScriptedLlm>);

impl std::ops::Deref for SharedLlm {
    type Target = ScriptedLlm;

    fn deref(&self) -> &ScriptedLlm {
        &self.0
    }
}

impl LlmProvider for SharedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let agent = ScriptedLlm::identify(request);
        *self.calls.lock().unwrap().entry(agent).or_default() += 1;
        self.prompts
            .lock()
            .unwrap()
            .insert(agent, request.prompt.clone());

        match self.script.get(agent) {
            Some(Reply::Json(content)) => Ok(CompletionResponse {
                id: format!("resp-{agent}"),
                content: content.clone(),
                model: request.model.clone(),
                stop_reason: StopReason::EndTurn,
                usage: Usage {
                    input_tokens: 100,
                    output_tokens: 200,
                },
            }),
            Some(Reply::AlwaysFail) | None => Err(LlmError::Overloaded("scripted failure".to_string())),
        }
    }
}

fn market_json(with_sources: bool) -> String {
    let sources = if with_sources {
        r#"[{"name": "G2", "url": "https://g2.com", "kind": "marketplace"},
            {"name": "Reddit r/mealprep", "kind": "forum"}]"#
    } else {
        "[]"
    };
    format!(
        r#"{{"market_size": "$3.1B (2025)", "growth_rate": "14% CAGR",
            "target_audience": ["busy parents"],
            "market_gaps": [
                {{"description": "No shared family planning", "opportunity_score": 70}},
                {{"description": "Weak dietary restriction support", "opportunity_score": 90}},
                {{"description": "No budget tracking"}},
                {{"description": "Poor leftovers handling", "opportunity_score": 40}}
            ],
            "trends": ["AI personalization"],
            "data_sources": {sources}}}"#
    )
}

fn files_json(dir: &str, n: usize) -> String {
    let files: Vec<String> = (0..n)
        .map(|i| format!(r#"{{"path": "/{dir}/file{i}.ts", "content": "export const x{i} = {i};", "language": "typescript"}}"#))
        .collect();
    format!(r#"{{"framework": "{dir}", "files": [{}]}}"#, files.join(", "))
}

fn quality_json(score: u8) -> String {
    format!(
        r#"{{"overall_score": {score}, "security_score": 80, "issues": [{{"severity": "medium", "message": "No rate limiting"}}], "recommendations": ["Add rate limiting"]}}"#
    )
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

fn sequencer(llm: Arc<ScriptedLlm>) -> PhaseSequencer {
    let invoker = ResilientInvoker::new(
        Arc::new(BoxLlmProvider::new(SharedLlm(llm))),
        RetryPolicy::new(MAX_RETRIES, Duration::from_secs(2), Duration::from_secs(5)),
    )
    .with_sleeper(Arc::new(NoopSleeper::new()));
    PhaseSequencer::new(
        Agents::new(invoker, ModelSettings::default()),
        TierSettings::default(),
    )
}

async fn run(llm: &Arc<ScriptedLlm>, tier: Tier) -> BuildOutcome {
    let scope = InvokeScope::new(Uuid::now_v7(), CancellationToken::new(), EventBus::new(256));
    let request = BuildRequest::new(
        "A meal planner that coordinates the whole family's dietary needs",
        "busy parents",
        tier,
    );
    sequencer(Arc::clone(llm)).run(&request, &scope, &NullProgress).await
}

fn expect_done(outcome: BuildOutcome) -> AggregateBuildResult {
    match outcome {
        BuildOutcome::Done(result) => *result,
        other => panic!("expected Done, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn free_tier_runs_without_review_analysis() {
    let llm = Arc::new(ScriptedLlm::happy());

    let result = expect_done(run(&llm, Tier::Free).await);

    assert_eq!(llm.calls(reviews::AGENT), 0);
    assert!(result.research.reviews.is_none());
    assert!(
        result
            .research
            .skipped
            .iter()
            .any(|s| s.agent == reviews::AGENT)
    );

    // All four sections present and generated.
    assert_eq!(result.research.competitor_list().len(), 2);
    assert_eq!(result.strategy.pricing.tiers.len(), 2);
    assert_eq!(result.artifacts.database.table_names(), vec!["families", "meals"]);
    assert_eq!(result.artifacts.all_files().len(), 4);
    assert!(result.provenance.fallback_sections.is_empty());

    assert_eq!(
        result.quality.deployment_ready,
        result.quality.overall_score >= 70
    );
    assert_eq!(result.quality.overall_score, 82);
    assert!(result.quality.deployment_ready);

    // Repaired smart-quoted reply and lenient string score.
    assert_eq!(result.research.uniqueness.score, 64);
    assert_eq!(result.research.uniqueness.provenance, Provenance::Generated);

    let phases: Vec<BuildPhase> = result
        .provenance
        .phase_timings
        .iter()
        .map(|t| t.phase)
        .collect();
    assert_eq!(phases, BuildPhase::ALL.to_vec());
}

#[tokio::test]
async fn shaping_is_applied_to_generated_sections() {
    let llm = Arc::new(ScriptedLlm::happy());

    let result = expect_done(run(&llm, Tier::Starter).await);

    // Gaps ordered by opportunity; advantages take the top three gaps then
    // the most frequent complaints.
    let gaps: Vec<&str> = result
        .research
        .market
        .market_gaps
        .iter()
        .map(|g| g.description.as_str())
        .collect();
    assert_eq!(gaps[0], "Weak dietary restriction support");
    assert_eq!(result.strategy.advantages.len(), 5);
    assert_eq!(result.strategy.advantages[0].description, gaps[0]);
    assert!(result.strategy.advantages[3].description.contains("no family accounts"));

    let complaints = result.research.complaint_list();
    assert_eq!(complaints[0].frequency, 40);

    // Leading slashes stripped; prices sorted ascending; currency upper-cased.
    assert!(result.artifacts.all_files().iter().all(|f| !f.path.starts_with('/')));
    assert_eq!(result.strategy.pricing.tiers[0].name, "Free");
    assert_eq!(result.strategy.pricing.currency, "USD");

    // Reviews ran on a paid tier with competitors present.
    assert_eq!(llm.calls(reviews::AGENT), 1);
    let review_prompt = llm.prompt(reviews::AGENT).unwrap();
    assert!(review_prompt.contains("Mealime"));
}

#[tokio::test]
async fn market_intelligence_exhaustion_fails_research() {
    let llm = Arc::new(ScriptedLlm::happy().with(market::AGENT, Reply::AlwaysFail));

    let outcome = run(&llm, Tier::Premium).await;

    match outcome {
        BuildOutcome::Failed(failure) => {
            assert_eq!(failure.phase, BuildPhase::Research);
            assert_eq!(failure.kind, FailureKind::PhaseFatal);
        }
        other => panic!("expected Failed, got {other:?}"),
    }

    assert_eq!(llm.calls(market::AGENT), MAX_RETRIES);
    for (agent, _) in AGENTS.iter().skip(1) {
        assert_eq!(llm.calls(*agent), 0, "{agent} should not have run");
    }
}

#[tokio::test]
async fn schema_exhaustion_uses_fallback_schema() {
    let llm = Arc::new(
        ScriptedLlm::happy().with(schema::AGENT, Reply::Json("I cannot design this.".to_string())),
    );

    let result = expect_done(run(&llm, Tier::Free).await);

    assert_eq!(llm.calls(schema::AGENT), MAX_RETRIES);
    assert_eq!(result.artifacts.database.value, schema::fallback());
    assert_eq!(result.artifacts.database.provenance, Provenance::Fallback);
    assert_eq!(result.artifacts.database.attempts, MAX_RETRIES);
    assert_eq!(
        result.provenance.fallback_sections,
        vec!["artifacts.database".to_string()]
    );

    // The backend was generated against the fallback schema.
    let backend_prompt = llm.prompt(codegen::BACKEND_AGENT).unwrap();
    assert!(backend_prompt.contains("users("));
    assert!(backend_prompt.contains("projects("));
    assert_eq!(result.artifacts.backend.provenance, Provenance::Generated);
}

#[tokio::test]
async fn every_optional_agent_failing_still_completes() {
    let mut llm = ScriptedLlm::happy();
    for (agent, _) in AGENTS.iter().skip(1) {
        llm = llm.with(*agent, Reply::AlwaysFail);
    }
    let llm = Arc::new(llm);

    let result = expect_done(run(&llm, Tier::Premium).await);

    assert_eq!(result.quality.overall_score, quality::FALLBACK_SCORE);
    assert!(!result.quality.deployment_ready);
    assert_eq!(result.research.starving_market.score, scores::FALLBACK_SCORE);
    assert_eq!(result.strategy.pricing.value, pricing::fallback());
    assert_eq!(result.artifacts.backend.value, codegen::backend_fallback());
    assert_eq!(result.artifacts.frontend.value, codegen::frontend_fallback());

    // Competitor fallback is empty, so reviews are skipped, not failed.
    assert!(result.research.competitor_list().is_empty());
    assert_eq!(llm.calls(reviews::AGENT), 0);
    assert!(
        result
            .provenance
            .fallback_sections
            .contains(&"research.competitors".to_string())
    );
    assert!(
        result
            .provenance
            .fallback_sections
            .contains(&"quality.report".to_string())
    );
}

#[tokio::test]
async fn no_data_sources_skips_competitor_analysis() {
    let llm = Arc::new(ScriptedLlm::happy().with(market::AGENT, Reply::Json(market_json(false))));

    let result = expect_done(run(&llm, Tier::Premium).await);

    assert_eq!(llm.calls(competitors::AGENT), 0);
    assert_eq!(llm.calls(reviews::AGENT), 0);
    assert!(result.research.competitors.is_none());
    let skipped: Vec<&str> = result
        .research
        .skipped
        .iter()
        .map(|s| s.agent.as_str())
        .collect();
    assert_eq!(skipped, vec![competitors::AGENT, reviews::AGENT]);
}

#[tokio::test]
async fn low_quality_score_is_not_deployment_ready() {
    let llm = Arc::new(ScriptedLlm::happy().with(quality::AGENT, Reply::Json(quality_json(69))));

    let result = expect_done(run(&llm, Tier::Starter).await);

    assert_eq!(result.quality.overall_score, 69);
    assert!(!result.quality.deployment_ready);
}

#[tokio::test]
async fn auditor_sees_only_tier_limited_files() {
    let llm = Arc::new(
        ScriptedLlm::happy()
            .with(codegen::BACKEND_AGENT, Reply::Json(files_json("api", 5)))
            .with(codegen::FRONTEND_AGENT, Reply::Json(files_json("web", 5))),
    );

    let result = expect_done(run(&llm, Tier::Free).await);

    let audit_files = TierSettings::default().free.audit_files;
    assert_eq!(result.quality.files_audited, audit_files);
    let prompt = llm.prompt(quality::AGENT).unwrap();
    assert_eq!(prompt.matches("\n### ").count(), audit_files);
    assert!(prompt.contains("api/file0.ts"));
    assert!(!prompt.contains("web/file4.ts"));
}
