//! Resilient invocation of the remote text-generation service.
//!
//! One invocation is a bounded ladder of attempts. Each attempt calls the
//! provider under a per-call timeout, extracts a JSON record from the raw
//! text, deserializes it into the agent's output type, and runs the type's
//! own validation. Any failure along the way burns one attempt; after a fixed
//! pause the next attempt starts. When attempts run out the caller either gets
//! its fallback document tagged `Provenance::Fallback` ([`ResilientInvoker::invoke`])
//! or an `Exhausted` error ([`ResilientInvoker::invoke_required`]).
//!
//! Cancellation is observed before every attempt and raced against both the
//! in-flight call and the retry pause.

pub mod policy;
pub mod sleep;

use std::sync::Arc;

use ideaforge_types::event::BuildEvent;
use ideaforge_types::extraction::ExtractionFailure;
use ideaforge_types::llm::{CompletionRequest, LlmError};
use ideaforge_types::provenance::Sourced;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::event::EventBus;
use crate::extraction;
use crate::llm::box_provider::BoxLlmProvider;

pub use policy::RetryPolicy;
pub use sleep::{NoopSleeper, Sleeper, TokioSleeper};

// ---------------------------------------------------------------------------
// Invocation inputs
// ---------------------------------------------------------------------------

/// One agent call in flight. Not persisted.
#[derive(Debug, Clone)]
pub struct AgentInvocation {
    /// Agent name, used for logging, events, and model overrides.
    pub agent: &'static str,
    pub model: String,
    /// Optional system prompt (agent persona and output contract).
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: u32,
    /// Transport calls made so far. Starts at 0.
    pub attempts: u32,
}

impl AgentInvocation {
    pub fn new(
        agent: &'static str,
        model: impl Into<String>,
        prompt: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        Self {
            agent,
            model: model.into(),
            system: None,
            prompt: prompt.into(),
            max_tokens,
            attempts: 0,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    fn request(&self) -> CompletionRequest {
        let mut request = CompletionRequest::single_turn(&self.model, &self.prompt, self.max_tokens);
        request.system = self.system.clone();
        request
    }
}

/// A typed record an agent expects back from the model.
///
/// Deserialization covers required fields and types. `validate` adds
/// semantic checks that serde cannot express; a rejection counts as a
/// schema failure and burns an attempt.
pub trait AgentOutput: DeserializeOwned + Send {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Per-build context shared by every invocation of one build.
#[derive(Debug, Clone)]
pub struct InvokeScope {
    pub build_id: Uuid,
    pub cancel: CancellationToken,
    pub events: EventBus,
}

impl InvokeScope {
    pub fn new(build_id: Uuid, cancel: CancellationToken, events: EventBus) -> Self {
        Self {
            build_id,
            cancel,
            events,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// The build was cancelled while an invocation was pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invocation cancelled")]
pub struct Cancelled;

/// Outcome of a fallback-less invocation that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvokeError {
    #[error("invocation cancelled")]
    Cancelled,

    #[error("{agent} exhausted {attempts} attempts: {last_error}")]
    Exhausted {
        agent: &'static str,
        attempts: u32,
        last_error: String,
    },
}

impl From<Cancelled> for InvokeError {
    fn from(_: Cancelled) -> Self {
        InvokeError::Cancelled
    }
}

/// Why a single attempt failed.
#[derive(Debug, thiserror::Error)]
enum AttemptError {
    #[error(transparent)]
    Transport(#[from] LlmError),

    #[error(transparent)]
    Extraction(#[from] ExtractionFailure),
}

impl AttemptError {
    fn kind(&self) -> &'static str {
        match self {
            AttemptError::Transport(LlmError::Timeout(_)) => "timeout",
            AttemptError::Transport(_) => "transport",
            AttemptError::Extraction(ExtractionFailure::NoJsonFound) => "no_json_found",
            AttemptError::Extraction(ExtractionFailure::SyntaxInvalid(_)) => "syntax_invalid",
            AttemptError::Extraction(ExtractionFailure::SchemaInvalid(_)) => "schema_invalid",
        }
    }
}

// ---------------------------------------------------------------------------
// ResilientInvoker
// ---------------------------------------------------------------------------

/// Wraps the provider with retry, timeout, extraction, and fallback.
///
/// Cheap to share: holds only `Arc`s and a `Copy` policy.
#[derive(Clone)]
pub struct ResilientInvoker {
    provider: Arc<BoxLlmProvider>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl ResilientInvoker {
    pub fn new(provider: Arc<BoxLlmProvider>, policy: RetryPolicy) -> Self {
        Self {
            provider,
            policy,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replace the sleeper used between attempts.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Invoke with a fallback document.
    ///
    /// Never fails except on cancellation: exhaustion yields
    /// `Sourced::fallback(fallback, attempts)`.
    pub async fn invoke<T: AgentOutput>(
        &self,
        invocation: &mut AgentInvocation,
        fallback: T,
        scope: &InvokeScope,
    ) -> Result<Sourced<T>, Cancelled> {
        match self.run(invocation, scope).await {
            Ok(value) => Ok(Sourced::generated(value, invocation.attempts)),
            Err(InvokeError::Cancelled) => Err(Cancelled),
            Err(InvokeError::Exhausted { agent, attempts, last_error }) => {
                tracing::warn!(
                    build_id = %scope.build_id,
                    agent,
                    attempts,
                    last_error = %last_error,
                    "attempts exhausted, using fallback"
                );
                scope.events.publish(BuildEvent::FallbackUsed {
                    build_id: scope.build_id,
                    agent: agent.to_string(),
                });
                Ok(Sourced::fallback(fallback, attempts))
            }
        }
    }

    /// Invoke a mandatory step with no fallback.
    pub async fn invoke_required<T: AgentOutput>(
        &self,
        invocation: &mut AgentInvocation,
        scope: &InvokeScope,
    ) -> Result<Sourced<T>, InvokeError> {
        let value = self.run(invocation, scope).await?;
        Ok(Sourced::generated(value, invocation.attempts))
    }

    async fn run<T: AgentOutput>(
        &self,
        invocation: &mut AgentInvocation,
        scope: &InvokeScope,
    ) -> Result<T, InvokeError> {
        let span = tracing::info_span!(
            "gen_ai.invoke_agent",
            gen_ai.system = self.provider.name(),
            gen_ai.agent.name = invocation.agent,
            gen_ai.request.model = %invocation.model,
            gen_ai.request.max_tokens = invocation.max_tokens,
            build_id = %scope.build_id,
        );
        self.run_attempts(invocation, scope).instrument(span).await
    }

    async fn run_attempts<T: AgentOutput>(
        &self,
        invocation: &mut AgentInvocation,
        scope: &InvokeScope,
    ) -> Result<T, InvokeError> {
        let max_attempts = self.policy.max_attempts();
        let mut last_error = String::new();

        while invocation.attempts < max_attempts {
            if scope.cancel.is_cancelled() {
                return Err(InvokeError::Cancelled);
            }

            invocation.attempts += 1;
            let attempt = invocation.attempts;

            let outcome = tokio::select! {
                biased;
                _ = scope.cancel.cancelled() => return Err(InvokeError::Cancelled),
                outcome = self.attempt::<T>(invocation) => outcome,
            };

            match outcome {
                Ok(value) => {
                    tracing::info!(agent = invocation.agent, attempt, outcome = "success", "agent attempt");
                    return Ok(value);
                }
                Err(e) => {
                    tracing::warn!(
                        agent = invocation.agent,
                        attempt,
                        max_attempts,
                        outcome = e.kind(),
                        error = %e,
                        "agent attempt"
                    );
                    scope.events.publish(BuildEvent::AttemptFailed {
                        build_id: scope.build_id,
                        agent: invocation.agent.to_string(),
                        attempt,
                        max_attempts,
                        error: e.to_string(),
                    });
                    last_error = e.to_string();
                }
            }

            if invocation.attempts < max_attempts {
                tokio::select! {
                    biased;
                    _ = scope.cancel.cancelled() => return Err(InvokeError::Cancelled),
                    _ = self.sleeper.sleep(self.policy.delay) => {}
                }
            }
        }

        Err(InvokeError::Exhausted {
            agent: invocation.agent,
            attempts: invocation.attempts,
            last_error,
        })
    }

    async fn attempt<T: AgentOutput>(&self, invocation: &AgentInvocation) -> Result<T, AttemptError> {
        let request = invocation.request();
        let timeout = self.policy.call_timeout;

        let response = tokio::time::timeout(timeout, self.provider.complete(&request))
            .await
            .map_err(|_| LlmError::Timeout(timeout.as_secs()))??;

        tracing::debug!(
            agent = invocation.agent,
            gen_ai.response.id = %response.id,
            gen_ai.usage.input_tokens = response.usage.input_tokens,
            gen_ai.usage.output_tokens = response.usage.output_tokens,
            "model responded"
        );

        let value: T = extraction::extract_as(&response.content)?;
        value.validate().map_err(ExtractionFailure::SchemaInvalid)?;
        Ok(value)
    }
}

impl std::fmt::Debug for ResilientInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientInvoker")
            .field("provider", &self.provider.name())
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use ideaforge_types::llm::{CompletionResponse, StopReason, Usage};
    use ideaforge_types::provenance::Provenance;
    use serde::Deserialize;

    use super::*;
    use crate::llm::provider::LlmProvider;

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct Verdict {
        score: u8,
        #[serde(default)]
        note: String,
    }

    impl AgentOutput for Verdict {
        fn validate(&self) -> Result<(), String> {
            if self.score > 100 {
                return Err(format!("score {} out of range", self.score));
            }
            Ok(())
        }
    }

    /// Replays scripted replies in order; repeats the last one when drained.
    struct ScriptedProvider {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        calls: AtomicU32,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<Result<&str, LlmError>>) -> Self {
            Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .map(|r| r.map(str::to_string))
                        .collect(),
                ),
                calls: AtomicU32::new(0),
            }
        }
    }

    impl LlmProvider for Arc<ScriptedProvider> {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            request: &CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = {
                let mut replies = self.replies.lock().unwrap();
                if replies.len() > 1 {
                    replies.pop_front().unwrap()
                } else {
                    replies.front().cloned().unwrap()
                }
            };
            reply.map(|content| CompletionResponse {
                id: "resp-1".to_string(),
                content,
                model: request.model.clone(),
                stop_reason: StopReason::EndTurn,
                usage: Usage::default(),
            })
        }
    }

    /// A retry pause that never ends.
    struct StalledSleeper;

    impl Sleeper for StalledSleeper {
        fn sleep(&self, _duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
            Box::pin(std::future::pending())
        }
    }

    /// Never answers.
    struct HangingProvider;

    impl LlmProvider for HangingProvider {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            std::future::pending().await
        }
    }

    fn transport_error() -> LlmError {
        LlmError::Provider {
            message: "connection reset".to_string(),
        }
    }

    fn setup(
        replies: Vec<Result<&str, LlmError>>,
        max_retries: u32,
    ) -> (ResilientInvoker, Arc<ScriptedProvider>, Arc<NoopSleeper>) {
        let scripted = Arc::new(ScriptedProvider::new(replies));
        let sleeper = Arc::new(NoopSleeper::new());
        let policy = RetryPolicy::new(max_retries, Duration::from_secs(2), Duration::from_secs(5));
        let invoker = ResilientInvoker::new(Arc::new(BoxLlmProvider::new(scripted.clone())), policy)
            .with_sleeper(sleeper.clone());
        (invoker, scripted, sleeper)
    }

    fn scope() -> InvokeScope {
        InvokeScope::new(Uuid::now_v7(), CancellationToken::new(), EventBus::new(64))
    }

    fn invocation() -> AgentInvocation {
        AgentInvocation::new("uniqueness_score", "test-model", "Rate this idea.", 512)
    }

    fn fallback() -> Verdict {
        Verdict {
            score: 50,
            note: "fallback".to_string(),
        }
    }

    #[tokio::test]
    async fn success_on_first_attempt() {
        let (invoker, scripted, sleeper) = setup(vec![Ok("{\"score\": 81, \"note\": \"sharp\"}")], 3);
        let mut inv = invocation();

        let out = invoker.invoke(&mut inv, fallback(), &scope()).await.unwrap();

        assert_eq!(out.provenance, Provenance::Generated);
        assert_eq!(out.value.score, 81);
        assert_eq!(out.attempts, 1);
        assert_eq!(scripted.calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.requested().is_empty());
    }

    #[tokio::test]
    async fn success_on_second_attempt_stops_calling() {
        let (invoker, scripted, sleeper) = setup(
            vec![Err(transport_error()), Ok("```json\n{\"score\": 64}\n```")],
            3,
        );
        let mut inv = invocation();

        let out = invoker.invoke(&mut inv, fallback(), &scope()).await.unwrap();

        assert_eq!(out.provenance, Provenance::Generated);
        assert_eq!(out.value.score, 64);
        assert_eq!(out.attempts, 2);
        assert_eq!(scripted.calls.load(Ordering::SeqCst), 2);
        assert_eq!(sleeper.requested(), vec![Duration::from_secs(2)]);
    }

    #[tokio::test]
    async fn always_failing_uses_fallback_after_max_retries() {
        let (invoker, scripted, sleeper) = setup(vec![Err(transport_error())], 3);
        let scope = scope();
        let mut rx = scope.events.subscribe();
        let mut inv = invocation();

        let out = invoker.invoke(&mut inv, fallback(), &scope).await.unwrap();

        assert_eq!(out.provenance, Provenance::Fallback);
        assert_eq!(out.value, fallback());
        assert_eq!(out.attempts, 3);
        assert_eq!(inv.attempts, 3);
        assert_eq!(scripted.calls.load(Ordering::SeqCst), 3);
        // Fixed delay between attempts, none after the last.
        assert_eq!(sleeper.requested(), vec![Duration::from_secs(2); 2]);

        let mut failed = 0;
        let mut fallback_used = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                BuildEvent::AttemptFailed { max_attempts, .. } => {
                    assert_eq!(max_attempts, 3);
                    failed += 1;
                }
                BuildEvent::FallbackUsed { agent, .. } => {
                    assert_eq!(agent, "uniqueness_score");
                    fallback_used = true;
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(failed, 3);
        assert!(fallback_used);
    }

    #[tokio::test]
    async fn malformed_and_schema_invalid_replies_burn_attempts() {
        let (invoker, scripted, _) = setup(
            vec![
                Ok("Sorry, I can't help with that."),
                Ok("{\"note\": \"missing score\"}"),
                Ok("{\"score\": 250}"),
            ],
            3,
        );
        let mut inv = invocation();

        let out = invoker.invoke(&mut inv, fallback(), &scope()).await.unwrap();

        assert!(out.is_fallback());
        assert_eq!(scripted.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn repaired_json_counts_as_success() {
        let (invoker, _, _) = setup(vec![Ok("Result:\n{\u{201C}score\u{201D}: 77,}")], 3);
        let mut inv = invocation();

        let out = invoker.invoke(&mut inv, fallback(), &scope()).await.unwrap();

        assert_eq!(out.provenance, Provenance::Generated);
        assert_eq!(out.value.score, 77);
    }

    #[tokio::test]
    async fn required_invocation_reports_exhaustion() {
        let (invoker, scripted, _) = setup(vec![Ok("no json here")], 2);
        let mut inv = invocation();

        let err = invoker
            .invoke_required::<Verdict>(&mut inv, &scope())
            .await
            .unwrap_err();

        match err {
            InvokeError::Exhausted { agent, attempts, last_error } => {
                assert_eq!(agent, "uniqueness_score");
                assert_eq!(attempts, 2);
                assert!(last_error.contains("no JSON object"));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
        assert_eq!(scripted.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancelled_before_first_attempt_makes_no_calls() {
        let (invoker, scripted, _) = setup(vec![Ok("{\"score\": 1}")], 3);
        let scope = scope();
        scope.cancel.cancel();
        let mut inv = invocation();

        let result = invoker.invoke(&mut inv, fallback(), &scope).await;

        assert_eq!(result.unwrap_err(), Cancelled);
        assert_eq!(scripted.calls.load(Ordering::SeqCst), 0);
        assert_eq!(inv.attempts, 0);
    }

    #[tokio::test]
    async fn cancellation_interrupts_in_flight_call() {
        let invoker = ResilientInvoker::new(
            Arc::new(BoxLlmProvider::new(HangingProvider)),
            RetryPolicy::new(3, Duration::ZERO, Duration::from_secs(60)),
        );
        let scope = scope();
        let token = scope.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let mut inv = invocation();
        let err = invoker
            .invoke_required::<Verdict>(&mut inv, &scope)
            .await
            .unwrap_err();

        assert_eq!(err, InvokeError::Cancelled);
        assert_eq!(inv.attempts, 1);
    }

    #[tokio::test]
    async fn cancellation_interrupts_retry_delay() {
        let scripted = Arc::new(ScriptedProvider::new(vec![Err(transport_error())]));
        let invoker = ResilientInvoker::new(
            Arc::new(BoxLlmProvider::new(scripted.clone())),
            RetryPolicy::new(3, Duration::from_secs(3_600), Duration::from_secs(5)),
        )
        .with_sleeper(Arc::new(StalledSleeper));
        let scope = scope();
        let token = scope.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let mut inv = invocation();
        let result = invoker.invoke(&mut inv, fallback(), &scope).await;

        assert_eq!(result.unwrap_err(), Cancelled);
        assert_eq!(inv.attempts, 1);
        assert_eq!(scripted.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn per_call_timeout_burns_attempt() {
        let invoker = ResilientInvoker::new(
            Arc::new(BoxLlmProvider::new(HangingProvider)),
            RetryPolicy::new(2, Duration::ZERO, Duration::from_millis(10)),
        )
        .with_sleeper(Arc::new(NoopSleeper::new()));
        let mut inv = invocation();

        let out = invoker.invoke(&mut inv, fallback(), &scope()).await.unwrap();

        assert!(out.is_fallback());
        assert_eq!(out.attempts, 2);
    }

    #[test]
    fn invocation_request_carries_system_prompt() {
        let inv = invocation().with_system("Respond with JSON only.");
        let request = inv.request();
        assert_eq!(request.model, "test-model");
        assert_eq!(request.max_tokens, 512);
        assert_eq!(request.system.as_deref(), Some("Respond with JSON only."));
        assert_eq!(request.prompt, "Rate this idea.");
    }
}
