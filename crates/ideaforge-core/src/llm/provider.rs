//! LlmProvider trait definition.
//!
//! This is the one external interface the build core consumes:
//! `Generate(prompt, model, max_tokens) -> raw text | transport error`,
//! expressed as a completion request/response pair.

use ideaforge_types::llm::{CompletionRequest, CompletionResponse, LlmError};

/// Trait for LLM provider backends.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition). Providers
/// must tolerate being called concurrently from independent builds; no
/// rate limiting or pooling policy is imposed from this side.
///
/// Implementations live in ideaforge-infra (e.g., `AnthropicProvider`).
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g., "anthropic").
    fn name(&self) -> &str;

    /// Send a completion request and receive the full response.
    ///
    /// The response content is raw model text; it may be prose, fenced
    /// JSON, or malformed JSON. Parsing is the caller's job.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;
}
