//! LLM provider implementations.
//!
//! Contains the Anthropic implementation of the [`LlmProvider`] trait defined
//! in `ideaforge-core`, and a factory ([`create_provider`]) that builds it
//! from [`ProviderSettings`] plus an API key resolved from the environment.
//!
//! [`LlmProvider`]: ideaforge_core::llm::provider::LlmProvider

pub mod anthropic;

use secrecy::SecretString;

use ideaforge_core::llm::box_provider::BoxLlmProvider;
use ideaforge_types::config::ProviderSettings;
use ideaforge_types::llm::LlmError;

use self::anthropic::AnthropicProvider;

/// Environment variable holding the Anthropic API key.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Read the API key from [`API_KEY_ENV`]; blank values count as missing.
pub fn api_key_from_env() -> Option<SecretString> {
    match std::env::var(API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => Some(SecretString::from(key.trim().to_string())),
        _ => None,
    }
}

/// Create a [`BoxLlmProvider`] from provider settings.
///
/// # Errors
///
/// `AuthenticationFailed` when no API key is available; `Provider` if the
/// HTTP client cannot be built.
pub fn create_provider(
    settings: &ProviderSettings,
    api_key: Option<SecretString>,
) -> Result<BoxLlmProvider, LlmError> {
    let key = api_key.ok_or(LlmError::AuthenticationFailed)?;
    let mut provider = AnthropicProvider::new(key)?;
    if let Some(base_url) = settings.base_url.as_deref() {
        tracing::info!(base_url, "using custom provider base URL");
        provider = provider.with_base_url(base_url);
    }
    Ok(BoxLlmProvider::new(provider))
}
