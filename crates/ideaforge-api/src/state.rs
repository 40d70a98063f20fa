//! Application state wiring the build pipeline together.
//!
//! AppState holds the concrete service instances used by both the CLI and
//! the REST API. `BuildService` is generic over its store; AppState pins it
//! to the in-memory TTL store from infra.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use ideaforge_core::agents::Agents;
use ideaforge_core::build::{BuildService, PhaseSequencer};
use ideaforge_core::invoker::{ResilientInvoker, RetryPolicy};
use ideaforge_core::llm::box_provider::BoxLlmProvider;
use ideaforge_infra::config::{load_forge_config, resolve_data_dir};
use ideaforge_infra::llm::{API_KEY_ENV, api_key_from_env, create_provider};
use ideaforge_infra::store::InMemoryBuildStore;
use ideaforge_types::config::ForgeConfig;

/// Build service pinned to the infra store.
pub type ConcreteBuildService = BuildService<InMemoryBuildStore>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub builds: ConcreteBuildService,
    pub config: Arc<ForgeConfig>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Load configuration and connect the provider.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        let config = load_forge_config(&data_dir).await;

        let provider = create_provider(&config.provider, api_key_from_env())
            .with_context(|| format!("cannot create LLM provider (is {API_KEY_ENV} set?)"))?;

        Ok(Self::from_parts(data_dir, config, provider))
    }

    /// Wire services from already-resolved parts.
    pub fn from_parts(data_dir: PathBuf, config: ForgeConfig, provider: BoxLlmProvider) -> Self {
        let invoker = ResilientInvoker::new(Arc::new(provider), RetryPolicy::from(&config.retry));
        let agents = Agents::new(invoker, config.models.clone());
        let sequencer = PhaseSequencer::new(agents, config.tiers.clone());
        let store = Arc::new(InMemoryBuildStore::new(Duration::from_secs(
            config.store.ttl_secs,
        )));

        tracing::debug!(
            data_dir = %data_dir.display(),
            model = %config.models.default,
            max_retries = config.retry.max_retries,
            ttl_secs = config.store.ttl_secs,
            "application state initialized"
        );

        Self {
            builds: BuildService::new(store, sequencer),
            config: Arc::new(config),
            data_dir,
        }
    }
}
