//! BuildService: the build lifecycle over an injected `BuildStore`.
//!
//! `start_build` validates synchronously, records a `Queued` status, spawns
//! the sequencer on its own task, and returns the handle immediately.
//! Progress is written to the store as the build runs so `get_status` can be
//! polled; the same progress is published on the service's `EventBus`.
//!
//! Cancellation tokens are tracked per running build in a `DashMap` and
//! removed when the build reaches a terminal state.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use dashmap::DashMap;
use ideaforge_types::artifacts::GeneratedFile;
use ideaforge_types::build::{BuildHandle, BuildRequest, BuildStage, BuildStatus};
use ideaforge_types::error::BuildError;
use ideaforge_types::event::BuildEvent;
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::progress::ProgressSink;
use super::sequencer::{BuildOutcome, PhaseSequencer};
use crate::event::EventBus;
use crate::invoker::InvokeScope;
use crate::storage::BuildStore;

pub struct BuildService<S: BuildStore> {
    store: Arc<S>,
    sequencer: Arc<PhaseSequencer>,
    events: EventBus,
    cancellation_tokens: Arc<DashMap<Uuid, CancellationToken>>,
}

impl<S: BuildStore> Clone for BuildService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            sequencer: Arc::clone(&self.sequencer),
            events: self.events.clone(),
            cancellation_tokens: Arc::clone(&self.cancellation_tokens),
        }
    }
}

impl<S: BuildStore> BuildService<S> {
    pub fn new(store: Arc<S>, sequencer: PhaseSequencer) -> Self {
        Self {
            store,
            sequencer: Arc::new(sequencer),
            events: EventBus::default(),
            cancellation_tokens: Arc::new(DashMap::new()),
        }
    }

    /// Use an existing bus instead of a private one.
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Subscribe to events of every build started by this service.
    pub fn subscribe(&self) -> broadcast::Receiver<BuildEvent> {
        self.events.subscribe()
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Number of builds currently running.
    pub fn active_builds(&self) -> usize {
        self.cancellation_tokens.len()
    }

    /// Accept a build and start it in the background.
    pub async fn start_build(&self, request: BuildRequest) -> Result<BuildHandle, BuildError> {
        request.validate()?;

        let handle = BuildHandle::new();
        let build_id = handle.id();
        let queued = BuildStatus::queued(build_id);
        self.store.put(queued.clone()).await?;

        let token = CancellationToken::new();
        self.cancellation_tokens.insert(build_id, token.clone());

        tracing::info!(
            %build_id,
            tier = %request.tier,
            idea_chars = request.idea.chars().count(),
            "build accepted"
        );

        let service = self.clone();
        tokio::spawn(async move {
            service.execute(queued, request, token).await;
        });

        Ok(handle)
    }

    /// Latest status of a build.
    pub async fn get_status(&self, handle: &BuildHandle) -> Result<BuildStatus, BuildError> {
        self.store
            .get(&handle.id())
            .await?
            .ok_or(BuildError::NotFound(handle.id()))
    }

    /// Request cancellation of a running build.
    ///
    /// Returns as soon as the token is signalled; the build reaches
    /// `Cancelled` at its next suspension point.
    pub async fn cancel_build(&self, handle: &BuildHandle) -> Result<(), BuildError> {
        let status = self.get_status(handle).await?;
        if status.is_terminal() {
            return Err(BuildError::AlreadyFinished(handle.id()));
        }
        match self.cancellation_tokens.get(&handle.id()) {
            Some(token) => {
                token.cancel();
                tracing::info!(build_id = %handle.id(), stage = %status.stage, "build cancellation requested");
                Ok(())
            }
            // Finished between the status read and now.
            None => Err(BuildError::AlreadyFinished(handle.id())),
        }
    }

    /// Evict expired terminal builds from the store.
    pub async fn purge_expired(&self) -> Result<usize, BuildError> {
        let purged = self.store.purge_expired().await?;
        if purged > 0 {
            tracing::debug!(purged, "expired builds purged");
        }
        Ok(purged)
    }

    async fn execute(self, queued: BuildStatus, request: BuildRequest, token: CancellationToken) {
        let build_id = queued.build_id;
        let started = Instant::now();
        let scope = InvokeScope::new(build_id, token, self.events.clone());
        let progress = StoreProgress::new(Arc::clone(&self.store), self.events.clone(), queued);

        let outcome = self.sequencer.run(&request, &scope, &progress).await;

        self.cancellation_tokens.remove(&build_id);
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        progress.finish(outcome, duration_ms).await;
    }
}

impl<S: BuildStore> std::fmt::Debug for BuildService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildService")
            .field("active_builds", &self.cancellation_tokens.len())
            .field("events", &self.events)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// StoreProgress
// ---------------------------------------------------------------------------

/// Progress sink that keeps the build's stored status current and mirrors
/// every change onto the event bus.
struct StoreProgress<S: BuildStore> {
    store: Arc<S>,
    events: EventBus,
    status: Mutex<BuildStatus>,
}

impl<S: BuildStore> StoreProgress<S> {
    fn new(store: Arc<S>, events: EventBus, initial: BuildStatus) -> Self {
        Self {
            store,
            events,
            status: Mutex::new(initial),
        }
    }

    async fn write(&self, status: BuildStatus) {
        let build_id = status.build_id;
        if let Err(e) = self.store.put(status).await {
            tracing::warn!(%build_id, error = %e, "failed to persist build status");
        }
    }

    /// Persist the terminal status and publish the terminal event.
    async fn finish(&self, outcome: BuildOutcome, duration_ms: u64) {
        let snapshot = {
            let mut status = self.status.lock().await;
            let build_id = status.build_id;
            status.stage = outcome.stage();
            status.updated_at = Utc::now();

            let event = match outcome {
                BuildOutcome::Done(result) => {
                    status.percent_complete = 100;
                    status.message = "Build complete".to_string();
                    status.partial_files = None;
                    let event = BuildEvent::Completed {
                        build_id,
                        overall_score: result.quality.overall_score,
                        deployment_ready: result.quality.deployment_ready,
                        fallback_sections: result.provenance.fallback_sections.clone(),
                        duration_ms,
                    };
                    status.result = Some(result);
                    event
                }
                BuildOutcome::Failed(failure) => {
                    status.message = failure.to_string();
                    status.error = Some(failure.clone());
                    BuildEvent::Failed { build_id, failure }
                }
                BuildOutcome::Cancelled { phase } => {
                    status.message = format!("Build cancelled during {phase}");
                    status.cancelled_in = Some(phase);
                    BuildEvent::Cancelled {
                        build_id,
                        phase: Some(phase),
                    }
                }
            };
            tracing::info!(%build_id, stage = %status.stage, duration_ms, "build reached terminal state");
            (status.clone(), event)
        };

        let (status, event) = snapshot;
        self.write(status).await;
        self.events.publish(event);
    }
}

impl<S: BuildStore> ProgressSink for StoreProgress<S> {
    async fn report(&self, stage: BuildStage, fraction: f32, message: &str) {
        let snapshot = {
            let mut status = self.status.lock().await;
            status.stage = stage;
            if let Some(percent) = stage.percent_at(fraction) {
                status.percent_complete = percent;
            }
            status.message = message.to_string();
            status.updated_at = Utc::now();
            status.clone()
        };

        self.events.publish(BuildEvent::Progress {
            build_id: snapshot.build_id,
            stage,
            percent_complete: snapshot.percent_complete,
            message: message.to_string(),
        });
        self.write(snapshot).await;
    }

    async fn partial_files(&self, files: Vec<GeneratedFile>) {
        let snapshot = {
            let mut status = self.status.lock().await;
            status.partial_files = Some(files);
            status.updated_at = Utc::now();
            status.clone()
        };
        self.write(snapshot).await;
    }
}
