//! Progress reporting seam.
//!
//! The sequencer reports where it is; a sink decides what that means
//! (status-store writes plus bus events in the build service, nothing at all
//! in tests).

use ideaforge_types::artifacts::GeneratedFile;
use ideaforge_types::build::BuildStage;

/// Receives progress from a running build.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition). Reporting
/// never fails from the sequencer's point of view; sinks log their own
/// errors.
pub trait ProgressSink: Send + Sync {
    /// The build is `fraction` of the way through `stage`.
    fn report(
        &self,
        stage: BuildStage,
        fraction: f32,
        message: &str,
    ) -> impl std::future::Future<Output = ()> + Send;

    /// Generated files are available ahead of the final result.
    fn partial_files(
        &self,
        files: Vec<GeneratedFile>,
    ) -> impl std::future::Future<Output = ()> + Send;
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    async fn report(&self, _stage: BuildStage, _fraction: f32, _message: &str) {}

    async fn partial_files(&self, _files: Vec<GeneratedFile>) {}
}
