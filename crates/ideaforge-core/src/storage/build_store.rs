//! Build-state store trait.
//!
//! Maps a build id to its latest `BuildStatus`. Injected into the build
//! service so that retention (TTL eviction after completion) is an explicit
//! property of the store instead of process-global state.

use ideaforge_types::build::BuildStatus;
use ideaforge_types::error::StoreError;
use uuid::Uuid;

/// Trait for build-status storage.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
/// Implementations live in ideaforge-infra.
///
/// Contract:
/// - a status whose stage is not terminal never expires;
/// - a terminal status becomes eligible for eviction once the store's TTL
///   has elapsed since it was written, and `get` must not return it after
///   that point.
pub trait BuildStore: Send + Sync + 'static {
    /// Latest status for `build_id`, or `None` if unknown or expired.
    fn get(
        &self,
        build_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<BuildStatus>, StoreError>> + Send;

    /// Insert or replace the status for `status.build_id`.
    fn put(
        &self,
        status: BuildStatus,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Evict every expired terminal build. Returns the number evicted.
    fn purge_expired(&self) -> impl std::future::Future<Output = Result<usize, StoreError>> + Send;
}
