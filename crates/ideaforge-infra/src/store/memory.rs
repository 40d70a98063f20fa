//! In-memory build-state store with TTL eviction after completion.
//!
//! Builds in flight never expire. When a terminal status (`Done`, `Failed`,
//! `Cancelled`) is written, the entry is stamped with `now + ttl`; reads past
//! that instant treat it as gone and evict it. A TTL too large to represent
//! as an instant means the entry never expires. `purge_expired` sweeps the
//! whole map and is meant to run periodically.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use uuid::Uuid;

use ideaforge_core::storage::BuildStore;
use ideaforge_types::build::BuildStatus;
use ideaforge_types::error::StoreError;

#[derive(Debug, Clone)]
struct Entry {
    status: BuildStatus,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// DashMap-backed [`BuildStore`].
#[derive(Debug)]
pub struct InMemoryBuildStore {
    entries: DashMap<Uuid, Entry>,
    ttl: Duration,
}

impl InMemoryBuildStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of stored entries, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl BuildStore for InMemoryBuildStore {
    async fn get(&self, build_id: &Uuid) -> Result<Option<BuildStatus>, StoreError> {
        let now = Instant::now();
        // The shard guard must be released before `remove_if` takes it again.
        match self.entries.get(build_id) {
            None => return Ok(None),
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.status.clone())),
            Some(_) => {}
        }
        self.entries.remove_if(build_id, |_, entry| entry.is_expired(now));
        tracing::debug!(%build_id, "evicted expired build on read");
        Ok(None)
    }

    async fn put(&self, status: BuildStatus) -> Result<(), StoreError> {
        let expires_at = if status.is_terminal() {
            Instant::now().checked_add(self.ttl)
        } else {
            None
        };
        self.entries
            .insert(status.build_id, Entry { status, expires_at });
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            tracing::debug!(purged, remaining = self.entries.len(), "purged expired builds");
        }
        Ok(purged)
    }
}
