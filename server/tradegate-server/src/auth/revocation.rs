//! Credential revocation list
//!
//! Revocation dominates validity: a revoked credential fails verification
//! even while unexpired and unmodified. The list is an injected capability
//! so a shared external store can replace the in-memory map without
//! touching guard or token logic.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Store of revoked credential identifiers.
///
/// Each entry carries the expiry of its underlying credential so eviction
/// is bounded: once the credential could no longer verify anyway, the entry
/// is garbage.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Record `id` as revoked until `expires_at` (unix seconds).
    async fn revoke(&self, id: &str, expires_at: i64);

    async fn is_revoked(&self, id: &str) -> bool;

    /// Atomically check-and-revoke. Returns `false` when `id` was already
    /// revoked. This is the critical section that gives a refresh token
    /// at most one successful use under concurrent attempts.
    async fn consume(&self, id: &str, expires_at: i64) -> bool;

    /// Evict entries whose credential expiry has passed.
    async fn sweep(&self, now: i64);
}

/// In-memory revocation store for single-instance deployments.
#[derive(Clone, Default)]
pub struct InMemoryRevocationStore {
    entries: Arc<RwLock<HashMap<String, i64>>>,
}

impl InMemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RevocationStore for InMemoryRevocationStore {
    async fn revoke(&self, id: &str, expires_at: i64) {
        self.entries.write().await.insert(id.to_string(), expires_at);
    }

    async fn is_revoked(&self, id: &str) -> bool {
        self.entries.read().await.contains_key(id)
    }

    async fn consume(&self, id: &str, expires_at: i64) -> bool {
        // Check and mark under one write guard; concurrent callers for the
        // same id serialize here.
        let mut entries = self.entries.write().await;
        if entries.contains_key(id) {
            return false;
        }
        entries.insert(id.to_string(), expires_at);
        true
    }

    async fn sweep(&self, now: i64) {
        self.entries.write().await.retain(|_, expires_at| *expires_at > now);
    }
}

/// Spawn the periodic sweep that keeps the list bounded.
pub fn spawn_revocation_sweeper(store: Arc<dyn RevocationStore>, interval_secs: u64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        loop {
            ticker.tick().await;
            store.sweep(Utc::now().timestamp()).await;
        }
    });
}
