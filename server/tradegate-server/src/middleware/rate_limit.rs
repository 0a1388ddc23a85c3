//! Sliding-window rate limiting
//!
//! Three independent scopes: one for general traffic, two tighter ones for
//! the credential-sensitive login and refresh operations. Each scope keeps
//! per-client attempt timestamps; an attempt is admitted only if fewer than
//! the scope's maximum fall inside the trailing window. Read-modify-write
//! happens under one write guard, so concurrent attempts from the same
//! client serialize instead of both slipping under the limit.

use crate::config::GatewayConfig;
use crate::error::ApiError;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Which limit bucket an attempt counts against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateScope {
    General,
    Login,
    Refresh,
}

impl RateScope {
    fn denial_message(&self) -> &'static str {
        match self {
            RateScope::General => "Too many requests, please slow down",
            RateScope::Login => "Too many login attempts, please try again later",
            RateScope::Refresh => "Too many refresh attempts, please try again later",
        }
    }
}

/// Per-scope window storage, injected so a shared external store can back
/// multi-instance deployments.
#[async_trait]
pub trait WindowStore: Send + Sync {
    /// Record an attempt for `key` if it fits in the window. Returns
    /// `Err(retry_after_ms)` when the client must wait.
    async fn try_record(&self, key: &str, now_ms: u64, window_ms: u64, max: u32)
        -> Result<(), u64>;

    /// Drop all attempts recorded for `key`.
    async fn clear(&self, key: &str);

    /// Evict entries whose every attempt has aged out of the window.
    async fn sweep(&self, now_ms: u64, window_ms: u64);
}

#[derive(Clone, Default)]
pub struct InMemoryWindowStore {
    attempts: Arc<RwLock<HashMap<String, Vec<u64>>>>,
}

impl InMemoryWindowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WindowStore for InMemoryWindowStore {
    async fn try_record(
        &self,
        key: &str,
        now_ms: u64,
        window_ms: u64,
        max: u32,
    ) -> Result<(), u64> {
        let mut attempts = self.attempts.write().await;
        let entry = attempts.entry(key.to_string()).or_default();
        let cutoff = now_ms.saturating_sub(window_ms);
        entry.retain(|ts| *ts > cutoff);

        if entry.len() >= max as usize {
            // Oldest in-window attempt decides when capacity frees up.
            let oldest = entry.iter().min().copied().unwrap_or(now_ms);
            let retry_after_ms = (oldest + window_ms).saturating_sub(now_ms);
            return Err(retry_after_ms);
        }

        entry.push(now_ms);
        Ok(())
    }

    async fn clear(&self, key: &str) {
        self.attempts.write().await.remove(key);
    }

    async fn sweep(&self, now_ms: u64, window_ms: u64) {
        let cutoff = now_ms.saturating_sub(window_ms);
        self.attempts
            .write()
            .await
            .retain(|_, timestamps| timestamps.iter().any(|ts| *ts > cutoff));
    }
}

/// Scoped sliding-window limiter over injected stores.
pub struct RateLimiter {
    config: Arc<GatewayConfig>,
    general: Arc<dyn WindowStore>,
    login: Arc<dyn WindowStore>,
    refresh: Arc<dyn WindowStore>,
}

impl RateLimiter {
    pub fn new(config: Arc<GatewayConfig>) -> Self {
        Self {
            config,
            general: Arc::new(InMemoryWindowStore::new()),
            login: Arc::new(InMemoryWindowStore::new()),
            refresh: Arc::new(InMemoryWindowStore::new()),
        }
    }

    fn store(&self, scope: RateScope) -> &Arc<dyn WindowStore> {
        match scope {
            RateScope::General => &self.general,
            RateScope::Login => &self.login,
            RateScope::Refresh => &self.refresh,
        }
    }

    fn limits(&self, scope: RateScope) -> (u32, u64) {
        match scope {
            RateScope::General => (
                self.config.general_max_requests_per_window,
                self.config.general_window_ms,
            ),
            RateScope::Login => (
                self.config.max_login_attempts_per_window,
                self.config.login_window_ms,
            ),
            RateScope::Refresh => (
                self.config.max_refresh_attempts_per_window,
                self.config.refresh_window_ms,
            ),
        }
    }

    /// Admit or reject an attempt. Rejections carry a retry-after estimate
    /// rounded up to whole seconds.
    pub async fn check(&self, scope: RateScope, key: &str) -> Result<(), ApiError> {
        let (max, window_ms) = self.limits(scope);
        let now_ms = Utc::now().timestamp_millis() as u64;

        match self.store(scope).try_record(key, now_ms, window_ms, max).await {
            Ok(()) => Ok(()),
            Err(retry_after_ms) => {
                tracing::warn!(scope = ?scope, key = %key, "rate limit exceeded");
                let retry_after_secs = retry_after_ms.div_ceil(1000).max(1);
                Err(ApiError::rate_limited(
                    scope.denial_message(),
                    retry_after_secs,
                ))
            }
        }
    }

    /// Forget login attempts for `key`. Called after a successful login so
    /// a prior run of typos does not shadow the authenticated user.
    pub async fn clear_login(&self, key: &str) {
        self.login.clear(key).await;
    }

    /// Spawn per-scope sweepers; each wakes at twice its window so entries
    /// linger at most one extra window beyond relevance.
    pub fn spawn_sweepers(self: &Arc<Self>) {
        for scope in [RateScope::General, RateScope::Login, RateScope::Refresh] {
            let limiter = Arc::clone(self);
            let (_, window_ms) = limiter.limits(scope);
            tokio::spawn(async move {
                let mut ticker =
                    tokio::time::interval(std::time::Duration::from_millis(window_ms * 2));
                loop {
                    ticker.tick().await;
                    let now_ms = Utc::now().timestamp_millis() as u64;
                    limiter.store(scope).sweep(now_ms, window_ms).await;
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(login_max: u32, login_window_ms: u64) -> RateLimiter {
        let config = GatewayConfig {
            max_login_attempts_per_window: login_max,
            login_window_ms,
            ..GatewayConfig::default()
        };
        RateLimiter::new(Arc::new(config))
    }

    #[tokio::test]
    async fn admits_up_to_max_then_rejects() {
        let limiter = limiter(3, 60_000);

        for _ in 0..3 {
            limiter.check(RateScope::Login, "1.2.3.4").await.unwrap();
        }
        let err = limiter.check(RateScope::Login, "1.2.3.4").await.unwrap_err();
        assert_eq!(err.code(), "RATE_LIMITED");
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let limiter = limiter(1, 60_000);

        limiter.check(RateScope::Login, "1.2.3.4").await.unwrap();
        limiter.check(RateScope::Login, "5.6.7.8").await.unwrap();
        assert!(limiter.check(RateScope::Login, "1.2.3.4").await.is_err());
    }

    #[tokio::test]
    async fn scopes_are_independent() {
        let limiter = limiter(1, 60_000);

        limiter.check(RateScope::Login, "k").await.unwrap();
        limiter.check(RateScope::Refresh, "k").await.unwrap();
        limiter.check(RateScope::General, "k").await.unwrap();
        assert!(limiter.check(RateScope::Login, "k").await.is_err());
    }

    #[tokio::test]
    async fn window_expiry_restores_capacity() {
        let limiter = limiter(1, 200);

        limiter.check(RateScope::Login, "k").await.unwrap();
        assert!(limiter.check(RateScope::Login, "k").await.is_err());

        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        assert!(limiter.check(RateScope::Login, "k").await.is_ok());
    }

    #[tokio::test]
    async fn clear_login_resets_the_counter() {
        let limiter = limiter(1, 60_000);

        limiter.check(RateScope::Login, "k").await.unwrap();
        limiter.clear_login("k").await;
        assert!(limiter.check(RateScope::Login, "k").await.is_ok());
    }

    #[tokio::test]
    async fn rejection_includes_retry_estimate() {
        let limiter = limiter(1, 60_000);

        limiter.check(RateScope::Login, "k").await.unwrap();
        match limiter.check(RateScope::Login, "k").await.unwrap_err() {
            ApiError::RateLimit {
                retry_after_secs, ..
            } => {
                assert!(retry_after_secs >= 1 && retry_after_secs <= 60);
            }
            other => panic!("expected rate limit error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn sweep_drops_stale_keys_only() {
        let store = InMemoryWindowStore::new();
        store.try_record("old", 1_000, 500, 10).await.unwrap();
        store.try_record("new", 2_000, 500, 10).await.unwrap();

        store.sweep(2_100, 500).await;

        // Stale key starts from a clean slate; recent key keeps history.
        assert!(store.try_record("new", 2_100, 500, 1).await.is_err());
        assert!(store.try_record("old", 2_100, 500, 1).await.is_ok());
    }
}
