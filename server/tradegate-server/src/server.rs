//! Shared gateway state
//!
//! One `GatewayServer` value is cloned into every handler and middleware.
//! All identity lookups go through a timeout wrapper so a stalled store
//! turns into a fail-closed service error instead of a hung request.

use crate::auth::{
    spawn_revocation_sweeper, InMemoryRevocationStore, RevocationStore, TokenService,
};
use crate::config::GatewayConfig;
use crate::middleware::{GuardPipeline, RateLimiter};
use async_trait::async_trait;
use auth_identity::{
    IdentityError, IdentityResolver, LegacySessionStore, Principal, PrincipalType,
};
use auth_policy::{default_rules, DashboardRouter, PolicyEngine};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Bounds every call into an identity resolver.
///
/// The guard re-checks principal status on each request; an unbounded
/// store call would put that store on the latency path of all traffic.
pub struct TimeoutResolver {
    inner: Arc<dyn IdentityResolver>,
    timeout: Duration,
}

impl TimeoutResolver {
    pub fn new(inner: Arc<dyn IdentityResolver>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl IdentityResolver for TimeoutResolver {
    async fn lookup(
        &self,
        id: Uuid,
        principal_type: PrincipalType,
    ) -> auth_identity::Result<Option<Principal>> {
        match tokio::time::timeout(self.timeout, self.inner.lookup(id, principal_type)).await {
            Ok(result) => result,
            Err(_) => Err(IdentityError::StoreUnavailable(
                "identity lookup timed out".to_string(),
            )),
        }
    }

    async fn verify_credentials(
        &self,
        identifier: &str,
        secret: &str,
    ) -> auth_identity::Result<Option<Principal>> {
        match tokio::time::timeout(
            self.timeout,
            self.inner.verify_credentials(identifier, secret),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(IdentityError::StoreUnavailable(
                "credential verification timed out".to_string(),
            )),
        }
    }
}

/// Gateway state shared across requests.
#[derive(Clone)]
pub struct GatewayServer {
    pub config: Arc<GatewayConfig>,
    pub identity: Arc<dyn IdentityResolver>,
    pub tokens: Arc<TokenService>,
    pub sessions: LegacySessionStore,
    pub limiter: Arc<RateLimiter>,
    pub policy: Arc<PolicyEngine>,
    pub router: Arc<DashboardRouter>,
    pub pipeline: Arc<GuardPipeline>,
    revocations: Arc<dyn RevocationStore>,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, identity: Arc<dyn IdentityResolver>) -> Self {
        crate::error::set_development_mode(config.development_mode);
        let config = Arc::new(config);
        let identity: Arc<dyn IdentityResolver> = Arc::new(TimeoutResolver::new(
            identity,
            Duration::from_millis(config.identity_timeout_ms),
        ));
        let revocations: Arc<dyn RevocationStore> = Arc::new(InMemoryRevocationStore::new());
        let tokens = Arc::new(TokenService::new(config.clone(), revocations.clone()));
        let limiter = Arc::new(RateLimiter::new(config.clone()));

        Self {
            identity,
            tokens,
            sessions: LegacySessionStore::new(),
            limiter,
            policy: Arc::new(PolicyEngine::new(default_rules())),
            router: Arc::new(DashboardRouter::new()),
            pipeline: Arc::new(GuardPipeline::standard()),
            revocations,
            config,
        }
    }

    /// Spawn the background sweepers that keep the in-memory stores
    /// bounded. Call once at startup; tests skip this.
    pub fn spawn_sweepers(&self) {
        spawn_revocation_sweeper(self.revocations.clone(), 60);
        self.limiter.spawn_sweepers();
    }
}
