//! Request guard for protected routes
//!
//! Four ordered checks run before any handler: authenticate (with
//! transparent refresh when only the access credential expired), session
//! consistency, dashboard authorization, and cross-dashboard routing.
//! Browsers get redirects on rejection; programmatic clients get the JSON
//! envelope. A successful pass attaches the principal to the request and,
//! when rotation happened, re-issues credential cookies on the response.

use crate::auth::{
    append_cookies, clearing_cookies, credential_cookies, AccessVerification,
    ExtractedCredentials, RefreshError, TokenPair,
};
use crate::config::GatewayConfig;
use crate::error::ApiError;
use crate::middleware::rate_limit::RateScope;
use crate::server::GatewayServer;
use auth_identity::{Principal, PrincipalType};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use uuid::Uuid;

/// How a rejected client should be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    /// Navigating browser; rejections become redirects.
    Browser,
    /// API client; rejections become JSON envelopes.
    Programmatic,
}

impl ClientKind {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let wants_html = headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("text/html"))
            .unwrap_or(false);
        if wants_html {
            ClientKind::Browser
        } else {
            ClientKind::Programmatic
        }
    }
}

/// Whether an expired access credential may be healed with the refresh
/// credential during authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPolicy {
    RefreshOnExpiry,
    Disallowed,
}

/// Everything the guard needs from the incoming request.
#[derive(Debug, Clone)]
pub struct RequestFacts {
    pub path: String,
    /// First path segment, candidate dashboard prefix.
    pub prefix: Option<String>,
    pub client_kind: ClientKind,
    /// Rate-limit key: forwarded client address, or a local fallback.
    pub client_key: String,
    pub credentials: ExtractedCredentials,
}

/// Gateway-owned endpoints whose first segment is not a dashboard area.
/// Everything else under the guard is treated as a dashboard prefix and
/// must pass the rule table, where unknown areas are a hard denial.
const NON_DASHBOARD_PREFIXES: &[&str] = &["check", "me", "validate", "routes"];

impl RequestFacts {
    /// Candidate dashboard prefix, if the path enters one.
    pub fn dashboard_prefix(&self) -> Option<&str> {
        self.prefix
            .as_deref()
            .filter(|prefix| !NON_DASHBOARD_PREFIXES.contains(prefix))
    }

    pub fn from_request(request: &Request, config: &GatewayConfig) -> Self {
        let path = request.uri().path().to_string();
        let prefix = path
            .trim_start_matches('/')
            .split('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .map(str::to_string);

        Self {
            prefix,
            client_kind: ClientKind::from_headers(request.headers()),
            client_key: client_key(request.headers()),
            credentials: ExtractedCredentials::extract(request.headers(), config),
            path,
        }
    }
}

pub fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "local".to_string())
}

/// Authenticated principal attached to the request for handlers.
#[derive(Debug, Clone)]
pub struct CurrentPrincipal {
    pub principal: Principal,
    pub session_id: Uuid,
}

/// State accumulated by a successful guard pass.
#[derive(Debug, Clone)]
pub struct AuthFlow {
    pub principal: Principal,
    pub session_id: Uuid,
    /// Present when transparent refresh rotated the pair.
    pub rotated: Option<TokenPair>,
}

/// Terminal guard decision against the request.
#[derive(Debug)]
pub enum GuardReject {
    Unauthenticated {
        message: String,
    },
    Forbidden {
        message: String,
        /// Where the principal belongs, when resolvable.
        destination: Option<String>,
    },
    RateLimited {
        message: String,
        retry_after_secs: u64,
    },
    Unavailable {
        message: String,
    },
}

impl GuardReject {
    fn unauthenticated(message: impl Into<String>) -> Self {
        GuardReject::Unauthenticated {
            message: message.into(),
        }
    }

    fn unavailable(message: impl Into<String>) -> Self {
        GuardReject::Unavailable {
            message: message.into(),
        }
    }

    /// Render per client kind. Unauthenticated rejections always clear
    /// credential cookies so the client falls back to a clean login.
    pub fn into_response(self, facts: &RequestFacts, config: &GatewayConfig) -> Response {
        match (facts.client_kind, self) {
            (ClientKind::Browser, GuardReject::Unauthenticated { .. }) => {
                let target = format!("/login?next={}", facts.path);
                let mut response = Redirect::temporary(&target).into_response();
                append_cookies(&mut response, &clearing_cookies(config));
                response
            }
            (ClientKind::Browser, GuardReject::Forbidden { destination, .. }) => {
                let target = destination.unwrap_or_else(|| "/login".to_string());
                Redirect::temporary(&target).into_response()
            }
            (ClientKind::Programmatic, GuardReject::Unauthenticated { message }) => {
                let mut response = ApiError::authentication(message).into_response();
                append_cookies(&mut response, &clearing_cookies(config));
                response
            }
            (
                ClientKind::Programmatic,
                GuardReject::Forbidden {
                    message,
                    destination,
                },
            ) => match destination {
                Some(destination) => {
                    ApiError::authorization_with_destination(message, destination).into_response()
                }
                None => ApiError::authorization(message).into_response(),
            },
            (
                _,
                GuardReject::RateLimited {
                    message,
                    retry_after_secs,
                },
            ) => ApiError::rate_limited(message, retry_after_secs).into_response(),
            (_, GuardReject::Unavailable { message }) => {
                ApiError::service(message).into_response()
            }
        }
    }
}

impl From<ApiError> for GuardReject {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::RateLimit {
                message,
                retry_after_secs,
            } => GuardReject::RateLimited {
                message,
                retry_after_secs,
            },
            ApiError::Authentication(message) => GuardReject::Unauthenticated { message },
            other => GuardReject::Unavailable {
                message: other.to_string(),
            },
        }
    }
}

/// The ordered check sequence applied to every guarded request.
pub struct GuardPipeline {
    refresh_policy: RefreshPolicy,
}

impl GuardPipeline {
    pub fn standard() -> Self {
        Self {
            refresh_policy: RefreshPolicy::RefreshOnExpiry,
        }
    }

    pub fn with_refresh_policy(refresh_policy: RefreshPolicy) -> Self {
        Self { refresh_policy }
    }

    pub async fn run(
        &self,
        server: &GatewayServer,
        facts: &RequestFacts,
    ) -> Result<AuthFlow, GuardReject> {
        let flow = self.authenticate(server, facts).await?;
        self.check_session_consistency(server, facts, &flow).await?;
        self.authorize(server, facts, &flow).await?;
        self.check_cross_access(server, facts, &flow).await?;
        Ok(flow)
    }

    /// Establish who is calling. A valid access credential authenticates
    /// directly (with a fresh status check against the identity store); an
    /// expired one may be healed by rotating the refresh credential. A
    /// tampered or revoked credential is never healed.
    async fn authenticate(
        &self,
        server: &GatewayServer,
        facts: &RequestFacts,
    ) -> Result<AuthFlow, GuardReject> {
        let credentials = &facts.credentials;

        if let Some(access) = &credentials.access {
            match server.tokens.verify_access(access).await {
                AccessVerification::Valid(claims) => {
                    let principal_id = claims
                        .principal_id()
                        .map_err(|_| GuardReject::unauthenticated("Invalid credentials"))?;
                    let session_id = claims
                        .session_id()
                        .map_err(|_| GuardReject::unauthenticated("Invalid credentials"))?;
                    let principal = self
                        .lookup_active(server, principal_id, claims.principal_type)
                        .await?;
                    return Ok(AuthFlow {
                        principal,
                        session_id,
                        rotated: None,
                    });
                }
                AccessVerification::Expired => {
                    // fall through to the refresh path
                }
                AccessVerification::Invalid => {
                    tracing::warn!(client = %facts.client_key, "rejected invalid access credential");
                    return Err(GuardReject::unauthenticated("Invalid credentials"));
                }
            }
        }

        if self.refresh_policy == RefreshPolicy::Disallowed {
            return Err(GuardReject::unauthenticated("Authentication required"));
        }

        let refresh = credentials
            .refresh
            .as_ref()
            .ok_or_else(|| GuardReject::unauthenticated("Authentication required"))?;

        server
            .limiter
            .check(RateScope::Refresh, &facts.client_key)
            .await?;

        match server.tokens.refresh(refresh, server.identity.as_ref()).await {
            Ok((pair, principal)) => Ok(AuthFlow {
                principal,
                session_id: pair.session_id,
                rotated: Some(pair),
            }),
            Err(RefreshError::Store(detail)) => Err(GuardReject::unavailable(detail)),
            Err(err) => {
                tracing::warn!(client = %facts.client_key, error = %err, "refresh rejected");
                Err(GuardReject::unauthenticated(
                    "Session expired, please log in again",
                ))
            }
        }
    }

    /// Fresh status check: a suspended or deleted principal is rejected even
    /// while holding an unexpired credential. Store trouble fails closed.
    async fn lookup_active(
        &self,
        server: &GatewayServer,
        principal_id: Uuid,
        principal_type: PrincipalType,
    ) -> Result<Principal, GuardReject> {
        match server.identity.lookup(principal_id, principal_type).await {
            Ok(Some(principal)) if principal.is_active() => Ok(principal),
            Ok(_) => {
                tracing::warn!(principal_id = %principal_id, "credential holder missing or inactive");
                Err(GuardReject::unauthenticated("Account is not active"))
            }
            Err(err) => Err(GuardReject::unavailable(err.to_string())),
        }
    }

    /// Compare the credential against the legacy session mirror. Drift
    /// invalidates everything: session destroyed, credentials revoked, full
    /// re-login required. A missing mirror is tolerated; the stores are
    /// eventually consistent and credentials remain the source of truth.
    async fn check_session_consistency(
        &self,
        server: &GatewayServer,
        facts: &RequestFacts,
        flow: &AuthFlow,
    ) -> Result<(), GuardReject> {
        let Some(cookie_session_id) = facts.credentials.session_id else {
            return Ok(());
        };

        let drifted = cookie_session_id != flow.session_id
            || server
                .sessions
                .matches(
                    cookie_session_id,
                    flow.principal.id,
                    flow.principal.principal_type,
                )
                .await
                == Some(false);

        if !drifted {
            return Ok(());
        }

        tracing::warn!(
            principal_id = %flow.principal.id,
            session_id = %cookie_session_id,
            "session mirror drifted from credential; invalidating both"
        );

        server.sessions.destroy(cookie_session_id).await;
        server.sessions.destroy(flow.session_id).await;
        if let Some(access) = &facts.credentials.access {
            server.tokens.revoke(access).await;
        }
        if let Some(refresh) = &facts.credentials.refresh {
            server.tokens.revoke(refresh).await;
        }

        Err(GuardReject::unauthenticated(
            "Session mismatch, please log in again",
        ))
    }

    /// Evaluate the dashboard rule when the path enters an area. The
    /// gateway's own endpoints only require authentication; every other
    /// prefix goes through the rule table, so an unknown area is denied
    /// rather than silently served.
    async fn authorize(
        &self,
        server: &GatewayServer,
        facts: &RequestFacts,
        flow: &AuthFlow,
    ) -> Result<(), GuardReject> {
        let Some(prefix) = facts.dashboard_prefix() else {
            return Ok(());
        };

        if let Err(reason) = server.policy.evaluate(&flow.principal, prefix) {
            tracing::warn!(
                principal_id = %flow.principal.id,
                prefix = %prefix,
                reason = %reason,
                "dashboard access denied"
            );
            let destination = server
                .router
                .resolve_destination(&flow.principal, server.identity.as_ref())
                .await
                .ok()
                .map(|d| d.path);
            return Err(GuardReject::Forbidden {
                message: reason.to_string(),
                destination,
            });
        }
        Ok(())
    }

    /// Keep principals inside their own dashboard area even when a rule
    /// would admit them elsewhere.
    async fn check_cross_access(
        &self,
        server: &GatewayServer,
        facts: &RequestFacts,
        flow: &AuthFlow,
    ) -> Result<(), GuardReject> {
        use auth_policy::CrossAccessOutcome;

        let Some(prefix) = facts.dashboard_prefix() else {
            return Ok(());
        };

        match server
            .router
            .guard_cross_access(&flow.principal, prefix, server.identity.as_ref())
            .await
        {
            Ok(CrossAccessOutcome::Granted) => Ok(()),
            Ok(CrossAccessOutcome::Redirect {
                destination,
                reason,
            }) => {
                tracing::warn!(
                    principal_id = %flow.principal.id,
                    requested = %prefix,
                    destination = %destination.path,
                    "cross-dashboard access blocked"
                );
                Err(GuardReject::Forbidden {
                    message: reason,
                    destination: Some(destination.path),
                })
            }
            Err(err) => Err(GuardReject::unavailable(err.to_string())),
        }
    }
}

/// Middleware applied to every protected route.
pub async fn auth_guard(
    State(server): State<GatewayServer>,
    mut request: Request,
    next: Next,
) -> Response {
    let facts = RequestFacts::from_request(&request, &server.config);

    if let Err(err) = server
        .limiter
        .check(RateScope::General, &facts.client_key)
        .await
    {
        return err.into_response();
    }

    let flow = match server.pipeline.run(&server, &facts).await {
        Ok(flow) => flow,
        Err(reject) => return reject.into_response(&facts, &server.config),
    };

    // Activity timestamp is best-effort and off the request path.
    let sessions = server.sessions.clone();
    let session_id = flow.session_id;
    tokio::spawn(async move {
        sessions.touch(session_id).await;
    });

    let rotated = flow.rotated;
    request.extensions_mut().insert(CurrentPrincipal {
        principal: flow.principal,
        session_id: flow.session_id,
    });

    let mut response = next.run(request).await;

    if let Some(pair) = rotated {
        let cookies = credential_cookies(&pair, &server.config, facts.credentials.remember);
        append_cookies(&mut response, &cookies);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::header::{ACCEPT, COOKIE};

    fn request(uri: &str, headers: &[(header::HeaderName, &str)]) -> Request {
        let mut builder = Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn browser_detection_follows_accept_header() {
        let html = request("/", &[(ACCEPT, "text/html,application/xhtml+xml")]);
        let json = request("/", &[(ACCEPT, "application/json")]);
        let none = request("/", &[]);

        assert_eq!(ClientKind::from_headers(html.headers()), ClientKind::Browser);
        assert_eq!(
            ClientKind::from_headers(json.headers()),
            ClientKind::Programmatic
        );
        assert_eq!(
            ClientKind::from_headers(none.headers()),
            ClientKind::Programmatic
        );
    }

    #[test]
    fn prefix_is_first_path_segment() {
        let config = GatewayConfig::default();

        let facts = RequestFacts::from_request(&request("/manufacturer/orders/42", &[]), &config);
        assert_eq!(facts.prefix.as_deref(), Some("manufacturer"));

        let facts = RequestFacts::from_request(&request("/", &[]), &config);
        assert_eq!(facts.prefix, None);
    }

    #[test]
    fn reserved_paths_are_not_dashboard_prefixes() {
        let config = GatewayConfig::default();

        for uri in ["/check", "/me", "/validate/distributor", "/routes"] {
            let facts = RequestFacts::from_request(&request(uri, &[]), &config);
            assert_eq!(facts.dashboard_prefix(), None, "uri {uri}");
        }

        // Anything else is a dashboard candidate, known to the rule table
        // or not.
        let facts = RequestFacts::from_request(&request("/manufacturer/dashboard", &[]), &config);
        assert_eq!(facts.dashboard_prefix(), Some("manufacturer"));
        let facts = RequestFacts::from_request(&request("/warehouse/dashboard", &[]), &config);
        assert_eq!(facts.dashboard_prefix(), Some("warehouse"));
    }

    #[test]
    fn client_key_prefers_forwarded_address() {
        let forwarded = request(
            "/",
            &[(
                header::HeaderName::from_static("x-forwarded-for"),
                "10.1.2.3, 172.16.0.1",
            )],
        );
        assert_eq!(client_key(forwarded.headers()), "10.1.2.3");
        assert_eq!(client_key(request("/", &[]).headers()), "local");
    }

    #[test]
    fn browser_unauthenticated_redirects_to_login_with_next() {
        let config = GatewayConfig::default();
        let facts = RequestFacts::from_request(
            &request("/admin/reports", &[(ACCEPT, "text/html")]),
            &config,
        );

        let response = GuardReject::unauthenticated("nope").into_response(&facts, &config);
        assert_eq!(response.status(), axum::http::StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/login?next=/admin/reports"
        );
        // Credential cookies are cleared alongside the redirect.
        assert!(response.headers().get_all(header::SET_COOKIE).iter().count() >= 4);
    }

    #[test]
    fn programmatic_forbidden_carries_destination() {
        let config = GatewayConfig::default();
        let facts = RequestFacts::from_request(&request("/distributor/home", &[]), &config);

        let response = GuardReject::Forbidden {
            message: "outside your area".into(),
            destination: Some("/manufacturer/dashboard".into()),
        }
        .into_response(&facts, &config);
        assert_eq!(response.status(), axum::http::StatusCode::FORBIDDEN);
    }

    #[test]
    fn facts_pick_up_cookie_credentials() {
        let config = GatewayConfig::default();
        let facts = RequestFacts::from_request(
            &request("/check", &[(COOKIE, "tg_access=abc; tg_remember=1")]),
            &config,
        );
        assert_eq!(facts.credentials.access.as_deref(), Some("abc"));
        assert!(facts.credentials.remember);
    }
}
