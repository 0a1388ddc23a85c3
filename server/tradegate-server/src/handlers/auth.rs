//! Authentication endpoints and the authenticated-surface handlers.

use crate::auth::{append_cookies, clearing_cookies, credential_cookies, ExtractedCredentials};
use crate::error::{api_message, api_success, ApiError, ApiResponse};
use crate::middleware::guard::{client_key, ClientKind, CurrentPrincipal};
use crate::middleware::RateScope;
use crate::server::GatewayServer;
use crate::validation::RequestValidation;
use crate::{validate_field, validate_length, validate_required};
use async_trait::async_trait;
use auth_identity::{OrganizationType, Principal, PrincipalType};
use auth_policy::CrossAccessOutcome;
use axum::body::Bytes;
use axum::extract::{FromRequest, Path, Request, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Principal view returned to clients. Never includes status or any
/// credential material.
#[derive(Debug, Serialize)]
pub struct PrincipalSummary {
    pub id: Uuid,
    pub principal_type: PrincipalType,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_type: Option<OrganizationType>,
    pub permissions: Vec<String>,
}

impl From<&Principal> for PrincipalSummary {
    fn from(principal: &Principal) -> Self {
        Self {
            id: principal.id,
            principal_type: principal.principal_type,
            role: principal.role.clone(),
            organization_type: principal.organization_type,
            permissions: principal.permissions.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub secret: String,
    #[serde(default)]
    pub remember: bool,
}

impl RequestValidation for LoginRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_required!(self.identifier, "Identifier is required");
        validate_length!(
            self.identifier,
            3,
            254,
            "Identifier must be between 3 and 254 characters"
        );
        validate_required!(self.secret, "Password is required");
        validate_length!(
            self.secret,
            8,
            128,
            "Password must be between 8 and 128 characters"
        );
        Ok(())
    }
}

/// Login body accepted as JSON or an HTML form post.
///
/// Form submissions answer with a redirect even when the Accept header is
/// permissive, so `from_form` is carried alongside the payload.
pub struct LoginPayload {
    pub request: LoginRequest,
    pub from_form: bool,
}

#[async_trait]
impl<S> FromRequest<S> for LoginPayload
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let from_form = content_type.starts_with("application/x-www-form-urlencoded");

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|_| ApiError::validation("Unreadable request body"))?;

        let request = if from_form {
            serde_urlencoded::from_bytes(&bytes)
                .map_err(|_| ApiError::validation("Malformed form body"))?
        } else {
            serde_json::from_slice(&bytes)
                .map_err(|_| ApiError::validation("Malformed JSON body"))?
        };

        Ok(Self { request, from_form })
    }
}

#[derive(Debug, Serialize)]
pub struct LoginData {
    pub destination: String,
    pub principal: PrincipalSummary,
}

/// POST /login
///
/// Validation runs before the attempt counts against the login window;
/// malformed requests are cheap and should not lock a client out. Unknown
/// identifier and wrong password answer identically.
pub async fn login(
    State(server): State<GatewayServer>,
    headers: HeaderMap,
    payload: LoginPayload,
) -> Result<Response, ApiError> {
    payload.request.validate()?;

    let key = client_key(&headers);
    server.limiter.check(RateScope::Login, &key).await?;

    let principal = server
        .identity
        .verify_credentials(&payload.request.identifier, &payload.request.secret)
        .await
        .map_err(|e| ApiError::service(e.to_string()))?
        .ok_or_else(|| {
            tracing::warn!(client = %key, "login failed");
            ApiError::authentication("Invalid identifier or password")
        })?;

    if !principal.is_active() {
        tracing::warn!(principal_id = %principal.id, "login rejected for inactive account");
        return Err(ApiError::authentication("Account is disabled"));
    }

    let pair = server
        .tokens
        .issue_pair(&principal)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    server
        .sessions
        .create(pair.session_id, principal.id, principal.principal_type)
        .await;
    server.limiter.clear_login(&key).await;

    let destination = server
        .router
        .resolve_destination(&principal, server.identity.as_ref())
        .await
        .map_err(|e| ApiError::service(e.to_string()))?;

    tracing::info!(
        principal_id = %principal.id,
        destination = %destination.path,
        "login succeeded"
    );

    let cookies = credential_cookies(&pair, &server.config, payload.request.remember);
    let browser = payload.from_form || ClientKind::from_headers(&headers) == ClientKind::Browser;

    let mut response = if browser {
        Redirect::to(&destination.path).into_response()
    } else {
        Json(api_success(LoginData {
            destination: destination.path,
            principal: PrincipalSummary::from(&principal),
        }))
        .into_response()
    };
    append_cookies(&mut response, &cookies);
    Ok(response)
}

/// POST /logout
///
/// Idempotent and public: whatever credentials arrive are revoked, the
/// session mirror is destroyed, and every credential cookie is cleared.
pub async fn logout(State(server): State<GatewayServer>, headers: HeaderMap) -> Response {
    let credentials = ExtractedCredentials::extract(&headers, &server.config);

    if let Some(access) = &credentials.access {
        server.tokens.revoke(access).await;
    }
    if let Some(refresh) = &credentials.refresh {
        server.tokens.revoke(refresh).await;
    }
    if let Some(session_id) = credentials.session_id {
        server.sessions.destroy(session_id).await;
    }

    let mut response = if ClientKind::from_headers(&headers) == ClientKind::Browser {
        Redirect::to("/login").into_response()
    } else {
        Json(api_message("Logged out")).into_response()
    };
    append_cookies(&mut response, &clearing_cookies(&server.config));
    response
}

#[derive(Debug, Serialize)]
pub struct CheckData {
    pub authenticated: bool,
    pub principal: PrincipalSummary,
    pub destination: String,
}

/// GET /check: authenticated probe; the guard has already done the heavy
/// lifting, this only resolves where the caller belongs.
pub async fn check(
    State(server): State<GatewayServer>,
    Extension(current): Extension<CurrentPrincipal>,
) -> Result<Json<ApiResponse<CheckData>>, ApiError> {
    let destination = server
        .router
        .resolve_destination(&current.principal, server.identity.as_ref())
        .await
        .map_err(|e| ApiError::service(e.to_string()))?;

    Ok(Json(api_success(CheckData {
        authenticated: true,
        principal: PrincipalSummary::from(&current.principal),
        destination: destination.path,
    })))
}

/// GET /me
pub async fn me(
    Extension(current): Extension<CurrentPrincipal>,
) -> Json<ApiResponse<PrincipalSummary>> {
    Json(api_success(PrincipalSummary::from(&current.principal)))
}

#[derive(Debug, Serialize)]
pub struct ValidationData {
    pub dashboard: String,
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

/// GET /validate/:dashboard_type
///
/// Answers allowed/denied without redirecting, so clients can probe areas
/// ahead of navigation. Denials are a 200 with `allowed: false`; the
/// request itself succeeded.
pub async fn validate_dashboard(
    State(server): State<GatewayServer>,
    Extension(current): Extension<CurrentPrincipal>,
    Path(dashboard_type): Path<String>,
) -> Result<Json<ApiResponse<ValidationData>>, ApiError> {
    if let Err(reason) = server.policy.evaluate(&current.principal, &dashboard_type) {
        let destination = server
            .router
            .resolve_destination(&current.principal, server.identity.as_ref())
            .await
            .ok()
            .map(|d| d.path);
        return Ok(Json(api_success(ValidationData {
            dashboard: dashboard_type,
            allowed: false,
            reason: Some(reason.to_string()),
            destination,
        })));
    }

    let outcome = server
        .router
        .guard_cross_access(&current.principal, &dashboard_type, server.identity.as_ref())
        .await
        .map_err(|e| ApiError::service(e.to_string()))?;

    Ok(Json(api_success(match outcome {
        CrossAccessOutcome::Granted => ValidationData {
            dashboard: dashboard_type,
            allowed: true,
            reason: None,
            destination: None,
        },
        CrossAccessOutcome::Redirect {
            destination,
            reason,
        } => ValidationData {
            dashboard: dashboard_type,
            allowed: false,
            reason: Some(reason),
            destination: Some(destination.path),
        },
    })))
}

#[derive(Debug, Serialize)]
pub struct RoutesData {
    /// The principal's home landing path.
    pub destination: String,
    /// Every dashboard prefix the principal may enter.
    pub accessible: Vec<String>,
}

/// GET /routes
pub async fn routes(
    State(server): State<GatewayServer>,
    Extension(current): Extension<CurrentPrincipal>,
) -> Result<Json<ApiResponse<RoutesData>>, ApiError> {
    let destination = server
        .router
        .resolve_destination(&current.principal, server.identity.as_ref())
        .await
        .map_err(|e| ApiError::service(e.to_string()))?;

    let mut accessible = Vec::new();
    for prefix in server.policy.known_prefixes() {
        if server.policy.evaluate(&current.principal, prefix).is_err() {
            continue;
        }
        let outcome = server
            .router
            .guard_cross_access(&current.principal, prefix, server.identity.as_ref())
            .await
            .map_err(|e| ApiError::service(e.to_string()))?;
        if matches!(outcome, CrossAccessOutcome::Granted) {
            accessible.push(prefix.to_string());
        }
    }

    Ok(Json(api_success(RoutesData {
        destination: destination.path,
        accessible,
    })))
}

#[derive(Debug, Serialize)]
pub struct DashboardData {
    pub dashboard: String,
    pub principal: PrincipalSummary,
}

/// GET /:dashboard/dashboard, the landing endpoint of each protected area.
/// The guard has already authenticated, authorized, and routed by the time
/// this runs.
pub async fn dashboard_entry(
    Extension(current): Extension<CurrentPrincipal>,
    Path(dashboard): Path<String>,
) -> Json<ApiResponse<DashboardData>> {
    Json(api_success(DashboardData {
        dashboard,
        principal: PrincipalSummary::from(&current.principal),
    }))
}
