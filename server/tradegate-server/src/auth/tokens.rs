//! Credential issuance, verification, and rotation
//!
//! Signed HS256 pairs: a short-lived access credential carrying a snapshot
//! of the principal, and a longer-lived single-use refresh credential.
//! Rotation preserves the session id; the consumed refresh credential lands
//! on the revocation list inside a single critical section, which is what
//! bounds a refresh-token value to at most one successful use.

use crate::auth::revocation::RevocationStore;
use crate::config::GatewayConfig;
use anyhow::{Context, Result};
use auth_identity::{IdentityResolver, OrganizationType, Principal, PrincipalStatus, PrincipalType};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

const TOKEN_USE_ACCESS: &str = "access";
const TOKEN_USE_REFRESH: &str = "refresh";

/// Claims of an access credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (principal id)
    pub sub: String,
    /// Unique token identifier
    pub jti: String,
    /// Session id shared by the credential pair
    pub sid: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub token_use: String,
    pub principal_type: PrincipalType,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_type: Option<OrganizationType>,
    pub permissions: Vec<String>,
}

impl AccessClaims {
    pub fn principal_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub).context("Invalid principal id in token")
    }

    pub fn session_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sid).context("Invalid session id in token")
    }

    /// Reconstruct the principal snapshot the claims were minted from.
    ///
    /// Status is not encoded in claims; it is re-checked against the
    /// identity store on every authentication, so the snapshot carries
    /// `Active` as a placeholder only.
    pub fn snapshot(&self) -> Result<Principal> {
        Ok(Principal {
            id: self.principal_id()?,
            principal_type: self.principal_type,
            role: self.role.clone(),
            organization_type: self.organization_type,
            permissions: self.permissions.clone(),
            status: PrincipalStatus::Active,
        })
    }
}

/// Claims of a refresh credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub jti: String,
    pub sid: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub token_use: String,
    pub principal_type: PrincipalType,
}

/// Minimal claim view used when revoking a token of either kind.
#[derive(Debug, Deserialize)]
struct RevocableClaims {
    exp: i64,
}

/// A freshly issued credential pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
    pub session_id: Uuid,
    pub access_expires_at: i64,
    pub refresh_expires_at: i64,
}

/// Result of access-credential verification.
///
/// Tampering and revocation are `Invalid` and never refreshable; pure
/// expiry is reported separately because a valid refresh credential may
/// still heal it.
#[derive(Debug)]
pub enum AccessVerification {
    Valid(Box<AccessClaims>),
    Expired,
    Invalid,
}

#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("invalid refresh credential")]
    Invalid,

    #[error("refresh credential already used")]
    Consumed,

    #[error("principal missing or inactive")]
    IdentityRejected,

    #[error("identity store unavailable: {0}")]
    Store(String),
}

/// Issues, verifies, refreshes, and revokes credential pairs.
pub struct TokenService {
    config: Arc<GatewayConfig>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    revocations: Arc<dyn RevocationStore>,
}

impl TokenService {
    pub fn new(config: Arc<GatewayConfig>, revocations: Arc<dyn RevocationStore>) -> Self {
        let encoding_key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        Self {
            config,
            encoding_key,
            decoding_key,
            revocations,
        }
    }

    /// Issue a fresh pair under a new session id.
    pub fn issue_pair(&self, principal: &Principal) -> Result<TokenPair> {
        self.issue_pair_for_session(principal, Uuid::new_v4())
    }

    /// Issue a pair bound to an existing session id (rotation).
    pub fn issue_pair_for_session(&self, principal: &Principal, session_id: Uuid) -> Result<TokenPair> {
        let now = Utc::now().timestamp();
        let access_expires_at = now + self.config.access_token_ttl_secs;
        let refresh_expires_at = now + self.config.refresh_token_ttl_secs;

        let access_claims = AccessClaims {
            sub: principal.id.to_string(),
            jti: Uuid::new_v4().to_string(),
            sid: session_id.to_string(),
            iat: now,
            exp: access_expires_at,
            iss: self.config.issuer.clone(),
            token_use: TOKEN_USE_ACCESS.to_string(),
            principal_type: principal.principal_type,
            role: principal.role.clone(),
            organization_type: principal.organization_type,
            permissions: principal.permissions.clone(),
        };

        let refresh_claims = RefreshClaims {
            sub: principal.id.to_string(),
            jti: Uuid::new_v4().to_string(),
            sid: session_id.to_string(),
            iat: now,
            exp: refresh_expires_at,
            iss: self.config.issuer.clone(),
            token_use: TOKEN_USE_REFRESH.to_string(),
            principal_type: principal.principal_type,
        };

        let header = Header::new(Algorithm::HS256);
        let access = encode(&header, &access_claims, &self.encoding_key)
            .context("Failed to encode access credential")?;
        let refresh = encode(&header, &refresh_claims, &self.encoding_key)
            .context("Failed to encode refresh credential")?;

        Ok(TokenPair {
            access,
            refresh,
            session_id,
            access_expires_at,
            refresh_expires_at,
        })
    }

    /// Verify an access credential, distinguishing expiry from tampering
    /// and revocation.
    pub async fn verify_access(&self, token: &str) -> AccessVerification {
        let claims = match decode::<AccessClaims>(token, &self.decoding_key, &self.validation()) {
            Ok(data) => data.claims,
            Err(err) => {
                return match err.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => AccessVerification::Expired,
                    _ => AccessVerification::Invalid,
                };
            }
        };

        if claims.token_use != TOKEN_USE_ACCESS {
            return AccessVerification::Invalid;
        }

        if self.revocations.is_revoked(&Self::digest(token)).await {
            return AccessVerification::Invalid;
        }

        AccessVerification::Valid(Box::new(claims))
    }

    /// Rotate a refresh credential into a new pair.
    ///
    /// The consumed token is marked revoked before the identity lookup; a
    /// lookup failure after that point burns the token, which is the safe
    /// direction (the caller clears all credentials anyway).
    pub async fn refresh(
        &self,
        refresh_token: &str,
        resolver: &dyn IdentityResolver,
    ) -> std::result::Result<(TokenPair, Principal), RefreshError> {
        let claims =
            match decode::<RefreshClaims>(refresh_token, &self.decoding_key, &self.validation()) {
                Ok(data) => data.claims,
                Err(_) => return Err(RefreshError::Invalid),
            };

        if claims.token_use != TOKEN_USE_REFRESH {
            return Err(RefreshError::Invalid);
        }

        let principal_id = Uuid::parse_str(&claims.sub).map_err(|_| RefreshError::Invalid)?;
        let session_id = Uuid::parse_str(&claims.sid).map_err(|_| RefreshError::Invalid)?;

        if !self
            .revocations
            .consume(&Self::digest(refresh_token), claims.exp)
            .await
        {
            tracing::warn!(
                principal_id = %principal_id,
                session_id = %session_id,
                "refresh credential reuse detected"
            );
            return Err(RefreshError::Consumed);
        }

        let principal = resolver
            .lookup(principal_id, claims.principal_type)
            .await
            .map_err(|e| RefreshError::Store(e.to_string()))?
            .ok_or(RefreshError::IdentityRejected)?;

        if !principal.is_active() {
            return Err(RefreshError::IdentityRejected);
        }

        let pair = self
            .issue_pair_for_session(&principal, session_id)
            .map_err(|e| RefreshError::Store(e.to_string()))?;

        Ok((pair, principal))
    }

    /// Revoke a credential of either kind.
    ///
    /// Decodes with expiry validation disabled so an expired-but-signed
    /// token can still be listed until its own expiry passes out of the
    /// sweep horizon. Tampered tokens fail signature validation and there
    /// is nothing to revoke.
    pub async fn revoke(&self, token: &str) {
        let mut validation = self.validation();
        validation.validate_exp = false;

        match decode::<RevocableClaims>(token, &self.decoding_key, &validation) {
            Ok(data) => {
                self.revocations
                    .revoke(&Self::digest(token), data.claims.exp)
                    .await;
            }
            Err(_) => {
                tracing::debug!("ignoring revocation of unverifiable credential");
            }
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation
    }

    /// Digest used as the credential's revocation identifier; raw token
    /// material never sits in the revocation map.
    fn digest(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        BASE64.encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::revocation::InMemoryRevocationStore;
    use auth_identity::InMemoryIdentityStore;

    fn config() -> Arc<GatewayConfig> {
        Arc::new(GatewayConfig {
            jwt_secret: "test-secret".to_string(),
            ..GatewayConfig::default()
        })
    }

    fn service() -> TokenService {
        TokenService::new(config(), Arc::new(InMemoryRevocationStore::new()))
    }

    fn principal() -> Principal {
        Principal {
            id: Uuid::new_v4(),
            principal_type: PrincipalType::OrgUser,
            role: "company_admin".to_string(),
            organization_type: Some(OrganizationType::Manufacturer),
            permissions: vec!["orders.read".to_string()],
            status: PrincipalStatus::Active,
        }
    }

    #[tokio::test]
    async fn issue_then_verify_round_trips_core_claims() {
        let service = service();
        let p = principal();
        let pair = service.issue_pair(&p).unwrap();

        let claims = match service.verify_access(&pair.access).await {
            AccessVerification::Valid(claims) => claims,
            other => panic!("expected valid access credential, got {other:?}"),
        };

        assert_eq!(claims.principal_id().unwrap(), p.id);
        assert_eq!(claims.principal_type, p.principal_type);
        assert_eq!(claims.role, p.role);
        assert_eq!(claims.organization_type, p.organization_type);
        assert_eq!(claims.permissions, p.permissions);
        assert_eq!(claims.session_id().unwrap(), pair.session_id);
    }

    #[tokio::test]
    async fn tampered_token_is_invalid_not_expired() {
        let service = service();
        let pair = service.issue_pair(&principal()).unwrap();

        let mut tampered = pair.access.clone();
        tampered.push('x');
        assert!(matches!(
            service.verify_access(&tampered).await,
            AccessVerification::Invalid
        ));
    }

    #[tokio::test]
    async fn revoked_access_fails_before_expiry() {
        let service = service();
        let pair = service.issue_pair(&principal()).unwrap();

        service.revoke(&pair.access).await;
        assert!(matches!(
            service.verify_access(&pair.access).await,
            AccessVerification::Invalid
        ));
    }

    #[tokio::test]
    async fn refresh_preserves_session_id_and_rotates() {
        let service = service();
        let store = InMemoryIdentityStore::new();
        let p = principal();
        store.seed(p.clone(), "a@b.com", "validpass").await.unwrap();

        let pair = service.issue_pair(&p).unwrap();
        let (new_pair, refreshed) = service.refresh(&pair.refresh, &store).await.unwrap();

        assert_eq!(new_pair.session_id, pair.session_id);
        assert_eq!(refreshed.id, p.id);
        assert_ne!(new_pair.refresh, pair.refresh);

        // The consumed refresh credential is gone for good.
        assert!(matches!(
            service.refresh(&pair.refresh, &store).await,
            Err(RefreshError::Consumed)
        ));
    }

    #[tokio::test]
    async fn concurrent_refreshes_have_exactly_one_winner() {
        let service = Arc::new(service());
        let store = Arc::new(InMemoryIdentityStore::new());
        let p = principal();
        store.seed(p.clone(), "a@b.com", "validpass").await.unwrap();

        let pair = service.issue_pair(&p).unwrap();

        let a = tokio::spawn({
            let service = service.clone();
            let store = store.clone();
            let token = pair.refresh.clone();
            async move { service.refresh(&token, store.as_ref()).await.is_ok() }
        });
        let b = tokio::spawn({
            let service = service.clone();
            let store = store.clone();
            let token = pair.refresh.clone();
            async move { service.refresh(&token, store.as_ref()).await.is_ok() }
        });

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert!(a ^ b, "exactly one refresh must succeed");
    }

    #[tokio::test]
    async fn refresh_rejects_inactive_principal() {
        let service = service();
        let store = InMemoryIdentityStore::new();
        let p = principal();
        store.seed(p.clone(), "a@b.com", "validpass").await.unwrap();

        let pair = service.issue_pair(&p).unwrap();
        store
            .set_status(p.id, PrincipalStatus::Suspended)
            .await
            .unwrap();

        assert!(matches!(
            service.refresh(&pair.refresh, &store).await,
            Err(RefreshError::IdentityRejected)
        ));
    }

    #[tokio::test]
    async fn access_token_is_not_accepted_as_refresh() {
        let service = service();
        let store = InMemoryIdentityStore::new();
        let pair = service.issue_pair(&principal()).unwrap();

        assert!(matches!(
            service.refresh(&pair.access, &store).await,
            Err(RefreshError::Invalid)
        ));
    }

    #[tokio::test]
    async fn expired_access_is_reported_as_expired() {
        let config = Arc::new(GatewayConfig {
            jwt_secret: "test-secret".to_string(),
            access_token_ttl_secs: -120,
            ..GatewayConfig::default()
        });
        let service = TokenService::new(config, Arc::new(InMemoryRevocationStore::new()));

        let pair = service.issue_pair(&principal()).unwrap();
        assert!(matches!(
            service.verify_access(&pair.access).await,
            AccessVerification::Expired
        ));
    }
}
