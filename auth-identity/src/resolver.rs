use crate::{error::*, models::*};
use async_trait::async_trait;
use uuid::Uuid;

/// Capability contract the auth core needs from an identity store.
///
/// The gateway never reaches into the store's schema; everything it knows
/// about an identity flows through these two calls. Implementations are
/// expected to be cheap to clone behind an `Arc<dyn IdentityResolver>`.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolve a principal by id within its type namespace.
    ///
    /// Returns `Ok(None)` when no such principal exists. Status is returned
    /// as currently stored, not as of any credential's claims.
    async fn lookup(&self, id: Uuid, principal_type: PrincipalType) -> Result<Option<Principal>>;

    /// Verify a login identifier/secret pair.
    ///
    /// Returns `Ok(None)` for both unknown identifiers and wrong secrets so
    /// callers cannot distinguish the two (no account enumeration).
    async fn verify_credentials(&self, identifier: &str, secret: &str)
        -> Result<Option<Principal>>;
}
