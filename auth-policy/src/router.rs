use crate::rules::{ADMIN_FAMILY_ROLES, OVERRIDE_ROLE};
use auth_identity::{IdentityError, IdentityResolver, OrganizationType, Principal};
use serde::Serialize;
use thiserror::Error;

/// Where a principal belongs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Destination {
    /// Dashboard prefix, e.g. `manufacturer`
    pub prefix: String,
    /// Landing path within the area, e.g. `/manufacturer/dashboard`
    pub path: String,
}

impl Destination {
    fn area(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            path: format!("/{prefix}/dashboard"),
        }
    }

    /// Fallback when a principal cannot be routed anywhere.
    pub fn routing_error() -> Self {
        Self {
            prefix: String::new(),
            path: "/login?error=routing".to_string(),
        }
    }
}

/// Outcome of a cross-dashboard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrossAccessOutcome {
    Granted,
    /// The principal belongs elsewhere; send it home with a reason.
    Redirect {
        destination: Destination,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum RouterError {
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

/// Resolves the home area for a principal and blocks navigation outside it.
///
/// The router takes the identity store as an `IdentityResolver` capability
/// so the organization-type re-fetch is injectable and the router testable
/// in isolation. A re-fetched organization type is used for the current
/// request only; it can change at any time and is never cached here.
pub struct DashboardRouter {
    override_role: String,
}

impl DashboardRouter {
    pub fn new() -> Self {
        Self {
            override_role: OVERRIDE_ROLE.to_string(),
        }
    }

    pub fn with_override_role(override_role: impl Into<String>) -> Self {
        Self {
            override_role: override_role.into(),
        }
    }

    fn is_admin_family(role: &str) -> bool {
        ADMIN_FAMILY_ROLES.contains(&role)
    }

    fn has_override(&self, principal: &Principal) -> bool {
        principal.role == self.override_role
    }

    /// Resolve the destination area for `principal`.
    ///
    /// Admin-family roles land in the admin area; everyone else is routed by
    /// organization type, re-fetched through `resolver` when the credential
    /// claims omitted it.
    pub async fn resolve_destination(
        &self,
        principal: &Principal,
        resolver: &dyn IdentityResolver,
    ) -> Result<Destination, RouterError> {
        if Self::is_admin_family(&principal.role) {
            return Ok(Destination::area("admin"));
        }

        let organization_type = match principal.organization_type {
            Some(ty) => Some(ty),
            None => self.refetch_organization_type(principal, resolver).await?,
        };

        Ok(match organization_type {
            Some(ty) => Destination::area(ty.as_str()),
            None => {
                tracing::warn!(
                    principal_id = %principal.id,
                    "principal has no organization type; falling back to routing-error destination"
                );
                Destination::routing_error()
            }
        })
    }

    /// Block access to areas other than the principal's own destination.
    pub async fn guard_cross_access(
        &self,
        principal: &Principal,
        requested_prefix: &str,
        resolver: &dyn IdentityResolver,
    ) -> Result<CrossAccessOutcome, RouterError> {
        if self.has_override(principal) {
            return Ok(CrossAccessOutcome::Granted);
        }

        let destination = self.resolve_destination(principal, resolver).await?;
        if destination.prefix == requested_prefix {
            Ok(CrossAccessOutcome::Granted)
        } else {
            Ok(CrossAccessOutcome::Redirect {
                reason: format!(
                    "'{requested_prefix}' is outside your dashboard area"
                ),
                destination,
            })
        }
    }

    async fn refetch_organization_type(
        &self,
        principal: &Principal,
        resolver: &dyn IdentityResolver,
    ) -> Result<Option<OrganizationType>, RouterError> {
        let fresh = resolver
            .lookup(principal.id, principal.principal_type)
            .await?;
        Ok(fresh.and_then(|p| p.organization_type))
    }
}

impl Default for DashboardRouter {
    fn default() -> Self {
        Self::new()
    }
}
