use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Classification of an authenticated identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalType {
    /// Platform staff account
    Admin,
    /// Account belonging to a member organization
    OrgUser,
}

impl PrincipalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalType::Admin => "admin",
            PrincipalType::OrgUser => "org_user",
        }
    }
}

/// Kind of member organization a principal belongs to.
///
/// Each organization type is served by its own dashboard area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationType {
    Manufacturer,
    Distributor,
}

impl OrganizationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrganizationType::Manufacturer => "manufacturer",
            OrganizationType::Distributor => "distributor",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "manufacturer" => Some(OrganizationType::Manufacturer),
            "distributor" => Some(OrganizationType::Distributor),
            _ => None,
        }
    }
}

/// Account lifecycle state as recorded by the identity store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalStatus {
    Active,
    Suspended,
    Deactivated,
}

impl PrincipalStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, PrincipalStatus::Active)
    }
}

/// A fully resolved identity as produced by the identity store.
///
/// The auth core never mutates a `Principal`; status and organization type
/// are re-read from the store whenever freshness matters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub principal_type: PrincipalType,
    /// Role name within the principal's type (e.g. `super_admin`,
    /// `company_admin`, `staff`). Kept as a string so new roles can be
    /// introduced by the identity store without a gateway release.
    pub role: String,
    pub organization_type: Option<OrganizationType>,
    pub permissions: Vec<String>,
    pub status: PrincipalStatus,
}

impl Principal {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn organization_type_parse_round_trip() {
        for ty in [OrganizationType::Manufacturer, OrganizationType::Distributor] {
            assert_eq!(OrganizationType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(OrganizationType::parse("retailer"), None);
    }

    #[test]
    fn status_activity() {
        assert!(PrincipalStatus::Active.is_active());
        assert!(!PrincipalStatus::Suspended.is_active());
        assert!(!PrincipalStatus::Deactivated.is_active());
    }
}
