use auth_identity::{OrganizationType, PrincipalType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Requirements for entering one dashboard area.
///
/// The first two sets define membership; the optional constraints qualify
/// members further. A rule marked `override_eligible` lets the designated
/// override role skip the optional constraints only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRule {
    pub allowed_principal_types: Vec<PrincipalType>,
    pub allowed_roles: Vec<String>,
    pub required_organization_types: Option<Vec<OrganizationType>>,
    pub required_permissions: Option<Vec<String>>,
    pub override_eligible: bool,
}

impl AccessRule {
    pub fn allows_principal_type(&self, ty: PrincipalType) -> bool {
        self.allowed_principal_types.contains(&ty)
    }

    pub fn allows_role(&self, role: &str) -> bool {
        self.allowed_roles.iter().any(|r| r == role)
    }
}

/// Rule table keyed by dashboard prefix (first path segment).
pub type RuleTable = HashMap<String, AccessRule>;

/// Role names that belong to the admin dashboard family.
pub const ADMIN_FAMILY_ROLES: &[&str] = &["super_admin", "admin", "support"];

/// The designated override role. See `PolicyEngine` for its exact scope.
pub const OVERRIDE_ROLE: &str = "super_admin";

/// Built-in rule table for the three stock dashboard areas.
///
/// The org-area rules admit `super_admin` through the membership checks so
/// the override can apply; other admin-family roles stay confined to the
/// admin area.
pub fn default_rules() -> RuleTable {
    let mut rules = RuleTable::new();

    rules.insert(
        "admin".to_string(),
        AccessRule {
            allowed_principal_types: vec![PrincipalType::Admin],
            allowed_roles: ADMIN_FAMILY_ROLES.iter().map(|r| r.to_string()).collect(),
            required_organization_types: None,
            required_permissions: None,
            override_eligible: false,
        },
    );

    rules.insert(
        "manufacturer".to_string(),
        AccessRule {
            allowed_principal_types: vec![PrincipalType::OrgUser, PrincipalType::Admin],
            allowed_roles: vec![
                "company_admin".to_string(),
                "manager".to_string(),
                "staff".to_string(),
                OVERRIDE_ROLE.to_string(),
            ],
            required_organization_types: Some(vec![OrganizationType::Manufacturer]),
            required_permissions: None,
            override_eligible: true,
        },
    );

    rules.insert(
        "distributor".to_string(),
        AccessRule {
            allowed_principal_types: vec![PrincipalType::OrgUser, PrincipalType::Admin],
            allowed_roles: vec![
                "company_admin".to_string(),
                "manager".to_string(),
                "staff".to_string(),
                OVERRIDE_ROLE.to_string(),
            ],
            required_organization_types: Some(vec![OrganizationType::Distributor]),
            required_permissions: None,
            override_eligible: true,
        },
    );

    rules
}
