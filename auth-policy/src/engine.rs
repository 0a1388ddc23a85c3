use crate::rules::{RuleTable, OVERRIDE_ROLE};
use auth_identity::Principal;
use serde::Serialize;
use thiserror::Error;

/// Why an access check was denied.
///
/// Each variant maps to exactly one evaluation step so callers (and logs)
/// can tell which check short-circuited.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum DenialReason {
    #[error("unknown dashboard '{prefix}'")]
    UnknownDashboard { prefix: String },

    #[error("principal type not allowed in this dashboard")]
    PrincipalTypeNotAllowed,

    #[error("role '{role}' not allowed in this dashboard")]
    RoleNotAllowed { role: String },

    #[error("organization type does not match this dashboard")]
    OrganizationTypeMismatch,

    #[error("missing required permission '{permission}'")]
    MissingPermission { permission: String },
}

/// Ordered, short-circuiting evaluation of a principal against a rule table.
///
/// Order is part of the contract: principal type, then role, then
/// organization type (if the rule specifies one), then permissions (AND,
/// if specified). The override role bypasses only the last two steps, and
/// only where the rule opts in.
pub struct PolicyEngine {
    rules: RuleTable,
    override_role: String,
}

impl PolicyEngine {
    pub fn new(rules: RuleTable) -> Self {
        Self {
            rules,
            override_role: OVERRIDE_ROLE.to_string(),
        }
    }

    pub fn with_override_role(rules: RuleTable, override_role: impl Into<String>) -> Self {
        Self {
            rules,
            override_role: override_role.into(),
        }
    }

    /// Dashboard prefixes this engine knows about.
    pub fn known_prefixes(&self) -> Vec<&str> {
        let mut prefixes: Vec<&str> = self.rules.keys().map(|k| k.as_str()).collect();
        prefixes.sort_unstable();
        prefixes
    }

    /// Evaluate `principal` against the rule for `prefix`.
    ///
    /// Unknown prefixes are a hard denial, never a silent allow.
    pub fn evaluate(&self, principal: &Principal, prefix: &str) -> Result<(), DenialReason> {
        let rule = self.rules.get(prefix).ok_or_else(|| DenialReason::UnknownDashboard {
            prefix: prefix.to_string(),
        })?;

        if !rule.allows_principal_type(principal.principal_type) {
            return Err(DenialReason::PrincipalTypeNotAllowed);
        }

        if !rule.allows_role(&principal.role) {
            return Err(DenialReason::RoleNotAllowed {
                role: principal.role.clone(),
            });
        }

        // Membership established; the override may now skip the qualifying
        // constraints where the rule allows it.
        if rule.override_eligible && principal.role == self.override_role {
            return Ok(());
        }

        if let Some(ref required) = rule.required_organization_types {
            match principal.organization_type {
                Some(ty) if required.contains(&ty) => {}
                _ => return Err(DenialReason::OrganizationTypeMismatch),
            }
        }

        if let Some(ref required) = rule.required_permissions {
            for permission in required {
                if !principal.has_permission(permission) {
                    return Err(DenialReason::MissingPermission {
                        permission: permission.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}
