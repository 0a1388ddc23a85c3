//! Dashboard authorization for Tradegate
//!
//! Pure policy: no IO apart from the injected `IdentityResolver` the router
//! uses to re-fetch a missing organization type. The crate answers two
//! questions:
//! - may this principal enter this dashboard area? (`PolicyEngine`)
//! - where does this principal belong, and is it straying? (`DashboardRouter`)

pub mod engine;
pub mod router;
pub mod rules;

pub use engine::{DenialReason, PolicyEngine};
pub use router::{CrossAccessOutcome, DashboardRouter, Destination, RouterError};
pub use rules::{default_rules, AccessRule, RuleTable};
