//! Principal model and identity-store contract for Tradegate
//!
//! This crate defines the identities the gateway authenticates and the
//! contract it expects from an external identity store:
//! - `Principal` and its classification (type, role, organization, status)
//! - The `IdentityResolver` capability used for lookups and credential checks
//! - The server-side `LegacySessionStore` kept for backward-compatible call sites
//! - An in-memory, argon2-backed store for development and tests
//!
//! Credential storage schema and password policy live with the real identity
//! store; only the contract is defined here.

pub mod error;
pub mod models;
pub mod resolver;
pub mod session;
pub mod store;

pub use error::*;
pub use models::*;
pub use resolver::IdentityResolver;
pub use session::{LegacySession, LegacySessionStore};
pub use store::InMemoryIdentityStore;
