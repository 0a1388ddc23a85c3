//! Credential lifecycle: issuance, transport, rotation, revocation.

pub mod cookies;
pub mod revocation;
pub mod tokens;

pub use cookies::{append_cookies, clearing_cookies, credential_cookies, ExtractedCredentials};
pub use revocation::{spawn_revocation_sweeper, InMemoryRevocationStore, RevocationStore};
pub use tokens::{AccessClaims, AccessVerification, RefreshError, TokenPair, TokenService};
