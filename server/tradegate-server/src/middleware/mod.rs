//! Request middleware: rate limiting and the auth guard.

pub mod guard;
pub mod rate_limit;

pub use guard::{auth_guard, AuthFlow, ClientKind, CurrentPrincipal, GuardPipeline, GuardReject, RefreshPolicy, RequestFacts};
pub use rate_limit::{InMemoryWindowStore, RateLimiter, RateScope, WindowStore};
