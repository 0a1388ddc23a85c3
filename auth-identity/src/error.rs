use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Principal not found")]
    PrincipalNotFound,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account disabled")]
    AccountDisabled,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Identity store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Hashing error")]
    HashingError,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, IdentityError>;
