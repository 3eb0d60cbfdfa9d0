//! Error types for every layer of the crate.
//!
//! Storage errors are passed through untouched from Sea-ORM inside
//! [`StoreError::Backend`]; the higher layers wrap them rather than
//! reinterpreting them, and nothing in this crate retries.

use sea_orm::DbErr;
use thiserror::Error;

/// Result alias for session store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the session store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database rejected or failed to run a statement.
    #[error("session store backend error: {0}")]
    Backend(#[from] DbErr),

    /// Session values could not be serialized.
    #[error("failed to encode session data: {0}")]
    Encode(String),

    /// A stored payload could not be deserialized.
    #[error("failed to decode session data: {0}")]
    Decode(String),
}

/// Errors raised by [`SessionManager`](crate::SessionManager) bulk operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The subject has no active session to revoke.
    #[error("you are not logged in yet")]
    NotLoggedIn,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors raised by [`CsrfService`](crate::CsrfService).
#[derive(Debug, Error)]
pub enum CsrfError {
    /// CSRF tokens are only handed out to logged-in users.
    #[error("you need to be logged in")]
    LoginRequired,

    /// The token is unknown, expired, or was already consumed.
    #[error("no csrf token was found")]
    NotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors raised by a [`CredentialRepository`](crate::CredentialRepository).
#[derive(Debug, Error)]
pub enum UserError {
    /// Another user already registered this email.
    #[error("email is not available")]
    EmailTaken,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Password hashing failure. Carries the underlying message only.
#[derive(Debug, Error)]
#[error("password hashing failed: {0}")]
pub struct PasswordError(pub String);

/// Coarse classification of [`AuthError`] for a transport layer.
///
/// Authorization failures deliberately share [`ErrorKind::Internal`] with
/// genuine internal failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Unauthorized,
    NotLoggedIn,
    NotFound,
    Internal,
}

/// Errors returned by [`AuthService`](crate::AuthService).
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("email is required")]
    EmailRequired,

    #[error("password must be at least {0} characters")]
    PasswordTooShort(usize),

    #[error("email is not available")]
    EmailNotAvailable,

    /// Credential mismatch or missing authentication. Never says which.
    #[error("unauthorized")]
    Unauthorized,

    #[error("you need to be logged in")]
    LoginRequired,

    #[error("you are not logged in yet")]
    NotLoggedIn,

    #[error("no csrf token was found")]
    CsrfNotFound,

    #[error("internal error")]
    Internal,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    /// Returns the classification a transport maps to a status code.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmailRequired
            | Self::PasswordTooShort(_)
            | Self::EmailNotAvailable
            | Self::LoginRequired => ErrorKind::Validation,
            Self::Unauthorized => ErrorKind::Unauthorized,
            Self::NotLoggedIn => ErrorKind::NotLoggedIn,
            Self::CsrfNotFound => ErrorKind::NotFound,
            Self::Internal | Self::Store(_) => ErrorKind::Internal,
        }
    }
}

impl From<SessionError> for AuthError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotLoggedIn => Self::NotLoggedIn,
            SessionError::Store(e) => Self::Store(e),
        }
    }
}

impl From<CsrfError> for AuthError {
    fn from(err: CsrfError) -> Self {
        match err {
            CsrfError::LoginRequired => Self::LoginRequired,
            CsrfError::NotFound => Self::CsrfNotFound,
            CsrfError::Store(e) => Self::Store(e),
        }
    }
}

impl From<UserError> for AuthError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::EmailTaken => Self::EmailNotAvailable,
            UserError::Store(e) => Self::Store(e),
        }
    }
}
