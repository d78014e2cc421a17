/// Errors surfaced by account and audit operations
///
/// Every operation of [`crate::accounts::AccountService`] returns
/// [`AccountResult`]. The HTTP layer maps each variant to a status code:
///
/// | Variant           | Status |
/// |-------------------|--------|
/// | `NotFound`        | 404    |
/// | `Validation`      | 400    |
/// | `Conflict`        | 409    |
/// | `Unauthenticated` | 401    |
/// | `Internal`        | 500    |
///
/// Audit append failures never appear here; they are logged and dropped.

use std::fmt;

use crate::auth::password::PasswordError;
use crate::store::StoreError;

/// Result alias for account operations
pub type AccountResult<T> = Result<T, AccountError>;

/// Unique field that caused a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictField {
    Username,
    Email,
}

impl ConflictField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictField::Username => "username",
            ConflictField::Email => "email",
        }
    }
}

impl fmt::Display for ConflictField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error kinds for account operations
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    /// Target user does not exist
    #[error("user not found")]
    NotFound,

    /// Malformed input, policy violation, or an invariant that would break
    #[error("{0}")]
    Validation(String),

    /// Username or email already taken
    #[error("{0} already exists")]
    Conflict(ConflictField),

    /// Wrong credentials or inactive account (login only)
    #[error("invalid username or password")]
    Unauthenticated,

    /// Store or hashing failure not attributable to the caller
    #[error("internal error: {0}")]
    Internal(String),
}

impl AccountError {
    pub fn validation(message: impl Into<String>) -> Self {
        AccountError::Validation(message.into())
    }
}

impl From<StoreError> for AccountError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(field) => AccountError::Conflict(field),
            other => AccountError::Internal(other.to_string()),
        }
    }
}

impl From<PasswordError> for AccountError {
    fn from(err: PasswordError) -> Self {
        AccountError::Internal(err.to_string())
    }
}
