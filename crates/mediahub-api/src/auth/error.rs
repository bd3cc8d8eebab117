//! Authentication error kinds
//!
//! Every failure in the auth core is one of these. They are mapped to HTTP
//! status codes in exactly one place, `From<AuthError> for AppError`.

use super::jwt::JwtError;
use super::password::PasswordError;
use super::rotation::RotationFailure;
use super::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing or malformed input
    #[error("{0}")]
    Validation(String),

    /// Unknown identity or wrong password; deliberately indistinguishable
    #[error("Invalid user credentials")]
    InvalidCredentials,

    #[error("Unauthorized request")]
    MissingToken,

    /// Bad signature, wrong purpose, malformed, or expired
    #[error("Invalid token: {0}")]
    InvalidToken(JwtError),

    /// Validly signed refresh token that is no longer the stored session
    #[error("Refresh token is expired or used")]
    SessionMismatch,

    #[error("{0} already exists")]
    Conflict(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Failed to sign token: {0}")]
    Signing(JwtError),

    #[error("Password hashing failed: {0}")]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Store(StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(field) => AuthError::Conflict(field),
            StoreError::UserNotFound => AuthError::UserNotFound,
            other => AuthError::Store(other),
        }
    }
}

impl From<RotationFailure> for AuthError {
    fn from(failure: RotationFailure) -> Self {
        match failure {
            RotationFailure::SignatureInvalid => AuthError::InvalidToken(JwtError::InvalidSignature),
            RotationFailure::Expired => AuthError::InvalidToken(JwtError::ExpiredToken),
            RotationFailure::StoreMismatch => AuthError::SessionMismatch,
        }
    }
}

impl AuthError {
    /// Whether this is an authentication failure (as opposed to bad input or a server fault)
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidCredentials
                | AuthError::MissingToken
                | AuthError::InvalidToken(_)
                | AuthError::SessionMismatch
        )
    }
}
