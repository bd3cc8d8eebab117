//! Refresh token rotation
//!
//! A refresh attempt moves through
//! `Presented -> SignatureValid -> StoreMatched -> Rotated`. It can exit
//! early in `SignatureInvalid`, `Expired` or `StoreMismatch`, and all three
//! are reported to the client as unauthorized.
//!
//! A valid signature is not enough. The presented token must also be the
//! session currently recorded for its subject, and the replacement is written
//! with a compare-and-swap against that same value. A rotated-out, logged-out
//! or concurrently consumed token therefore fails even while its signature
//! and expiry still check out.

use super::error::AuthError;
use super::issuer::{session_digest, SessionWrite, TokenIssuer, TokenPair};
use super::jwt::{validate_token, JwtError, TokenPurpose};
use super::models::User;
use super::store::CredentialStore;
use std::sync::Arc;
use uuid::Uuid;

/// Terminal failure states of a refresh attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationFailure {
    /// Malformed, wrongly signed, or not a refresh token
    SignatureInvalid,
    Expired,
    /// Signature fine, but not the stored session (rotated, revoked, or lost a race)
    StoreMismatch,
}

impl RotationFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            RotationFailure::SignatureInvalid => "signature_invalid",
            RotationFailure::Expired => "expired",
            RotationFailure::StoreMismatch => "store_mismatch",
        }
    }
}

/// Progress of one refresh attempt
#[derive(Debug)]
pub enum RotationState {
    Presented { token: String },
    SignatureValid { user_id: Uuid, digest: String },
    StoreMatched { user: User, digest: String },
    Rotated { user: User, pair: TokenPair },
    Failed(RotationFailure),
}

impl RotationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RotationState::Rotated { .. } | RotationState::Failed(_))
    }
}

/// Drives a presented refresh token through the rotation states
pub struct Rotation {
    issuer: TokenIssuer,
    store: Arc<dyn CredentialStore>,
}

impl Rotation {
    pub fn new(issuer: TokenIssuer, store: Arc<dyn CredentialStore>) -> Self {
        Self { issuer, store }
    }

    /// Run a refresh attempt to completion
    ///
    /// Returns the identity and its new pair, or the error for the failure
    /// state reached. Store faults surface as themselves, not as failures.
    pub async fn run(&self, token: &str) -> Result<(User, TokenPair), AuthError> {
        let mut state = RotationState::Presented {
            token: token.to_string(),
        };

        while !state.is_terminal() {
            state = self.step(state).await?;
        }

        match state {
            RotationState::Rotated { user, pair } => {
                tracing::info!(user_id = %user.id, "Session rotated");
                Ok((user, pair))
            }
            RotationState::Failed(failure) => {
                tracing::warn!(failure = failure.as_str(), "Refresh token rejected");
                Err(failure.into())
            }
            _ => Err(AuthError::Internal(
                "rotation stopped in a non-terminal state".to_string(),
            )),
        }
    }

    /// Advance one transition
    pub async fn step(&self, state: RotationState) -> Result<RotationState, AuthError> {
        match state {
            RotationState::Presented { token } => Ok(self.check_signature(&token)),
            RotationState::SignatureValid { user_id, digest } => {
                self.match_store(user_id, digest).await
            }
            RotationState::StoreMatched { user, digest } => {
                match self
                    .issuer
                    .issue_pair(user.id, SessionWrite::ReplaceIfCurrent(&digest))
                    .await
                {
                    Ok(pair) => Ok(RotationState::Rotated { user, pair }),
                    Err(AuthError::SessionMismatch) => {
                        tracing::debug!(user_id = %user.id, "Lost rotation race");
                        Ok(RotationState::Failed(RotationFailure::StoreMismatch))
                    }
                    Err(e) => Err(e),
                }
            }
            terminal => Ok(terminal),
        }
    }

    fn check_signature(&self, token: &str) -> RotationState {
        let claims = match validate_token(self.issuer.jwt_config(), TokenPurpose::Refresh, token) {
            Ok(claims) => claims,
            Err(JwtError::ExpiredToken) => return RotationState::Failed(RotationFailure::Expired),
            Err(_) => return RotationState::Failed(RotationFailure::SignatureInvalid),
        };

        match claims.subject_id() {
            Ok(user_id) => RotationState::SignatureValid {
                user_id,
                digest: session_digest(token),
            },
            Err(_) => RotationState::Failed(RotationFailure::SignatureInvalid),
        }
    }

    async fn match_store(&self, user_id: Uuid, digest: String) -> Result<RotationState, AuthError> {
        let user = match self.store.find_by_id(user_id).await? {
            Some(user) => user,
            None => return Ok(RotationState::Failed(RotationFailure::StoreMismatch)),
        };

        if user.session_digest.as_deref() != Some(digest.as_str()) {
            return Ok(RotationState::Failed(RotationFailure::StoreMismatch));
        }

        Ok(RotationState::StoreMatched { user, digest })
    }
}
