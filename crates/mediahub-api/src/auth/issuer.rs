//! Token issuer
//!
//! Mints an access/refresh pair for an identity and records the refresh
//! token as the identity's one live session. Each call performs exactly one
//! write to the credential store.

use super::error::AuthError;
use super::jwt::{generate_token, JwtConfig, TokenPurpose};
use super::store::CredentialStore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

/// Freshly minted tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// How the new session replaces the stored one
#[derive(Debug, Clone, Copy)]
pub enum SessionWrite<'a> {
    /// Login: whatever was stored is discarded
    Overwrite,
    /// Rotation: succeeds only if the stored digest still equals this value
    ReplaceIfCurrent(&'a str),
}

/// SHA-256 digest of a refresh token, as stored in the session field
pub fn session_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Clone)]
pub struct TokenIssuer {
    jwt: JwtConfig,
    store: Arc<dyn CredentialStore>,
}

impl TokenIssuer {
    pub fn new(jwt: JwtConfig, store: Arc<dyn CredentialStore>) -> Self {
        Self { jwt, store }
    }

    pub fn jwt_config(&self) -> &JwtConfig {
        &self.jwt
    }

    /// Mint a pair for `user_id` and persist the refresh token's digest
    ///
    /// With `SessionWrite::ReplaceIfCurrent`, losing the compare-and-swap
    /// yields `AuthError::SessionMismatch` and the minted pair is discarded.
    pub async fn issue_pair(
        &self,
        user_id: Uuid,
        write: SessionWrite<'_>,
    ) -> Result<TokenPair, AuthError> {
        let access_token =
            generate_token(&self.jwt, TokenPurpose::Access, user_id).map_err(AuthError::Signing)?;
        let refresh_token = generate_token(&self.jwt, TokenPurpose::Refresh, user_id)
            .map_err(AuthError::Signing)?;
        let digest = session_digest(&refresh_token);

        match write {
            SessionWrite::Overwrite => {
                self.store.set_session(user_id, Some(&digest)).await?;
            }
            SessionWrite::ReplaceIfCurrent(expected) => {
                let swapped = self
                    .store
                    .swap_session(user_id, Some(expected), Some(&digest))
                    .await?;
                if !swapped {
                    return Err(AuthError::SessionMismatch);
                }
            }
        }

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }
}
