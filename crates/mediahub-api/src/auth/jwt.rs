//! JWT token generation and validation
//!
//! Implements HMAC-SHA256 signed access and refresh tokens. Each purpose has
//! its own secret and lifetime, and the purpose is also embedded in the claims
//! and checked on validation, so an access token is never accepted where a
//! refresh token is expected (and vice versa).

use mediahub_core::AuthConfig;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

/// What a token may be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPurpose {
    Access,
    Refresh,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::Access => "access",
            TokenPurpose::Refresh => "refresh",
        }
    }
}

impl std::fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT Claims structure
///
/// Both token kinds carry the same claim set; only `purpose`, the signing
/// secret and the lifetime differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Token issuer
    pub iss: String,
    /// Subject - user ID
    pub sub: String,
    /// JWT ID - makes every minted token unique, even within one second
    pub jti: String,
    /// Access or refresh
    pub purpose: TokenPurpose,
    /// Issued at timestamp (Unix epoch)
    pub iat: u64,
    /// Expiration timestamp (Unix epoch)
    pub exp: u64,
}

impl Claims {
    /// Parse the subject back into a user ID
    pub fn subject_id(&self) -> Result<Uuid, JwtError> {
        Uuid::parse_str(&self.sub).map_err(|_| JwtError::InvalidToken)
    }
}

/// JWT token generation and validation errors
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode JWT: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid token format")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Expected {expected} token, got {found} token")]
    WrongPurpose {
        expected: TokenPurpose,
        found: TokenPurpose,
    },

    #[error("Token lifetime of {0}s overflows the expiry timestamp")]
    LifetimeOverflow(u64),

    #[error("System time error: {0}")]
    SystemTimeError(#[from] std::time::SystemTimeError),
}

/// Signing configuration with one named key per token purpose
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret for access tokens
    pub access_secret: String,
    /// Secret for refresh tokens
    pub refresh_secret: String,
    /// Access token lifetime in seconds
    pub access_expiration_secs: u64,
    /// Refresh token lifetime in seconds
    pub refresh_expiration_secs: u64,
    /// Token issuer identifier
    pub issuer: String,
}

impl JwtConfig {
    pub fn secret(&self, purpose: TokenPurpose) -> &str {
        match purpose {
            TokenPurpose::Access => &self.access_secret,
            TokenPurpose::Refresh => &self.refresh_secret,
        }
    }

    pub fn expiration_secs(&self, purpose: TokenPurpose) -> u64 {
        match purpose {
            TokenPurpose::Access => self.access_expiration_secs,
            TokenPurpose::Refresh => self.refresh_expiration_secs,
        }
    }
}

impl From<&AuthConfig> for JwtConfig {
    fn from(config: &AuthConfig) -> Self {
        Self {
            access_secret: config.access_token_secret.clone(),
            refresh_secret: config.refresh_token_secret.clone(),
            access_expiration_secs: config.access_token_ttl_secs,
            refresh_expiration_secs: config.refresh_token_ttl_secs,
            issuer: config.issuer.clone(),
        }
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self::from(&AuthConfig::default())
    }
}

// Secrets stay out of logs.
impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .field("access_expiration_secs", &self.access_expiration_secs)
            .field("refresh_expiration_secs", &self.refresh_expiration_secs)
            .field("issuer", &self.issuer)
            .finish()
    }
}

fn now_secs() -> Result<u64, JwtError> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

/// Generate a signed token for a user
///
/// # Arguments
///
/// * `config` - Signing configuration
/// * `purpose` - Selects the secret, the lifetime and the embedded purpose tag
/// * `user_id` - Subject of the token
///
/// # Example
///
/// ```no_run
/// use mediahub_api::auth::jwt::{generate_token, JwtConfig, TokenPurpose};
/// use uuid::Uuid;
///
/// let config = JwtConfig::default();
/// let token = generate_token(&config, TokenPurpose::Access, Uuid::new_v4())
///     .expect("Failed to generate token");
/// ```
pub fn generate_token(
    config: &JwtConfig,
    purpose: TokenPurpose,
    user_id: Uuid,
) -> Result<String, JwtError> {
    let now = now_secs()?;
    let lifetime = config.expiration_secs(purpose);
    let exp = now
        .checked_add(lifetime)
        .ok_or(JwtError::LifetimeOverflow(lifetime))?;

    let claims = Claims {
        iss: config.issuer.clone(),
        sub: user_id.to_string(),
        jti: Uuid::new_v4().to_string(),
        purpose,
        iat: now,
        exp,
    };

    sign_claims(config, &claims)
}

/// Sign an explicit claim set with the secret matching its purpose
pub fn sign_claims(config: &JwtConfig, claims: &Claims) -> Result<String, JwtError> {
    let token = encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(config.secret(claims.purpose).as_bytes()),
    )?;

    Ok(token)
}

/// Validate a token of the expected purpose and extract its claims
///
/// Expiry is checked with zero leeway: a token is rejected as soon as the
/// current time is past `exp`.
pub fn validate_token(
    config: &JwtConfig,
    purpose: TokenPurpose,
    token: &str,
) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);
    validation.set_required_spec_claims(&["exp", "iss", "sub"]);
    validation.leeway = 0;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret(purpose).as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::ExpiredToken,
        jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::InvalidSignature,
        _ => JwtError::InvalidToken,
    })?;

    let claims = token_data.claims;
    if claims.purpose != purpose {
        return Err(JwtError::WrongPurpose {
            expected: purpose,
            found: claims.purpose,
        });
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims_expiring_at(config: &JwtConfig, purpose: TokenPurpose, exp: u64) -> Claims {
        Claims {
            iss: config.issuer.clone(),
            sub: Uuid::new_v4().to_string(),
            jti: Uuid::new_v4().to_string(),
            purpose,
            iat: exp.saturating_sub(60),
            exp,
        }
    }

    #[test]
    fn test_generate_and_validate_token() {
        let config = JwtConfig::default();
        let user_id = Uuid::new_v4();

        let token = generate_token(&config, TokenPurpose::Access, user_id)
            .expect("Failed to generate token");
        let claims = validate_token(&config, TokenPurpose::Access, &token)
            .expect("Failed to validate token");

        assert_eq!(claims.subject_id().unwrap(), user_id);
        assert_eq!(claims.purpose, TokenPurpose::Access);
        assert_eq!(claims.iss, "mediahub");
        assert_eq!(claims.exp - claims.iat, config.access_expiration_secs);
    }

    #[test]
    fn test_tokens_are_unique() {
        let config = JwtConfig::default();
        let user_id = Uuid::new_v4();

        let first = generate_token(&config, TokenPurpose::Refresh, user_id).unwrap();
        let second = generate_token(&config, TokenPurpose::Refresh, user_id).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_invalid_token() {
        let config = JwtConfig::default();
        let result = validate_token(&config, TokenPurpose::Access, "invalid.token.here");
        assert!(matches!(result, Err(JwtError::InvalidToken)));
    }

    #[test]
    fn test_access_token_rejected_as_refresh() {
        let config = JwtConfig::default();
        let token = generate_token(&config, TokenPurpose::Access, Uuid::new_v4()).unwrap();

        // Different secret, so the signature check fails first
        let result = validate_token(&config, TokenPurpose::Refresh, &token);
        assert!(matches!(result, Err(JwtError::InvalidSignature)));
    }

    #[test]
    fn test_purpose_tag_checked_even_with_shared_secret() {
        let config = JwtConfig {
            refresh_secret: "shared".to_string(),
            access_secret: "shared".to_string(),
            ..Default::default()
        };
        let token = generate_token(&config, TokenPurpose::Access, Uuid::new_v4()).unwrap();

        let result = validate_token(&config, TokenPurpose::Refresh, &token);
        assert!(matches!(
            result,
            Err(JwtError::WrongPurpose {
                expected: TokenPurpose::Refresh,
                found: TokenPurpose::Access,
            })
        ));
    }

    #[test]
    fn test_wrong_secret() {
        let config1 = JwtConfig {
            access_secret: "secret1".to_string(),
            ..Default::default()
        };
        let config2 = JwtConfig {
            access_secret: "secret2".to_string(),
            ..Default::default()
        };

        let token = generate_token(&config1, TokenPurpose::Access, Uuid::new_v4()).unwrap();
        let result = validate_token(&config2, TokenPurpose::Access, &token);
        assert!(matches!(result, Err(JwtError::InvalidSignature)));
    }

    #[test]
    fn test_expired_one_second_ago() {
        let config = JwtConfig::default();
        let now = now_secs().unwrap();

        let claims = claims_expiring_at(&config, TokenPurpose::Access, now - 1);
        let token = sign_claims(&config, &claims).unwrap();

        let result = validate_token(&config, TokenPurpose::Access, &token);
        assert!(matches!(result, Err(JwtError::ExpiredToken)));
    }

    #[test]
    fn test_valid_until_expiry() {
        let config = JwtConfig::default();
        let now = now_secs().unwrap();

        let claims = claims_expiring_at(&config, TokenPurpose::Access, now + 2);
        let token = sign_claims(&config, &claims).unwrap();

        assert!(validate_token(&config, TokenPurpose::Access, &token).is_ok());
    }

    #[test]
    fn test_oversized_lifetime_is_an_error() {
        let config = JwtConfig {
            refresh_expiration_secs: u64::MAX,
            ..JwtConfig::default()
        };

        let result = generate_token(&config, TokenPurpose::Refresh, Uuid::new_v4());
        assert!(matches!(result, Err(JwtError::LifetimeOverflow(u64::MAX))));
        assert!(generate_token(&config, TokenPurpose::Access, Uuid::new_v4()).is_ok());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = JwtConfig::default();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains(&config.access_secret));
        assert!(!rendered.contains(&config.refresh_secret));
    }
}
