/// Password hashing and verification using Argon2id
///
/// Hashes are stored in PHC string format, so the salt and cost parameters
/// travel with the hash and verification needs no separate configuration.
/// Verification compares digests in constant time.
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params,
};
use mediahub_core::AuthConfig;
use thiserror::Error;

/// Password hashing and verification errors
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    #[error("Failed to verify password: {0}")]
    VerificationFailed(String),

    #[error("Invalid password hash format")]
    InvalidHashFormat,
}

/// Argon2 cost parameters
#[derive(Debug, Clone)]
pub struct PasswordConfig {
    /// Memory cost in KiB (default: 65536 = 64 MB)
    pub memory_cost: u32,
    /// Time cost (iterations, default: 3)
    pub time_cost: u32,
    /// Parallelism (lanes, default: 4)
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self::from(&AuthConfig::default())
    }
}

impl From<&AuthConfig> for PasswordConfig {
    fn from(config: &AuthConfig) -> Self {
        Self {
            memory_cost: config.password_memory_cost_kib,
            time_cost: config.password_time_cost,
            parallelism: config.password_parallelism,
        }
    }
}

impl PasswordConfig {
    /// Cheapest parameters Argon2 accepts. Only for tests.
    pub fn minimal() -> Self {
        Self {
            memory_cost: Params::MIN_M_COST,
            time_cost: Params::MIN_T_COST,
            parallelism: Params::MIN_P_COST,
        }
    }

    fn to_params(&self) -> Result<Params, PasswordError> {
        Params::new(self.memory_cost, self.time_cost, self.parallelism, Some(32))
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))
    }
}

/// Hash a plaintext password using Argon2id
///
/// # Example
///
/// ```no_run
/// use mediahub_api::auth::password::{hash_password, PasswordConfig};
///
/// let hash = hash_password("secret1", &PasswordConfig::default()).unwrap();
/// assert!(hash.starts_with("$argon2id$"));
/// ```
pub fn hash_password(password: &str, config: &PasswordConfig) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        config.to_params()?,
    );

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

    Ok(password_hash.to_string())
}

/// Verify a plaintext password against a stored hash
///
/// * `Ok(true)` - Password matches
/// * `Ok(false)` - Password does not match
/// * `Err(PasswordError)` - The stored hash is unusable
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHashFormat)?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerificationFailed(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_password() {
        let config = PasswordConfig::minimal();
        let hash = hash_password("secret1", &config).expect("Failed to hash password");

        assert!(verify_password("secret1", &hash).expect("Verification failed"));
        assert!(!verify_password("secret2", &hash).expect("Verification failed"));
    }

    #[test]
    fn test_same_password_produces_different_hashes() {
        let config = PasswordConfig::minimal();

        let hash1 = hash_password("SamePassword", &config).unwrap();
        let hash2 = hash_password("SamePassword", &config).unwrap();

        assert_ne!(hash1, hash2);
        assert!(verify_password("SamePassword", &hash1).unwrap());
        assert!(verify_password("SamePassword", &hash2).unwrap());
    }

    #[test]
    fn test_invalid_hash_format() {
        let result = verify_password("password", "invalid-hash-format");
        assert!(matches!(result, Err(PasswordError::InvalidHashFormat)));
    }

    #[test]
    fn test_parameters_embedded_in_hash() {
        let config = PasswordConfig {
            memory_cost: 4096,
            time_cost: 2,
            parallelism: 1,
        };

        let hash = hash_password("TestPassword", &config).unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("m=4096"));
        assert!(hash.contains("t=2"));
        assert!(hash.contains("p=1"));
        assert!(verify_password("TestPassword", &hash).unwrap());
    }

    #[test]
    fn test_invalid_parameters() {
        let config = PasswordConfig {
            memory_cost: 1,
            time_cost: 0,
            parallelism: 0,
        };
        assert!(matches!(
            hash_password("x", &config),
            Err(PasswordError::HashingFailed(_))
        ));
    }
}
