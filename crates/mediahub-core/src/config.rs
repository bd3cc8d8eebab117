//! MediaHub Configuration Management
//!
//! Handles configuration from environment variables and TOML files
//! with sensible defaults for development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Database connection
    pub database: DatabaseConfig,

    /// Token signing and session settings
    pub auth: AuthConfig,

    /// Media storage
    pub media: MediaConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_env()?;
        Ok(self)
    }

    /// Upper bound on either token lifetime (ten years)
    pub const MAX_TOKEN_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

    /// Reject configurations the token layer cannot run safely with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.access_token_secret.is_empty() {
            return Err(ConfigError::MissingRequired("ACCESS_TOKEN_SECRET".to_string()));
        }
        if self.auth.refresh_token_secret.is_empty() {
            return Err(ConfigError::MissingRequired("REFRESH_TOKEN_SECRET".to_string()));
        }
        if self.auth.access_token_secret == self.auth.refresh_token_secret {
            return Err(ConfigError::InvalidValue {
                key: "REFRESH_TOKEN_SECRET".to_string(),
                value: "<must differ from ACCESS_TOKEN_SECRET>".to_string(),
            });
        }
        if self.auth.access_token_ttl_secs == 0 || self.auth.refresh_token_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "token expiry".to_string(),
                value: "0".to_string(),
            });
        }
        for (key, ttl) in [
            ("ACCESS_TOKEN_EXPIRY_SECS", self.auth.access_token_ttl_secs),
            ("REFRESH_TOKEN_EXPIRY_SECS", self.auth.refresh_token_ttl_secs),
        ] {
            if ttl > Self::MAX_TOKEN_TTL_SECS {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: ttl.to_string(),
                });
            }
        }
        Ok(())
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        // Server
        if let Ok(host) = std::env::var("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = parse_env("API_PORT")? {
            self.server.port = port;
        }
        // CORS origins from environment variable (comma-separated)
        if let Ok(origins) = std::env::var("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // PostgreSQL
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.postgres_url = Some(url).filter(|u| !u.is_empty());
        }

        // Tokens
        if let Ok(secret) = std::env::var("ACCESS_TOKEN_SECRET") {
            self.auth.access_token_secret = secret;
        }
        if let Ok(secret) = std::env::var("REFRESH_TOKEN_SECRET") {
            self.auth.refresh_token_secret = secret;
        }
        if let Some(ttl) = parse_env("ACCESS_TOKEN_EXPIRY_SECS")? {
            self.auth.access_token_ttl_secs = ttl;
        }
        if let Some(ttl) = parse_env("REFRESH_TOKEN_EXPIRY_SECS")? {
            self.auth.refresh_token_ttl_secs = ttl;
        }
        if let Ok(issuer) = std::env::var("JWT_ISSUER") {
            self.auth.issuer = issuer;
        }
        if let Some(secure) = parse_env("SECURE_COOKIES")? {
            self.auth.secure_cookies = secure;
        }

        // Media
        if let Ok(dir) = std::env::var("MEDIA_UPLOAD_DIR") {
            self.media.upload_dir = PathBuf::from(dir);
        }
        if let Ok(url) = std::env::var("MEDIA_PUBLIC_BASE_URL") {
            self.media.public_base_url = url;
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = parse_env("LOG_JSON")? {
            self.logging.json_format = json;
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Maximum request body size in bytes (multipart uploads included)
    pub max_body_size: usize,

    /// Allowed origins for credentialed CORS requests
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_body_size: 16 * 1024 * 1024, // 16MB
            // Empty by default for security - set via CORS_ORIGINS env var
            cors_origins: vec![],
        }
    }
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL. `None` selects the in-memory credential store.
    pub postgres_url: Option<String>,

    /// PostgreSQL connection pool size
    pub postgres_pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            postgres_url: None,
            postgres_pool_size: 10,
        }
    }
}

/// Token and session configuration
///
/// Access and refresh tokens are signed with separate secrets so that one
/// can never be verified as the other.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for access tokens
    pub access_token_secret: String,

    /// HMAC secret for refresh tokens
    pub refresh_token_secret: String,

    /// Access token lifetime in seconds (default: 15 minutes)
    pub access_token_ttl_secs: u64,

    /// Refresh token lifetime in seconds (default: 10 days)
    pub refresh_token_ttl_secs: u64,

    /// Token issuer identifier
    pub issuer: String,

    /// Mark session cookies `Secure`
    pub secure_cookies: bool,

    /// Argon2 memory cost in KiB
    pub password_memory_cost_kib: u32,

    /// Argon2 iterations
    pub password_time_cost: u32,

    /// Argon2 lanes
    pub password_parallelism: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token_secret: "development-access-secret-change-in-production".to_string(),
            refresh_token_secret: "development-refresh-secret-change-in-production".to_string(),
            access_token_ttl_secs: 15 * 60,
            refresh_token_ttl_secs: 10 * 24 * 60 * 60,
            issuer: "mediahub".to_string(),
            secure_cookies: true,
            password_memory_cost_kib: 65536, // 64 MB
            password_time_cost: 3,
            password_parallelism: 4,
        }
    }
}

/// Media storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Directory uploaded assets are moved into
    pub upload_dir: PathBuf,

    /// Directory multipart uploads are staged in before handing them to the store
    pub staging_dir: PathBuf,

    /// Public URL prefix under which `upload_dir` is served
    pub public_base_url: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("./public/media"),
            staging_dir: PathBuf::from("./public/temp"),
            public_base_url: "http://localhost:8000/media".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
