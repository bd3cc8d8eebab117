//! MediaHub Core - shared configuration, errors, and storage traits
//!
//! This crate defines the abstractions the API server is assembled from:
//! - Common error types
//! - Configuration management
//! - The media store interface and its filesystem implementation

pub mod config;
pub mod media;

pub use config::{
    AppConfig, AuthConfig, ConfigError, DatabaseConfig, LoggingConfig, MediaConfig, ServerConfig,
};
pub use media::{LocalMediaStore, MediaAsset, MediaStore};

use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for MediaHub operations
#[derive(Error, Debug)]
pub enum MediaHubError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Media storage error: {0}")]
    MediaError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MediaHubError>;
