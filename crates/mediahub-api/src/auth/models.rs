//! Identity records
//!
//! - User: the stored identity, including credential and session state
//! - NewUser: what the credential store needs to create one
//! - UserPublic: the only projection that ever leaves the server
//!
//! `User` maps to the `users` table (see `migrations/`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Stored identity
///
/// `password_hash` and `session_digest` are never serialized. The session
/// digest is the SHA-256 of the one outstanding refresh token, or `None`
/// when no session is live.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,

    /// Lowercased, unique
    pub username: String,

    /// Lowercased, unique
    pub email: String,

    pub full_name: String,

    /// Avatar URL from the media store
    pub avatar: String,

    /// Cover image URL from the media store (empty when not provided)
    pub cover_image: String,

    /// Argon2id PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Digest of the current refresh token
    #[serde(skip_serializing)]
    pub session_digest: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether a refresh token session is currently live
    pub fn has_session(&self) -> bool {
        self.session_digest.is_some()
    }

    /// Convert user to public representation (without credential fields)
    pub fn to_public(&self) -> UserPublic {
        UserPublic {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            avatar: self.avatar.clone(),
            cover_image: self.cover_image.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Public user representation (safe for API responses)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserPublic {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a user
///
/// `username` and `email` are normalized on construction.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: String,
    pub password_hash: String,
}

impl NewUser {
    pub fn new(
        username: &str,
        email: &str,
        full_name: &str,
        avatar: String,
        cover_image: Option<String>,
        password_hash: String,
    ) -> Self {
        Self {
            username: normalize_identifier(username),
            email: normalize_identifier(email),
            full_name: full_name.trim().to_string(),
            avatar,
            cover_image: cover_image.unwrap_or_default(),
            password_hash,
        }
    }

    /// Materialize into a stored record
    pub fn into_user(self) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            username: self.username,
            email: self.email,
            full_name: self.full_name,
            avatar: self.avatar,
            cover_image: self.cover_image,
            password_hash: self.password_hash,
            session_digest: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Profile fields a user may change about themselves
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    /// Normalized
    pub email: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.email.is_none()
    }
}

/// Case-normalize a username or email for storage and lookup
pub fn normalize_identifier(value: &str) -> String {
    value.trim().to_lowercase()
}
