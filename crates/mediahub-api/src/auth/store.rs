//! Credential store
//!
//! Persistence for identity records behind the [`CredentialStore`] trait:
//! - Identity creation with username/email uniqueness
//! - Lookup by id, or by username-or-email
//! - The session field, written either unconditionally or with an atomic
//!   compare-and-swap against the value the caller last validated
//!
//! The session field is the only server-side session state. Every write to
//! it goes through a single statement (or a single lock acquisition), so two
//! requests racing to rotate the same session cannot both win.

use super::models::{normalize_identifier, NewUser, ProfileUpdate, User};
use super::password::{verify_password, PasswordError};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("User not found")]
    UserNotFound,

    /// A uniqueness constraint would be violated; carries the field name
    #[error("{0} already exists")]
    Conflict(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                let field = match db.constraint() {
                    Some(c) if c.contains("email") => "email",
                    Some(c) if c.contains("username") => "username",
                    _ => "user",
                };
                return StoreError::Conflict(field.to_string());
            }
        }
        StoreError::DatabaseError(err.to_string())
    }
}

/// Persistence interface for identity records
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Create a user. Fails with `Conflict` if the username or email is taken.
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Find a user whose username or email equals the normalized identifier
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, StoreError>;

    /// Unconditionally replace (or clear) the session digest
    async fn set_session(&self, id: Uuid, digest: Option<&str>) -> Result<(), StoreError>;

    /// Replace the session digest only if it still equals `expected`.
    ///
    /// Returns `Ok(false)` when the stored value has moved on, or when the
    /// user does not exist.
    async fn swap_session(
        &self,
        id: Uuid,
        expected: Option<&str>,
        replacement: Option<&str>,
    ) -> Result<bool, StoreError>;

    /// Replace the password hash and clear the session in one write
    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError>;

    /// Apply a profile update. Fails with `Conflict` if the new email is taken.
    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<User, StoreError>;

    /// Backend name for logging and readiness reporting
    fn backend(&self) -> &'static str;

    /// Check a candidate password against the user's stored hash
    fn verify_password(&self, user: &User, candidate: &str) -> Result<bool, PasswordError> {
        verify_password(candidate, &user.password_hash)
    }
}

// ============================================================================
// PostgreSQL
// ============================================================================

const USER_COLUMNS: &str = "id, username, email, full_name, avatar, cover_image, password_hash, session_digest, created_at, updated_at";

/// PostgreSQL-backed credential store
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::DatabaseError(format!("Migration failed: {e}")))
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let record = user.into_user();
        let query = format!(
            r#"
            INSERT INTO users (id, username, email, full_name, avatar, cover_image, password_hash, session_digest, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NULL, $8, $8)
            RETURNING {USER_COLUMNS}
            "#
        );

        let created = sqlx::query_as::<_, User>(&query)
            .bind(record.id)
            .bind(&record.username)
            .bind(&record.email)
            .bind(&record.full_name)
            .bind(&record.avatar)
            .bind(&record.cover_image)
            .bind(&record.password_hash)
            .bind(record.created_at)
            .fetch_one(&self.pool)
            .await?;

        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, StoreError> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1 OR email = $1 ORDER BY created_at, id LIMIT 1"
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(normalize_identifier(identifier))
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn set_session(&self, id: Uuid, digest: Option<&str>) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE users SET session_digest = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(digest)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::UserNotFound);
        }
        Ok(())
    }

    async fn swap_session(
        &self,
        id: Uuid,
        expected: Option<&str>,
        replacement: Option<&str>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE users SET session_digest = $3, updated_at = NOW() WHERE id = $1 AND session_digest IS NOT DISTINCT FROM $2",
        )
        .bind(id)
        .bind(expected)
        .bind(replacement)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, session_digest = NULL, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::UserNotFound);
        }
        Ok(())
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<User, StoreError> {
        if let Some(email) = update.email.as_deref() {
            let taken = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM users WHERE id <> $1 AND (username = $2 OR email = $2))",
            )
            .bind(id)
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
            if taken {
                return Err(StoreError::Conflict("email".to_string()));
            }
        }

        let query = format!(
            r#"
            UPDATE users
            SET full_name = COALESCE($2, full_name),
                email = COALESCE($3, email),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(update.full_name.as_deref())
            .bind(update.email.as_deref())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::UserNotFound)
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// In-memory credential store for development and testing
///
/// All mutations happen under one write lock, which gives `swap_session`
/// the same atomicity as the conditional UPDATE in PostgreSQL.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;

        if users
            .values()
            .any(|u| u.username == user.username || u.email == user.username)
        {
            return Err(StoreError::Conflict("username".to_string()));
        }
        if users
            .values()
            .any(|u| u.email == user.email || u.username == user.email)
        {
            return Err(StoreError::Conflict("email".to_string()));
        }

        let record = user.into_user();
        users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, StoreError> {
        let identifier = normalize_identifier(identifier);
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.username == identifier || u.email == identifier)
            .cloned())
    }

    async fn set_session(&self, id: Uuid, digest: Option<&str>) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(StoreError::UserNotFound)?;
        user.session_digest = digest.map(str::to_string);
        user.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn swap_session(
        &self,
        id: Uuid,
        expected: Option<&str>,
        replacement: Option<&str>,
    ) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        match users.get_mut(&id) {
            Some(user) if user.session_digest.as_deref() == expected => {
                user.session_digest = replacement.map(str::to_string);
                user.updated_at = chrono::Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(StoreError::UserNotFound)?;
        user.password_hash = password_hash.to_string();
        user.session_digest = None;
        user.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<User, StoreError> {
        let mut users = self.users.write().await;

        if let Some(email) = &update.email {
            if users
                .values()
                .any(|u| u.id != id && (&u.email == email || &u.username == email))
            {
                return Err(StoreError::Conflict("email".to_string()));
            }
        }

        let user = users.get_mut(&id).ok_or(StoreError::UserNotFound)?;
        if let Some(full_name) = &update.full_name {
            user.full_name = full_name.clone();
        }
        if let Some(email) = &update.email {
            user.email = email.clone();
        }
        user.updated_at = chrono::Utc::now();
        Ok(user.clone())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::{hash_password, PasswordConfig};
    use std::sync::Arc;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser::new(
            username,
            email,
            "Test User",
            "http://cdn.test/avatar.png".to_string(),
            None,
            "hash".to_string(),
        )
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let store = InMemoryCredentialStore::new();
        let created = store.create(new_user("Alice", "alice@x.com")).await.unwrap();

        let by_id = store.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id.username, "alice");

        let by_username = store.find_by_identifier("ALICE").await.unwrap().unwrap();
        let by_email = store.find_by_identifier(" Alice@X.com ").await.unwrap().unwrap();
        assert_eq!(by_username.id, created.id);
        assert_eq!(by_email.id, created.id);

        assert!(store.find_by_identifier("bob").await.unwrap().is_none());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_username_conflict_is_case_insensitive() {
        let store = InMemoryCredentialStore::new();
        store.create(new_user("alice", "alice@x.com")).await.unwrap();

        let result = store.create(new_user("ALICE", "other@x.com")).await;
        assert!(matches!(result, Err(StoreError::Conflict(field)) if field == "username"));

        let result = store.create(new_user("alice2", "Alice@X.COM")).await;
        assert!(matches!(result, Err(StoreError::Conflict(field)) if field == "email"));

        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_identifiers_unique_across_username_and_email() {
        let store = InMemoryCredentialStore::new();
        store.create(new_user("alice", "alice@x.com")).await.unwrap();
        let bob = store.create(new_user("bob", "bob@x.com")).await.unwrap();

        let result = store.create(new_user("carol", "alice")).await;
        assert!(matches!(result, Err(StoreError::Conflict(field)) if field == "email"));

        let update = ProfileUpdate {
            full_name: None,
            email: Some("alice".to_string()),
        };
        let result = store.update_profile(bob.id, &update).await;
        assert!(matches!(result, Err(StoreError::Conflict(field)) if field == "email"));

        let found = store.find_by_identifier("alice").await.unwrap().unwrap();
        assert_eq!(found.username, "alice");
        let bob = store.find_by_id(bob.id).await.unwrap().unwrap();
        assert_eq!(bob.email, "bob@x.com");
    }

    #[tokio::test]
    async fn test_swap_session_requires_expected_value() {
        let store = InMemoryCredentialStore::new();
        let user = store.create(new_user("alice", "alice@x.com")).await.unwrap();

        // Nothing stored yet: only `None` matches
        assert!(!store.swap_session(user.id, Some("r0"), Some("r1")).await.unwrap());
        assert!(store.swap_session(user.id, None, Some("r0")).await.unwrap());

        assert!(store.swap_session(user.id, Some("r0"), Some("r1")).await.unwrap());
        // Replaying the old expectation loses
        assert!(!store.swap_session(user.id, Some("r0"), Some("r2")).await.unwrap());

        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.session_digest.as_deref(), Some("r1"));

        assert!(!store.swap_session(Uuid::new_v4(), None, Some("x")).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_swaps_single_winner() {
        let store = Arc::new(InMemoryCredentialStore::new());
        let user = store.create(new_user("alice", "alice@x.com")).await.unwrap();
        store.set_session(user.id, Some("r0")).await.unwrap();
        let user_id = user.id;

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let replacement = format!("r1-{i}");
                store
                    .swap_session(user_id, Some("r0"), Some(&replacement))
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_set_session_overwrites_and_clears() {
        let store = InMemoryCredentialStore::new();
        let user = store.create(new_user("alice", "alice@x.com")).await.unwrap();

        store.set_session(user.id, Some("a")).await.unwrap();
        store.set_session(user.id, Some("b")).await.unwrap();
        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.session_digest.as_deref(), Some("b"));

        store.set_session(user.id, None).await.unwrap();
        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert!(!stored.has_session());

        assert!(matches!(
            store.set_session(Uuid::new_v4(), None).await,
            Err(StoreError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn test_update_password_clears_session() {
        let store = InMemoryCredentialStore::new();
        let config = PasswordConfig::minimal();
        let mut input = new_user("alice", "alice@x.com");
        input.password_hash = hash_password("old-secret", &config).unwrap();
        let user = store.create(input).await.unwrap();
        store.set_session(user.id, Some("digest")).await.unwrap();

        let new_hash = hash_password("new-secret", &config).unwrap();
        store.update_password(user.id, &new_hash).await.unwrap();

        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert!(!stored.has_session());
        assert!(store.verify_password(&stored, "new-secret").unwrap());
        assert!(!store.verify_password(&stored, "old-secret").unwrap());
    }

    #[tokio::test]
    async fn test_update_profile() {
        let store = InMemoryCredentialStore::new();
        let alice = store.create(new_user("alice", "alice@x.com")).await.unwrap();
        store.create(new_user("bob", "bob@x.com")).await.unwrap();

        let taken = ProfileUpdate {
            email: Some("bob@x.com".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            store.update_profile(alice.id, &taken).await,
            Err(StoreError::Conflict(_))
        ));

        let update = ProfileUpdate {
            full_name: Some("Alice L.".to_string()),
            email: Some("alice@wonder.land".to_string()),
        };
        let updated = store.update_profile(alice.id, &update).await.unwrap();
        assert_eq!(updated.full_name, "Alice L.");
        assert_eq!(updated.email, "alice@wonder.land");
        assert_eq!(updated.username, "alice");
    }
}
