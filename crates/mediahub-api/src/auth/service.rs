//! Authentication service layer
//!
//! Business logic for registration, login, token refresh, logout, password
//! change and profile management. Persistence goes through the
//! [`CredentialStore`], uploads through the [`MediaStore`].

use super::error::AuthError;
use super::issuer::{SessionWrite, TokenIssuer, TokenPair};
use super::jwt::JwtConfig;
use super::models::{normalize_identifier, NewUser, ProfileUpdate, User, UserPublic};
use super::password::{hash_password, verify_password, PasswordConfig};
use super::rotation::Rotation;
use super::store::CredentialStore;
use mediahub_core::{MediaAsset, MediaStore};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

/// Registration input, with uploaded files already staged on disk
#[derive(Debug, Clone, Default)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub avatar: Option<PathBuf>,
    pub cover_image: Option<PathBuf>,
}

/// User login request
///
/// Either `username` or `email` identifies the account.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub password: String,
}

/// Token refresh request, for clients that do not send cookies
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
}

/// Login result: the public user plus both tokens
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: UserPublic,
    pub access_token: String,
    pub refresh_token: String,
}

/// Authentication service
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    media: Arc<dyn MediaStore>,
    issuer: TokenIssuer,
    rotation: Rotation,
    passwords: PasswordConfig,
    /// Verified against when the identity is unknown, so both login failures cost the same
    dummy_hash: String,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        media: Arc<dyn MediaStore>,
        jwt: JwtConfig,
        passwords: PasswordConfig,
    ) -> Result<Self, AuthError> {
        let dummy_hash = hash_password(&Uuid::new_v4().to_string(), &passwords)?;
        let issuer = TokenIssuer::new(jwt, store.clone());
        let rotation = Rotation::new(issuer.clone(), store.clone());

        Ok(Self {
            store,
            media,
            issuer,
            rotation,
            passwords,
            dummy_hash,
        })
    }

    pub fn jwt_config(&self) -> &JwtConfig {
        self.issuer.jwt_config()
    }

    /// Name of the credential store backend
    pub fn store_backend(&self) -> &'static str {
        self.store.backend()
    }

    pub fn media_backend(&self) -> &str {
        self.media.name()
    }

    /// Register a new user
    ///
    /// Staged files are always consumed: handed to the media store, or
    /// removed when the request is rejected first.
    pub async fn register(&self, input: RegisterInput) -> Result<UserPublic, AuthError> {
        let staged = [input.avatar.clone(), input.cover_image.clone()];

        if let Err(e) = validate_registration(&input) {
            discard_staged(staged.iter().flatten()).await;
            return Err(e);
        }

        for identifier in [&input.username, &input.email] {
            if self.store.find_by_identifier(identifier).await?.is_some() {
                discard_staged(staged.iter().flatten()).await;
                return Err(AuthError::Conflict("User".to_string()));
            }
        }

        let RegisterInput {
            username,
            email,
            full_name,
            password,
            avatar,
            cover_image,
        } = input;

        let Some(avatar_path) = avatar else {
            discard_staged(staged.iter().flatten()).await;
            return Err(AuthError::Validation("Avatar file is required".to_string()));
        };

        let avatar = match self.media.upload(&avatar_path).await {
            Ok(asset) => asset,
            Err(e) => {
                tracing::warn!(error = %e, "Avatar upload failed");
                discard_staged(cover_image.iter()).await;
                return Err(AuthError::Validation("Avatar file is required".to_string()));
            }
        };

        let cover = match cover_image {
            Some(path) => match self.media.upload(&path).await {
                Ok(asset) => Some(asset),
                Err(e) => {
                    tracing::warn!(error = %e, "Cover image upload failed; continuing without it");
                    None
                }
            },
            None => None,
        };

        let created = match self.hash(password).await {
            Ok(password_hash) => {
                let new_user = NewUser::new(
                    &username,
                    &email,
                    &full_name,
                    avatar.url.clone(),
                    cover.as_ref().map(|c| c.url.clone()),
                    password_hash,
                );
                self.store.create(new_user).await.map_err(AuthError::from)
            }
            Err(e) => Err(e),
        };

        match created {
            Ok(user) => {
                tracing::info!(user_id = %user.id, username = %user.username, "User registered");
                Ok(user.to_public())
            }
            Err(e) => {
                self.release_assets(&[Some(avatar), cover]).await;
                Err(e)
            }
        }
    }

    /// Verify credentials and open a new session
    ///
    /// Any previously stored session is replaced. Unknown identities and
    /// wrong passwords fail identically.
    pub async fn login(&self, request: LoginRequest) -> Result<(UserPublic, TokenPair), AuthError> {
        let identifier = request
            .username
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| request.email.as_deref().filter(|s| !s.trim().is_empty()))
            .ok_or_else(|| AuthError::Validation("username or email is required".to_string()))?;

        if request.password.is_empty() {
            return Err(AuthError::Validation("password is required".to_string()));
        }

        let Some(user) = self.store.find_by_identifier(identifier).await? else {
            self.verify_dummy(request.password).await?;
            tracing::info!("Login failed: unknown identity");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.check_password(&user, request.password).await? {
            tracing::info!(user_id = %user.id, "Login failed: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let pair = self.issuer.issue_pair(user.id, SessionWrite::Overwrite).await?;
        tracing::info!(user_id = %user.id, "User logged in");

        Ok((user.to_public(), pair))
    }

    /// Exchange a refresh token for a new pair, retiring the presented one
    pub async fn refresh(&self, refresh_token: Option<&str>) -> Result<TokenPair, AuthError> {
        let token = refresh_token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let (_, pair) = self.rotation.run(token).await?;
        Ok(pair)
    }

    /// Revoke the user's session
    pub async fn logout(&self, user_id: Uuid) -> Result<(), AuthError> {
        self.store.set_session(user_id, None).await?;
        tracing::info!(user_id = %user_id, "User logged out");
        Ok(())
    }

    /// Replace the password and revoke the current session in one write
    pub async fn change_password(
        &self,
        user_id: Uuid,
        request: ChangePasswordRequest,
    ) -> Result<(), AuthError> {
        if request.old_password.is_empty() || request.new_password.is_empty() {
            return Err(AuthError::Validation(
                "oldPassword and newPassword are required".to_string(),
            ));
        }

        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !self.check_password(&user, request.old_password).await? {
            return Err(AuthError::Validation("Invalid old password".to_string()));
        }

        let password_hash = self.hash(request.new_password).await?;
        self.store.update_password(user_id, &password_hash).await?;

        tracing::info!(user_id = %user_id, "Password changed; session revoked");
        Ok(())
    }

    pub async fn current_user(&self, user_id: Uuid) -> Result<UserPublic, AuthError> {
        self.store
            .find_by_id(user_id)
            .await?
            .map(|u| u.to_public())
            .ok_or(AuthError::UserNotFound)
    }

    /// Update the caller's full name and/or email
    pub async fn update_account(
        &self,
        user_id: Uuid,
        request: UpdateAccountRequest,
    ) -> Result<UserPublic, AuthError> {
        let full_name = request.full_name.map(|n| n.trim().to_string());
        let email = request.email.map(|e| normalize_identifier(&e));

        if full_name.as_deref() == Some("") || email.as_deref() == Some("") {
            return Err(AuthError::Validation(
                "fullName and email cannot be empty".to_string(),
            ));
        }
        check_identifier_spaces(None, email.as_deref())?;

        let update = ProfileUpdate { full_name, email };
        if update.is_empty() {
            return Err(AuthError::Validation(
                "fullName or email is required".to_string(),
            ));
        }

        let user = self.store.update_profile(user_id, &update).await?;
        tracing::info!(user_id = %user_id, "Account details updated");
        Ok(user.to_public())
    }

    async fn hash(&self, password: String) -> Result<String, AuthError> {
        let config = self.passwords.clone();
        tokio::task::spawn_blocking(move || hash_password(&password, &config))
            .await
            .map_err(|e| AuthError::Internal(format!("hashing task failed: {e}")))?
            .map_err(AuthError::from)
    }

    async fn check_password(&self, user: &User, candidate: String) -> Result<bool, AuthError> {
        let store = self.store.clone();
        let user = user.clone();
        tokio::task::spawn_blocking(move || store.verify_password(&user, &candidate))
            .await
            .map_err(|e| AuthError::Internal(format!("verification task failed: {e}")))?
            .map_err(AuthError::from)
    }

    async fn verify_dummy(&self, candidate: String) -> Result<(), AuthError> {
        let hash = self.dummy_hash.clone();
        tokio::task::spawn_blocking(move || verify_password(&candidate, &hash))
            .await
            .map_err(|e| AuthError::Internal(format!("verification task failed: {e}")))??;
        Ok(())
    }

    async fn release_assets(&self, assets: &[Option<MediaAsset>]) {
        for asset in assets.iter().flatten() {
            if let Err(e) = self.media.delete(&asset.public_id).await {
                tracing::warn!(public_id = %asset.public_id, error = %e, "Failed to release media asset");
            }
        }
    }
}

fn validate_registration(input: &RegisterInput) -> Result<(), AuthError> {
    let required = [
        ("fullName", &input.full_name),
        ("username", &input.username),
        ("email", &input.email),
        ("password", &input.password),
    ];

    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(AuthError::Validation(format!("{field} is required")));
        }
    }

    check_identifier_spaces(Some(&input.username), Some(&input.email))
}

/// Usernames never contain `@` and emails always do, so a login identifier
/// can name at most one user.
fn check_identifier_spaces(username: Option<&str>, email: Option<&str>) -> Result<(), AuthError> {
    if username.is_some_and(|u| u.contains('@')) {
        return Err(AuthError::Validation(
            "username cannot contain '@'".to_string(),
        ));
    }
    if email.is_some_and(|e| !e.contains('@')) {
        return Err(AuthError::Validation("Invalid email format".to_string()));
    }
    Ok(())
}

/// Remove staged uploads that will not reach the media store
pub(crate) async fn discard_staged<'a>(paths: impl IntoIterator<Item = &'a PathBuf>) {
    for path in paths {
        if let Err(e) = tokio::fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "Failed to discard staged upload");
            }
        }
    }
}
