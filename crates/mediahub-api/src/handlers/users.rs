//! User account and session handlers
//!
//! Token-issuing endpoints return the pair in the body and also set it as
//! http-only cookies. Endpoints that end a session clear both cookies.

use crate::auth::cookies::{refresh_token_from, with_session_cookies, without_session_cookies};
use crate::auth::service::discard_staged;
use crate::auth::{
    AuthenticatedUser, ChangePasswordRequest, LoginRequest, LoginResponse, RefreshRequest,
    RegisterInput, TokenPair, UpdateAccountRequest, UserPublic,
};
use crate::error::AppError;
use crate::response::ApiResponse;
use crate::state::AppState;
use axum::{
    extract::{multipart::Field, Multipart, State},
    response::IntoResponse,
    Extension, Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

/// Multipart registration form (documentation only)
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
pub struct RegisterForm {
    username: String,
    email: String,
    full_name: String,
    password: String,
    #[schema(value_type = String, format = Binary)]
    avatar: String,
    #[schema(value_type = Option<String>, format = Binary)]
    cover_image: Option<String>,
}

/// Register a new user
///
/// Multipart form with text fields `username`, `email`, `fullName`,
/// `password`, a required `avatar` file and an optional `coverImage` file.
#[utoipa::path(
    post,
    path = "/api/v1/users/register",
    tag = "users",
    request_body(content = RegisterForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "User registered (wrapped in the response envelope)", body = UserPublic),
        (status = 400, description = "Missing field or avatar", body = crate::error::ApiError),
        (status = 409, description = "Username or email taken", body = crate::error::ApiError),
    )
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut staged = Vec::new();
    let input = match read_registration(multipart, &state.config.media.staging_dir, &mut staged).await
    {
        Ok(input) => input,
        Err(e) => {
            discard_staged(&staged).await;
            return Err(e);
        }
    };

    let user = state.auth.register(input).await?;

    Ok(ApiResponse::created(user, "User registered successfully"))
}

/// Login with username or email and password
#[utoipa::path(
    post,
    path = "/api/v1/users/login",
    tag = "users",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful; tokens also set as cookies", body = LoginResponse),
        (status = 400, description = "Missing identifier or password", body = crate::error::ApiError),
        (status = 401, description = "Invalid user credentials", body = crate::error::ApiError),
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (user, pair) = state.auth.login(request).await?;

    let jar = with_session_cookies(jar, &pair, state.secure_cookies());
    let body = LoginResponse {
        user,
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
    };

    Ok((jar, ApiResponse::ok(body, "User logged in successfully")))
}

/// Logout the current session
#[utoipa::path(
    post,
    path = "/api/v1/users/logout",
    tag = "users",
    responses(
        (status = 200, description = "Session revoked and cookies cleared"),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
    ),
    security(("cookie_auth" = []), ("bearer_auth" = []))
)]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    state.auth.logout(user.user_id).await?;

    Ok((
        without_session_cookies(jar),
        ApiResponse::ok(json!({}), "User logged out"),
    ))
}

/// Exchange a refresh token for a new pair
///
/// The token is taken from the `refreshToken` cookie, or from the JSON body
/// for clients without cookies. If the cookie is rejected and the body
/// carries a different token, the body token is tried. The presented token
/// is retired.
#[utoipa::path(
    post,
    path = "/api/v1/users/refresh-token",
    tag = "users",
    request_body(content = RefreshRequest, description = "Used when the refreshToken cookie is absent or rejected"),
    responses(
        (status = 200, description = "New token pair; also set as cookies", body = TokenPair),
        (status = 401, description = "Missing, invalid, expired, or already used refresh token", body = crate::error::ApiError),
    )
)]
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    body: Option<Json<RefreshRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let cookie = refresh_token_from(&jar);
    let body = body
        .and_then(|Json(request)| request.refresh_token)
        .filter(|t| !t.trim().is_empty());

    let pair = match (cookie, body) {
        (Some(cookie), Some(body)) if cookie != body => {
            match state.auth.refresh(Some(&cookie)).await {
                Err(e) if e.is_unauthorized() => state.auth.refresh(Some(&body)).await?,
                other => other?,
            }
        }
        (cookie, body) => state.auth.refresh(cookie.or(body).as_deref()).await?,
    };

    let jar = with_session_cookies(jar, &pair, state.secure_cookies());
    Ok((jar, ApiResponse::ok(pair, "Access token refreshed")))
}

/// Change the current user's password
///
/// Revokes the session, so the client must log in again.
#[utoipa::path(
    put,
    path = "/api/v1/users/update-password",
    tag = "users",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "Missing fields or invalid old password", body = crate::error::ApiError),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
    ),
    security(("cookie_auth" = []), ("bearer_auth" = []))
)]
pub async fn update_password(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    jar: CookieJar,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.auth.change_password(user.user_id, request).await?;

    Ok((
        without_session_cookies(jar),
        ApiResponse::ok(json!({}), "Password changed successfully"),
    ))
}

/// Get the current user
#[utoipa::path(
    get,
    path = "/api/v1/users/current-user",
    tag = "users",
    responses(
        (status = 200, description = "Current user (wrapped in the response envelope)", body = UserPublic),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
    ),
    security(("cookie_auth" = []), ("bearer_auth" = []))
)]
pub async fn current_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.auth.current_user(user.user_id).await?;
    Ok(ApiResponse::ok(user, "Current user fetched successfully"))
}

/// Update full name and/or email
#[utoipa::path(
    patch,
    path = "/api/v1/users/update-account",
    tag = "users",
    request_body = UpdateAccountRequest,
    responses(
        (status = 200, description = "Updated user (wrapped in the response envelope)", body = UserPublic),
        (status = 400, description = "Nothing to update", body = crate::error::ApiError),
        (status = 409, description = "Email taken", body = crate::error::ApiError),
    ),
    security(("cookie_auth" = []), ("bearer_auth" = []))
)]
pub async fn update_account(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<UpdateAccountRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.auth.update_account(user.user_id, request).await?;
    Ok(ApiResponse::ok(user, "Account details updated successfully"))
}

/// Read the registration form, staging file parts under `staging_dir`
///
/// Every staged path is pushed to `staged` as soon as it exists on disk.
async fn read_registration(
    mut multipart: Multipart,
    staging_dir: &Path,
    staged: &mut Vec<PathBuf>,
) -> Result<RegisterInput, AppError> {
    let mut input = RegisterInput::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "username" => input.username = text(field).await?,
            "email" => input.email = text(field).await?,
            "fullName" => input.full_name = text(field).await?,
            "password" => input.password = text(field).await?,
            "avatar" => {
                if let Some(path) = stage_file(field, staging_dir, staged).await? {
                    input.avatar = Some(path);
                }
            }
            "coverImage" | "cover" => {
                if let Some(path) = stage_file(field, staging_dir, staged).await? {
                    input.cover_image = Some(path);
                }
            }
            other => tracing::debug!(field = %other, "Ignoring unknown multipart field"),
        }
    }

    // A repeated file field leaves an earlier staged copy nobody references.
    let orphaned: Vec<&PathBuf> = staged
        .iter()
        .filter(|p| input.avatar.as_ref() != Some(*p) && input.cover_image.as_ref() != Some(*p))
        .collect();
    discard_staged(orphaned).await;

    Ok(input)
}

async fn text(field: Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid form field: {e}")))
}

/// Write one file part to the staging directory; empty parts are skipped
async fn stage_file(
    field: Field<'_>,
    staging_dir: &Path,
    staged: &mut Vec<PathBuf>,
) -> Result<Option<PathBuf>, AppError> {
    let extension = field
        .file_name()
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase());

    let bytes = field
        .bytes()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid file upload: {e}")))?;
    if bytes.is_empty() {
        return Ok(None);
    }

    tokio::fs::create_dir_all(staging_dir)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to create staging dir: {e}")))?;

    let file_name = match extension {
        Some(ext) => format!("{}.{ext}", Uuid::new_v4()),
        None => Uuid::new_v4().to_string(),
    };
    let path = staging_dir.join(file_name);

    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to stage upload: {e}")))?;
    staged.push(path.clone());

    Ok(Some(path))
}
