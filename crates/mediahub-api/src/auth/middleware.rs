//! Route guard for protected endpoints
//!
//! Validates the access token carried in the `accessToken` cookie or the
//! `Authorization: Bearer` header. The check is signature plus expiry only;
//! the credential store is never consulted.

use super::cookies::access_token_from;
use super::error::AuthError;
use super::jwt::{validate_token, JwtConfig, TokenPurpose};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use uuid::Uuid;

/// Identity bound to the current request
///
/// Added to request extensions by `auth_middleware`; handlers take it with
/// `Extension<AuthenticatedUser>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

/// Verify an access token and return the identity it is bound to
///
/// Fails with `MissingToken` when absent or empty and `InvalidToken` on a bad
/// signature, a refresh token, malformed input, or `now > exp`.
pub fn authenticate(config: &JwtConfig, token: Option<&str>) -> Result<Uuid, AuthError> {
    let token = token
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)?;

    let claims =
        validate_token(config, TokenPurpose::Access, token).map_err(AuthError::InvalidToken)?;

    claims.subject_id().map_err(AuthError::InvalidToken)
}

/// Token from the `Authorization: Bearer` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Authentication middleware that requires a valid access token
///
/// The cookie is checked first. When it is missing or rejected, the
/// `Authorization` header gets its turn, so a stale cookie cannot shadow a
/// valid bearer token.
///
/// ```ignore
/// use axum::{middleware, routing::get, Router};
///
/// let protected = Router::new()
///     .route("/current-user", get(current_user))
///     .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));
/// ```
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let config = state.auth.jwt_config();
    let cookie = access_token_from(&jar);
    let header = bearer_token(request.headers()).map(String::from);

    let verified = match authenticate(config, cookie.as_deref()) {
        Err(_) if header.is_some() => authenticate(config, header.as_deref()),
        other => other,
    };

    let user_id = match verified {
        Ok(id) => id,
        Err(e) => {
            tracing::debug!(
                path = %request.uri().path(),
                error = %e,
                "Rejected unauthenticated request"
            );
            return Err(e.into());
        }
    };

    request
        .extensions_mut()
        .insert(AuthenticatedUser { user_id });

    Ok(next.run(request).await)
}
