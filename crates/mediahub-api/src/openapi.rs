//! OpenAPI document

use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::health::readiness_check,
        crate::handlers::users::register,
        crate::handlers::users::login,
        crate::handlers::users::logout,
        crate::handlers::users::refresh_token,
        crate::handlers::users::update_password,
        crate::handlers::users::current_user,
        crate::handlers::users::update_account,
    ),
    components(
        schemas(
            crate::handlers::health::HealthResponse,
            crate::handlers::health::ReadinessResponse,
            crate::handlers::health::ReadinessChecks,
            crate::handlers::users::RegisterForm,
            crate::auth::LoginRequest,
            crate::auth::LoginResponse,
            crate::auth::RefreshRequest,
            crate::auth::ChangePasswordRequest,
            crate::auth::UpdateAccountRequest,
            crate::auth::TokenPair,
            crate::auth::UserPublic,
            crate::error::ApiError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness and readiness"),
        (name = "users", description = "Accounts, login and session tokens"),
    ),
    info(
        title = "MediaHub API",
        description = "Account registration and session token lifecycle for the MediaHub media platform.",
    ),
)]
pub struct ApiDoc;

/// Declares the access token transports used by protected routes
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
            components.add_security_scheme(
                "cookie_auth",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("accessToken"))),
            );
        }
    }
}
