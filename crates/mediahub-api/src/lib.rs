//! MediaHub API - account and session service
//!
//! HTTP surface for registration, login, refresh-token rotation, logout and
//! password change. Router assembly lives here; business logic in [`auth`].

pub mod auth;
pub mod error;
pub mod handlers;
pub mod openapi;
pub mod response;
pub mod routes;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::get,
    Json, Router,
};
use openapi::ApiDoc;
use state::AppState;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use utoipa::OpenApi;

/// Build the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);
    let body_limit = state.config.server.max_body_size;
    let media_dir = state.config.media.upload_dir.clone();

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/api-docs/openapi.json", get(openapi_json))
        .nest("/api/v1/users", routes::user_routes(state.clone()))
        .nest_service("/media", ServeDir::new(media_dir))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// CORS with credentials, so browsers send the token cookies cross-origin
///
/// Credentials rule out wildcards; with no configured origins the request
/// origin is mirrored.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::mirror_request()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Application state backed by in-memory stores and temporary media dirs
#[cfg(any(test, feature = "test-utils"))]
pub fn create_state_for_testing() -> AppState {
    use auth::{AuthService, InMemoryCredentialStore, JwtConfig, PasswordConfig};
    use mediahub_core::{config::AppConfig, LocalMediaStore};

    let root = std::env::temp_dir().join(format!("mediahub-api-test-{}", uuid::Uuid::new_v4()));
    let mut config = AppConfig::default();
    config.media.upload_dir = root.join("media");
    config.media.staging_dir = root.join("temp");
    config.auth.secure_cookies = false;

    let store = Arc::new(InMemoryCredentialStore::new());
    let media = Arc::new(LocalMediaStore::new(
        config.media.upload_dir.clone(),
        config.media.public_base_url.clone(),
    ));
    let auth = AuthService::new(
        store,
        media,
        JwtConfig::from(&config.auth),
        PasswordConfig::minimal(),
    )
    .expect("test auth service");

    AppState::new(config, auth)
}

/// Router over [`create_state_for_testing`]
#[cfg(any(test, feature = "test-utils"))]
pub fn create_router_for_testing() -> Router {
    create_router(Arc::new(create_state_for_testing()))
}
