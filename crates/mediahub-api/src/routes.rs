//! API route definitions

use crate::auth::middleware::auth_middleware;
use crate::handlers::users;
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;

/// Routes mounted under `/api/v1/users`
pub fn user_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/register", post(users::register))
        .route("/login", post(users::login))
        .route("/refresh-token", post(users::refresh_token));

    // Protected routes (access token required)
    let protected_routes = Router::new()
        .route("/logout", post(users::logout))
        .route("/update-password", put(users::update_password))
        .route("/current-user", get(users::current_user))
        .route("/update-account", patch(users::update_account))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new().merge(public_routes).merge(protected_routes)
}
