//! Authentication and session lifecycle
//!
//! Components, leaves first:
//! - Credential store: identity records and the atomic session field
//! - Token issuer: access/refresh pair minting with per-purpose keys
//! - Route guard: stateless access-token check for protected routes
//! - Rotation: refresh-token exchange with replay rejection
//! - Revocation: logout and password change clear the stored session

pub mod cookies;
pub mod error;
pub mod issuer;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod rotation;
pub mod service;
pub mod store;

pub use error::AuthError;
pub use issuer::{session_digest, SessionWrite, TokenIssuer, TokenPair};
pub use jwt::{generate_token, validate_token, Claims, JwtConfig, JwtError, TokenPurpose};
pub use middleware::{auth_middleware, authenticate, AuthenticatedUser};
pub use models::{NewUser, ProfileUpdate, User, UserPublic};
pub use password::{hash_password, verify_password, PasswordConfig};
pub use rotation::{Rotation, RotationFailure, RotationState};
pub use service::{
    AuthService, ChangePasswordRequest, LoginRequest, LoginResponse, RefreshRequest,
    RegisterInput, UpdateAccountRequest,
};
pub use store::{CredentialStore, InMemoryCredentialStore, PgCredentialStore, StoreError};
