//! Application state management

use crate::auth::AuthService;
use mediahub_core::config::AppConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Registration, login and session lifecycle
    pub auth: AuthService,
    /// Server start time
    pub start_time: Instant,
    /// Ready status
    pub is_ready: AtomicBool,
}

impl AppState {
    pub fn new(config: AppConfig, auth: AuthService) -> Self {
        Self {
            config,
            auth,
            start_time: Instant::now(),
            is_ready: AtomicBool::new(true),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::SeqCst);
    }

    /// Whether token cookies carry the `Secure` attribute
    pub fn secure_cookies(&self) -> bool {
        self.config.auth.secure_cookies
    }
}
