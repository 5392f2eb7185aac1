//! Test utilities and common setup.

use std::sync::Arc;

use axum::Router;

use taskhub::api;
use taskhub::auth::{AuthConfig, AuthState};
use taskhub::directory::InMemoryDirectory;
use taskhub::notify::Notifier;
use taskhub::realtime::RealtimeHub;

/// Everything a test needs to drive the app from both sides: the
/// router for HTTP requests, the hub for observing fan-out, and the
/// directory for seeding task membership.
pub struct TestApp {
    pub router: Router,
    pub hub: Arc<RealtimeHub>,
    pub directory: Arc<InMemoryDirectory>,
}

/// Create a test AuthConfig in dev mode so `dev:<user>` tokens work.
fn test_auth_config() -> AuthConfig {
    AuthConfig {
        dev_mode: true,
        jwt_secret: Some("test-secret-for-integration-tests-minimum-32-chars".to_string()),
    }
}

/// Create a test application with all services initialized.
pub fn test_app() -> TestApp {
    let auth_state = AuthState::new(test_auth_config());
    let hub = RealtimeHub::new();
    let directory = Arc::new(InMemoryDirectory::new());
    let notifier = Notifier::new(hub.clone(), directory.clone());

    let state = api::AppState::new(hub.clone(), notifier, auth_state);
    let router = api::create_router(state, &[]);

    TestApp {
        router,
        hub,
        directory,
    }
}

/// Bearer token for a regular dev-mode user.
pub fn user_token(user_id: &str) -> String {
    format!("dev:{user_id}")
}

/// Bearer token for a dev-mode admin.
pub fn admin_token(user_id: &str) -> String {
    format!("dev:{user_id}:admin")
}
