//! Application state shared across handlers.

use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::AuthState;
use crate::notify::Notifier;
use crate::realtime::RealtimeHub;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<RealtimeHub>,
    pub notifier: Notifier,
    pub auth: AuthState,
}

impl AppState {
    pub fn new(hub: Arc<RealtimeHub>, notifier: Notifier, auth: AuthState) -> Self {
        Self {
            hub,
            notifier,
            auth,
        }
    }
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}
