//! Authentication module.
//!
//! Verifies bearer tokens issued elsewhere (the marketplace's login
//! service); issuance is out of scope here. Supports:
//! - JWT validation against a shared secret (production)
//! - Dev bypass mode with `dev:<user>[:admin]` tokens

mod claims;
mod config;
mod error;
mod middleware;

pub use claims::{Claims, Role};
pub use config::{AuthConfig, ConfigValidationError};
pub use error::AuthError;
pub use middleware::{AuthState, CurrentUser, RequireAdmin};
