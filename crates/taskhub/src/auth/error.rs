//! Authentication errors.

use thiserror::Error;

/// Errors from token extraction and verification. Rendered to HTTP
/// responses via conversion into [`crate::api::ApiError`].
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing authorization")]
    MissingToken,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token has expired")]
    TokenExpired,

    #[error("insufficient permissions: {0}")]
    InsufficientPermissions(String),
}
