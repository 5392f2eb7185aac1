//! HTTP API module.
//!
//! Streaming endpoints, presence queries, and the internal notify
//! trigger, behind bearer-token authentication.

mod error;
mod handlers;
mod routes;
mod state;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use handlers::NotifyRequest;
pub use routes::create_router;
pub use state::AppState;
