//! Taskhub realtime backend library.
//!
//! The heart of this crate is [`realtime::RealtimeHub`]: an explicitly
//! constructed service object that fans domain events out to long-lived
//! SSE connections, tracks best-effort presence, and optionally relays
//! events across horizontally scaled instances. The `api` module wraps
//! the hub in an axum router; `notify` is the typed seam the (external)
//! CRUD layer calls after its own work has committed.

pub mod api;
pub mod auth;
pub mod directory;
pub mod notify;
pub mod realtime;

pub use taskhub_protocol as protocol;
