//! Canonical realtime protocol types for Taskhub.
//!
//! Everything that crosses a process boundary lives here: the tagged
//! event union pushed to streaming clients, the topic keys used for
//! fan-out routing, and the envelope used on the cross-instance
//! channel. The server and any future sidecars share these types so
//! the wire format has exactly one definition.

mod envelope;
mod event;
mod topic;

pub use envelope::DistributedEnvelope;
pub use event::{PresenceStatus, RealtimeEvent, Route};
pub use topic::{ParseTopicError, Topic};
