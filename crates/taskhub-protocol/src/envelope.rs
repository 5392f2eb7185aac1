//! Cross-instance relay envelope.

use serde::{Deserialize, Serialize};

use crate::event::RealtimeEvent;

/// Wrapper for events relayed between horizontally scaled instances.
///
/// `origin` identifies the publishing instance. A receiving instance
/// injects the event into its local bus only when the origin differs
/// from its own id, and injected events are never relayed back out, so
/// an envelope cannot circulate indefinitely even on transports that
/// echo a publisher's own messages back to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributedEnvelope {
    pub origin: String,
    pub event: RealtimeEvent,
}

impl DistributedEnvelope {
    pub fn new(origin: impl Into<String>, event: RealtimeEvent) -> Self {
        Self {
            origin: origin.into(),
            event,
        }
    }
}
