//! The realtime event union pushed to streaming clients.
//!
//! Events are transient: created by an API action, fanned out to the
//! connections subscribed to the matching topic, never persisted.
//! Clients that miss a frame reconcile by re-fetching authoritative
//! state on reconnect.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::topic::Topic;

/// Online/offline presence status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

impl std::fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PresenceStatus::Online => write!(f, "online"),
            PresenceStatus::Offline => write!(f, "offline"),
        }
    }
}

/// Events delivered over the streaming transport.
///
/// The `type` tag is the wire frame type; payload fields are flattened
/// alongside it, so a `message` event serializes as
/// `{"type":"message","task_id":42,...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RealtimeEvent {
    /// First frame on every stream, acknowledging the subscription.
    #[serde(rename = "connected")]
    Connected { connection_id: String },

    /// Explicit heartbeat frame. Keepalive between server and client is
    /// normally carried by SSE comment frames; this exists for clients
    /// that want an application-level liveness signal.
    #[serde(rename = "ping")]
    Ping,

    /// A chat message was posted on a task.
    #[serde(rename = "message")]
    Message {
        task_id: i64,
        message_id: i64,
        sender_id: String,
        sender_name: String,
        content: String,
        sent_at: DateTime<Utc>,
    },

    /// A notification addressed to one user.
    #[serde(rename = "notification")]
    Notification {
        user_id: String,
        title: String,
        body: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        link: Option<String>,
        created_at: DateTime<Utc>,
    },

    /// A new task was posted.
    #[serde(rename = "task:created")]
    TaskCreated {
        task_id: i64,
        title: String,
        poster_id: String,
    },

    /// Task fields changed (title, description, price, ...).
    #[serde(rename = "task:updated")]
    TaskUpdated {
        task_id: i64,
        title: String,
        status: String,
    },

    /// A helper accepted the task.
    #[serde(rename = "task:accepted")]
    TaskAccepted {
        task_id: i64,
        title: String,
        helper_id: String,
        helper_name: String,
    },

    /// The task was marked completed.
    #[serde(rename = "task:completed")]
    TaskCompleted { task_id: i64, title: String },

    /// The task was cancelled.
    #[serde(rename = "task:cancelled")]
    TaskCancelled {
        task_id: i64,
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// Someone started or stopped typing in a task chat.
    #[serde(rename = "typing")]
    Typing {
        task_id: i64,
        user_id: String,
        is_typing: bool,
    },

    /// A user's presence changed.
    #[serde(rename = "presence")]
    Presence {
        user_id: String,
        status: PresenceStatus,
        timestamp: DateTime<Utc>,
    },

    /// A review was left after task completion.
    #[serde(rename = "review:created")]
    ReviewCreated {
        task_id: i64,
        reviewer_id: String,
        reviewee_id: String,
        rating: u8,
    },
}

/// Where an event is fanned out to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Deliver to every connection bound to one topic.
    Topic(Topic),
    /// Deliver to every connection regardless of topic.
    All,
    /// Never fanned out by the dispatcher (session-local frames).
    None,
}

impl RealtimeEvent {
    /// The wire frame type, as it appears in the `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            RealtimeEvent::Connected { .. } => "connected",
            RealtimeEvent::Ping => "ping",
            RealtimeEvent::Message { .. } => "message",
            RealtimeEvent::Notification { .. } => "notification",
            RealtimeEvent::TaskCreated { .. } => "task:created",
            RealtimeEvent::TaskUpdated { .. } => "task:updated",
            RealtimeEvent::TaskAccepted { .. } => "task:accepted",
            RealtimeEvent::TaskCompleted { .. } => "task:completed",
            RealtimeEvent::TaskCancelled { .. } => "task:cancelled",
            RealtimeEvent::Typing { .. } => "typing",
            RealtimeEvent::Presence { .. } => "presence",
            RealtimeEvent::ReviewCreated { .. } => "review:created",
        }
    }

    /// Fan-out target for this event.
    ///
    /// Task-scoped events go to the task topic, notifications to the
    /// addressed user's topic, presence to everyone. `Connected` and
    /// `Ping` are written by the session handler itself and are never
    /// routed through the dispatcher.
    pub fn route(&self) -> Route {
        match self {
            RealtimeEvent::Connected { .. } | RealtimeEvent::Ping => Route::None,
            RealtimeEvent::Message { task_id, .. }
            | RealtimeEvent::TaskCreated { task_id, .. }
            | RealtimeEvent::TaskUpdated { task_id, .. }
            | RealtimeEvent::TaskAccepted { task_id, .. }
            | RealtimeEvent::TaskCompleted { task_id, .. }
            | RealtimeEvent::TaskCancelled { task_id, .. }
            | RealtimeEvent::Typing { task_id, .. }
            | RealtimeEvent::ReviewCreated { task_id, .. } => Route::Topic(Topic::Task(*task_id)),
            RealtimeEvent::Notification { user_id, .. } => {
                Route::Topic(Topic::User(user_id.clone()))
            }
            RealtimeEvent::Presence { .. } => Route::All,
        }
    }
}
