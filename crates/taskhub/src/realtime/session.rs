//! Per-connection stream lifecycle.
//!
//! A session moves `Connecting -> Open -> Closing -> Closed`. It is
//! only constructed after authentication succeeds, so a rejected
//! handshake leaves no registry or presence trace. Teardown lives in a
//! single RAII guard dropped with the response stream: timer, registry
//! entry, and presence mark are released together, never piecemeal.

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};
use log::{debug, info};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use taskhub_protocol::{RealtimeEvent, Topic};

use super::hub::RealtimeHub;
use super::registry::{Connection, ConnectionId};

/// Interval for SSE keepalive comment frames. Keeps intermediary
/// proxies from timing out an otherwise quiet connection.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Per-connection send buffer. A client that stalls longer than this
/// many frames starts losing them (see the broadcaster).
const FRAME_BUFFER_SIZE: usize = 64;

/// Stream session states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Open => write!(f, "open"),
            SessionState::Closing => write!(f, "closing"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

/// One open streaming connection, registered in the hub.
pub struct StreamSession {
    id: ConnectionId,
    frames: mpsc::Receiver<String>,
    guard: TeardownGuard,
}

impl StreamSession {
    /// Register a new connection on `topic`. When `presence_user` is
    /// set the stream is user-scoped and drives that user's presence.
    pub fn open(hub: Arc<RealtimeHub>, topic: Topic, presence_user: Option<String>) -> Self {
        let id: ConnectionId = nanoid::nanoid!(12);
        debug!("Stream {id} {} on topic {topic}", SessionState::Connecting);

        let (tx, rx) = mpsc::channel(FRAME_BUFFER_SIZE);
        hub.registry()
            .register(id.clone(), Connection::new(topic.clone(), tx));
        if let Some(user) = &presence_user {
            hub.mark_online(user);
        }
        info!("Stream {id} {} on topic {topic}", SessionState::Open);

        Self {
            guard: TeardownGuard {
                hub,
                id: id.clone(),
                presence_user,
                state: SessionState::Open,
            },
            id,
            frames: rx,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Receive the next fanned-out frame. `None` once the session's
    /// sink has been dropped from the registry.
    pub async fn next_frame(&mut self) -> Option<String> {
        self.frames.recv().await
    }

    /// Turn the session into an SSE response: a `connected` frame,
    /// then every fanned-out frame in arrival order, with keepalive
    /// comments on the heartbeat interval. Dropping the response (the
    /// client went away) runs the teardown guard.
    pub fn into_sse(self) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
        let StreamSession { id, frames, guard } = self;
        // A variant holding a single String cannot fail to serialize.
        let connected = serde_json::to_string(&RealtimeEvent::Connected { connection_id: id })
            .expect("connected frame serializes");

        let stream = stream::once(async move { Ok(Event::default().data(connected)) }).chain(
            ReceiverStream::new(frames).map(move |frame| {
                let _open = &guard;
                Ok(Event::default().data(frame))
            }),
        );

        Sse::new(stream).keep_alive(KeepAlive::new().interval(HEARTBEAT_INTERVAL).text("ping"))
    }
}

/// Releases everything the session acquired, in one place.
struct TeardownGuard {
    hub: Arc<RealtimeHub>,
    id: ConnectionId,
    presence_user: Option<String>,
    state: SessionState,
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        self.state = SessionState::Closing;
        self.hub.registry().unregister(&self.id);
        if let Some(user) = self.presence_user.take() {
            self.hub.mark_offline(&user);
        }
        self.state = SessionState::Closed;
        info!("Stream {} {}", self.id, self.state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_registers_and_drop_unregisters() {
        let hub = RealtimeHub::new();
        let session = StreamSession::open(hub.clone(), Topic::Task(42), None);
        assert_eq!(hub.connection_count(), 1);

        drop(session);
        assert_eq!(hub.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_user_scoped_session_drives_presence() {
        let hub = RealtimeHub::new();
        let session = StreamSession::open(
            hub.clone(),
            Topic::User("usr_5".into()),
            Some("usr_5".into()),
        );
        assert!(hub.is_online("usr_5"));

        drop(session);
        assert!(!hub.is_online("usr_5"));
    }

    #[tokio::test]
    async fn test_task_scoped_session_leaves_presence_alone() {
        let hub = RealtimeHub::new();
        let session = StreamSession::open(hub.clone(), Topic::Task(42), None);
        assert!(hub.online_users().is_empty());
        drop(session);
        assert!(hub.online_users().is_empty());
    }
}
