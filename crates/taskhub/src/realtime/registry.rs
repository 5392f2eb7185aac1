//! Connection registry: the set of open streaming connections.

use std::time::Instant;

use dashmap::DashMap;
use log::{debug, info};
use tokio::sync::mpsc;

use taskhub_protocol::Topic;

/// Opaque identifier for one streaming connection.
pub type ConnectionId = String;

/// The capability to push one serialized frame to an open connection.
///
/// Pushes go through `try_send`: a closed receiver means the client is
/// gone (the broadcaster prunes the entry), a full buffer means the
/// client has stalled and the frame is dropped for that connection.
pub type FrameSink = mpsc::Sender<String>;

/// One registered streaming connection.
#[derive(Debug)]
pub struct Connection {
    pub topic: Topic,
    pub sink: FrameSink,
    pub created_at: Instant,
}

impl Connection {
    pub fn new(topic: Topic, sink: FrameSink) -> Self {
        Self {
            topic,
            sink,
            created_at: Instant::now(),
        }
    }
}

/// Registry of active streaming connections, keyed by connection id.
///
/// The registry is a set: one entry per connection id, so a connection
/// cannot be delivered the same event twice in one broadcast pass. It
/// never errors itself; sink failures surface in the broadcaster, which
/// removes the offending entry.
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Add a connection. If the id is already present the previous
    /// entry is replaced: last registration wins.
    pub fn register(&self, id: ConnectionId, connection: Connection) {
        let topic = connection.topic.clone();
        if self.connections.insert(id.clone(), connection).is_some() {
            debug!("Replaced existing registration for connection {id}");
        }
        info!("Registered connection {id} on topic {topic}");
    }

    /// Remove a connection. Removing an absent id is a no-op.
    pub fn unregister(&self, id: &str) {
        if self.connections.remove(id).is_some() {
            info!("Unregistered connection {id}");
        }
    }

    /// Invoke `f` for every connection currently bound to `topic`.
    /// Iteration order is unspecified. Callers must not mutate the
    /// registry from inside `f`; collect ids and remove afterwards.
    pub fn for_each_in_topic(&self, topic: &Topic, mut f: impl FnMut(&ConnectionId, &Connection)) {
        for entry in self.connections.iter() {
            if entry.value().topic == *topic {
                f(entry.key(), entry.value());
            }
        }
    }

    /// Invoke `f` for every connection regardless of topic.
    pub fn for_each(&self, mut f: impl FnMut(&ConnectionId, &Connection)) {
        for entry in self.connections.iter() {
            f(entry.key(), entry.value());
        }
    }

    /// Total number of open connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Number of connections bound to `topic`.
    pub fn topic_len(&self, topic: &Topic) -> usize {
        let mut count = 0;
        self.for_each_in_topic(topic, |_, _| count += 1);
        count
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
