//! Topic fan-out with dead-connection pruning.

use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::mpsc::error::TrySendError;

use taskhub_protocol::{RealtimeEvent, Topic};

use super::registry::{ConnectionId, ConnectionRegistry};

/// Fans events out to every connection in a topic.
///
/// Delivery is at-most-once per live connection per call: no retry, no
/// queuing. A connection whose sink has closed is collected during the
/// pass and unregistered after it, so one dead connection never aborts
/// delivery to the others and the registry is never mutated while it is
/// being iterated. A connection whose buffer is full merely loses this
/// frame; the client catches up from authoritative state on reconnect.
pub struct TopicBroadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl TopicBroadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Deliver `event` to every connection bound to `topic`. Returns
    /// the number of sinks the frame was handed to.
    pub fn broadcast(&self, topic: &Topic, event: &RealtimeEvent) -> usize {
        let Some(frame) = serialize(event) else {
            return 0;
        };

        let mut delivered = 0;
        let mut dead: Vec<ConnectionId> = Vec::new();
        self.registry.for_each_in_topic(topic, |id, connection| {
            match connection.sink.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        "Dropping {} frame for stalled connection {id}",
                        event.kind()
                    );
                }
                Err(TrySendError::Closed(_)) => dead.push(id.clone()),
            }
        });

        for id in &dead {
            self.registry.unregister(id);
        }
        if !dead.is_empty() {
            debug!("Pruned {} dead connection(s) from topic {topic}", dead.len());
        }
        delivered
    }

    /// Deliver `event` to every open connection regardless of topic.
    /// Used for presence-class events that any stream may reflect.
    pub fn broadcast_all(&self, event: &RealtimeEvent) -> usize {
        let Some(frame) = serialize(event) else {
            return 0;
        };

        let mut delivered = 0;
        let mut dead: Vec<ConnectionId> = Vec::new();
        self.registry
            .for_each(|id, connection| match connection.sink.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        "Dropping {} frame for stalled connection {id}",
                        event.kind()
                    );
                }
                Err(TrySendError::Closed(_)) => dead.push(id.clone()),
            });

        for id in &dead {
            self.registry.unregister(id);
        }
        delivered
    }
}

fn serialize(event: &RealtimeEvent) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(frame) => Some(frame),
        Err(err) => {
            warn!("Failed to serialize {} event: {err}", event.kind());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::registry::Connection;
    use tokio::sync::mpsc;

    fn event() -> RealtimeEvent {
        RealtimeEvent::Typing {
            task_id: 42,
            user_id: "usr_1".to_string(),
            is_typing: true,
        }
    }

    #[tokio::test]
    async fn test_broadcast_reaches_only_the_topic() {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = TopicBroadcaster::new(registry.clone());

        let (tx1, mut rx1) = mpsc::channel(8);
        let (tx2, mut rx2) = mpsc::channel(8);
        registry.register("c1".into(), Connection::new(Topic::Task(42), tx1));
        registry.register("c2".into(), Connection::new(Topic::Task(43), tx2));

        let delivered = broadcaster.broadcast(&Topic::Task(42), &event());
        assert_eq!(delivered, 1);

        let frame = rx1.try_recv().unwrap();
        assert!(frame.contains("\"type\":\"typing\""));
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_sink_is_pruned_others_still_delivered() {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = TopicBroadcaster::new(registry.clone());

        let (tx_dead, rx_dead) = mpsc::channel(8);
        drop(rx_dead);
        let (tx_live, mut rx_live) = mpsc::channel(8);
        registry.register("dead".into(), Connection::new(Topic::Task(42), tx_dead));
        registry.register("live".into(), Connection::new(Topic::Task(42), tx_live));

        let delivered = broadcaster.broadcast(&Topic::Task(42), &event());
        assert_eq!(delivered, 1);
        assert!(rx_live.try_recv().is_ok());

        // Exactly the failing connection was removed.
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.topic_len(&Topic::Task(42)), 1);
    }

    #[tokio::test]
    async fn test_saturated_sink_drops_frame_but_keeps_connection() {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = TopicBroadcaster::new(registry.clone());

        let (tx, mut rx) = mpsc::channel(1);
        tx.try_send("occupied".to_string()).unwrap();
        registry.register("slow".into(), Connection::new(Topic::Task(42), tx));

        let delivered = broadcaster.broadcast(&Topic::Task(42), &event());
        assert_eq!(delivered, 0);
        assert_eq!(registry.len(), 1);

        // Draining the buffer lets the next broadcast through.
        assert_eq!(rx.try_recv().unwrap(), "occupied");
        assert_eq!(broadcaster.broadcast(&Topic::Task(42), &event()), 1);
    }

    #[tokio::test]
    async fn test_broadcast_all_spans_topics() {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = TopicBroadcaster::new(registry.clone());

        let (tx1, mut rx1) = mpsc::channel(8);
        let (tx2, mut rx2) = mpsc::channel(8);
        registry.register("c1".into(), Connection::new(Topic::Task(42), tx1));
        registry.register(
            "c2".into(),
            Connection::new(Topic::User("usr_5".into()), tx2),
        );

        let presence = RealtimeEvent::Presence {
            user_id: "usr_5".to_string(),
            status: taskhub_protocol::PresenceStatus::Online,
            timestamp: chrono::Utc::now(),
        };
        assert_eq!(broadcaster.broadcast_all(&presence), 2);
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }
}
