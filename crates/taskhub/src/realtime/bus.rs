//! Process-wide publish/subscribe hub.

use std::sync::Arc;

use log::debug;
use tokio::sync::broadcast;

use taskhub_protocol::RealtimeEvent;

/// Size of the broadcast channel backing the bus. Subscribers that fall
/// this far behind observe `RecvError::Lagged` and skip ahead; they do
/// not slow anyone else down.
const EVENT_BUFFER_SIZE: usize = 256;

/// Decouples event producers (the notify layer, presence, the
/// distributed adapter) from consumers (the dispatch task, tests,
/// embedding applications).
///
/// Cloning is cheap and shares the underlying channel. Any number of
/// subscribers is supported; one open streaming connection per
/// subscriber is the expected load, and each receiver is independent,
/// so a subscriber that panics or lags never blocks delivery to the
/// rest. Events are observed in publish order within the process.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Arc<RealtimeEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        Self { tx }
    }

    /// Publish an event to all current subscribers. Publishing with no
    /// subscribers is a no-op.
    pub fn publish(&self, event: RealtimeEvent) {
        debug!("Publishing {} event", event.kind());
        // send() errs only when there are no receivers; that's fine.
        let _ = self.tx.send(Arc::new(event));
    }

    /// Subscribe to all events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<RealtimeEvent>> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_without_subscribers_is_a_noop() {
        let bus = EventBus::new();
        bus.publish(RealtimeEvent::Ping);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_every_subscriber_sees_every_event_in_order() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(RealtimeEvent::Ping);
        bus.publish(RealtimeEvent::TaskCompleted {
            task_id: 7,
            title: "Proofread essay".to_string(),
        });

        for rx in [&mut rx1, &mut rx2] {
            assert!(matches!(*rx.recv().await.unwrap(), RealtimeEvent::Ping));
            assert!(matches!(
                *rx.recv().await.unwrap(),
                RealtimeEvent::TaskCompleted { task_id: 7, .. }
            ));
        }
    }

    #[tokio::test]
    async fn test_failing_subscriber_does_not_block_others() {
        let bus = EventBus::new();

        let mut doomed = bus.subscribe();
        let failing = tokio::spawn(async move {
            let _ = doomed.recv().await;
            panic!("subscriber blew up");
        });

        let mut healthy = bus.subscribe();
        bus.publish(RealtimeEvent::Ping);

        assert!(matches!(
            *healthy.recv().await.unwrap(),
            RealtimeEvent::Ping
        ));
        // The panicking task dies alone.
        assert!(failing.await.unwrap_err().is_panic());

        bus.publish(RealtimeEvent::Ping);
        assert!(matches!(
            *healthy.recv().await.unwrap(),
            RealtimeEvent::Ping
        ));
    }
}
