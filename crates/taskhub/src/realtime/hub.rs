//! The realtime hub: one explicitly constructed service object owning
//! the registry, broadcaster, presence set, bus, and optional relay.

use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};
use tokio::sync::broadcast;

use taskhub_protocol::{PresenceStatus, RealtimeEvent, Route};

use super::broadcaster::TopicBroadcaster;
use super::bus::EventBus;
use super::distributed::{DistributedAdapter, PubSubTransport};
use super::presence::PresenceTracker;
use super::registry::ConnectionRegistry;

/// Process-wide fan-out service.
///
/// Created once at startup and passed (as `Arc`) to whatever needs to
/// publish or open streams; there is no ambient global instance. A
/// dispatch task subscribes to the bus and pushes each event to the
/// connections in its route's topic.
pub struct RealtimeHub {
    registry: Arc<ConnectionRegistry>,
    broadcaster: TopicBroadcaster,
    presence: PresenceTracker,
    bus: EventBus,
    adapter: Option<Arc<DistributedAdapter>>,
}

impl RealtimeHub {
    /// Single-instance hub: events fan out to local connections only.
    pub fn new() -> Arc<Self> {
        Self::build(None)
    }

    /// Multi-instance hub. If the transport is unreachable the hub
    /// comes up anyway and delivery stays local; cross-instance fan-out
    /// is not worth refusing to serve over.
    pub async fn with_transport(transport: Arc<dyn PubSubTransport>) -> Arc<Self> {
        let bus = EventBus::new();
        let adapter = DistributedAdapter::start(transport, bus.clone()).await;
        if adapter.is_none() {
            warn!("Running single-instance: distributed transport unavailable");
        }
        Self::assemble(bus, adapter)
    }

    fn build(adapter: Option<Arc<DistributedAdapter>>) -> Arc<Self> {
        Self::assemble(EventBus::new(), adapter)
    }

    fn assemble(bus: EventBus, adapter: Option<Arc<DistributedAdapter>>) -> Arc<Self> {
        let registry = Arc::new(ConnectionRegistry::new());
        let hub = Arc::new(Self {
            broadcaster: TopicBroadcaster::new(registry.clone()),
            presence: PresenceTracker::new(bus.clone()),
            registry,
            bus,
            adapter,
        });
        hub.spawn_dispatch();
        info!(
            "Realtime hub started ({} mode)",
            if hub.adapter.is_some() {
                "distributed"
            } else {
                "single-instance"
            }
        );
        hub
    }

    /// Publish an event: relayed to peer instances (when distributed)
    /// and delivered to local subscribers, in that order. Fire and
    /// forget; relay failures are logged, never surfaced.
    pub fn publish(&self, event: RealtimeEvent) {
        if let Some(adapter) = &self.adapter {
            adapter.relay(&event);
        }
        self.bus.publish(event);
    }

    /// Subscribe to the raw event stream, bypassing topic routing.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<RealtimeEvent>> {
        self.bus.subscribe()
    }

    /// Mark a user online. The presence tracker publishes the
    /// transition on the local bus; distributed hubs also relay it.
    pub fn mark_online(&self, user_id: &str) {
        if self.presence.mark_online(user_id) {
            self.relay_presence(user_id, PresenceStatus::Online);
        }
    }

    /// Mark a user offline. Idempotent, like `mark_online`.
    pub fn mark_offline(&self, user_id: &str) {
        if self.presence.mark_offline(user_id) {
            self.relay_presence(user_id, PresenceStatus::Offline);
        }
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.presence.is_online(user_id)
    }

    pub fn online_users(&self) -> Vec<String> {
        self.presence.online_users()
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    fn relay_presence(&self, user_id: &str, status: PresenceStatus) {
        if let Some(adapter) = &self.adapter {
            adapter.relay(&RealtimeEvent::Presence {
                user_id: user_id.to_string(),
                status,
                timestamp: Utc::now(),
            });
        }
    }

    // The task's strong Arc plus the hub's bus sender form a cycle, so
    // the hub and its dispatch task live until process exit. The hub is
    // a process-lifetime singleton; connection resources are released
    // per-session, not by dropping the hub.
    fn spawn_dispatch(self: &Arc<Self>) {
        let hub = self.clone();
        let mut rx = self.bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => match event.route() {
                        Route::Topic(topic) => {
                            hub.broadcaster.broadcast(&topic, &event);
                        }
                        Route::All => {
                            hub.broadcaster.broadcast_all(&event);
                        }
                        Route::None => {}
                    },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Dispatch task lagged, {skipped} event(s) not fanned out");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }
}
