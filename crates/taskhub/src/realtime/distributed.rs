//! Cross-instance event relay.
//!
//! With more than one process serving streams, an event published on
//! one instance must reach subscribers connected to the others. The
//! adapter relays locally published events onto an external pub/sub
//! channel and injects inbound envelopes into the local bus. Injected
//! events are never relayed back out, and envelopes carrying our own
//! origin id are ignored, so transports that echo a publisher's
//! messages back to it cannot create a loop.

use async_trait::async_trait;
use log::{debug, warn};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

use taskhub_protocol::{DistributedEnvelope, RealtimeEvent};

use super::bus::EventBus;

/// Buffer for inbound relay payloads per subscriber.
const INBOUND_BUFFER_SIZE: usize = 256;

/// The external pub/sub channel carrying serialized envelopes.
///
/// Implementations wrap whatever the deployment provides (a Redis-like
/// channel, a message broker). [`InProcessTransport`] ships with the
/// crate for tests and embedded multi-hub setups.
#[async_trait]
pub trait PubSubTransport: Send + Sync {
    /// Publish one payload to every subscribed instance.
    async fn publish(&self, payload: Vec<u8>) -> anyhow::Result<()>;

    /// Open a subscription delivering payloads published after this
    /// call, including this instance's own (the origin check filters
    /// those out).
    async fn subscribe(&self) -> anyhow::Result<mpsc::Receiver<Vec<u8>>>;
}

/// A transport backed by a shared broadcast channel. All hubs handed a
/// clone of the same value behave like instances on one pub/sub bus.
#[derive(Clone)]
pub struct InProcessTransport {
    tx: broadcast::Sender<Vec<u8>>,
}

impl InProcessTransport {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(INBOUND_BUFFER_SIZE);
        Self { tx }
    }
}

impl Default for InProcessTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PubSubTransport for InProcessTransport {
    async fn publish(&self, payload: Vec<u8>) -> anyhow::Result<()> {
        // No subscribers yet is not an error.
        let _ = self.tx.send(payload);
        Ok(())
    }

    async fn subscribe(&self) -> anyhow::Result<mpsc::Receiver<Vec<u8>>> {
        let mut inbound = self.tx.subscribe();
        let (tx, rx) = mpsc::channel(INBOUND_BUFFER_SIZE);
        tokio::spawn(async move {
            loop {
                match inbound.recv().await {
                    Ok(payload) => {
                        if tx.send(payload).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Relay subscriber lagged, skipped {skipped} payload(s)");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Ok(rx)
    }
}

/// Relays events between this instance and its peers.
pub struct DistributedAdapter {
    instance_id: String,
    transport: Arc<dyn PubSubTransport>,
}

impl DistributedAdapter {
    /// Connect to the transport and start injecting inbound events into
    /// `bus`. Returns `None` when the transport is unreachable; the
    /// caller degrades to single-instance delivery rather than failing.
    pub async fn start(transport: Arc<dyn PubSubTransport>, bus: EventBus) -> Option<Arc<Self>> {
        let mut inbound = match transport.subscribe().await {
            Ok(rx) => rx,
            Err(err) => {
                warn!("Distributed transport unavailable, events stay local: {err:?}");
                return None;
            }
        };

        let instance_id = nanoid::nanoid!(10);
        let adapter = Arc::new(Self {
            instance_id: instance_id.clone(),
            transport,
        });

        tokio::spawn(async move {
            while let Some(payload) = inbound.recv().await {
                match serde_json::from_slice::<DistributedEnvelope>(&payload) {
                    Ok(envelope) if envelope.origin != instance_id => {
                        debug!(
                            "Injecting {} event from instance {}",
                            envelope.event.kind(),
                            envelope.origin
                        );
                        // Local injection only; remote events are never
                        // re-relayed back onto the channel.
                        bus.publish(envelope.event);
                    }
                    Ok(_) => {} // our own publish echoed back
                    Err(err) => warn!("Dropping malformed relay payload: {err}"),
                }
            }
            debug!("Relay subscription for instance {instance_id} closed");
        });

        Some(adapter)
    }

    /// Best-effort relay of a locally published event to all peers.
    /// Failures are logged; local delivery has already happened and is
    /// never rolled back.
    pub fn relay(&self, event: &RealtimeEvent) {
        let envelope = DistributedEnvelope::new(self.instance_id.clone(), event.clone());
        let payload = match serde_json::to_vec(&envelope) {
            Ok(payload) => payload,
            Err(err) => {
                warn!("Failed to serialize relay envelope: {err}");
                return;
            }
        };
        let transport = self.transport.clone();
        let kind = event.kind();
        tokio::spawn(async move {
            if let Err(err) = transport.publish(payload).await {
                warn!("Failed to relay {kind} event: {err:?}");
            }
        });
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }
}
