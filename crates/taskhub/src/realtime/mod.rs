//! Realtime event fan-out.
//!
//! Module map, leaf to root:
//!
//! - [`registry`]: the set of open streaming connections, keyed by
//!   connection id and grouped by topic.
//! - [`broadcaster`]: serialize-once fan-out to a topic, pruning
//!   connections whose sinks have closed.
//! - [`presence`]: shared online-user set, publishing transitions on
//!   the bus.
//! - [`bus`]: process-wide publish/subscribe hub.
//! - [`distributed`]: optional cross-instance relay over a pluggable
//!   pub/sub transport.
//! - [`session`]: per-connection lifecycle: registration, first frame,
//!   heartbeat, RAII teardown.
//! - [`hub`]: ties the above together and runs the dispatch task.

pub mod broadcaster;
pub mod bus;
pub mod distributed;
pub mod hub;
pub mod presence;
pub mod registry;
pub mod session;

pub use broadcaster::TopicBroadcaster;
pub use bus::EventBus;
pub use distributed::{DistributedAdapter, InProcessTransport, PubSubTransport};
pub use hub::RealtimeHub;
pub use presence::PresenceTracker;
pub use registry::{Connection, ConnectionId, ConnectionRegistry, FrameSink};
pub use session::{StreamSession, HEARTBEAT_INTERVAL};
