//! Best-effort presence tracking.

use chrono::Utc;
use dashmap::DashSet;
use log::debug;

use taskhub_protocol::{PresenceStatus, RealtimeEvent};

use super::bus::EventBus;

/// Shared set of users currently considered online.
///
/// Marks are idempotent set operations with no reference counting: a
/// user with two open tabs goes offline the moment either tab closes
/// and flickers back when the survivor's next stream opens. There is no
/// expiry either; an unclean disconnect leaves the user online until
/// the transport notices the broken pipe and runs the disconnect path.
/// Both are accepted product behavior, not silently corrected here.
pub struct PresenceTracker {
    online: DashSet<String>,
    bus: EventBus,
}

impl PresenceTracker {
    pub fn new(bus: EventBus) -> Self {
        Self {
            online: DashSet::new(),
            bus,
        }
    }

    /// Mark a user online. Returns true if this call changed state; a
    /// `presence` event is published on the bus only on a transition.
    pub fn mark_online(&self, user_id: &str) -> bool {
        let changed = self.online.insert(user_id.to_string());
        if changed {
            debug!("User {user_id} is now online");
            self.publish(user_id, PresenceStatus::Online);
        }
        changed
    }

    /// Mark a user offline. Idempotent, like `mark_online`.
    pub fn mark_offline(&self, user_id: &str) -> bool {
        let changed = self.online.remove(user_id).is_some();
        if changed {
            debug!("User {user_id} is now offline");
            self.publish(user_id, PresenceStatus::Offline);
        }
        changed
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.online.contains(user_id)
    }

    /// Snapshot of all online user ids, in unspecified order.
    pub fn online_users(&self) -> Vec<String> {
        self.online.iter().map(|id| id.key().clone()).collect()
    }

    fn publish(&self, user_id: &str, status: PresenceStatus) {
        self.bus.publish(RealtimeEvent::Presence {
            user_id: user_id.to_string(),
            status,
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mark_online_then_offline() {
        let tracker = PresenceTracker::new(EventBus::new());

        assert!(tracker.mark_online("usr_5"));
        assert!(tracker.is_online("usr_5"));

        assert!(tracker.mark_offline("usr_5"));
        assert!(!tracker.is_online("usr_5"));
    }

    #[tokio::test]
    async fn test_marks_are_idempotent() {
        let tracker = PresenceTracker::new(EventBus::new());

        assert!(tracker.mark_online("usr_5"));
        assert!(!tracker.mark_online("usr_5"));
        assert!(tracker.is_online("usr_5"));

        assert!(tracker.mark_offline("usr_5"));
        assert!(!tracker.mark_offline("usr_5"));
        assert!(!tracker.is_online("usr_5"));
    }

    #[tokio::test]
    async fn test_transitions_publish_presence_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let tracker = PresenceTracker::new(bus);

        tracker.mark_online("usr_5");
        tracker.mark_online("usr_5"); // no transition, no event
        tracker.mark_offline("usr_5");

        let first = rx.recv().await.unwrap();
        assert!(matches!(
            &*first,
            RealtimeEvent::Presence {
                status: PresenceStatus::Online,
                ..
            }
        ));
        let second = rx.recv().await.unwrap();
        match &*second {
            RealtimeEvent::Presence {
                user_id, status, ..
            } => {
                assert_eq!(user_id, "usr_5");
                assert_eq!(*status, PresenceStatus::Offline);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_online_users_snapshot() {
        let tracker = PresenceTracker::new(EventBus::new());
        tracker.mark_online("usr_1");
        tracker.mark_online("usr_2");
        tracker.mark_offline("usr_1");

        let online = tracker.online_users();
        assert_eq!(online, vec!["usr_2".to_string()]);
    }
}
