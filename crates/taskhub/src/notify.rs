//! Typed notify seam between API actions and the realtime hub.
//!
//! The marketplace's CRUD layer calls these after its own write has
//! committed. Everything here is best-effort: a failed participant
//! lookup or relay is logged and swallowed, because accepting a task
//! must succeed whether or not anyone is around to see the toast.

use std::sync::Arc;

use chrono::Utc;
use log::warn;

use taskhub_protocol::RealtimeEvent;

use crate::directory::ParticipantDirectory;
use crate::realtime::RealtimeHub;

/// Post-commit notification publisher.
#[derive(Clone)]
pub struct Notifier {
    hub: Arc<RealtimeHub>,
    directory: Arc<dyn ParticipantDirectory>,
}

impl Notifier {
    pub fn new(hub: Arc<RealtimeHub>, directory: Arc<dyn ParticipantDirectory>) -> Self {
        Self { hub, directory }
    }

    /// A new task was posted.
    pub fn task_created(&self, task_id: i64, title: &str, poster_id: &str) {
        self.hub.publish(RealtimeEvent::TaskCreated {
            task_id,
            title: title.to_string(),
            poster_id: poster_id.to_string(),
        });
    }

    /// Task fields changed.
    pub fn task_updated(&self, task_id: i64, title: &str, status: &str) {
        self.hub.publish(RealtimeEvent::TaskUpdated {
            task_id,
            title: title.to_string(),
            status: status.to_string(),
        });
    }

    /// A helper accepted the task. Watchers of the task page get the
    /// lifecycle event; the other participants get a notification.
    pub async fn task_accepted(&self, task_id: i64, title: &str, helper_id: &str, helper_name: &str) {
        self.hub.publish(RealtimeEvent::TaskAccepted {
            task_id,
            title: title.to_string(),
            helper_id: helper_id.to_string(),
            helper_name: helper_name.to_string(),
        });
        self.notify_participants(
            task_id,
            helper_id,
            "Task accepted",
            &format!("{helper_name} accepted \"{title}\""),
        )
        .await;
    }

    /// The task was marked completed.
    pub async fn task_completed(&self, task_id: i64, title: &str, actor_id: &str) {
        self.hub.publish(RealtimeEvent::TaskCompleted {
            task_id,
            title: title.to_string(),
        });
        self.notify_participants(
            task_id,
            actor_id,
            "Task completed",
            &format!("\"{title}\" was marked completed"),
        )
        .await;
    }

    /// The task was cancelled.
    pub async fn task_cancelled(
        &self,
        task_id: i64,
        title: &str,
        actor_id: &str,
        reason: Option<&str>,
    ) {
        self.hub.publish(RealtimeEvent::TaskCancelled {
            task_id,
            title: title.to_string(),
            reason: reason.map(str::to_string),
        });
        self.notify_participants(
            task_id,
            actor_id,
            "Task cancelled",
            &format!("\"{title}\" was cancelled"),
        )
        .await;
    }

    /// A chat message was posted on a task.
    pub async fn message_created(
        &self,
        task_id: i64,
        message_id: i64,
        sender_id: &str,
        sender_name: &str,
        content: &str,
    ) {
        self.hub.publish(RealtimeEvent::Message {
            task_id,
            message_id,
            sender_id: sender_id.to_string(),
            sender_name: sender_name.to_string(),
            content: content.to_string(),
            sent_at: Utc::now(),
        });
        self.notify_participants(
            task_id,
            sender_id,
            "New message",
            &format!("{sender_name}: {content}"),
        )
        .await;
    }

    /// A review was left. The reviewee is notified directly.
    pub fn review_created(&self, task_id: i64, reviewer_id: &str, reviewee_id: &str, rating: u8) {
        self.hub.publish(RealtimeEvent::ReviewCreated {
            task_id,
            reviewer_id: reviewer_id.to_string(),
            reviewee_id: reviewee_id.to_string(),
            rating,
        });
        self.hub.publish(RealtimeEvent::Notification {
            user_id: reviewee_id.to_string(),
            title: "New review".to_string(),
            body: format!("You received a {rating}-star review"),
            link: Some(format!("/tasks/{task_id}")),
            created_at: Utc::now(),
        });
    }

    /// Someone started or stopped typing in a task chat. Ephemeral;
    /// never turned into a notification.
    pub fn typing(&self, task_id: i64, user_id: &str, is_typing: bool) {
        self.hub.publish(RealtimeEvent::Typing {
            task_id,
            user_id: user_id.to_string(),
            is_typing,
        });
    }

    /// Send a notification to every task participant except `exclude`
    /// (the acting user). Lookup failures are logged and swallowed.
    async fn notify_participants(&self, task_id: i64, exclude: &str, title: &str, body: &str) {
        let participants = match self.directory.task_participants(task_id).await {
            Ok(participants) => participants,
            Err(err) => {
                warn!("Skipping notifications for task {task_id}: {err:?}");
                return;
            }
        };
        for user_id in participants {
            if user_id == exclude {
                continue;
            }
            self.hub.publish(RealtimeEvent::Notification {
                user_id,
                title: title.to_string(),
                body: body.to_string(),
                link: Some(format!("/tasks/{task_id}")),
                created_at: Utc::now(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryDirectory;
    use async_trait::async_trait;

    fn notifier_with(directory: Arc<dyn ParticipantDirectory>) -> (Arc<RealtimeHub>, Notifier) {
        let hub = RealtimeHub::new();
        (hub.clone(), Notifier::new(hub, directory))
    }

    #[tokio::test]
    async fn test_accept_notifies_other_participants_only() {
        let directory = Arc::new(InMemoryDirectory::new());
        directory.set_participants(42, vec!["usr_poster".into(), "usr_helper".into()]);
        let (hub, notifier) = notifier_with(directory);
        let mut rx = hub.subscribe();

        notifier
            .task_accepted(42, "Move a couch", "usr_helper", "Sam")
            .await;

        assert!(matches!(
            *rx.recv().await.unwrap(),
            RealtimeEvent::TaskAccepted { task_id: 42, .. }
        ));
        match &*rx.recv().await.unwrap() {
            RealtimeEvent::Notification { user_id, body, .. } => {
                assert_eq!(user_id, "usr_poster");
                assert!(body.contains("Sam"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_directory_failure_is_swallowed() {
        struct BrokenDirectory;

        #[async_trait]
        impl ParticipantDirectory for BrokenDirectory {
            async fn task_participants(&self, _task_id: i64) -> anyhow::Result<Vec<String>> {
                anyhow::bail!("database unavailable")
            }
        }

        let (hub, notifier) = notifier_with(Arc::new(BrokenDirectory));
        let mut rx = hub.subscribe();

        // Must not panic or error; the lifecycle event still goes out.
        notifier.task_completed(42, "Move a couch", "usr_1").await;

        assert!(matches!(
            *rx.recv().await.unwrap(),
            RealtimeEvent::TaskCompleted { task_id: 42, .. }
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_review_notifies_reviewee() {
        let (hub, notifier) = notifier_with(Arc::new(InMemoryDirectory::new()));
        let mut rx = hub.subscribe();

        notifier.review_created(42, "usr_1", "usr_2", 5);

        assert!(matches!(
            *rx.recv().await.unwrap(),
            RealtimeEvent::ReviewCreated { rating: 5, .. }
        ));
        match &*rx.recv().await.unwrap() {
            RealtimeEvent::Notification { user_id, .. } => assert_eq!(user_id, "usr_2"),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
