//! Narrow lookup interface onto the (external) task store.
//!
//! Persistence is not this service's concern. The notify layer only
//! ever needs "who is involved in this task" to address notifications,
//! so that is the whole contract; the marketplace application provides
//! an ORM-backed implementation.

use async_trait::async_trait;
use dashmap::DashMap;

/// Resolves task ids to the user ids that should be notified about
/// them (poster plus accepted helper, typically).
#[async_trait]
pub trait ParticipantDirectory: Send + Sync {
    async fn task_participants(&self, task_id: i64) -> anyhow::Result<Vec<String>>;
}

/// In-memory directory for tests, demos, and single-process embedding.
#[derive(Default)]
pub struct InMemoryDirectory {
    participants: DashMap<i64, Vec<String>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_participants(&self, task_id: i64, users: Vec<String>) {
        self.participants.insert(task_id, users);
    }
}

#[async_trait]
impl ParticipantDirectory for InMemoryDirectory {
    async fn task_participants(&self, task_id: i64) -> anyhow::Result<Vec<String>> {
        Ok(self
            .participants
            .get(&task_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_task_has_no_participants() {
        let directory = InMemoryDirectory::new();
        assert!(directory.task_participants(99).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_and_fetch_participants() {
        let directory = InMemoryDirectory::new();
        directory.set_participants(42, vec!["usr_1".into(), "usr_2".into()]);
        assert_eq!(
            directory.task_participants(42).await.unwrap(),
            vec!["usr_1".to_string(), "usr_2".to_string()]
        );
    }
}
