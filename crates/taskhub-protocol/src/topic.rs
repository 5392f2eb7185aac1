//! Fan-out routing keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A routing key grouping connections for fan-out.
///
/// Task-scoped streams (chat, typing, lifecycle updates for one task)
/// share a `Task` topic; per-user notification streams get a `User`
/// topic. Topics are derived from the connections present in the
/// registry, never stored on their own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Topic {
    /// All connections watching one task.
    Task(i64),
    /// All connections belonging to one user (notifications).
    User(String),
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Task(id) => write!(f, "task:{id}"),
            Topic::User(id) => write!(f, "user:{id}"),
        }
    }
}

/// Error returned when a topic string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTopicError(pub String);

impl fmt::Display for ParseTopicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid topic: {}", self.0)
    }
}

impl std::error::Error for ParseTopicError {}

impl FromStr for Topic {
    type Err = ParseTopicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("task", id)) => id
                .parse::<i64>()
                .map(Topic::Task)
                .map_err(|_| ParseTopicError(s.to_string())),
            Some(("user", id)) if !id.is_empty() => Ok(Topic::User(id.to_string())),
            _ => Err(ParseTopicError(s.to_string())),
        }
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.to_string()
    }
}

impl TryFrom<String> for Topic {
    type Error = ParseTopicError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_display_roundtrip() {
        let task = Topic::Task(42);
        assert_eq!(task.to_string(), "task:42");
        assert_eq!("task:42".parse::<Topic>().unwrap(), task);

        let user = Topic::User("usr_7".to_string());
        assert_eq!(user.to_string(), "user:usr_7");
        assert_eq!("user:usr_7".parse::<Topic>().unwrap(), user);
    }

    #[test]
    fn test_topic_parse_rejects_garbage() {
        assert!("task:abc".parse::<Topic>().is_err());
        assert!("user:".parse::<Topic>().is_err());
        assert!("42".parse::<Topic>().is_err());
    }
}
