//! Chat turns and the ordered transcript of a session.

use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};

/// Who wrote a turn. System prompts are not transcript turns; they are added per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single immutable turn in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub session_id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Append-only, timestamp-ordered list of messages.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from stored rows; rows may arrive in any order. Ties keep their input order.
    pub fn from_history(mut messages: Vec<Message>) -> Self {
        messages.sort_by_key(|m| m.timestamp);
        Self { messages }
    }

    /// Append a new turn stamped after every existing one.
    pub fn push(
        &mut self,
        session_id: impl Into<String>,
        role: Role,
        content: impl Into<String>,
    ) -> Message {
        let message = Message {
            session_id: session_id.into(),
            role,
            content: content.into(),
            timestamp: self.next_timestamp(),
        };
        self.messages.push(message.clone());
        message
    }

    /// Current time at microsecond precision, bumped past the last message if the clock lags.
    fn next_timestamp(&self) -> DateTime<Utc> {
        let step = Duration::microseconds(1);
        let now = Utc::now();
        let now = now.duration_trunc(step).unwrap_or(now);
        match self.messages.last() {
            Some(last) if now <= last.timestamp => last.timestamp + step,
            _ => now,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64, role: Role, content: &str) -> Message {
        Message {
            session_id: "s".to_string(),
            role,
            content: content.to_string(),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn from_history_sorts_by_timestamp() {
        let t = Transcript::from_history(vec![
            at(30, Role::Assistant, "c"),
            at(10, Role::User, "a"),
            at(20, Role::Assistant, "b"),
        ]);
        let contents: Vec<&str> = t.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["a", "b", "c"]);
    }

    #[test]
    fn push_is_strictly_increasing() {
        let mut t = Transcript::new();
        for i in 0..50 {
            t.push("s", Role::User, format!("m{i}"));
        }
        for pair in t.messages().windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
        }
    }

    #[test]
    fn push_after_future_history_stays_ordered() {
        let future = Utc::now() + Duration::hours(1);
        let mut t = Transcript::from_history(vec![Message {
            session_id: "s".to_string(),
            role: Role::User,
            content: "later".to_string(),
            timestamp: future,
        }]);
        let m = t.push("s", Role::Assistant, "next");
        assert!(m.timestamp > future);
        assert_eq!(t.len(), 2);
        assert_eq!(t.last().map(|m| m.content.as_str()), Some("next"));
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
        assert!(serde_json::from_str::<Role>("\"system\"").is_err());
    }
}
