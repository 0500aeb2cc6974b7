use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::MessageId;

/// Who (or what) produced a transcript entry.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    User,
    Assistant,
    Prediction,
    TestResult,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Prediction => "prediction",
            Self::TestResult => "test-result",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub kind: MessageKind,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// --- Convenience constructors ---

impl Message {
    fn new(kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            kind,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageKind::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Assistant, content)
    }

    pub fn prediction(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Prediction, content)
    }

    pub fn test_result(content: impl Into<String>) -> Self {
        Self::new(MessageKind::TestResult, content)
    }
}

/// Append-only conversation history. Entries are never edited or removed
/// individually; the only shrinking operation is a full [`Transcript::clear`]
/// as part of a session reset.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Transcript {
    entries: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: Message) {
        self.entries.push(message);
    }

    pub fn entries(&self) -> &[Message] {
        &self.entries
    }

    /// Entries appended at or after index `ix`, for incremental rendering.
    pub fn since(&self, ix: usize) -> &[Message] {
        &self.entries[ix.min(self.entries.len())..]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.entries.last()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags() {
        assert_eq!(serde_json::to_string(&MessageKind::User).unwrap(), r#""user""#);
        assert_eq!(serde_json::to_string(&MessageKind::Assistant).unwrap(), r#""assistant""#);
        assert_eq!(serde_json::to_string(&MessageKind::Prediction).unwrap(), r#""prediction""#);
        assert_eq!(serde_json::to_string(&MessageKind::TestResult).unwrap(), r#""test-result""#);
    }

    #[test]
    fn constructors_set_kind() {
        assert_eq!(Message::user("hi").kind, MessageKind::User);
        assert_eq!(Message::assistant("hello").kind, MessageKind::Assistant);
        assert_eq!(Message::prediction("Flu").kind, MessageKind::Prediction);
        assert_eq!(Message::test_result("done").kind, MessageKind::TestResult);
    }

    #[test]
    fn serde_roundtrip() {
        let msg = Message::prediction("Final Prediction: Flu");
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, msg.id);
        assert_eq!(parsed.kind, MessageKind::Prediction);
        assert_eq!(parsed.content, msg.content);
    }

    #[test]
    fn transcript_grows_monotonically() {
        let mut t = Transcript::new();
        assert!(t.is_empty());
        t.append(Message::user("fever"));
        t.append(Message::assistant("noted"));
        assert_eq!(t.len(), 2);
        assert_eq!(t.entries()[0].kind, MessageKind::User);
        assert_eq!(t.entries()[1].kind, MessageKind::Assistant);
    }

    #[test]
    fn since_returns_tail() {
        let mut t = Transcript::new();
        t.append(Message::user("a"));
        t.append(Message::user("b"));
        t.append(Message::user("c"));
        let tail = t.since(1);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].content, "b");
        assert!(t.since(10).is_empty());
    }

    #[test]
    fn clear_empties_transcript() {
        let mut t = Transcript::new();
        t.append(Message::user("a"));
        t.clear();
        assert!(t.is_empty());
        assert!(t.last().is_none());
    }
}
