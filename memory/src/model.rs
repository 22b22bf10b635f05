//! Core data types: memories, their vector-index payloads, and history turns.

use engram_core::embedding::Embedding;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

/// Provenance of a stored fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemorySource {
    /// Extracted from the user's side of the conversation.
    UserMessage,
    /// Extracted from the assistant's side of the conversation.
    AssistantMessage,
    /// Derived from the exchange as a whole.
    Conversation,
}

impl MemorySource {
    /// The wire representation of this source tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UserMessage => "user_message",
            Self::AssistantMessage => "assistant_message",
            Self::Conversation => "conversation",
        }
    }
}

/// A single long-term memory.
///
/// `memory_id` is assigned at creation and never changes for the lifetime of
/// the row; when a candidate updates an existing memory, the candidate's
/// transient id is discarded and the target id is reused. The embedding field
/// is a debugging cache only — the authoritative vector lives in the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    /// Globally unique identifier, shared between the metadata store and the
    /// vector index.
    pub memory_id: String,
    /// Where the fact came from.
    pub source: MemorySource,
    /// The atomic factual statement.
    pub content: String,
    /// Free-form category label ("preference", "fact", ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Creation or last update time, UTC.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Opaque scope key; retrieval and reconciliation are partitioned by it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Cached embedding for debugging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Embedding>,
}

impl Memory {
    /// Creates a memory with a fresh id and the current timestamp.
    #[must_use]
    pub fn new(source: MemorySource, content: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            memory_id: Uuid::new_v4().to_string(),
            source,
            content: content.into(),
            kind: kind.into(),
            timestamp: OffsetDateTime::now_utc(),
            user_id: None,
            embedding: None,
        }
    }

    /// Scopes this memory to a user.
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// The payload projection stored alongside this memory's vector.
    #[must_use]
    pub fn payload(&self) -> MemoryPayload {
        MemoryPayload {
            memory_id: self.memory_id.clone(),
            content: self.content.clone(),
            kind: self.kind.clone(),
            source: self.source,
            timestamp: self.timestamp,
            user_id: self.user_id.clone(),
        }
    }
}

/// Metadata carried alongside a vector in the index.
///
/// A superset of the identifying fields of [`Memory`], sufficient for the
/// reconciler to judge overlap without reading the metadata store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryPayload {
    /// Identifier shared with the metadata row.
    pub memory_id: String,
    /// The factual statement.
    pub content: String,
    /// Category label.
    #[serde(rename = "type")]
    pub kind: String,
    /// Provenance tag.
    pub source: MemorySource,
    /// RFC 3339 on the wire.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Scope key, if any.
    #[serde(default)]
    pub user_id: Option<String>,
}

impl MemoryPayload {
    /// Equality check of one payload field against a filter value.
    ///
    /// Unknown keys never match. The `type` key is handled (stripped) by the
    /// index before this is consulted.
    pub(crate) fn field_matches(&self, key: &str, value: &str) -> bool {
        match key {
            "memory_id" => self.memory_id == value,
            "content" => self.content == value,
            "type" => self.kind == value,
            "source" => self.source.as_str() == value,
            "user_id" => self.user_id.as_deref() == Some(value),
            "timestamp" => self
                .timestamp
                .format(&Rfc3339)
                .is_ok_and(|rendered| rendered == value),
            _ => false,
        }
    }
}

/// One user/assistant exchange from the recent history window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// What the user said.
    pub user: String,
    /// What the assistant replied.
    pub assistant: String,
}

impl Turn {
    /// Creates a turn from the two sides of an exchange.
    #[must_use]
    pub fn new(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            assistant: assistant.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_memories_get_distinct_ids() {
        let first = Memory::new(MemorySource::UserMessage, "User is vegetarian", "preference");
        let second = Memory::new(MemorySource::UserMessage, "User is vegetarian", "preference");
        assert_ne!(first.memory_id, second.memory_id);
    }

    #[test]
    fn kind_serializes_as_type() {
        let memory = Memory::new(MemorySource::UserMessage, "Lives in Delhi", "location");
        let json = serde_json::to_value(&memory).unwrap();
        assert_eq!(json["type"], "location");
        assert!(json.get("kind").is_none());
        assert_eq!(json["source"], "user_message");
    }

    #[test]
    fn payload_carries_identifying_fields() {
        let memory = Memory::new(MemorySource::Conversation, "Prefers tea", "preference")
            .with_user_id("alice");
        let payload = memory.payload();

        assert_eq!(payload.memory_id, memory.memory_id);
        assert_eq!(payload.content, "Prefers tea");
        assert_eq!(payload.user_id.as_deref(), Some("alice"));

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "preference");
        assert!(json["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn payload_field_matching() {
        let payload = Memory::new(MemorySource::UserMessage, "Prefers tea", "preference")
            .with_user_id("alice")
            .payload();

        assert!(payload.field_matches("user_id", "alice"));
        assert!(!payload.field_matches("user_id", "bob"));
        assert!(payload.field_matches("source", "user_message"));
        assert!(!payload.field_matches("favorite_color", "green"));
    }

    #[test]
    fn source_round_trips_through_serde() {
        for source in [
            MemorySource::UserMessage,
            MemorySource::AssistantMessage,
            MemorySource::Conversation,
        ] {
            let json = serde_json::to_string(&source).unwrap();
            assert_eq!(json, format!("\"{}\"", source.as_str()));
            let parsed: MemorySource = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, source);
        }
    }
}
