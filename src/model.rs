use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// Identifiers that collide with route segments and can never name an event
pub const RESERVED_IDS: [&str; 1] = ["events"];

/// Check whether an id value would shadow a route segment
pub fn is_reserved(id: &str) -> bool {
    RESERVED_IDS.contains(&id)
}

/// A single event record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub start: String,
    pub end: String,
    pub poc: String,
    #[serde(default)]
    pub attendees: Vec<String>,
}

/// Creation form fields. Absent fields deserialize as empty strings, so a
/// missing field and an empty one are rejected the same way.
#[derive(Debug, Default, Deserialize)]
pub struct EventForm {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub end: String,
    #[serde(default)]
    pub poc: String,
}

impl EventForm {
    /// Names of required fields that are empty. `id` is optional and not
    /// part of this check.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.title.is_empty() {
            missing.push("title");
        }
        if self.description.is_empty() {
            missing.push("description");
        }
        if self.location.is_empty() {
            missing.push("location");
        }
        if self.start.is_empty() {
            missing.push("start");
        }
        if self.end.is_empty() {
            missing.push("end");
        }
        if self.poc.is_empty() {
            missing.push("poc");
        }
        missing
    }

    /// Build the event record, with no attendees yet
    pub fn into_event(self) -> Event {
        Event {
            id: self.id,
            title: self.title,
            description: self.description,
            location: self.location,
            start: self.start,
            end: self.end,
            poc: self.poc,
            attendees: Vec::new(),
        }
    }
}

/// Attendee form. An absent name comes through as an empty string and is
/// appended as-is; names are not validated.
#[derive(Debug, Deserialize)]
pub struct AttendeeForm {
    #[serde(default)]
    pub attendee: String,
}

/// Magic prefix of the encoded form of a generated key. Decoding a path
/// segment requires this prefix, so arbitrary base64-looking literals
/// still classify as literal ids.
const ENCODED_KEY_MAGIC: &[u8; 4] = b"EVK1";

/// An event identifier as it appears in a URL path segment. Generated
/// keys travel in an opaque encoded form; anything else is a literal
/// caller-chosen id. Both address the store uniformly via `store_key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    /// A store-generated key, recovered from its encoded form
    Encoded(Uuid),
    /// A caller-chosen literal id
    Literal(String),
}

impl Identifier {
    /// Classify a path segment. A segment is an encoded key iff it is
    /// url-safe unpadded base64 of the magic prefix followed by the 16
    /// raw bytes of a UUID; any decode failure means a literal id.
    pub fn parse(segment: &str) -> Self {
        if let Ok(bytes) = URL_SAFE_NO_PAD.decode(segment) {
            if bytes.len() == 20 && &bytes[..4] == ENCODED_KEY_MAGIC {
                if let Ok(key) = Uuid::from_slice(&bytes[4..]) {
                    return Identifier::Encoded(key);
                }
            }
        }
        Identifier::Literal(segment.to_string())
    }

    /// The encoded form of a generated key, for use in canonical URLs
    pub fn encode(key: &Uuid) -> String {
        let mut bytes = Vec::with_capacity(20);
        bytes.extend_from_slice(ENCODED_KEY_MAGIC);
        bytes.extend_from_slice(key.as_bytes());
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// The string key this identifier addresses in the store
    pub fn store_key(&self) -> String {
        match self {
            Identifier::Encoded(key) => key.to_string(),
            Identifier::Literal(id) => id.clone(),
        }
    }
}

/// Store envelope: the event plus its write version. The version starts
/// at 1 and moves on every conditional write; it never leaves the store
/// layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    pub version: u64,
    pub event: Event,
}

/// Errors from the document store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store connection error: {0}")]
    Connection(String),
    #[error("document serialization error: {0}")]
    Serialization(String),
    /// The stored version moved between read and write
    #[error("version conflict")]
    VersionConflict,
}

/// Document store trait for event records
#[async_trait]
pub trait EventStore: Send + Sync + 'static {
    /// Fetch the document at `key`, or None if absent
    async fn get(&self, key: &str) -> Result<Option<StoredEvent>, StoreError>;

    /// Store `event` at `key` as a fresh version-1 document
    async fn put(&self, key: &str, event: &Event) -> Result<(), StoreError>;

    /// Replace the document at `key` only if its stored version still
    /// equals `expected`. A missing document also counts as a conflict.
    async fn put_versioned(
        &self,
        key: &str,
        event: &Event,
        expected: u64,
    ) -> Result<(), StoreError>;
}

/// In-memory implementation of the store (for testing, and as a startup
/// fallback when Redis is unreachable)
#[derive(Debug, Default)]
pub struct InMemoryStore {
    events: tokio::sync::RwLock<HashMap<String, StoredEvent>>,
}

#[async_trait]
impl EventStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<StoredEvent>, StoreError> {
        let events = self.events.read().await;
        Ok(events.get(key).cloned())
    }

    async fn put(&self, key: &str, event: &Event) -> Result<(), StoreError> {
        let mut events = self.events.write().await;
        events.insert(
            key.to_string(),
            StoredEvent {
                version: 1,
                event: event.clone(),
            },
        );
        Ok(())
    }

    async fn put_versioned(
        &self,
        key: &str,
        event: &Event,
        expected: u64,
    ) -> Result<(), StoreError> {
        let mut events = self.events.write().await;
        match events.get(key) {
            Some(current) if current.version == expected => {
                events.insert(
                    key.to_string(),
                    StoredEvent {
                        version: expected + 1,
                        event: event.clone(),
                    },
                );
                Ok(())
            }
            _ => Err(StoreError::VersionConflict),
        }
    }
}
