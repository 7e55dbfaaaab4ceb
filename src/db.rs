use crate::model::{Event, EventStore, StoreError, StoredEvent};
use async_trait::async_trait;
use redis::{AsyncCommands, Client as RedisClient, Script};
use tracing::info;

/// Redis key namespace
mod keys {
    pub const EVENT_PREFIX: &str = "event:";
}

/// Compare-and-swap on the envelope version, executed atomically
/// server-side. Returns 1 when the document was replaced, 0 when it is
/// missing or its version moved.
const CAS_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if not current then
    return 0
end
if cjson.decode(current)['version'] ~= tonumber(ARGV[1]) then
    return 0
end
redis.call('SET', KEYS[1], ARGV[2])
return 1
"#;

/// Direct Redis store implementation. Events are stored as one JSON
/// envelope per key; records are never expired.
pub struct RedisStore {
    client: RedisClient,
    cas: Script,
}

impl RedisStore {
    /// Create a new Redis store from a connection URL
    pub fn new(redis_url: &str) -> Result<Self, StoreError> {
        info!("Connecting to Redis at {}", redis_url);

        let client = RedisClient::open(redis_url)
            .map_err(|e| StoreError::Connection(format!("Failed to create Redis client: {e}")))?;

        Ok(Self {
            client,
            cas: Script::new(CAS_SCRIPT),
        })
    }

    /// Get a Redis connection from the client
    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, StoreError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to connect to Redis: {e}")))
    }

    fn document_key(key: &str) -> String {
        format!("{}{}", keys::EVENT_PREFIX, key)
    }

    fn to_json(stored: &StoredEvent) -> Result<String, StoreError> {
        serde_json::to_string(stored)
            .map_err(|e| StoreError::Serialization(format!("JSON serialization error: {e}")))
    }
}

#[async_trait]
impl EventStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<StoredEvent>, StoreError> {
        let mut conn = self.connection().await?;

        let raw: Option<String> = conn
            .get(Self::document_key(key))
            .await
            .map_err(|e| StoreError::Connection(format!("Redis GET error: {e}")))?;

        match raw {
            None => Ok(None),
            Some(json) => {
                let stored: StoredEvent = serde_json::from_str(&json)
                    .map_err(|e| StoreError::Serialization(format!("JSON parse error: {e}")))?;
                Ok(Some(stored))
            }
        }
    }

    async fn put(&self, key: &str, event: &Event) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;

        let json = Self::to_json(&StoredEvent {
            version: 1,
            event: event.clone(),
        })?;

        conn.set::<_, _, ()>(Self::document_key(key), &json)
            .await
            .map_err(|e| StoreError::Connection(format!("Redis SET error: {e}")))?;

        info!("Stored event at key {}", key);
        Ok(())
    }

    async fn put_versioned(
        &self,
        key: &str,
        event: &Event,
        expected: u64,
    ) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;

        let json = Self::to_json(&StoredEvent {
            version: expected + 1,
            event: event.clone(),
        })?;

        let swapped: i64 = self
            .cas
            .key(Self::document_key(key))
            .arg(expected)
            .arg(&json)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StoreError::Connection(format!("Redis EVAL error: {e}")))?;

        if swapped == 0 {
            return Err(StoreError::VersionConflict);
        }
        Ok(())
    }
}
