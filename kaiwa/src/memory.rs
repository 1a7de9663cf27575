//! Append-only conversation memory.
//!
//! A [`Memory`] stores [`MemoryItem`]s (usually chat messages, sometimes
//! arbitrary typed content) in insertion order. The shipped
//! [`InMemoryMemory`] lives with its owning agent context; persistence
//! across restarts is a backend concern, not a core one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;

use crate::message::Message;

/// Errors produced by memory backends.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// The backing store failed.
    #[error("memory storage failed: {0}")]
    Storage(String),
}

/// Content held by one memory item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MemoryContent {
    /// A chat message (the common case).
    Message(Message),
    /// Arbitrary typed content.
    Value(Value),
}

/// One entry in a memory: unique id, monotonic creation time, content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryItem {
    /// Unique identifier within the memory.
    pub id: String,
    /// Creation timestamp; monotonic in insertion order.
    pub created_at: DateTime<Utc>,
    /// The wrapped content.
    pub content: MemoryContent,
}

impl MemoryItem {
    fn new(content: MemoryContent) -> Self {
        Self {
            id: format!("mem:{}", uuid::Uuid::new_v4().simple()),
            created_at: Utc::now(),
            content,
        }
    }

    /// Wrap a chat message.
    #[must_use]
    pub fn from_message(message: Message) -> Self {
        Self::new(MemoryContent::Message(message))
    }

    /// Wrap arbitrary content.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        Self::new(MemoryContent::Value(value))
    }

    /// The wrapped message, when this item holds one.
    #[must_use]
    pub fn as_message(&self) -> Option<&Message> {
        match &self.content {
            MemoryContent::Message(message) => Some(message),
            MemoryContent::Value(_) => None,
        }
    }
}

/// Append-only item log with limited retrieval.
#[async_trait]
pub trait Memory: Send + Sync {
    /// Append one item. Fails only on storage errors.
    async fn append(&self, item: MemoryItem) -> Result<(), MemoryError>;

    /// Retrieve items in insertion order. A negative `limit` returns all,
    /// zero returns none, otherwise at most `limit` items from the front.
    async fn retrieve(&self, limit: i64) -> Result<Vec<MemoryItem>, MemoryError>;

    /// Drop every item.
    async fn reset(&self) -> Result<(), MemoryError>;
}

/// In-process memory backed by a mutex-guarded vector.
#[derive(Debug, Default)]
pub struct InMemoryMemory {
    items: Mutex<Vec<MemoryItem>>,
}

impl InMemoryMemory {
    /// Create an empty memory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().map(|items| items.len()).unwrap_or(0)
    }

    /// True when no items are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Memory for InMemoryMemory {
    async fn append(&self, item: MemoryItem) -> Result<(), MemoryError> {
        let mut items = self
            .items
            .lock()
            .map_err(|e| MemoryError::Storage(e.to_string()))?;
        items.push(item);
        Ok(())
    }

    async fn retrieve(&self, limit: i64) -> Result<Vec<MemoryItem>, MemoryError> {
        let items = self
            .items
            .lock()
            .map_err(|e| MemoryError::Storage(e.to_string()))?;
        if limit < 0 {
            return Ok(items.clone());
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let take = (limit as usize).min(items.len());
        Ok(items[..take].to_vec())
    }

    async fn reset(&self) -> Result<(), MemoryError> {
        let mut items = self
            .items
            .lock()
            .map_err(|e| MemoryError::Storage(e.to_string()))?;
        items.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[test]
    fn test_round_trip_preserves_message() {
        tokio_test::block_on(async {
            let memory = InMemoryMemory::new();
            let message = Message::user("ping");
            memory
                .append(MemoryItem::from_message(message.clone()))
                .await
                .unwrap();

            let items = memory.retrieve(-1).await.unwrap();
            assert_eq!(items.len(), 1);
            assert_eq!(items[0].as_message(), Some(&message));
        });
    }

    #[tokio::test]
    async fn test_retrieve_limit_semantics() {
        let memory = InMemoryMemory::new();
        for n in 0..5 {
            memory
                .append(MemoryItem::from_value(serde_json::json!(n)))
                .await
                .unwrap();
        }

        assert_eq!(memory.retrieve(-1).await.unwrap().len(), 5);
        assert_eq!(memory.retrieve(0).await.unwrap().len(), 0);
        assert_eq!(memory.retrieve(3).await.unwrap().len(), 3);
        assert_eq!(memory.retrieve(99).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_retrieve_preserves_insertion_order() {
        let memory = InMemoryMemory::new();
        for n in 0..4 {
            memory
                .append(MemoryItem::from_value(serde_json::json!(n)))
                .await
                .unwrap();
        }
        let items = memory.retrieve(2).await.unwrap();
        let values: Vec<_> = items
            .iter()
            .map(|i| match &i.content {
                MemoryContent::Value(v) => v.as_i64().unwrap(),
                MemoryContent::Message(_) => panic!("expected value"),
            })
            .collect();
        assert_eq!(values, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let memory = InMemoryMemory::new();
        memory
            .append(MemoryItem::from_message(Message::user("x")))
            .await
            .unwrap();
        memory.reset().await.unwrap();
        assert!(memory.retrieve(-1).await.unwrap().is_empty());
        assert!(memory.is_empty());
    }
}
