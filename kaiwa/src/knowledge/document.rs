//! The knowledge document model.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A document stored in a knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier within a storage.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// The document text.
    pub content: String,
    /// Arbitrary metadata.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Embedding vector, when already computed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Document {
    /// Create a document with a freshly minted id and no embedding.
    #[must_use]
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: format!("doc:{}", uuid::Uuid::new_v4().simple()),
            name: name.into(),
            content: content.into(),
            metadata: Map::new(),
            embedding: None,
        }
    }

    /// Replace the minted id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Attach a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Attach a precomputed embedding.
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}
