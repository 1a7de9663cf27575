//! The knowledge storage trait and search types.

use async_trait::async_trait;

use super::document::Document;
use super::errors::KnowledgeError;

/// Options for a similarity search.
#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    /// Maximum number of results to return.
    pub max_results: usize,
    /// Minimum similarity score in `[0, 1]`; results below are dropped.
    pub score_threshold: f32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_results: 10,
            score_threshold: 0.0,
        }
    }
}

/// A document paired with its similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    /// The matched document.
    pub document: Document,
    /// Similarity to the query, higher is closer.
    pub score: f32,
}

/// A queryable store of documents.
#[async_trait]
pub trait KnowledgeStorage: Send + Sync {
    /// Insert a document.
    async fn add(&self, doc: Document) -> Result<(), KnowledgeError>;

    /// Replace the document with the given id.
    async fn update(&self, id: &str, doc: Document) -> Result<(), KnowledgeError>;

    /// Look up a document by id.
    async fn get(&self, id: &str) -> Result<Option<Document>, KnowledgeError>;

    /// Remove a document by id. Unknown ids are ignored.
    async fn delete(&self, id: &str) -> Result<(), KnowledgeError>;

    /// Similarity search, ranked best-first.
    async fn search(
        &self,
        query: &str,
        options: SearchOptions,
    ) -> Result<Vec<ScoredDocument>, KnowledgeError>;
}
