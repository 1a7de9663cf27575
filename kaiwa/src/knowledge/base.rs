//! A named, domain-tagged knowledge base.

use std::sync::Arc;

use super::errors::KnowledgeError;
use super::storage::{KnowledgeStorage, ScoredDocument, SearchOptions};

/// Binds a storage backend to a name, description, and domain tags.
///
/// Domains are free-form string tags used by the knowledge tool to select
/// bases per query.
#[derive(Clone)]
pub struct KnowledgeBase {
    name: String,
    description: String,
    domains: Vec<String>,
    storage: Arc<dyn KnowledgeStorage>,
}

impl std::fmt::Debug for KnowledgeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeBase")
            .field("name", &self.name)
            .field("domains", &self.domains)
            .finish_non_exhaustive()
    }
}

impl KnowledgeBase {
    /// Create a base over the given storage.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        domains: Vec<String>,
        storage: Arc<dyn KnowledgeStorage>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            domains,
            storage,
        }
    }

    /// The base's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The base's description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The declared domain tags.
    #[must_use]
    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    /// The underlying storage.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn KnowledgeStorage> {
        &self.storage
    }

    /// Similarity search against this base.
    ///
    /// # Errors
    ///
    /// Propagates storage and embedding failures.
    pub async fn search(
        &self,
        query: &str,
        options: SearchOptions,
    ) -> Result<Vec<ScoredDocument>, KnowledgeError> {
        self.storage.search(query, options).await
    }
}
