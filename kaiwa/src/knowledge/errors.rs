//! Knowledge subsystem errors.

use crate::error::ErrorCode;

/// Errors produced by knowledge bases and the knowledge tool.
#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    /// Base selection matched no registered base.
    #[error("no knowledge base found: {0}")]
    NoBaseFound(String),

    /// Embedding generation failed.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The backing store failed.
    #[error("knowledge storage failed: {0}")]
    Storage(String),
}

impl KnowledgeError {
    /// Stable identity of this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NoBaseFound(_) => ErrorCode::NO_KNOWLEDGE_BASE_FOUND,
            Self::Embedding(_) => ErrorCode::EMBEDDING_FAILED,
            Self::Storage(_) => ErrorCode::STORAGE,
        }
    }
}
