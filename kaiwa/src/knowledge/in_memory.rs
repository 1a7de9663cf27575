//! In-process knowledge storage with cosine-similarity search.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::document::Document;
use super::embedder::Embedder;
use super::errors::KnowledgeError;
use super::storage::{KnowledgeStorage, ScoredDocument, SearchOptions};

/// The reference storage backend: documents in a vector, embeddings computed
/// on insert when absent, cosine similarity on search.
pub struct InMemoryKnowledgeStorage {
    embedder: Arc<dyn Embedder>,
    docs: RwLock<Vec<Document>>,
}

impl std::fmt::Debug for InMemoryKnowledgeStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryKnowledgeStorage").finish_non_exhaustive()
    }
}

impl InMemoryKnowledgeStorage {
    /// Create an empty storage over the given embedder.
    #[must_use]
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            docs: RwLock::new(Vec::new()),
        }
    }

    async fn ensure_embedding(&self, doc: &mut Document) -> Result<(), KnowledgeError> {
        if doc.embedding.is_none() {
            let vectors = self.embedder.embed(std::slice::from_ref(&doc.content)).await?;
            doc.embedding = vectors.into_iter().next();
        }
        Ok(())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl KnowledgeStorage for InMemoryKnowledgeStorage {
    async fn add(&self, mut doc: Document) -> Result<(), KnowledgeError> {
        self.ensure_embedding(&mut doc).await?;
        self.docs.write().await.push(doc);
        Ok(())
    }

    async fn update(&self, id: &str, mut doc: Document) -> Result<(), KnowledgeError> {
        self.ensure_embedding(&mut doc).await?;
        let mut docs = self.docs.write().await;
        let Some(slot) = docs.iter_mut().find(|d| d.id == id) else {
            return Err(KnowledgeError::Storage(format!("document '{id}' not found")));
        };
        *slot = doc;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Document>, KnowledgeError> {
        Ok(self.docs.read().await.iter().find(|d| d.id == id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<(), KnowledgeError> {
        self.docs.write().await.retain(|d| d.id != id);
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        options: SearchOptions,
    ) -> Result<Vec<ScoredDocument>, KnowledgeError> {
        let query_vec = self
            .embedder
            .embed(std::slice::from_ref(&query.to_string()))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| KnowledgeError::Embedding("empty embedding response".to_string()))?;

        let docs = self.docs.read().await;
        let mut scored: Vec<ScoredDocument> = docs
            .iter()
            .filter_map(|doc| {
                let embedding = doc.embedding.as_ref()?;
                let score = cosine_similarity(&query_vec, embedding);
                (score >= options.score_threshold).then(|| ScoredDocument {
                    document: doc.clone(),
                    score,
                })
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(options.max_results);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Maps a handful of known words onto fixed unit vectors.
    struct WordEmbedder;

    #[async_trait]
    impl Embedder for WordEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, KnowledgeError> {
            Ok(texts
                .iter()
                .map(|t| match t.as_str() {
                    s if s.contains("entropy") => vec![1.0, 0.0, 0.0],
                    s if s.contains("thermodynamics") => vec![0.9, 0.1, 0.0],
                    s if s.contains("gravity") => vec![0.0, 1.0, 0.0],
                    _ => vec![0.0, 0.0, 1.0],
                })
                .collect())
        }
    }

    fn storage() -> InMemoryKnowledgeStorage {
        InMemoryKnowledgeStorage::new(Arc::new(WordEmbedder))
    }

    #[tokio::test]
    async fn test_add_get_delete() {
        let store = storage();
        let doc = Document::new("a", "entropy basics").with_id("d1");
        store.add(doc.clone()).await.unwrap();

        let fetched = store.get("d1").await.unwrap().unwrap();
        assert_eq!(fetched.name, "a");
        assert!(fetched.embedding.is_some(), "embedding computed on insert");

        store.delete("d1").await.unwrap();
        assert!(store.get("d1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_replaces_by_id() {
        let store = storage();
        store.add(Document::new("a", "entropy").with_id("d1")).await.unwrap();
        store
            .update("d1", Document::new("b", "gravity").with_id("d1"))
            .await
            .unwrap();
        assert_eq!(store.get("d1").await.unwrap().unwrap().name, "b");

        let missing = store.update("nope", Document::new("c", "x")).await;
        assert!(matches!(missing, Err(KnowledgeError::Storage(_))));
    }

    #[tokio::test]
    async fn test_search_ranks_and_filters() {
        let store = storage();
        store
            .add(Document::new("thermo", "thermodynamics and heat").with_id("d1"))
            .await
            .unwrap();
        store
            .add(Document::new("grav", "gravity wells").with_id("d2"))
            .await
            .unwrap();
        store
            .add(Document::new("misc", "unrelated").with_id("d3"))
            .await
            .unwrap();

        let results = store
            .search(
                "entropy",
                SearchOptions {
                    max_results: 10,
                    score_threshold: 0.5,
                },
            )
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.id, "d1");

        let top_all = store.search("entropy", SearchOptions::default()).await.unwrap();
        assert_eq!(top_all[0].document.id, "d1", "best match first");
    }

    #[test]
    fn test_cosine_similarity_guards() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        let sim = cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]);
        assert!((sim - 1.0).abs() < 1e-6);
    }
}
