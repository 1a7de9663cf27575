//! The knowledge tool: N bases behind one tool surface.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::message::{ToolCall, ToolCallResult};
use crate::prompts;
use crate::tool::{Schema, Tool, ToolDescriptor, ToolError};

use super::base::KnowledgeBase;
use super::errors::KnowledgeError;
use super::storage::SearchOptions;

/// The knowledge tool's registry name.
pub const KNOWLEDGE_TOOL_NAME: &str = "knowledge_search";

const DEFAULT_MAX_RESULTS: usize = 10;
const DEFAULT_MAX_BASES: i64 = -1;

/// Presents any number of knowledge bases as a single tool.
///
/// Bases are selected per call by intersecting their declared domains with
/// the requested ones; the selection preserves registration order.
pub struct KnowledgeTool {
    bases: Vec<Arc<KnowledgeBase>>,
}

impl std::fmt::Debug for KnowledgeTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeTool")
            .field("bases", &self.bases.iter().map(|b| b.name()).collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct KnowledgeArgs {
    query: String,
    #[serde(default = "default_max_results")]
    max_results: usize,
    #[serde(default)]
    score_threshold: f32,
    #[serde(default)]
    domains: Vec<String>,
    #[serde(default = "default_max_bases")]
    max_bases: i64,
}

const fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

const fn default_max_bases() -> i64 {
    DEFAULT_MAX_BASES
}

impl KnowledgeTool {
    /// Create the tool over the given bases, in registration order.
    #[must_use]
    pub fn new(bases: Vec<Arc<KnowledgeBase>>) -> Self {
        Self { bases }
    }

    /// Names of the registered bases.
    #[must_use]
    pub fn base_names(&self) -> Vec<&str> {
        self.bases.iter().map(|b| b.name()).collect()
    }

    /// Sorted, deduplicated union of every base's domains.
    #[must_use]
    pub fn all_domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self
            .bases
            .iter()
            .flat_map(|b| b.domains().iter().cloned())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        domains.sort();
        domains
    }

    /// Select bases for a request.
    ///
    /// Empty `domains` selects every base; otherwise a base qualifies when
    /// any of its declared domains intersects the request. Registration
    /// order is preserved, duplicates (by name) are suppressed, and a
    /// non-negative `max_bases` truncates the selection.
    fn select_bases(
        &self,
        domains: &[String],
        max_bases: i64,
    ) -> Result<Vec<Arc<KnowledgeBase>>, KnowledgeError> {
        let wanted: HashSet<&str> = domains.iter().map(String::as_str).collect();
        let mut seen = HashSet::new();
        let mut selected: Vec<Arc<KnowledgeBase>> = self
            .bases
            .iter()
            .filter(|base| {
                wanted.is_empty() || base.domains().iter().any(|d| wanted.contains(d.as_str()))
            })
            .filter(|base| seen.insert(base.name().to_string()))
            .cloned()
            .collect();

        if max_bases >= 0 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let cap = max_bases as usize;
            selected.truncate(cap);
        }

        if selected.is_empty() {
            return Err(KnowledgeError::NoBaseFound(if wanted.is_empty() {
                "no bases registered".to_string()
            } else {
                format!("no base declares any of the domains [{}]", domains.join(", "))
            }));
        }
        Ok(selected)
    }
}

#[async_trait]
impl Tool for KnowledgeTool {
    fn descriptor(&self) -> ToolDescriptor {
        let mut domains_description =
            "Restrict the search to bases declaring at least one of these domains.".to_string();
        let all = self.all_domains();
        if !all.is_empty() {
            domains_description.push_str(&format!(" Available domains: [{}].", all.join(", ")));
        }

        ToolDescriptor::new(
            KNOWLEDGE_TOOL_NAME,
            prompts::builtin::RAG.trim(),
            Schema::object()
                .property("query", Schema::string().describe("The search query."))
                .property(
                    "max_results",
                    Schema::integer().describe("Maximum results per base. Defaults to 10."),
                )
                .property(
                    "score_threshold",
                    Schema::number()
                        .describe("Minimum similarity score in [0, 1]. Defaults to 0."),
                )
                .property("domains", Schema::array(Schema::string()).describe(domains_description))
                .property(
                    "max_bases",
                    Schema::integer()
                        .describe("Maximum number of bases to search; -1 means all. Defaults to -1."),
                )
                .require("query"),
        )
    }

    async fn call(
        &self,
        call: ToolCall,
        _cancel: CancellationToken,
    ) -> Result<ToolCallResult, ToolError> {
        let args: KnowledgeArgs = call
            .parse_arguments()
            .map_err(|e| ToolError::invalid_arguments(KNOWLEDGE_TOOL_NAME, e.to_string()))?;

        let bases = self
            .select_bases(&args.domains, args.max_bases)
            .map_err(|e| ToolError::invoke(KNOWLEDGE_TOOL_NAME, e.to_string()))?;
        debug!(
            query = %args.query,
            bases = bases.len(),
            "searching knowledge bases"
        );

        let options = SearchOptions {
            max_results: args.max_results,
            score_threshold: args.score_threshold,
        };
        let mut items = Vec::new();
        for base in bases {
            let results = base
                .search(&args.query, options)
                .await
                .map_err(|e| ToolError::invoke(KNOWLEDGE_TOOL_NAME, e.to_string()))?;
            for scored in results {
                items.push(serde_json::json!({
                    "id": scored.document.id,
                    "name": scored.document.name,
                    "content": scored.document.content,
                    "metadata": scored.document.metadata,
                }));
            }
        }

        let mut result = Map::new();
        result.insert("count".to_string(), Value::from(items.len()));
        result.insert("items".to_string(), Value::Array(items));
        Ok(ToolCallResult::new(call.id, call.name, result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::knowledge::storage::{KnowledgeStorage, ScoredDocument};
    use crate::knowledge::Document;

    /// Counts searches and returns one canned document.
    struct CountingStorage {
        searches: AtomicUsize,
    }

    impl CountingStorage {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                searches: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl KnowledgeStorage for CountingStorage {
        async fn add(&self, _doc: Document) -> Result<(), KnowledgeError> {
            Ok(())
        }

        async fn update(&self, _id: &str, _doc: Document) -> Result<(), KnowledgeError> {
            Ok(())
        }

        async fn get(&self, _id: &str) -> Result<Option<Document>, KnowledgeError> {
            Ok(None)
        }

        async fn delete(&self, _id: &str) -> Result<(), KnowledgeError> {
            Ok(())
        }

        async fn search(
            &self,
            query: &str,
            _options: SearchOptions,
        ) -> Result<Vec<ScoredDocument>, KnowledgeError> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            Ok(vec![ScoredDocument {
                document: Document::new("hit", format!("about {query}")).with_id("d1"),
                score: 0.9,
            }])
        }
    }

    fn base(name: &str, domains: &[&str], storage: Arc<CountingStorage>) -> Arc<KnowledgeBase> {
        Arc::new(KnowledgeBase::new(
            name,
            format!("{name} base"),
            domains.iter().map(ToString::to_string).collect(),
            storage,
        ))
    }

    fn call_with(args: Value) -> ToolCall {
        let Value::Object(map) = args else {
            panic!("args must be an object");
        };
        ToolCall::new(KNOWLEDGE_TOOL_NAME, map)
    }

    #[tokio::test]
    async fn test_domain_selection_searches_matching_bases_only() {
        let science = CountingStorage::new();
        let physics = CountingStorage::new();
        let tool = KnowledgeTool::new(vec![
            base("science", &["Astronomy", "Biology"], Arc::clone(&science)),
            base("physics", &["Physics"], Arc::clone(&physics)),
        ]);

        let call = call_with(serde_json::json!({
            "query": "entropy",
            "domains": ["Physics"],
        }));
        let result = tool.call(call, CancellationToken::new()).await.unwrap();

        assert_eq!(science.searches.load(Ordering::SeqCst), 0);
        assert_eq!(physics.searches.load(Ordering::SeqCst), 1);
        assert_eq!(result.result["count"], 1);
        assert_eq!(result.result["items"][0]["id"], "d1");
    }

    #[tokio::test]
    async fn test_empty_domains_selects_all_in_order() {
        let a = CountingStorage::new();
        let b = CountingStorage::new();
        let tool = KnowledgeTool::new(vec![
            base("a", &["X"], Arc::clone(&a)),
            base("b", &["Y"], Arc::clone(&b)),
        ]);

        let call = call_with(serde_json::json!({ "query": "q" }));
        let result = tool.call(call, CancellationToken::new()).await.unwrap();
        assert_eq!(a.searches.load(Ordering::SeqCst), 1);
        assert_eq!(b.searches.load(Ordering::SeqCst), 1);
        assert_eq!(result.result["count"], 2);
    }

    #[tokio::test]
    async fn test_max_bases_truncates() {
        let a = CountingStorage::new();
        let b = CountingStorage::new();
        let tool = KnowledgeTool::new(vec![
            base("a", &["X"], Arc::clone(&a)),
            base("b", &["Y"], Arc::clone(&b)),
        ]);

        let call = call_with(serde_json::json!({ "query": "q", "max_bases": 1 }));
        tool.call(call, CancellationToken::new()).await.unwrap();
        assert_eq!(a.searches.load(Ordering::SeqCst), 1);
        assert_eq!(b.searches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unmatched_filter_fails() {
        let tool = KnowledgeTool::new(vec![base("a", &["X"], CountingStorage::new())]);
        let call = call_with(serde_json::json!({ "query": "q", "domains": ["Nope"] }));
        let err = tool.call(call, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::Invoke { .. }));
        assert!(err.to_string().contains("no base declares"));
    }

    #[tokio::test]
    async fn test_missing_query_is_invalid_arguments() {
        let tool = KnowledgeTool::new(vec![base("a", &["X"], CountingStorage::new())]);
        let call = call_with(serde_json::json!({ "domains": ["X"] }));
        let err = tool.call(call, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[test]
    fn test_descriptor_lists_sorted_domains() {
        let tool = KnowledgeTool::new(vec![
            base("a", &["Zoology", "Astronomy"], CountingStorage::new()),
            base("b", &["Physics", "Astronomy"], CountingStorage::new()),
        ]);
        let descriptor = tool.descriptor();
        let domains_schema = &descriptor.parameters.properties.as_ref().unwrap()["domains"];
        let description = domains_schema.description.as_deref().unwrap();
        assert!(description.contains("Available domains: [Astronomy, Physics, Zoology]."));
    }
}
