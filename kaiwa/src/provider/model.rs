//! Model identity and the process-wide model registry.
//!
//! Provider adapters register the models they serve at startup; the agent
//! resolves its configured model through [`resolve_model`].

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use serde::{Deserialize, Serialize};

use super::ChatProvider;

/// Identifies a model by provider and model id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelId {
    /// Provider name, e.g. `openai`.
    pub provider: String,
    /// Model id within the provider, e.g. `gpt-4o`.
    pub id: String,
}

impl ModelId {
    /// Create a model id.
    #[must_use]
    pub fn new(provider: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.provider, self.id)
    }
}

type Registry = RwLock<HashMap<ModelId, Arc<dyn ChatProvider>>>;

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Register a provider for a model, replacing any previous registration.
pub fn register_model(model: ModelId, provider: Arc<dyn ChatProvider>) {
    let mut models = registry()
        .write()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    models.insert(model, provider);
}

/// Resolve the provider registered for a model.
#[must_use]
pub fn resolve_model(model: &ModelId) -> Option<Arc<dyn ChatProvider>> {
    let models = registry()
        .read()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    models.get(model).cloned()
}

/// Every registered model id, in no particular order.
#[must_use]
pub fn registered_models() -> Vec<ModelId> {
    let models = registry()
        .read()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    models.keys().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockChatProvider;

    #[test]
    fn test_register_and_resolve() {
        let model = ModelId::new("mock", "registry-test-model");
        assert!(resolve_model(&model).is_none());

        register_model(model.clone(), Arc::new(MockChatProvider::new()));
        assert!(resolve_model(&model).is_some());
        assert!(registered_models().contains(&model));
    }

    #[test]
    fn test_display() {
        assert_eq!(ModelId::new("openai", "gpt-4o").to_string(), "openai/gpt-4o");
    }
}
