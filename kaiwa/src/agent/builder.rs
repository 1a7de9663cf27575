//! Fluent agent construction.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use crate::bus::EventBus;
use crate::context::{AgentContext, ContextRules, RetrieveOptions, RuleBasedContext};
use crate::error::{AgentError, Result};
use crate::knowledge::{KnowledgeBase, KnowledgeTool};
use crate::memory::Memory;
use crate::pattern::{BehaviorPattern, GenericPattern};
use crate::provider::{ChatProvider, ModelId, resolve_model};
use crate::state::AgentState;
use crate::tool::{Tool, ToolRegistry};

use super::Agent;

/// Builder for [`Agent`].
///
/// The minimum viable agent is a model plus a provider (explicit, or
/// resolved from the process-wide model registry). Everything else has a
/// default: generic pattern, in-memory stores, empty tool registry, fresh
/// bus.
#[derive(Default)]
pub struct AgentBuilder {
    id: Option<String>,
    system_prompt: String,
    model: Option<ModelId>,
    provider: Option<Arc<dyn ChatProvider>>,
    pattern: Option<Arc<dyn BehaviorPattern>>,
    memory: Option<Arc<dyn Memory>>,
    state: Option<Arc<dyn AgentState>>,
    tools: Vec<Arc<dyn Tool>>,
    knowledge_bases: Vec<Arc<KnowledgeBase>>,
    rules: ContextRules,
    retrieve: RetrieveOptions,
    bus: Option<EventBus>,
    context: Option<Arc<dyn AgentContext>>,
}

impl std::fmt::Debug for AgentBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentBuilder")
            .field("id", &self.id)
            .field("model", &self.model)
            .field("tools", &self.tools.len())
            .finish_non_exhaustive()
    }
}

impl AgentBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the agent id. Defaults to a minted one.
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the system prompt header.
    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Set the model.
    #[must_use]
    pub fn model(mut self, model: ModelId) -> Self {
        self.model = Some(model);
        self
    }

    /// Set the provider explicitly instead of resolving it from the model
    /// registry.
    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn ChatProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the behavior pattern. Defaults to [`GenericPattern`].
    #[must_use]
    pub fn pattern(mut self, pattern: impl BehaviorPattern + 'static) -> Self {
        self.pattern = Some(Arc::new(pattern));
        self
    }

    /// Replace the memory backend.
    #[must_use]
    pub fn memory(mut self, memory: Arc<dyn Memory>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Replace the state backend.
    #[must_use]
    pub fn state(mut self, state: Arc<dyn AgentState>) -> Self {
        self.state = Some(state);
        self
    }

    /// Register a tool. Duplicate names surface at [`AgentBuilder::build`].
    #[must_use]
    pub fn tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    /// Register an already-shared tool.
    #[must_use]
    pub fn tool_arc(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Attach a knowledge base; any base enables the knowledge tool.
    #[must_use]
    pub fn knowledge_base(mut self, base: Arc<KnowledgeBase>) -> Self {
        self.knowledge_bases.push(base);
        self
    }

    /// Allow a tool to run without user confirmation.
    #[must_use]
    pub fn auto_tool(mut self, name: impl Into<String>) -> Self {
        self.rules.auto_tools.insert(name.into());
        self
    }

    /// Set whether the tool catalogue is prepended to prompts.
    #[must_use]
    pub const fn tool_instructions(mut self, enabled: bool) -> Self {
        self.rules.auto_add_tool_instructions = enabled;
        self
    }

    /// Bound how much memory history each step reads.
    #[must_use]
    pub const fn retrieve_limit(mut self, limit: i64) -> Self {
        self.retrieve = RetrieveOptions { limit };
        self
    }

    /// Share an existing event bus instead of creating one.
    #[must_use]
    pub fn bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Override the whole context. Tools, stores, and rules set on the
    /// builder are ignored when a custom context is supplied.
    #[must_use]
    pub fn context(mut self, context: Arc<dyn AgentContext>) -> Self {
        self.context = Some(context);
        self
    }

    /// Build the agent.
    ///
    /// # Errors
    ///
    /// Fails when the model is missing, when no provider is set or
    /// registered for it, or when two tools share a name.
    pub fn build(self) -> Result<Agent> {
        let model = self
            .model
            .ok_or_else(|| AgentError::internal("agent model is required"))?;
        let provider = match self.provider {
            Some(provider) => provider,
            None => resolve_model(&model).ok_or_else(|| {
                AgentError::internal(format!("no provider registered for model {model}"))
            })?,
        };
        let id = self
            .id
            .unwrap_or_else(|| format!("agent:{}", uuid::Uuid::new_v4().simple()));

        let context: Arc<dyn AgentContext> = match self.context {
            Some(context) => context,
            None => {
                let mut registry = ToolRegistry::new();
                for tool in self.tools {
                    registry.add_arc(tool)?;
                }
                let mut context =
                    RuleBasedContext::new(id.clone(), self.system_prompt, model)
                        .with_registry(Arc::new(registry))
                        .with_rules(self.rules)
                        .with_retrieve_options(self.retrieve);
                if let Some(memory) = self.memory {
                    context = context.with_memory(memory);
                }
                if let Some(state) = self.state {
                    context = context.with_state(state);
                }
                if !self.knowledge_bases.is_empty() {
                    context = context
                        .with_knowledge_tool(Arc::new(KnowledgeTool::new(self.knowledge_bases)));
                }
                Arc::new(context)
            }
        };

        Ok(Agent {
            id,
            context,
            pattern: self
                .pattern
                .unwrap_or_else(|| Arc::new(GenericPattern::new())),
            provider,
            bus: self.bus.unwrap_or_default(),
            step_seq: Arc::new(AtomicU64::new(0)),
        })
    }
}
