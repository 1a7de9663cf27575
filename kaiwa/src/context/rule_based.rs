//! The rule-based context implementation.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{AgentError, Result};
use crate::knowledge::KnowledgeTool;
use crate::memory::{InMemoryMemory, Memory, MemoryItem};
use crate::message::{Message, ToolCall, ToolCallResult};
use crate::provider::ModelId;
use crate::state::{AgentState, InMemoryState};
use crate::tool::{Tool, ToolError, ToolRegistry, render_instructions};

use super::rules::{ContextRules, SharedRules};
use super::{AgentContext, GenerateContextParams, GeneratedContext, RetrieveOptions};

/// The single shipped [`AgentContext`]: prompt assembly and tool policy
/// driven by [`ContextRules`].
pub struct RuleBasedContext {
    agent_id: String,
    system_prompt: String,
    model: ModelId,
    registry: Arc<ToolRegistry>,
    knowledge_tool: Option<Arc<KnowledgeTool>>,
    memory: Arc<dyn Memory>,
    state: Arc<dyn AgentState>,
    rules: SharedRules,
    retrieve: RetrieveOptions,
}

impl std::fmt::Debug for RuleBasedContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleBasedContext")
            .field("agent_id", &self.agent_id)
            .field("model", &self.model)
            .field("tools", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl RuleBasedContext {
    /// Create a context with in-memory stores, an empty registry, and
    /// default rules.
    #[must_use]
    pub fn new(
        agent_id: impl Into<String>,
        system_prompt: impl Into<String>,
        model: ModelId,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            system_prompt: system_prompt.into(),
            model,
            registry: Arc::new(ToolRegistry::new()),
            knowledge_tool: None,
            memory: Arc::new(InMemoryMemory::new()),
            state: Arc::new(InMemoryState::new()),
            rules: SharedRules::default(),
            retrieve: RetrieveOptions::default(),
        }
    }

    /// Replace the tool registry.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Attach the knowledge tool.
    #[must_use]
    pub fn with_knowledge_tool(mut self, tool: Arc<KnowledgeTool>) -> Self {
        self.knowledge_tool = Some(tool);
        self
    }

    /// Replace the memory backend.
    #[must_use]
    pub fn with_memory(mut self, memory: Arc<dyn Memory>) -> Self {
        self.memory = memory;
        self
    }

    /// Replace the state backend.
    #[must_use]
    pub fn with_state(mut self, state: Arc<dyn AgentState>) -> Self {
        self.state = state;
        self
    }

    /// Replace the rules.
    #[must_use]
    pub fn with_rules(mut self, rules: ContextRules) -> Self {
        self.rules = SharedRules::new(rules);
        self
    }

    /// Replace the retrieve options.
    #[must_use]
    pub const fn with_retrieve_options(mut self, retrieve: RetrieveOptions) -> Self {
        self.retrieve = retrieve;
        self
    }

    /// The memory backend.
    #[must_use]
    pub fn memory(&self) -> &Arc<dyn Memory> {
        &self.memory
    }

    fn descriptors(&self) -> Vec<crate::tool::ToolDescriptor> {
        let mut descriptors = self.registry.descriptors();
        if let Some(tool) = &self.knowledge_tool {
            descriptors.push(tool.descriptor());
        }
        descriptors
    }

    fn knows_tool(&self, name: &str) -> bool {
        self.registry.contains(name)
            || self
                .knowledge_tool
                .as_ref()
                .is_some_and(|t| t.descriptor().name == name)
    }
}

#[async_trait]
impl AgentContext for RuleBasedContext {
    fn agent_id(&self) -> &str {
        &self.agent_id
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn model(&self) -> &ModelId {
        &self.model
    }

    async fn generate(&self, params: GenerateContextParams) -> Result<GeneratedContext> {
        let rules = self.rules.snapshot().await;
        let descriptors = self.descriptors();
        let mut messages = Vec::new();

        if rules.auto_add_tool_instructions && !descriptors.is_empty() {
            messages.push(Message::system(render_instructions(&descriptors)));
        }

        let history = self
            .memory
            .retrieve(self.retrieve.limit)
            .await
            .map_err(|e| AgentError::generate_context_failed(e.to_string()))?;
        messages.extend(history.iter().filter_map(|item| item.as_message().cloned()));

        let mut fresh = Vec::new();
        if let Some(request) = params.user_request {
            fresh.push(request.message);
        }
        if let Some(result) = params.tool_call_result {
            fresh.push(Message::tool(vec![result]));
        }
        for message in &fresh {
            self.memory
                .append(MemoryItem::from_message(message.clone()))
                .await
                .map_err(|e| AgentError::generate_context_failed(e.to_string()))?;
        }
        messages.extend(fresh);

        let mut options = params.options;
        if !descriptors.is_empty() {
            options = options.with_tools(descriptors);
        }
        debug!(
            agent_id = %self.agent_id,
            messages = messages.len(),
            "generated step context"
        );
        Ok(GeneratedContext { messages, options })
    }

    async fn update_memory(&self, messages: Vec<Message>) -> Result<()> {
        for message in messages {
            self.memory.append(MemoryItem::from_message(message)).await?;
        }
        Ok(())
    }

    fn state(&self) -> Arc<dyn AgentState> {
        Arc::clone(&self.state)
    }

    async fn call_tool(
        &self,
        call: &ToolCall,
        cancel: CancellationToken,
    ) -> std::result::Result<ToolCallResult, ToolError> {
        if let Some(tool) = &self.knowledge_tool
            && tool.descriptor().name == call.name
        {
            return tool.call(call.clone(), cancel).await;
        }
        self.registry.call(call, cancel).await
    }

    async fn can_auto_call(&self, call: &ToolCall) -> bool {
        self.rules.snapshot().await.allows_auto_call(&call.name)
    }

    async fn validate_tool_call(&self, call: &ToolCall) -> std::result::Result<(), ToolError> {
        if self.knows_tool(&call.name) {
            Ok(())
        } else {
            Err(ToolError::not_found(&call.name))
        }
    }

    async fn update_rules(&self, enable: &[String], disable: &[String]) {
        self.rules.update(enable, disable).await;
    }

    async fn rules_snapshot(&self) -> ContextRules {
        self.rules.snapshot().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    use crate::event::UserRequest;
    use crate::message::MessageRole;
    use crate::provider::ChatOptions;
    use crate::tool::{Schema, ToolDescriptor};

    struct NullTool(&'static str);

    #[async_trait]
    impl Tool for NullTool {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor::new(self.0, format!("The {} tool.", self.0), Schema::object())
        }

        async fn call(
            &self,
            call: ToolCall,
            _cancel: CancellationToken,
        ) -> std::result::Result<ToolCallResult, ToolError> {
            Ok(ToolCallResult::new(call.id, call.name, Map::new()))
        }
    }

    fn context_with_tools() -> RuleBasedContext {
        let mut registry = ToolRegistry::new();
        registry.add(NullTool("weather")).unwrap();
        RuleBasedContext::new("agent-1", "You are helpful.", ModelId::new("mock", "m"))
            .with_registry(Arc::new(registry))
            .with_rules(ContextRules::new().with_auto_tool("weather"))
    }

    #[tokio::test]
    async fn test_generate_prepends_instructions_and_updates_memory() {
        let ctx = context_with_tools();
        let request = UserRequest::new(Message::user("weather in Paris?"));
        let generated = ctx
            .generate(GenerateContextParams::from_user_request(request))
            .await
            .unwrap();

        assert_eq!(generated.messages.len(), 2);
        assert_eq!(generated.messages[0].role, MessageRole::System);
        assert!(generated.messages[0].text().contains("<tool name=\"weather\">"));
        assert_eq!(generated.messages[1].text(), "weather in Paris?");
        assert_eq!(
            generated.options.tools.as_ref().map(Vec::len),
            Some(1),
            "tools appended to options"
        );

        // The fresh user message was appended to memory.
        let items = ctx.memory().retrieve(-1).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_message().unwrap().text(), "weather in Paris?");
    }

    #[tokio::test]
    async fn test_generate_includes_history_before_fresh_turn() {
        let ctx = context_with_tools();
        ctx.update_memory(vec![Message::user("earlier"), Message::assistant("reply")])
            .await
            .unwrap();

        let request = UserRequest::new(Message::user("now"));
        let generated = ctx
            .generate(GenerateContextParams::from_user_request(request))
            .await
            .unwrap();
        let texts: Vec<String> = generated.messages.iter().map(Message::text).collect();
        assert_eq!(texts.len(), 4);
        assert_eq!(texts[1], "earlier");
        assert_eq!(texts[2], "reply");
        assert_eq!(texts[3], "now");
    }

    #[tokio::test]
    async fn test_instructions_suppressed_by_rule() {
        let mut registry = ToolRegistry::new();
        registry.add(NullTool("weather")).unwrap();
        let ctx = RuleBasedContext::new("a", "p", ModelId::new("mock", "m"))
            .with_registry(Arc::new(registry))
            .with_rules(ContextRules::new().with_tool_instructions(false));

        let generated = ctx
            .generate(GenerateContextParams::continuation(ChatOptions::new()))
            .await
            .unwrap();
        assert!(generated.messages.is_empty());
        assert!(generated.options.tools.is_some(), "tools still offered");
    }

    #[tokio::test]
    async fn test_auto_call_policy_and_validation() {
        let ctx = context_with_tools();
        let known = ToolCall::new("weather", Map::new());
        let unknown = ToolCall::new("nope", Map::new());

        assert!(ctx.can_auto_call(&known).await);
        assert!(ctx.validate_tool_call(&known).await.is_ok());
        assert!(matches!(
            ctx.validate_tool_call(&unknown).await,
            Err(ToolError::NotFound(_))
        ));

        ctx.update_rules(&[], &["weather".into()]).await;
        assert!(!ctx.can_auto_call(&known).await);
    }

    #[tokio::test]
    async fn test_tool_result_becomes_tool_message() {
        let ctx = context_with_tools();
        let call = ToolCall::new("weather", Map::new());
        let result = ToolCallResult::new(call.id.clone(), "weather", Map::new());

        let params = GenerateContextParams {
            user_request: None,
            tool_call_result: Some(result),
            options: ChatOptions::new(),
        };
        let generated = ctx.generate(params).await.unwrap();
        let tool_msg = generated.messages.last().unwrap();
        assert_eq!(tool_msg.role, MessageRole::Tool);
        assert_eq!(tool_msg.tool_call_results()[0].id, call.id);
    }
}
