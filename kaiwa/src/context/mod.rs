//! The per-agent context: prompt assembly, tool policy, memory and state.
//!
//! Behavior patterns depend only on the [`AgentContext`] capability set; the
//! single shipped implementation is the rule-based
//! [`RuleBasedContext`]. Keeping the seam here lets applications swap in
//! their own composer without touching the patterns.

mod rule_based;
mod rules;

pub use rule_based::RuleBasedContext;
pub use rules::{ContextRules, SharedRules};

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::event::UserRequest;
use crate::message::{Message, ToolCall, ToolCallResult};
use crate::provider::{ChatOptions, ModelId};
use crate::state::AgentState;
use crate::tool::ToolError;

/// How much memory history a step reads.
#[derive(Debug, Clone, Copy)]
pub struct RetrieveOptions {
    /// Item limit handed to [`Memory::retrieve`]; negative means all.
    ///
    /// [`Memory::retrieve`]: crate::memory::Memory::retrieve
    pub limit: i64,
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        Self { limit: -1 }
    }
}

/// Input to one prompt assembly.
#[derive(Debug, Clone, Default)]
pub struct GenerateContextParams {
    /// A fresh user request, when the step was triggered by one.
    pub user_request: Option<UserRequest>,
    /// A fresh tool result, when the step was triggered by one.
    pub tool_call_result: Option<ToolCallResult>,
    /// Chat options forwarded verbatim.
    pub options: ChatOptions,
}

impl GenerateContextParams {
    /// Params for a user-request step.
    #[must_use]
    pub fn from_user_request(request: UserRequest) -> Self {
        let options = request.options.clone();
        Self {
            user_request: Some(request),
            tool_call_result: None,
            options,
        }
    }

    /// Params for a continuation turn carrying nothing fresh (the new
    /// messages are already in memory).
    #[must_use]
    pub fn continuation(options: ChatOptions) -> Self {
        Self {
            user_request: None,
            tool_call_result: None,
            options,
        }
    }
}

/// Output of one prompt assembly.
#[derive(Debug, Clone)]
pub struct GeneratedContext {
    /// The prompt messages, in order.
    pub messages: Vec<Message>,
    /// The chat options, tools appended.
    pub options: ChatOptions,
}

/// The capability set behind which patterns see their agent.
#[async_trait]
pub trait AgentContext: Send + Sync {
    /// The owning agent's id.
    fn agent_id(&self) -> &str;

    /// The agent's system prompt header.
    fn system_prompt(&self) -> &str;

    /// The agent's configured model.
    fn model(&self) -> &ModelId;

    /// Assemble the prompt for one LLM turn, appending any fresh
    /// user/tool messages to memory as a side effect.
    async fn generate(&self, params: GenerateContextParams) -> Result<GeneratedContext>;

    /// Append messages to memory, in order.
    async fn update_memory(&self, messages: Vec<Message>) -> Result<()>;

    /// The agent's keyed state store.
    fn state(&self) -> Arc<dyn AgentState>;

    /// Invoke a tool on behalf of the agent.
    async fn call_tool(
        &self,
        call: &ToolCall,
        cancel: CancellationToken,
    ) -> std::result::Result<ToolCallResult, ToolError>;

    /// True when the tool may run without user confirmation.
    async fn can_auto_call(&self, call: &ToolCall) -> bool;

    /// Check that the call names a known tool.
    async fn validate_tool_call(&self, call: &ToolCall) -> std::result::Result<(), ToolError>;

    /// Mutate the rules: enable then disable the named auto-tools.
    async fn update_rules(&self, enable: &[String], disable: &[String]);

    /// A consistent snapshot of the current rules.
    async fn rules_snapshot(&self) -> ContextRules;
}
