//! Behavior patterns: interchangeable interpreters of the provider stream.
//!
//! A [`BehaviorPattern`] drives one reasoning step to a terminal response.
//! The four shipped patterns share the streaming loop in `driver` and differ
//! only in their system instruction, their text-part handling, and their
//! end-of-stream hook:
//!
//! - [`GenericPattern`]: text flows to the user verbatim.
//! - [`CotPattern`]: parses a `{thinking, final_answer}` JSON object out of
//!   the stream.
//! - [`ReactPattern`]: parses thought/action JSON blocks, bounded by a
//!   per-step iteration limit.
//! - [`PlanExecutePattern`]: plans first, then executes task by task with
//!   optional user confirmation.

mod cot;
mod driver;
mod generic;
mod json_scan;
mod plan;
mod react;

pub use cot::CotPattern;
pub use generic::GenericPattern;
pub use plan::{
    PLAN_STATE_KEY, Plan, PlanExecuteOptions, PlanExecutePattern, PlanState, PlanTask, TaskState,
};
pub use react::ReactPattern;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::bus::EventBus;
use crate::context::{AgentContext, ContextRules, GenerateContextParams};
use crate::error::Result;
use crate::event::{Event, UserRequest};
use crate::message::{FinishReason, ToolCallResult};
use crate::provider::{Chat, ChatOptions};

/// The input that triggered a step.
#[derive(Debug, Default)]
pub struct StepInput {
    /// Present when the step was triggered by a user request.
    pub user_request: Option<UserRequest>,
    /// Present when the step was triggered by an external tool result.
    pub tool_call_result: Option<ToolCallResult>,
}

impl StepInput {
    /// The chat options carried by the triggering request, if any.
    #[must_use]
    pub fn options(&self) -> ChatOptions {
        self.user_request
            .as_ref()
            .map(|r| r.options.clone())
            .unwrap_or_default()
    }
}

/// How a step ended.
#[derive(Debug, Clone)]
pub struct TerminalResponse {
    /// The finish reason reported on `agent_response_end`.
    pub finish_reason: FinishReason,
    /// Error message, for abnormal ends.
    pub error: Option<String>,
    /// True when the step aborted.
    pub abort: bool,
}

impl TerminalResponse {
    /// A terminal response with the given reason and no error.
    #[must_use]
    pub const fn new(finish_reason: FinishReason) -> Self {
        Self {
            finish_reason,
            error: None,
            abort: false,
        }
    }

    /// A normal end.
    #[must_use]
    pub const fn normal() -> Self {
        Self::new(FinishReason::NormalEnd)
    }

    /// An end awaiting externally-confirmed tool calls.
    #[must_use]
    pub const fn tool_use() -> Self {
        Self::new(FinishReason::ToolUse)
    }

    /// Attach an error message.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Set the abort marker.
    #[must_use]
    pub const fn with_abort(mut self, abort: bool) -> Self {
        self.abort = abort;
        self
    }
}

/// Emits events to the shared bus and, when attached, a per-session output
/// channel.
#[derive(Clone)]
pub struct StepEmitter {
    bus: EventBus,
    output: Option<mpsc::Sender<Event>>,
}

impl std::fmt::Debug for StepEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepEmitter")
            .field("has_output", &self.output.is_some())
            .finish()
    }
}

impl StepEmitter {
    /// An emitter publishing to the bus only.
    #[must_use]
    pub const fn new(bus: EventBus) -> Self {
        Self { bus, output: None }
    }

    /// Also deliver every event to the given channel.
    #[must_use]
    pub fn with_output(mut self, output: mpsc::Sender<Event>) -> Self {
        self.output = Some(output);
        self
    }

    /// Emit one event. A closed bus or dropped output receiver is
    /// tolerated.
    pub async fn emit(&self, event: Event) {
        if let Some(output) = &self.output
            && output.send(event.clone()).await.is_err()
        {
            debug!(topic = %event.topic, "session output receiver gone");
        }
        if self.bus.publish(event).await.is_err() {
            debug!("event bus closed, dropping event");
        }
    }
}

/// Everything one reasoning step may touch.
pub struct StepContext<'s> {
    /// Step id, `step:<agent-id>:<session-id>:<index>`.
    pub step_id: String,
    /// The agent's context capability set.
    pub context: Arc<dyn AgentContext>,
    /// The session's chat handle.
    pub chat: &'s mut dyn Chat,
    /// Event emitter for this step.
    pub emitter: StepEmitter,
    /// The session's cancellation token.
    pub cancel: CancellationToken,
    /// The rules snapshot taken at step entry.
    pub rules: ContextRules,
    /// The triggering input.
    pub input: StepInput,
}

impl StepContext<'_> {
    /// Consume the step input into params for the first LLM turn.
    pub fn initial_params(&mut self) -> GenerateContextParams {
        let options = self.input.options();
        GenerateContextParams {
            user_request: self.input.user_request.take(),
            tool_call_result: self.input.tool_call_result.take(),
            options,
        }
    }
}

impl std::fmt::Debug for StepContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepContext")
            .field("step_id", &self.step_id)
            .finish_non_exhaustive()
    }
}

/// A strategy that drives one reasoning step to a terminal response.
#[async_trait]
pub trait BehaviorPattern: Send + Sync {
    /// The pattern's name, for logs.
    fn name(&self) -> &'static str;

    /// The session's system instruction: the header plus the pattern's
    /// embedded prompt. The default returns the header unchanged.
    fn system_instruction(&self, header: &str) -> String {
        header.to_string()
    }

    /// Drive one step. Emits `agent_message` / `external_action` events as
    /// it goes; the caller emits the start/end lifecycle markers.
    async fn next_step(&self, step: &mut StepContext<'_>) -> Result<TerminalResponse>;
}
