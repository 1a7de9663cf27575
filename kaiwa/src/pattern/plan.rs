//! The Plan-and-Execute pattern and its plan model.
//!
//! The model first emits a plan (`planResult`), then reports task status as
//! it executes (`currentTaskStatus`), and finally succeeds or fails the
//! whole plan (`executeState` + `finalResult`). Plans persist in the agent
//! state under [`PLAN_STATE_KEY`]; plan and per-task confirmations are
//! routed through `external_action` events unless disabled.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::GenerateContextParams;
use crate::error::{AgentError, Result};
use crate::event::{Event, ExternalAction};
use crate::message::{FinishReason, Message};
use crate::prompts;

use super::driver::{
    Reconciliation, TurnOutput, reconcile, run_turn, terminal_without_tools,
};
use super::json_scan::first_object;
use super::{BehaviorPattern, StepContext, TerminalResponse};

/// State key under which the current plan is stored.
pub const PLAN_STATE_KEY: &str = "plan";

/// Overall plan state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanState {
    /// Awaiting confirmation or execution.
    Pending,
    /// Tasks are running.
    Executing,
    /// Every task finished and the plan produced its result.
    Succeed,
    /// The plan cannot be completed.
    Failed,
}

/// State of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Not started.
    Pending,
    /// In progress.
    Running,
    /// Finished successfully.
    Succeed,
    /// Finished with an error.
    Failed,
    /// Intentionally not run.
    Skipped,
}

/// One task in a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanTask {
    /// Task id, unique within the plan.
    pub id: String,
    /// What the task does.
    #[serde(default)]
    pub description: String,
    /// Current state.
    pub state: TaskState,
    /// Ids of tasks this one depends on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Result text, when finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Error text, when failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When execution started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When execution completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// An ordered list of tasks with an overall state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Overall state.
    pub state: PlanState,
    /// The tasks, in execution order.
    #[serde(default)]
    pub tasks: Vec<PlanTask>,
}

impl Plan {
    /// Replace the task with a matching id, or append it.
    pub fn merge_task(&mut self, task: PlanTask) {
        if let Some(slot) = self.tasks.iter_mut().find(|t| t.id == task.id) {
            *slot = task;
        } else {
            self.tasks.push(task);
        }
    }

    /// A markdown checklist rendering of the plan.
    #[must_use]
    pub fn render(&self) -> String {
        let state = match self.state {
            PlanState::Pending => "pending",
            PlanState::Executing => "executing",
            PlanState::Succeed => "succeed",
            PlanState::Failed => "failed",
        };
        let mut out = format!("Plan ({state}):\n");
        for task in &self.tasks {
            let marker = match task.state {
                TaskState::Pending => " ",
                TaskState::Running => "~",
                TaskState::Succeed => "x",
                TaskState::Failed => "!",
                TaskState::Skipped => "-",
            };
            out.push_str(&format!("- [{marker}] {}: {}\n", task.id, task.description));
            if let Some(error) = &task.error {
                out.push_str(&format!("      error: {error}\n"));
            }
        }
        out
    }
}

/// One turn's parsed directive.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlanTurn {
    plan_result: Option<Plan>,
    current_task_status: Option<PlanTask>,
    execute_state: PlanState,
    reason: String,
    #[serde(default)]
    final_result: Option<String>,
}

/// Confirmation switches for the pattern.
#[derive(Debug, Clone, Copy)]
pub struct PlanExecuteOptions {
    /// Ask the user to confirm a freshly produced plan.
    pub require_plan_confirmation: bool,
    /// Ask the user to confirm each pending task before it runs.
    pub require_step_confirmation: bool,
}

impl Default for PlanExecuteOptions {
    fn default() -> Self {
        Self {
            require_plan_confirmation: true,
            require_step_confirmation: true,
        }
    }
}

/// Plan first, execute task by task.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanExecutePattern {
    options: PlanExecuteOptions,
}

impl PlanExecutePattern {
    /// Create the pattern with the given confirmation switches.
    #[must_use]
    pub const fn new(options: PlanExecuteOptions) -> Self {
        Self { options }
    }

    async fn load_plan(step: &StepContext<'_>) -> Result<Plan> {
        let value = step
            .context
            .state()
            .get(PLAN_STATE_KEY)
            .await
            .map_err(|e| AgentError::load_plan_failed(e.to_string()))?
            .ok_or_else(|| AgentError::load_plan_failed("no plan stored"))?;
        serde_json::from_value(value).map_err(|e| AgentError::load_plan_failed(e.to_string()))
    }

    async fn store_plan(step: &StepContext<'_>, plan: &Plan) -> Result<()> {
        let value = serde_json::to_value(plan)?;
        step.context
            .state()
            .put(PLAN_STATE_KEY, value)
            .await
            .map_err(AgentError::from)
    }

    /// Apply one parsed directive. `Ok(Some(..))` terminates the step,
    /// `Ok(None)` falls through to tool reconciliation; `LoopAgain` is
    /// signaled by returning the continuation marker.
    async fn apply(
        &self,
        step: &mut StepContext<'_>,
        directive: PlanTurn,
        turn: &TurnOutput,
    ) -> Result<Applied> {
        if let Some(plan) = directive.plan_result {
            Self::store_plan(step, &plan).await?;
            debug!(tasks = plan.tasks.len(), "plan stored");
            if self.options.require_plan_confirmation {
                step.emitter
                    .emit(Event::external_action(ExternalAction {
                        message: Some(Message::assistant(format!(
                            "Please confirm the proposed plan.\n\n{}",
                            plan.render()
                        ))),
                        tool_call: None,
                    }))
                    .await;
                return Ok(Applied::Terminal(TerminalResponse::normal()));
            }
            step.context
                .update_memory(vec![Message::user(
                    "Plan accepted. Proceed with the first task.",
                )])
                .await?;
            return Ok(Applied::LoopAgain);
        }

        if let Some(task) = directive.current_task_status {
            let task_state = task.state;
            let mut plan = Self::load_plan(step).await?;
            plan.merge_task(task);
            plan.state = directive.execute_state;
            Self::store_plan(step, &plan).await?;

            if task_state == TaskState::Pending {
                if self.options.require_step_confirmation {
                    step.emitter
                        .emit(Event::external_action(ExternalAction {
                            message: Some(Message::assistant(format!(
                                "Please confirm the next task.\n\n{}",
                                plan.render()
                            ))),
                            tool_call: None,
                        }))
                        .await;
                    return Ok(Applied::Terminal(TerminalResponse::normal()));
                }
                step.context
                    .update_memory(vec![Message::user("Proceed.")])
                    .await?;
                return Ok(Applied::LoopAgain);
            }
        }

        match directive.execute_state {
            PlanState::Failed => {
                let rendering = Self::load_plan(step)
                    .await
                    .map(|p| p.render())
                    .unwrap_or_default();
                let text = format!("Plan failed: {}\n\n{rendering}", directive.reason);
                Self::emit_assistant(step, turn, &text).await;
                Ok(Applied::Terminal(
                    TerminalResponse::new(FinishReason::Error)
                        .with_error(directive.reason)
                        .with_abort(true),
                ))
            }
            PlanState::Succeed => {
                let Some(final_result) =
                    directive.final_result.filter(|r| !r.is_empty())
                else {
                    return Ok(Applied::Fallthrough);
                };
                step.context
                    .update_memory(vec![Message::assistant(final_result.clone())])
                    .await?;
                let rendering = Self::load_plan(step)
                    .await
                    .map(|p| p.render())
                    .unwrap_or_default();
                Self::emit_assistant(step, turn, &format!("{final_result}\n\n{rendering}"))
                    .await;
                Ok(Applied::Terminal(TerminalResponse::normal().with_abort(true)))
            }
            PlanState::Pending | PlanState::Executing => Ok(Applied::Fallthrough),
        }
    }

    async fn emit_assistant(step: &StepContext<'_>, turn: &TurnOutput, text: &str) {
        let mut message = Message::assistant(text);
        if let Some(model) = turn.runtime.as_ref().and_then(|rt| rt.model.clone()) {
            message = message.with_model(model);
        }
        step.emitter
            .emit(Event::agent_message(&step.step_id, message))
            .await;
    }
}

enum Applied {
    /// The step ends now.
    Terminal(TerminalResponse),
    /// Run another LLM turn immediately.
    LoopAgain,
    /// Nothing terminal; settle tool calls as usual.
    Fallthrough,
}

#[async_trait]
impl BehaviorPattern for PlanExecutePattern {
    fn name(&self) -> &'static str {
        "plan_execute"
    }

    fn system_instruction(&self, header: &str) -> String {
        format!("{header}\n\n{}", prompts::builtin::PLAN_EXECUTE)
    }

    async fn next_step(&self, step: &mut StepContext<'_>) -> Result<TerminalResponse> {
        let base_options = step.input.options();
        let mut params = step.initial_params();
        loop {
            let turn = run_turn(step, params, None).await?;

            if let Some(directive) = parse_plan_turn(&turn.text) {
                match self.apply(step, directive, &turn).await? {
                    Applied::Terminal(terminal) => return Ok(terminal),
                    Applied::LoopAgain => {
                        params = GenerateContextParams::continuation(base_options.clone());
                        continue;
                    }
                    Applied::Fallthrough => {}
                }
            }

            match reconcile(step, &turn.tool_calls).await? {
                Reconciliation::Continue => {
                    params = GenerateContextParams::continuation(base_options.clone());
                }
                Reconciliation::AwaitExternal => return Ok(TerminalResponse::tool_use()),
                Reconciliation::NoCalls => return Ok(terminal_without_tools(&turn)),
            }
        }
    }
}

fn parse_plan_turn(text: &str) -> Option<PlanTurn> {
    let object = first_object(text)?;
    match serde_json::from_str(object) {
        Ok(directive) => Some(directive),
        Err(err) => {
            debug!(error = %err, "turn text carried no plan directive");
            None
        }
    }
}
