//! The Chain-of-Thought pattern.
//!
//! The embedded prompt constrains the model to a single JSON object with
//! string fields `thinking` and `final_answer`. The observer re-extracts the
//! first balanced object from the accumulated buffer on every chunk: fresh
//! `thinking` is surfaced as an assistant message as soon as it parses, and
//! a non-empty `final_answer` ends the step with a `Final Answer:` message.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::context::GenerateContextParams;
use crate::error::Result;
use crate::message::ToolCall;
use crate::prompts;

use super::driver::{
    Reconciliation, TextObserver, TurnView, reconcile, run_turn, terminal_without_tools,
};
use super::json_scan::first_object;
use super::{BehaviorPattern, StepContext, TerminalResponse};

/// Reason in JSON, answer once.
#[derive(Debug, Clone, Copy, Default)]
pub struct CotPattern;

impl CotPattern {
    /// Create the pattern.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[derive(Debug, Default, Deserialize)]
struct CotTurn {
    #[serde(default)]
    thinking: String,
    #[serde(default)]
    final_answer: String,
}

#[derive(Default)]
struct CotObserver {
    buffer: String,
    emitted_thinking: String,
    final_answer: Option<String>,
}

#[async_trait]
impl TextObserver for CotObserver {
    async fn on_text(&mut self, view: &TurnView<'_>, text: &str) -> Result<Vec<ToolCall>> {
        self.buffer.push_str(text);
        let Some(object) = first_object(&self.buffer) else {
            return Ok(Vec::new());
        };
        match serde_json::from_str::<CotTurn>(object) {
            Ok(turn) => {
                if !turn.thinking.is_empty() && turn.thinking != self.emitted_thinking {
                    view.emit_assistant(&turn.thinking).await;
                    self.emitted_thinking = turn.thinking;
                }
                if !turn.final_answer.is_empty() {
                    self.final_answer = Some(turn.final_answer);
                }
            }
            Err(err) => debug!(error = %err, "chain-of-thought object not yet parseable"),
        }
        Ok(Vec::new())
    }
}

#[async_trait]
impl BehaviorPattern for CotPattern {
    fn name(&self) -> &'static str {
        "cot"
    }

    fn system_instruction(&self, header: &str) -> String {
        format!("{header}\n\n{}", prompts::builtin::COT)
    }

    async fn next_step(&self, step: &mut StepContext<'_>) -> Result<TerminalResponse> {
        let base_options = step.input.options();
        let mut params = step.initial_params();
        loop {
            let mut observer = CotObserver::default();
            let turn = run_turn(step, params, Some(&mut observer)).await?;

            if let Some(answer) = observer.final_answer {
                let view = TurnView {
                    step_id: &step.step_id,
                    emitter: &step.emitter,
                    model: turn.runtime.as_ref().and_then(|rt| rt.model.clone()),
                };
                view.emit_assistant(&format!("\nFinal Answer: {answer}")).await;
                return Ok(TerminalResponse::normal());
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
