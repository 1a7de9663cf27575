//! The ReAct pattern: thought/action JSON blocks with an iteration bound.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::context::GenerateContextParams;
use crate::error::Result;
use crate::message::{FinishReason, ToolCall};
use crate::prompts;

use super::driver::{Reconciliation, TextObserver, TurnView, reconcile, run_turn};
use super::json_scan::BlockScanner;
use super::{BehaviorPattern, StepContext, TerminalResponse};

const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Loop thought → action → observation until an answer or the iteration
/// bound.
#[derive(Debug, Clone, Copy)]
pub struct ReactPattern {
    max_iterations: u32,
}

impl Default for ReactPattern {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl ReactPattern {
    /// Create the pattern with the given per-step iteration bound.
    #[must_use]
    pub const fn new(max_iterations: u32) -> Self {
        Self { max_iterations }
    }
}

/// One parsed block. `thought`, `action`, and `observation` ride along in
/// the verbatim text; the engine only acts on the fields below.
#[derive(Debug, Deserialize)]
struct ReactBlock {
    #[serde(default)]
    tool_calls: Vec<ReactToolCall>,
    #[serde(default)]
    answer: Option<String>,
    #[serde(default = "default_continue", rename = "continue")]
    continue_: bool,
}

#[derive(Debug, Deserialize)]
struct ReactToolCall {
    name: String,
    #[serde(default)]
    tool_call_id: Option<String>,
    #[serde(default)]
    arguments: Map<String, Value>,
}

const fn default_continue() -> bool {
    true
}

impl From<ReactToolCall> for ToolCall {
    fn from(raw: ReactToolCall) -> Self {
        let call = Self::new(raw.name, raw.arguments);
        match raw.tool_call_id {
            Some(id) if !id.is_empty() => call.with_id(id),
            _ => call,
        }
    }
}

#[derive(Default)]
struct ReactObserver {
    scanner: BlockScanner,
    answer: Option<String>,
}

#[async_trait]
impl TextObserver for ReactObserver {
    async fn on_text(&mut self, view: &TurnView<'_>, text: &str) -> Result<Vec<ToolCall>> {
        let mut extracted = Vec::new();
        for block in self.scanner.push(text) {
            let parsed: ReactBlock = match serde_json::from_str(&block) {
                Ok(parsed) => parsed,
                Err(err) => {
                    debug!(error = %err, "skipping malformed react block");
                    continue;
                }
            };

            // Surface the block verbatim for transparency.
            view.emit_assistant(&block).await;

            extracted.extend(parsed.tool_calls.into_iter().map(ToolCall::from));

            let answered = parsed.answer.as_ref().is_some_and(|a| !a.is_empty());
            if !parsed.continue_ || answered {
                self.answer = Some(
                    parsed
                        .answer
                        .filter(|a| !a.is_empty())
                        .unwrap_or_else(|| "no answer".to_string()),
                );
            }
        }
        Ok(extracted)
    }
}

#[async_trait]
impl BehaviorPattern for ReactPattern {
    fn name(&self) -> &'static str {
        "react"
    }

    fn system_instruction(&self, header: &str) -> String {
        format!("{header}\n\n{}", prompts::builtin::REACT)
    }

    async fn next_step(&self, step: &mut StepContext<'_>) -> Result<TerminalResponse> {
        let base_options = step.input.options();
        let mut params = step.initial_params();
        let mut iterations: u32 = 0;

        loop {
            let mut observer = ReactObserver::default();
            let turn = run_turn(step, params, Some(&mut observer)).await?;

            if let Some(answer) = observer.answer {
                let view = TurnView {
                    step_id: &step.step_id,
                    emitter: &step.emitter,
                    model: turn.runtime.as_ref().and_then(|rt| rt.model.clone()),
                };
                view.emit_assistant(&answer).await;
                return Ok(TerminalResponse::normal());
            }

            if reconcile(step, &turn.tool_calls).await? == Reconciliation::AwaitExternal {
                return Ok(TerminalResponse::tool_use());
            }

            // No answer yet: the model asked to keep going (or said nothing
            // usable). Bound the loop.
            iterations += 1;
            if iterations > self.max_iterations {
                return Ok(TerminalResponse::new(FinishReason::Canceled).with_error(format!(
                    "max iterations reached, max={}",
                    self.max_iterations
                )));
            }
            params = GenerateContextParams::continuation(base_options.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_parses_tool_calls() {
        let block = r#"{
            "thought": "need weather",
            "tool_calls": [
                {"name": "weather", "tool_call_id": "c1", "arguments": {"city": "Paris"}}
            ],
            "continue": true
        }"#;
        let parsed: ReactBlock = serde_json::from_str(block).unwrap();
        assert_eq!(parsed.tool_calls.len(), 1);
        let call = ToolCall::from(parsed.tool_calls.into_iter().next().unwrap());
        assert_eq!(call.id, "c1");
        assert_eq!(call.name, "weather");
        assert_eq!(call.arguments["city"], "Paris");
    }

    #[test]
    fn test_block_without_id_mints_one() {
        let block = r#"{"tool_calls": [{"name": "weather"}], "continue": true}"#;
        let parsed: ReactBlock = serde_json::from_str(block).unwrap();
        let call = ToolCall::from(parsed.tool_calls.into_iter().next().unwrap());
        assert!(call.id.starts_with("call:"));
    }

    #[test]
    fn test_continue_defaults_to_true() {
        let parsed: ReactBlock = serde_json::from_str(r#"{"thought": "hmm"}"#).unwrap();
        assert!(parsed.continue_);
        assert!(parsed.answer.is_none());
    }
}
