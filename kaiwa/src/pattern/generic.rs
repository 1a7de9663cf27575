//! The generic pattern: streamed text flows to the user verbatim.

use async_trait::async_trait;

use crate::context::GenerateContextParams;
use crate::error::Result;

use super::driver::{Reconciliation, reconcile, run_turn, terminal_without_tools};
use super::{BehaviorPattern, StepContext, TerminalResponse};

/// No parsing, no hooks: forward text, settle tool calls, finish.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericPattern;

impl GenericPattern {
    /// Create the pattern.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BehaviorPattern for GenericPattern {
    fn name(&self) -> &'static str {
        "generic"
    }

    async fn next_step(&self, step: &mut StepContext<'_>) -> Result<TerminalResponse> {
        let base_options = step.input.options();
        let mut params = step.initial_params();
        loop {
            let turn = run_turn(step, params, None).await?;
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
