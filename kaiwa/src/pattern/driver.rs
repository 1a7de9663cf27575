//! The shared streaming turn and tool-call reconciliation.
//!
//! Every pattern's `next_step` is built from two operations: [`run_turn`],
//! which assembles the prompt, consumes one provider stream, and records the
//! synthetic assistant message; and [`reconcile`], which classifies the
//! turn's tool calls as invalid, auto-callable, or user-gated and folds the
//! local outcomes back into memory.

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, warn};

use crate::context::GenerateContextParams;
use crate::error::{AgentError, Result};
use crate::event::{Event, ExternalAction};
use crate::message::{FinishReason, Message, MessagePart, ToolCall, ToolCallResult};
use crate::provider::ModelId;

use super::{StepContext, StepEmitter, TerminalResponse};

/// The step's runtime identity, adopted from the first streamed chunk.
#[derive(Debug, Clone)]
pub(crate) struct RuntimeContext {
    pub message_id: String,
    pub model: Option<ModelId>,
}

/// What one LLM turn produced.
#[derive(Debug, Default)]
pub(crate) struct TurnOutput {
    /// Full concatenated text.
    pub text: String,
    /// Tool calls: streamed parts plus any the observer extracted.
    pub tool_calls: Vec<ToolCall>,
    /// Runtime identity, absent only for empty streams.
    pub runtime: Option<RuntimeContext>,
    /// The provider's reported finish reason, if any.
    pub provider_finish: Option<FinishReason>,
}

/// A view of the in-flight turn handed to text observers.
pub(crate) struct TurnView<'a> {
    pub step_id: &'a str,
    pub emitter: &'a StepEmitter,
    pub model: Option<ModelId>,
}

impl TurnView<'_> {
    /// Emit an assistant message carrying `text` on `agent_message`.
    pub(crate) async fn emit_assistant(&self, text: &str) {
        let mut message = Message::assistant(text);
        if let Some(model) = &self.model {
            message = message.with_model(model.clone());
        }
        self.emitter
            .emit(Event::agent_message(self.step_id, message))
            .await;
    }
}

/// Per-pattern text-part handling.
///
/// Absent an observer, streamed text is forwarded verbatim as
/// `agent_message` events.
#[async_trait]
pub(crate) trait TextObserver: Send {
    /// Handle one streamed text part; returns any tool calls extracted from
    /// the text.
    async fn on_text(&mut self, view: &TurnView<'_>, text: &str) -> Result<Vec<ToolCall>>;
}

/// Run one LLM turn: assemble the prompt, stream the response, append the
/// synthetic assistant message to memory.
///
/// Cancellation surfaces as [`AgentError::ChatSessionAbort`]; a failed
/// stream as [`AgentError::ChatSessionFailed`].
pub(crate) async fn run_turn(
    step: &mut StepContext<'_>,
    params: GenerateContextParams,
    mut observer: Option<&mut dyn TextObserver>,
) -> Result<TurnOutput> {
    let generated = step.context.generate(params).await?;
    let mut stream = step.chat.send(generated.messages, generated.options).await?;

    let mut output = TurnOutput::default();
    loop {
        let next = tokio::select! {
            () = step.cancel.cancelled() => return Err(AgentError::ChatSessionAbort),
            next = stream.next() => next,
        };
        let Some(chunk) = next else { break };
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err @ (AgentError::ChatSessionAbort | AgentError::ChatSessionFailed { .. })) => {
                return Err(err);
            }
            Err(err) => return Err(AgentError::chat_session_failed(err.to_string())),
        };

        if output.runtime.is_none() {
            output.runtime = Some(RuntimeContext {
                message_id: chunk.message_id.clone(),
                model: chunk.model.clone(),
            });
        }
        if let Some(reason) = chunk.finish_reason {
            output.provider_finish = Some(reason);
        }

        for part in chunk.parts {
            match part {
                MessagePart::Text { text } => {
                    output.text.push_str(&text);
                    let view = TurnView {
                        step_id: &step.step_id,
                        emitter: &step.emitter,
                        model: output.runtime.as_ref().and_then(|rt| rt.model.clone()),
                    };
                    if let Some(observer) = observer.as_deref_mut() {
                        let extracted = observer.on_text(&view, &text).await?;
                        output.tool_calls.extend(extracted);
                    } else {
                        view.emit_assistant(&text).await;
                    }
                }
                MessagePart::ToolCall(call) => output.tool_calls.push(call),
                // Providers stream calls and text; results never arrive here.
                MessagePart::ToolCallResult(_) => {}
            }
        }
    }

    if !output.text.is_empty() || !output.tool_calls.is_empty() {
        let mut message = Message::assistant_with(output.text.clone(), output.tool_calls.clone());
        if let Some(runtime) = &output.runtime {
            message = message.with_id(runtime.message_id.clone());
            if let Some(model) = &runtime.model {
                message = message.with_model(model.clone());
            }
        }
        step.context.update_memory(vec![message]).await?;
    }
    debug!(
        step_id = %step.step_id,
        text_len = output.text.len(),
        tool_calls = output.tool_calls.len(),
        "turn complete"
    );
    Ok(output)
}

/// Outcome of reconciling a turn's tool calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reconciliation {
    /// The turn requested no tools.
    NoCalls,
    /// At least one call was invalid or auto-executed; the step should run
    /// another LLM turn over the new tool-result messages.
    Continue,
    /// At least one call was externalized and none handled locally; the
    /// step ends with `tool_use`.
    AwaitExternal,
}

/// Classify and settle each tool call from a turn.
///
/// Invalid calls and auto-executed calls fold synthetic or real results into
/// memory; user-gated calls are emitted as `external_action` events. The
/// auto-call decision uses the rules snapshot taken at step entry.
pub(crate) async fn reconcile(
    step: &mut StepContext<'_>,
    tool_calls: &[ToolCall],
) -> Result<Reconciliation> {
    if tool_calls.is_empty() {
        return Ok(Reconciliation::NoCalls);
    }

    let mut any_local = false;
    let mut any_external = false;
    for call in tool_calls {
        if let Err(err) = step.context.validate_tool_call(call).await {
            warn!(tool = %call.name, error = %err, "invalid tool call");
            let result = ToolCallResult::synthetic(call, format!("invalid tool, reason: {err}"));
            step.context.update_memory(vec![Message::tool(vec![result])]).await?;
            any_local = true;
        } else if step.rules.allows_auto_call(&call.name) {
            let result = match step.context.call_tool(call, step.cancel.clone()).await {
                Ok(result) => result,
                Err(err) => {
                    warn!(tool = %call.name, error = %err, "auto tool call failed");
                    ToolCallResult::invoke_failed(call, err.to_string())
                }
            };
            step.context.update_memory(vec![Message::tool(vec![result])]).await?;
            any_local = true;
        } else {
            step.emitter
                .emit(Event::external_action(ExternalAction {
                    message: None,
                    tool_call: Some(call.clone()),
                }))
                .await;
            any_external = true;
        }
    }

    Ok(if any_local {
        Reconciliation::Continue
    } else if any_external {
        Reconciliation::AwaitExternal
    } else {
        Reconciliation::NoCalls
    })
}

/// The terminal response for a turn that settled every call locally or had
/// none: normal end, unless the provider reported a length stop.
pub(crate) fn terminal_without_tools(output: &TurnOutput) -> TerminalResponse {
    if output.provider_finish == Some(FinishReason::Length) {
        TerminalResponse::new(FinishReason::Length)
    } else {
        TerminalResponse::normal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::Map;
    use tokio_util::sync::CancellationToken;

    use crate::bus::EventBus;
    use crate::context::{AgentContext, ContextRules, RuleBasedContext};
    use crate::event::{EventPayload, UserRequest};
    use crate::memory::Memory;
    use crate::message::MessageRole;
    use crate::pattern::StepInput;
    use crate::provider::{Chat, ChatProvider, ChatResponse, MockChatProvider, ModelId};
    use crate::tool::{Schema, Tool, ToolDescriptor, ToolError, ToolRegistry};

    struct TempTool;

    #[async_trait]
    impl Tool for TempTool {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor::new("temp", "Reads a thermometer.", Schema::object())
        }

        async fn call(
            &self,
            call: ToolCall,
            _cancel: CancellationToken,
        ) -> std::result::Result<ToolCallResult, ToolError> {
            let mut result = Map::new();
            result.insert("temp".to_string(), serde_json::json!(22));
            Ok(ToolCallResult::new(call.id, call.name, result))
        }
    }

    fn context(auto: bool) -> Arc<RuleBasedContext> {
        let mut registry = ToolRegistry::new();
        registry.add(TempTool).unwrap();
        let mut rules = ContextRules::new();
        if auto {
            rules = rules.with_auto_tool("temp");
        }
        Arc::new(
            RuleBasedContext::new("agent-t", "prompt", ModelId::new("mock", "m"))
                .with_registry(Arc::new(registry))
                .with_rules(rules),
        )
    }

    async fn open_chat(provider: &MockChatProvider) -> Box<dyn Chat> {
        provider
            .new_chat("prompt", &ModelId::new("mock", "m"))
            .await
            .unwrap()
    }

    async fn step_over<'c>(
        ctx: &Arc<RuleBasedContext>,
        chat: &'c mut dyn Chat,
    ) -> StepContext<'c> {
        let context: Arc<dyn AgentContext> = ctx.clone();
        let rules = context.rules_snapshot().await;
        StepContext {
            step_id: "step:agent-t:s:1".to_string(),
            context,
            chat,
            emitter: StepEmitter::new(EventBus::new()),
            cancel: CancellationToken::new(),
            rules,
            input: StepInput::default(),
        }
    }

    #[tokio::test]
    async fn test_run_turn_adopts_runtime_and_records_memory() {
        let provider = MockChatProvider::new();
        provider.enqueue_chunks(vec![
            ChatResponse::new("provider-msg-7").with_text("hel"),
            ChatResponse::new("provider-msg-7")
                .with_text("lo")
                .with_finish_reason(FinishReason::NormalEnd),
        ]);
        let ctx = context(false);
        let mut chat = open_chat(&provider).await;
        let mut step = step_over(&ctx, &mut *chat).await;

        let params = crate::context::GenerateContextParams::from_user_request(
            UserRequest::new(Message::user("hi")),
        );
        let turn = run_turn(&mut step, params, None).await.unwrap();

        assert_eq!(turn.text, "hello");
        assert_eq!(turn.runtime.as_ref().unwrap().message_id, "provider-msg-7");
        assert_eq!(turn.provider_finish, Some(FinishReason::NormalEnd));

        // Memory holds the user message then the synthetic assistant message
        // carrying the provider's id.
        let items = ctx.memory().retrieve(-1).await.unwrap();
        let messages: Vec<&Message> =
            items.iter().filter_map(|i| i.as_message()).collect();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[1].id, "provider-msg-7");
        assert_eq!(messages[1].text(), "hello");
    }

    #[tokio::test]
    async fn test_reconcile_auto_executes_from_snapshot() {
        let provider = MockChatProvider::new();
        let ctx = context(true);
        let mut chat = open_chat(&provider).await;
        let mut step = step_over(&ctx, &mut *chat).await;

        let call = ToolCall::new("temp", Map::new());
        let outcome = reconcile(&mut step, &[call]).await.unwrap();
        assert_eq!(outcome, Reconciliation::Continue);

        let items = ctx.memory().retrieve(-1).await.unwrap();
        let result = items[0].as_message().unwrap().tool_call_results()[0].clone();
        assert_eq!(result.result["temp"], 22);
    }

    #[tokio::test]
    async fn test_reconcile_mixed_local_and_gated_continues() {
        // An invalid call settles locally, so the step continues even though
        // another call was externalized.
        let provider = MockChatProvider::new();
        let ctx = context(false);
        let mut chat = open_chat(&provider).await;

        let bus = EventBus::new();
        let actions = Arc::new(std::sync::Mutex::new(0usize));
        let actions_clone = Arc::clone(&actions);
        bus.subscribe(crate::event::topics::EXTERNAL_ACTION, move |event| {
            if matches!(event.payload, EventPayload::ExternalAction(_)) {
                *actions_clone.lock().unwrap() += 1;
            }
        })
        .await
        .unwrap();

        let mut step = step_over(&ctx, &mut *chat).await;
        step.emitter = StepEmitter::new(bus);

        let calls = vec![
            ToolCall::new("bogus", Map::new()),
            ToolCall::new("temp", Map::new()),
        ];
        let outcome = reconcile(&mut step, &calls).await.unwrap();
        assert_eq!(outcome, Reconciliation::Continue);
        assert_eq!(*actions.lock().unwrap(), 1, "the valid gated call was externalized");

        let items = ctx.memory().retrieve(-1).await.unwrap();
        let synthetic = items[0].as_message().unwrap().tool_call_results()[0].clone();
        assert!(synthetic.state().unwrap().starts_with("invalid tool"));
    }

    #[tokio::test]
    async fn test_reconcile_gated_only_awaits_external() {
        let provider = MockChatProvider::new();
        let ctx = context(false);
        let mut chat = open_chat(&provider).await;
        let mut step = step_over(&ctx, &mut *chat).await;

        let calls = vec![ToolCall::new("temp", Map::new())];
        let outcome = reconcile(&mut step, &calls).await.unwrap();
        assert_eq!(outcome, Reconciliation::AwaitExternal);
        assert!(ctx.memory().retrieve(-1).await.unwrap().is_empty());
    }

    #[test]
    fn test_terminal_without_tools_maps_length() {
        let mut output = TurnOutput::default();
        assert_eq!(
            terminal_without_tools(&output).finish_reason,
            FinishReason::NormalEnd
        );
        output.provider_finish = Some(FinishReason::Length);
        assert_eq!(
            terminal_without_tools(&output).finish_reason,
            FinishReason::Length
        );
    }
}
