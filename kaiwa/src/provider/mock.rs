//! Scripted chat provider for tests and offline runs.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_stream::stream;
use async_trait::async_trait;

use crate::error::AgentError;
use crate::message::Message;

use super::{Chat, ChatOptions, ChatProvider, ChatResponse, ChatStream, ModelId};

/// One scripted turn.
#[derive(Debug, Clone)]
enum MockTurn {
    /// Stream these chunks, then end.
    Chunks(Vec<ChatResponse>),
    /// Stream these chunks, then stay pending forever (for cancellation
    /// tests).
    ChunksThenHang(Vec<ChatResponse>),
    /// Fail the stream with this message after any chunks already yielded.
    Error(String),
}

/// A chat provider that replays a script.
///
/// Turns are consumed in order across every chat opened from this provider;
/// an exhausted script streams a single empty, normally-finished response.
/// Every request's message list is recorded for assertions.
///
/// # Example
///
/// ```rust,ignore
/// let provider = MockChatProvider::new();
/// provider.enqueue_text(&["po", "ng"]);
/// // First send streams "po" then "ng", then finishes.
/// ```
#[derive(Clone, Default)]
pub struct MockChatProvider {
    script: Arc<Mutex<VecDeque<MockTurn>>>,
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
    next_message: Arc<Mutex<u64>>,
}

impl std::fmt::Debug for MockChatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockChatProvider").finish_non_exhaustive()
    }
}

impl MockChatProvider {
    /// Create a provider with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn mint_message_id(&self) -> String {
        let mut next = self.next_message.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *next += 1;
        format!("mock-msg-{next}")
    }

    fn push(&self, turn: MockTurn) {
        self.script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push_back(turn);
    }

    /// Enqueue a turn from raw chunks.
    pub fn enqueue_chunks(&self, chunks: Vec<ChatResponse>) {
        self.push(MockTurn::Chunks(chunks));
    }

    /// Enqueue a turn streaming the given text pieces one chunk each, then
    /// finishing normally.
    pub fn enqueue_text(&self, pieces: &[&str]) {
        let message_id = self.mint_message_id();
        let mut chunks: Vec<ChatResponse> = pieces
            .iter()
            .map(|piece| ChatResponse::new(&message_id).with_text(*piece))
            .collect();
        if let Some(last) = chunks.last_mut() {
            last.finish_reason = Some(crate::message::FinishReason::NormalEnd);
        } else {
            chunks.push(
                ChatResponse::new(&message_id)
                    .with_finish_reason(crate::message::FinishReason::NormalEnd),
            );
        }
        self.push(MockTurn::Chunks(chunks));
    }

    /// Enqueue a turn emitting one tool call, finishing with `tool_use`.
    pub fn enqueue_tool_call(&self, call: crate::message::ToolCall) {
        let message_id = self.mint_message_id();
        self.push(MockTurn::Chunks(vec![
            ChatResponse::new(message_id)
                .with_tool_call(call)
                .with_finish_reason(crate::message::FinishReason::ToolUse),
        ]));
    }

    /// Enqueue a turn that streams `pieces` and then never completes.
    pub fn enqueue_text_then_hang(&self, pieces: &[&str]) {
        let message_id = self.mint_message_id();
        let chunks = pieces
            .iter()
            .map(|piece| ChatResponse::new(&message_id).with_text(*piece))
            .collect();
        self.push(MockTurn::ChunksThenHang(chunks));
    }

    /// Enqueue a turn that fails the stream.
    pub fn enqueue_error(&self, message: impl Into<String>) {
        self.push(MockTurn::Error(message.into()));
    }

    /// Every request's message list, in send order.
    #[must_use]
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn next_turn(&self) -> MockTurn {
        self.script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| {
                MockTurn::Chunks(vec![
                    ChatResponse::new(self.mint_message_id())
                        .with_finish_reason(crate::message::FinishReason::NormalEnd),
                ])
            })
    }
}

struct MockChat {
    provider: MockChatProvider,
    model: ModelId,
}

#[async_trait]
impl Chat for MockChat {
    async fn send(
        &mut self,
        messages: Vec<Message>,
        _options: ChatOptions,
    ) -> Result<ChatStream, AgentError> {
        self.provider
            .requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(messages);

        let turn = self.provider.next_turn();
        let model = self.model.clone();
        let stream = stream! {
            match turn {
                MockTurn::Chunks(chunks) => {
                    for chunk in chunks {
                        yield Ok(chunk.with_model(model.clone()));
                    }
                }
                MockTurn::ChunksThenHang(chunks) => {
                    for chunk in chunks {
                        yield Ok(chunk.with_model(model.clone()));
                    }
                    futures::future::pending::<()>().await;
                }
                MockTurn::Error(message) => {
                    yield Err(AgentError::chat_session_failed(message));
                }
            }
        };
        Ok(Box::pin(stream))
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    async fn new_chat(
        &self,
        _system_prompt: &str,
        model: &ModelId,
    ) -> Result<Box<dyn Chat>, AgentError> {
        Ok(Box::new(MockChat {
            provider: self.clone(),
            model: model.clone(),
        }))
    }
}
