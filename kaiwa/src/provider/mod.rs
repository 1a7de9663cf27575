//! The provider streaming façade.
//!
//! A [`ChatProvider`] opens [`Chat`] sessions; each `send` yields a lazy
//! finite stream of [`ChatResponse`] chunks. Wire protocols (OpenAI,
//! Anthropic, local servers) live in adapter crates that implement these
//! traits and register their models in the process-wide registry
//! ([`register_model`]).

mod mock;
mod model;

pub use mock::MockChatProvider;
pub use model::{ModelId, register_model, registered_models, resolve_model};

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AgentError;
use crate::knowledge::{Embedder, KnowledgeError};
use crate::message::{FinishReason, Message, MessagePart, ToolCall};
use crate::tool::ToolDescriptor;

/// An open-ended bag of chat options.
///
/// The recognized options are typed; anything else travels in `extra` and is
/// interpreted by the provider adapter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatOptions {
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Whether the provider should stream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streaming: Option<bool>,
    /// Tools offered to the model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDescriptor>>,
    /// Provider-specific options.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl ChatOptions {
    /// Create empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sampling temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the streaming flag.
    #[must_use]
    pub const fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = Some(streaming);
        self
    }

    /// Offer tools to the model, replacing any previous list.
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolDescriptor>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Attach a provider-specific option.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// One streamed chunk of a chat response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The provider's message id; constant across one response's chunks.
    pub message_id: String,
    /// The responding model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelId>,
    /// Parts carried by this chunk.
    pub parts: Vec<MessagePart>,
    /// Set on the final chunk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

impl ChatResponse {
    /// Create an empty chunk for the given message id.
    #[must_use]
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            model: None,
            parts: Vec::new(),
            finish_reason: None,
        }
    }

    /// Attach the responding model.
    #[must_use]
    pub fn with_model(mut self, model: ModelId) -> Self {
        self.model = Some(model);
        self
    }

    /// Append a text part.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.parts.push(MessagePart::text(text));
        self
    }

    /// Append a tool-call part.
    #[must_use]
    pub fn with_tool_call(mut self, call: ToolCall) -> Self {
        self.parts.push(MessagePart::ToolCall(call));
        self
    }

    /// Mark this as the final chunk.
    #[must_use]
    pub const fn with_finish_reason(mut self, reason: FinishReason) -> Self {
        self.finish_reason = Some(reason);
        self
    }
}

/// A lazy finite sequence of response chunks. Must not be re-iterated.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatResponse, AgentError>> + Send>>;

/// An open chat session.
#[async_trait]
pub trait Chat: Send + Sync {
    /// Send messages and stream the response.
    ///
    /// Dropping the returned stream aborts the in-flight request.
    async fn send(
        &mut self,
        messages: Vec<Message>,
        options: ChatOptions,
    ) -> Result<ChatStream, AgentError>;
}

/// Opens chat sessions against one provider.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Open a new chat session for the given system prompt and model.
    async fn new_chat(
        &self,
        system_prompt: &str,
        model: &ModelId,
    ) -> Result<Box<dyn Chat>, AgentError>;
}

/// Produces embedding vectors, one per input text.
#[async_trait]
pub trait EmbedderProvider: Send + Sync {
    /// Embed every text.
    async fn get_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AgentError>;
}

/// Bridges an [`EmbedderProvider`] to the knowledge [`Embedder`] seam.
#[derive(Clone)]
pub struct ProviderEmbedder {
    provider: Arc<dyn EmbedderProvider>,
}

impl std::fmt::Debug for ProviderEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEmbedder").finish_non_exhaustive()
    }
}

impl ProviderEmbedder {
    /// Wrap a provider.
    #[must_use]
    pub fn new(provider: Arc<dyn EmbedderProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Embedder for ProviderEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, KnowledgeError> {
        self.provider
            .get_embeddings(texts)
            .await
            .map_err(|e| KnowledgeError::Embedding(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_options_builders() {
        let options = ChatOptions::new()
            .with_temperature(0.2)
            .with_streaming(true)
            .with_extra("top_p", serde_json::json!(0.9));
        assert_eq!(options.temperature, Some(0.2));
        assert_eq!(options.streaming, Some(true));
        assert_eq!(options.extra["top_p"], 0.9);
    }

    #[test]
    fn test_chat_response_builders() {
        let response = ChatResponse::new("m1")
            .with_text("hi")
            .with_finish_reason(FinishReason::NormalEnd);
        assert_eq!(response.message_id, "m1");
        assert_eq!(response.parts.len(), 1);
        assert_eq!(response.finish_reason, Some(FinishReason::NormalEnd));
    }
}
