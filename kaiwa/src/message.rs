//! Message types exchanged between the agent, the model, and tools.
//!
//! A [`Message`] is an immutable, timestamped list of [`MessagePart`]s
//! produced by one of the four [`MessageRole`]s. Tool interactions travel as
//! [`ToolCall`] / [`ToolCallResult`] parts carrying JSON argument and result
//! mappings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::provider::ModelId;

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System message providing instructions.
    System,
    /// User message.
    User,
    /// Assistant (model) message.
    Assistant,
    /// Tool result message.
    Tool,
}

impl MessageRole {
    /// Get the string representation of the role.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// A structured request from the model to invoke a named tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for the call, minted when the call is created.
    pub id: String,
    /// Name of the tool.
    pub name: String,
    /// Arguments passed to the tool.
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    /// Create a new tool call with a freshly minted id.
    #[must_use]
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: format!("call:{}", uuid::Uuid::new_v4().simple()),
            name: name.into(),
            arguments,
        }
    }

    /// Replace the minted id, e.g. with a provider-supplied one.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Look up a single argument by key.
    #[must_use]
    pub fn argument(&self, key: &str) -> Option<&Value> {
        self.arguments.get(key)
    }

    /// Parse the argument mapping as a typed value.
    pub fn parse_arguments<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.arguments.clone()))
    }
}

/// The outcome of a tool call. Carries the originating call id verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Id of the originating [`ToolCall`].
    pub id: String,
    /// Name of the tool.
    pub name: String,
    /// Result mapping.
    pub result: Map<String, Value>,
}

/// Result state recorded when the user rejects a gated tool call.
pub const STATE_USER_SKIPPED: &str = "UserSkipped";

/// Result state recorded when a tool invocation fails or panics.
pub const STATE_INVOKE_FAILED: &str = "InvokeFailed";

impl ToolCallResult {
    /// Create a result for the given call id and tool name.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        result: Map<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            result,
        }
    }

    /// A synthetic result carrying only a `state` marker.
    #[must_use]
    pub fn synthetic(call: &ToolCall, state: impl Into<String>) -> Self {
        let mut result = Map::new();
        result.insert("state".to_string(), Value::String(state.into()));
        Self::new(call.id.clone(), call.name.clone(), result)
    }

    /// A synthetic result recording a failed invocation.
    #[must_use]
    pub fn invoke_failed(call: &ToolCall, error: impl Into<String>) -> Self {
        let mut result = Map::new();
        result.insert(
            "state".to_string(),
            Value::String(STATE_INVOKE_FAILED.to_string()),
        );
        result.insert("error".to_string(), Value::String(error.into()));
        Self::new(call.id.clone(), call.name.clone(), result)
    }

    /// A synthetic result recording a user rejection.
    #[must_use]
    pub fn user_skipped(call: &ToolCall) -> Self {
        Self::synthetic(call, STATE_USER_SKIPPED)
    }

    /// The `state` marker, if this is a synthetic result.
    #[must_use]
    pub fn state(&self) -> Option<&str> {
        self.result.get("state").and_then(Value::as_str)
    }
}

/// One part of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagePart {
    /// Plain text.
    Text {
        /// The text content.
        text: String,
    },
    /// A tool call requested by the model.
    ToolCall(ToolCall),
    /// A tool result fed back to the model.
    ToolCallResult(ToolCallResult),
}

impl MessagePart {
    /// Create a new text part.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Get the text content if this is a text part.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Why a reasoning step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The step completed normally.
    NormalEnd,
    /// The step ended awaiting an externally-confirmed tool call.
    ToolUse,
    /// The step was canceled.
    Canceled,
    /// The step failed.
    Error,
    /// The model hit its length limit.
    Length,
}

impl FinishReason {
    /// Get the string representation of the reason.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NormalEnd => "normal_end",
            Self::ToolUse => "tool_use",
            Self::Canceled => "canceled",
            Self::Error => "error",
            Self::Length => "length",
        }
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier.
    pub id: String,
    /// Role of the creator.
    pub role: MessageRole,
    /// Originating model, when the message came from one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Ordered message parts.
    pub parts: Vec<MessagePart>,
}

impl Message {
    /// Create a message with a freshly minted id.
    #[must_use]
    pub fn new(role: MessageRole, parts: Vec<MessagePart>) -> Self {
        Self {
            id: format!("msg:{}", uuid::Uuid::new_v4().simple()),
            role,
            model: None,
            created_at: Utc::now(),
            parts,
        }
    }

    /// Create a new system message.
    #[must_use]
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(MessageRole::System, vec![MessagePart::text(text)])
    }

    /// Create a new user message.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, vec![MessagePart::text(text)])
    }

    /// Create a new assistant message from plain text.
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, vec![MessagePart::text(text)])
    }

    /// Create an assistant message from text and tool calls; either may be
    /// empty.
    #[must_use]
    pub fn assistant_with(text: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        let text = text.into();
        let mut parts = Vec::with_capacity(1 + tool_calls.len());
        if !text.is_empty() {
            parts.push(MessagePart::text(text));
        }
        parts.extend(tool_calls.into_iter().map(MessagePart::ToolCall));
        Self::new(MessageRole::Assistant, parts)
    }

    /// Create a tool message from results.
    #[must_use]
    pub fn tool(results: Vec<ToolCallResult>) -> Self {
        Self::new(
            MessageRole::Tool,
            results.into_iter().map(MessagePart::ToolCallResult).collect(),
        )
    }

    /// Replace the minted id, e.g. with a provider-supplied one.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Attach the originating model.
    #[must_use]
    pub fn with_model(mut self, model: ModelId) -> Self {
        self.model = Some(model);
        self
    }

    /// Concatenated text of every text part.
    #[must_use]
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(MessagePart::as_text)
            .collect::<Vec<_>>()
            .concat()
    }

    /// All tool calls carried by this message, in part order.
    #[must_use]
    pub fn tool_calls(&self) -> Vec<&ToolCall> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                MessagePart::ToolCall(call) => Some(call),
                _ => None,
            })
            .collect()
    }

    /// All tool results carried by this message, in part order.
    #[must_use]
    pub fn tool_call_results(&self) -> Vec<&ToolCallResult> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                MessagePart::ToolCallResult(result) => Some(result),
                _ => None,
            })
            .collect()
    }

    /// True when the message has no parts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_concatenation() {
        let msg = Message::new(
            MessageRole::Assistant,
            vec![MessagePart::text("po"), MessagePart::text("ng")],
        );
        assert_eq!(msg.text(), "pong");
    }

    #[test]
    fn test_tool_call_ids_are_fresh() {
        let a = ToolCall::new("weather", Map::new());
        let b = ToolCall::new("weather", Map::new());
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("call:"));
    }

    #[test]
    fn test_result_carries_call_id_verbatim() {
        let call = ToolCall::new("weather", Map::new());
        let result = ToolCallResult::synthetic(&call, STATE_USER_SKIPPED);
        assert_eq!(result.id, call.id);
        assert_eq!(result.state(), Some(STATE_USER_SKIPPED));
    }

    #[test]
    fn test_assistant_with_skips_empty_text() {
        let call = ToolCall::new("weather", Map::new());
        let msg = Message::assistant_with("", vec![call]);
        assert_eq!(msg.parts.len(), 1);
        assert_eq!(msg.tool_calls().len(), 1);
        assert_eq!(msg.text(), "");
    }

    #[test]
    fn test_parse_arguments() {
        #[derive(Deserialize)]
        struct Args {
            city: String,
        }
        let mut map = Map::new();
        map.insert("city".to_string(), Value::String("Paris".to_string()));
        let call = ToolCall::new("weather", map);
        let args: Args = call.parse_arguments().expect("arguments should parse");
        assert_eq!(args.city, "Paris");
    }

    #[test]
    fn test_message_part_serde_round_trip() {
        let part = MessagePart::text("hello");
        let json = serde_json::to_string(&part).expect("serialize");
        assert!(json.contains("\"type\":\"text\""));
        let back: MessagePart = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, part);
    }
}
