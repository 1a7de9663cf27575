//! Events published by the agent core.
//!
//! Every observable occurrence travels as an [`Event`]: a timestamped,
//! uniquely identified envelope binding a topic string to a typed payload.
//! The core's topics are listed in [`topics`]; external observers may publish
//! their own topics with [`EventPayload::Custom`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::{FinishReason, Message, ToolCall, ToolCallResult};
use crate::provider::ChatOptions;

/// Topic names used by the core.
pub mod topics {
    /// A user request entering the agent.
    pub const USER_REQUEST: &str = "user_request";
    /// An externally-confirmed action the agent asks an observer to perform.
    pub const EXTERNAL_ACTION: &str = "external_action";
    /// The observer's reply to an external action.
    pub const EXTERNAL_ACTION_RESULT: &str = "external_action_result";
    /// Incremental or synthetic assistant output.
    pub const AGENT_MESSAGE: &str = "agent_message";
    /// A reasoning step started.
    pub const AGENT_RESPONSE_START: &str = "agent_response_start";
    /// A reasoning step ended.
    pub const AGENT_RESPONSE_END: &str = "agent_response_end";
}

/// A user request: the message plus chat options for the step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRequest {
    /// The user's message.
    pub message: Message,
    /// Chat options forwarded to the provider.
    #[serde(default)]
    pub options: ChatOptions,
}

impl UserRequest {
    /// Create a request with default chat options.
    #[must_use]
    pub fn new(message: Message) -> Self {
        Self {
            message,
            options: ChatOptions::default(),
        }
    }

    /// Attach chat options.
    #[must_use]
    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }
}

/// A request for an outside observer to act: show a message, or execute a
/// tool call after confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalAction {
    /// A message for the observer, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    /// A tool call awaiting confirmation, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCall>,
}

/// The observer's reply to an [`ExternalAction`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalActionResult {
    /// A follow-up message from the user, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    /// The tool result (real or synthetic `UserSkipped`), when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_result: Option<ToolCallResult>,
}

/// Assistant output attributed to a step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    /// The step id this output belongs to.
    pub trace_id: String,
    /// The message.
    pub message: Message,
}

/// Marks the start of a reasoning step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseStart {
    /// The step id.
    pub trace_id: String,
}

/// Marks the end of a reasoning step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnd {
    /// The step id.
    pub trace_id: String,
    /// Why the step ended.
    pub finish_reason: FinishReason,
    /// Error message, when the step ended abnormally.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// True when the step aborted.
    #[serde(default)]
    pub abort: bool,
}

/// Typed event payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[non_exhaustive]
pub enum EventPayload {
    /// See [`UserRequest`].
    UserRequest(UserRequest),
    /// See [`ExternalAction`].
    ExternalAction(ExternalAction),
    /// See [`ExternalActionResult`].
    ExternalActionResult(ExternalActionResult),
    /// See [`AgentMessage`].
    AgentMessage(AgentMessage),
    /// See [`ResponseStart`].
    ResponseStart(ResponseStart),
    /// See [`ResponseEnd`].
    ResponseEnd(ResponseEnd),
    /// An observer-defined payload on an observer-defined topic.
    Custom(Value),
}

/// A published event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier.
    pub id: String,
    /// Publication timestamp.
    pub timestamp: DateTime<Utc>,
    /// Topic string.
    pub topic: String,
    /// Payload.
    pub payload: EventPayload,
}

impl Event {
    /// Create an event with a freshly minted id and the current timestamp.
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: format!("evt:{}", uuid::Uuid::new_v4().simple()),
            timestamp: Utc::now(),
            topic: topic.into(),
            payload,
        }
    }

    /// A `user_request` event.
    #[must_use]
    pub fn user_request(request: UserRequest) -> Self {
        Self::new(topics::USER_REQUEST, EventPayload::UserRequest(request))
    }

    /// An `external_action` event.
    #[must_use]
    pub fn external_action(action: ExternalAction) -> Self {
        Self::new(topics::EXTERNAL_ACTION, EventPayload::ExternalAction(action))
    }

    /// An `external_action_result` event.
    #[must_use]
    pub fn external_action_result(result: ExternalActionResult) -> Self {
        Self::new(
            topics::EXTERNAL_ACTION_RESULT,
            EventPayload::ExternalActionResult(result),
        )
    }

    /// An `agent_message` event.
    #[must_use]
    pub fn agent_message(trace_id: impl Into<String>, message: Message) -> Self {
        Self::new(
            topics::AGENT_MESSAGE,
            EventPayload::AgentMessage(AgentMessage {
                trace_id: trace_id.into(),
                message,
            }),
        )
    }

    /// An `agent_response_start` event.
    #[must_use]
    pub fn response_start(trace_id: impl Into<String>) -> Self {
        Self::new(
            topics::AGENT_RESPONSE_START,
            EventPayload::ResponseStart(ResponseStart {
                trace_id: trace_id.into(),
            }),
        )
    }

    /// An `agent_response_end` event.
    #[must_use]
    pub fn response_end(
        trace_id: impl Into<String>,
        finish_reason: FinishReason,
        error: Option<String>,
        abort: bool,
    ) -> Self {
        Self::new(
            topics::AGENT_RESPONSE_END,
            EventPayload::ResponseEnd(ResponseEnd {
                trace_id: trace_id.into(),
                finish_reason,
                error,
                abort,
            }),
        )
    }

    /// The step id this event belongs to, when the payload carries one.
    #[must_use]
    pub fn trace_id(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::AgentMessage(m) => Some(&m.trace_id),
            EventPayload::ResponseStart(s) => Some(&s.trace_id),
            EventPayload::ResponseEnd(e) => Some(&e.trace_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_pick_canonical_topics() {
        let ev = Event::user_request(UserRequest::new(Message::user("hi")));
        assert_eq!(ev.topic, topics::USER_REQUEST);

        let ev = Event::response_start("step:a:s:1");
        assert_eq!(ev.topic, topics::AGENT_RESPONSE_START);
        assert_eq!(ev.trace_id(), Some("step:a:s:1"));
    }

    #[test]
    fn test_event_ids_are_unique() {
        let a = Event::response_start("t");
        let b = Event::response_start("t");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_response_end_serde() {
        let ev = Event::response_end("t", FinishReason::Canceled, Some("canceled".into()), true);
        let json = serde_json::to_string(&ev).expect("serialize");
        assert!(json.contains("\"finish_reason\":\"canceled\""));
        assert!(json.contains("\"abort\":true"));
    }
}
