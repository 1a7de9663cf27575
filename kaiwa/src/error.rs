//! Error types for the kaiwa runtime.
//!
//! Every error the core produces carries a stable [`ErrorCode`] (numeric code
//! plus name) so observers can match on error identity without parsing
//! messages.

use std::fmt;

use crate::bus::BusError;
use crate::knowledge::KnowledgeError;
use crate::memory::MemoryError;
use crate::state::StateError;
use crate::tool::ToolError;

/// A type alias for `Result<T, AgentError>`.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Stable identity of an error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// Numeric code, stable across releases.
    pub code: u16,
    /// Short machine-readable name.
    pub name: &'static str,
}

impl ErrorCode {
    /// An input event arrived on a topic the step loop does not accept.
    pub const INVALID_INPUT_EVENT: Self = Self::new(1001, "invalid_input_event");
    /// The chat session was canceled; the step aborts.
    pub const CHAT_SESSION_ABORT: Self = Self::new(1002, "chat_session_abort");
    /// The chat session failed while streaming; the step aborts.
    pub const CHAT_SESSION_FAILED: Self = Self::new(1003, "chat_session_failed");
    /// Prompt assembly failed.
    pub const GENERATE_CONTEXT_FAILED: Self = Self::new(1004, "generate_context_failed");
    /// A tool call referenced a tool the context does not know.
    pub const INVALID_TOOL_CALL: Self = Self::new(1005, "invalid_tool_call");
    /// The stored plan could not be loaded or decoded.
    pub const LOAD_PLAN_FAILED: Self = Self::new(1006, "load_plan_failed");
    /// The knowledge tool's base selection matched nothing.
    pub const NO_KNOWLEDGE_BASE_FOUND: Self = Self::new(1007, "no_knowledge_base_found");
    /// A tool name is absent from the registry. Permanent; never retried.
    pub const TOOL_NOT_FOUND: Self = Self::new(1008, "tool_not_found");
    /// Embedding generation failed.
    pub const EMBEDDING_FAILED: Self = Self::new(1009, "embedding_failed");
    /// The event bus is closed.
    pub const BUS_CLOSED: Self = Self::new(1010, "bus_closed");
    /// A memory or state backend failed.
    pub const STORAGE: Self = Self::new(1011, "storage");
    /// Anything without a more specific identity.
    pub const INTERNAL: Self = Self::new(1012, "internal");

    const fn new(code: u16, name: &'static str) -> Self {
        Self { code, name }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.code)
    }
}

/// The main error type for agent operations.
#[derive(Debug)]
pub enum AgentError {
    /// An input event arrived on an unexpected topic.
    InvalidInputEvent {
        /// The offending topic.
        topic: String,
    },

    /// The chat session was canceled.
    ChatSessionAbort,

    /// The chat session failed while streaming.
    ChatSessionFailed {
        /// The underlying error message.
        message: String,
    },

    /// Prompt assembly failed.
    GenerateContextFailed {
        /// The underlying error message.
        message: String,
    },

    /// The stored plan could not be loaded or decoded.
    LoadPlanFailed {
        /// The underlying error message.
        message: String,
    },

    /// A tool subsystem error.
    Tool(ToolError),

    /// A knowledge subsystem error.
    Knowledge(KnowledgeError),

    /// The event bus is closed.
    BusClosed,

    /// A memory or state backend failed.
    Storage {
        /// The underlying error message.
        message: String,
    },

    /// Generic internal error.
    Internal {
        /// The underlying error message.
        message: String,
    },
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInputEvent { topic } => {
                write!(f, "invalid input event on topic '{topic}'")
            }
            Self::ChatSessionAbort => write!(f, "chat session canceled"),
            Self::ChatSessionFailed { message } => {
                write!(f, "chat session failed: {message}")
            }
            Self::GenerateContextFailed { message } => {
                write!(f, "generate context failed: {message}")
            }
            Self::LoadPlanFailed { message } => write!(f, "load plan failed: {message}"),
            Self::Tool(err) => write!(f, "tool error: {err}"),
            Self::Knowledge(err) => write!(f, "knowledge error: {err}"),
            Self::BusClosed => write!(f, "event bus is closed"),
            Self::Storage { message } => write!(f, "storage error: {message}"),
            Self::Internal { message } => write!(f, "internal error: {message}"),
        }
    }
}

impl std::error::Error for AgentError {}

impl AgentError {
    /// Stable identity of this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidInputEvent { .. } => ErrorCode::INVALID_INPUT_EVENT,
            Self::ChatSessionAbort => ErrorCode::CHAT_SESSION_ABORT,
            Self::ChatSessionFailed { .. } => ErrorCode::CHAT_SESSION_FAILED,
            Self::GenerateContextFailed { .. } => ErrorCode::GENERATE_CONTEXT_FAILED,
            Self::LoadPlanFailed { .. } => ErrorCode::LOAD_PLAN_FAILED,
            Self::Tool(err) => err.code(),
            Self::Knowledge(err) => err.code(),
            Self::BusClosed => ErrorCode::BUS_CLOSED,
            Self::Storage { .. } => ErrorCode::STORAGE,
            Self::Internal { .. } => ErrorCode::INTERNAL,
        }
    }

    /// True when this error means the step was canceled rather than failed.
    #[must_use]
    pub const fn is_canceled(&self) -> bool {
        matches!(self, Self::ChatSessionAbort)
    }

    /// Create a new invalid-input-event error.
    #[must_use]
    pub fn invalid_input_event(topic: impl Into<String>) -> Self {
        Self::InvalidInputEvent {
            topic: topic.into(),
        }
    }

    /// Create a new chat-session-failed error.
    #[must_use]
    pub fn chat_session_failed(message: impl Into<String>) -> Self {
        Self::ChatSessionFailed {
            message: message.into(),
        }
    }

    /// Create a new generate-context-failed error.
    #[must_use]
    pub fn generate_context_failed(message: impl Into<String>) -> Self {
        Self::GenerateContextFailed {
            message: message.into(),
        }
    }

    /// Create a new load-plan-failed error.
    #[must_use]
    pub fn load_plan_failed(message: impl Into<String>) -> Self {
        Self::LoadPlanFailed {
            message: message.into(),
        }
    }

    /// Create a new storage error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<ToolError> for AgentError {
    fn from(err: ToolError) -> Self {
        Self::Tool(err)
    }
}

impl From<KnowledgeError> for AgentError {
    fn from(err: KnowledgeError) -> Self {
        Self::Knowledge(err)
    }
}

impl From<MemoryError> for AgentError {
    fn from(err: MemoryError) -> Self {
        Self::Storage {
            message: err.to_string(),
        }
    }
}

impl From<StateError> for AgentError {
    fn from(err: StateError) -> Self {
        Self::Storage {
            message: err.to_string(),
        }
    }
}

impl From<BusError> for AgentError {
    fn from(_: BusError) -> Self {
        Self::BusClosed
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(ErrorCode::INVALID_INPUT_EVENT.code, 1001);
        assert_eq!(ErrorCode::TOOL_NOT_FOUND.name, "tool_not_found");
        assert_eq!(
            AgentError::invalid_input_event("bogus").code(),
            ErrorCode::INVALID_INPUT_EVENT
        );
        assert_eq!(AgentError::ChatSessionAbort.code(), ErrorCode::CHAT_SESSION_ABORT);
    }

    #[test]
    fn test_tool_error_code_passthrough() {
        let err = AgentError::from(ToolError::not_found("weather"));
        assert_eq!(err.code(), ErrorCode::TOOL_NOT_FOUND);
        assert!(err.to_string().contains("weather"));
    }

    #[test]
    fn test_canceled_marker() {
        assert!(AgentError::ChatSessionAbort.is_canceled());
        assert!(!AgentError::internal("boom").is_canceled());
    }
}
