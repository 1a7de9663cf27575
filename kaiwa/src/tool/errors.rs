//! Tool subsystem errors.

use crate::error::ErrorCode;

/// Errors produced by tools and the registry.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The named tool is absent from the registry. Permanent; never retried.
    #[error("tool '{0}' not found")]
    NotFound(String),

    /// A tool with this name is already registered.
    #[error("tool '{0}' is already registered")]
    DuplicateName(String),

    /// The call's argument mapping did not match the tool's schema.
    #[error("invalid arguments for tool '{tool}': {message}")]
    InvalidArguments {
        /// Tool name.
        tool: String,
        /// What was wrong.
        message: String,
    },

    /// The tool ran and failed (including panics).
    #[error("tool '{tool}' failed: {message}")]
    Invoke {
        /// Tool name.
        tool: String,
        /// The underlying error message.
        message: String,
    },
}

impl ToolError {
    /// Create a new not-found error.
    #[must_use]
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    /// Create a new invalid-arguments error.
    #[must_use]
    pub fn invalid_arguments(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a new invocation error.
    #[must_use]
    pub fn invoke(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invoke {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Stable identity of this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::TOOL_NOT_FOUND,
            Self::InvalidArguments { .. } => ErrorCode::INVALID_TOOL_CALL,
            Self::DuplicateName(_) | Self::Invoke { .. } => ErrorCode::INTERNAL,
        }
    }

    /// True when retrying can never succeed.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::DuplicateName(_))
    }
}
