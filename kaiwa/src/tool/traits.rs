//! The tool invocation trait.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::message::{ToolCall, ToolCallResult};

use super::errors::ToolError;
use super::schema::ToolDescriptor;

/// An invocable tool.
///
/// Implementations are object-safe and shared behind `Arc`, so a call takes
/// `&self`; any per-call state belongs in the call itself. The cancellation
/// token is the step's: a long-running tool should watch it and bail out,
/// but how (and whether) it honors the token is the tool's decision.
///
/// # Example
///
/// ```rust,ignore
/// struct Weather;
///
/// #[async_trait]
/// impl Tool for Weather {
///     fn descriptor(&self) -> ToolDescriptor {
///         ToolDescriptor::new(
///             "weather",
///             "Current weather for a city.",
///             Schema::object()
///                 .property("city", Schema::string().describe("City name"))
///                 .require("city"),
///         )
///     }
///
///     async fn call(
///         &self,
///         call: ToolCall,
///         _cancel: CancellationToken,
///     ) -> Result<ToolCallResult, ToolError> {
///         let mut result = serde_json::Map::new();
///         result.insert("temp".into(), serde_json::json!(22));
///         Ok(ToolCallResult::new(call.id, call.name, result))
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// The tool's descriptor. Must be stable for the registry's lifetime.
    fn descriptor(&self) -> ToolDescriptor;

    /// Execute one call. The result must carry the call's id verbatim.
    async fn call(
        &self,
        call: ToolCall,
        cancel: CancellationToken,
    ) -> Result<ToolCallResult, ToolError>;
}
