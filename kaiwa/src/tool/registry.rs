//! The tool registry: unique names, dispatch, instruction prose.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::message::{ToolCall, ToolCallResult};

use super::errors::ToolError;
use super::schema::ToolDescriptor;
use super::traits::Tool;

/// Holds tools keyed by their descriptor name, in insertion order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.index.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateName`] when a tool with the same
    /// descriptor name is already registered.
    pub fn add(&mut self, tool: impl Tool + 'static) -> Result<(), ToolError> {
        self.add_arc(Arc::new(tool))
    }

    /// Register an already-shared tool.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateName`] when a tool with the same
    /// descriptor name is already registered.
    pub fn add_arc(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.descriptor().name;
        if self.index.contains_key(&name) {
            return Err(ToolError::DuplicateName(name));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// True when a tool with this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// True when no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Look up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&i| Arc::clone(&self.tools[i]))
    }

    /// Every descriptor, in insertion order.
    #[must_use]
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor()).collect()
    }

    /// Dispatch a call to the named tool.
    ///
    /// The call runs on its own task, so a panicking tool surfaces as
    /// [`ToolError::Invoke`] instead of unwinding the caller.
    ///
    /// # Errors
    ///
    /// Returns the permanent [`ToolError::NotFound`] for unknown names, or
    /// whatever the tool itself fails with.
    pub async fn call(
        &self,
        call: &ToolCall,
        cancel: CancellationToken,
    ) -> Result<ToolCallResult, ToolError> {
        let Some(tool) = self.get(&call.name) else {
            return Err(ToolError::not_found(&call.name));
        };
        debug!(tool = %call.name, call_id = %call.id, "dispatching tool call");

        let owned = call.clone();
        let name = call.name.clone();
        match tokio::spawn(async move { tool.call(owned, cancel).await }).await {
            Ok(result) => result,
            Err(join_err) => Err(ToolError::invoke(
                name,
                format!("tool task panicked: {join_err}"),
            )),
        }
    }

    /// Render the fenced tool catalogue for inclusion in prompts.
    ///
    /// Deterministic in descriptor-insertion order.
    #[must_use]
    pub fn instructions(&self) -> String {
        render_instructions(&self.descriptors())
    }
}

/// Render the fenced tool catalogue for an arbitrary descriptor list.
///
/// Deterministic in list order.
#[must_use]
pub fn render_instructions(descriptors: &[ToolDescriptor]) -> String {
    let mut out = String::from("The following tools are available to you:\n\n```\n<tools>\n");
    for descriptor in descriptors {
        out.push_str(&format!(
            "<tool name=\"{}\">\n{}\n</tool>\n",
            descriptor.name, descriptor.description
        ));
    }
    out.push_str("</tools>\n```");
    out
}
