//! Tools: descriptors, the invocation trait, and the registry.
//!
//! A [`Tool`] describes itself with a [`ToolDescriptor`] (name, description,
//! parameter [`Schema`]) and executes [`ToolCall`]s. A [`ToolRegistry`]
//! holds tools by unique name, dispatches calls, and renders the instruction
//! prose included in prompts.
//!
//! [`ToolCall`]: crate::message::ToolCall

mod errors;
mod registry;
mod schema;
mod traits;

pub use errors::ToolError;
pub use registry::{ToolRegistry, render_instructions};
pub use schema::{Schema, SchemaType, ToolDescriptor};
pub use traits::Tool;
