//! Embedded prompt files.
//!
//! The engine treats prompt text as opaque except for the JSON field
//! contracts each pattern's parser relies on; see the individual files.

/// Built-in prompt files embedded at compile time.
pub mod builtin {
    /// Chain-of-Thought prompt: the response must be a JSON object with
    /// string fields `thinking` and `final_answer`.
    pub const COT: &str = include_str!("cot.md");

    /// ReAct prompt: the response contains one or more JSON blocks with
    /// optional `thought`, `action`, `tool_calls`, `observation`, `answer`
    /// and a required boolean `continue`.
    pub const REACT: &str = include_str!("react.md");

    /// Plan-and-Execute prompt: each turn is either a tool call or a JSON
    /// object with required `executeState` and `reason`.
    pub const PLAN_EXECUTE: &str = include_str!("plan_execute.md");

    /// Retrieval prompt used as the knowledge tool's description.
    pub const RAG: &str = include_str!("rag.md");
}
