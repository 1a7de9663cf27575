#![cfg_attr(docsrs, feature(doc_cfg))]
//! Kaiwa is an agent runtime core: a library that turns a streaming chat LLM
//! provider into an autonomous conversational agent with multi-step
//! reasoning, tool use, knowledge retrieval, and planned execution.
//!
//! The moving parts:
//!
//! - [`agent`]: the per-session step loop, one input event in, one
//!   reasoning step out, observable as events.
//! - [`pattern`]: interchangeable reasoning strategies (Generic,
//!   Chain-of-Thought, ReAct, Plan-and-Execute) over a shared streaming
//!   loop.
//! - [`context`]: per-step prompt assembly, tool validation, and the
//!   auto-call policy.
//! - [`tool`]: descriptors, the invocation trait, and the registry.
//! - [`knowledge`]: knowledge bases behind a single retrieval tool.
//! - [`bus`]: the topic pub/sub fabric observers subscribe to.
//! - [`provider`]: the streaming facade adapters implement.
//! - [`memory`] and [`state`]: the conversation log and the keyed store.
//!
//! Wire adapters, vector databases, and UIs live outside this crate; they
//! meet it at the traits in [`provider`], [`knowledge`], and [`bus`].

// Core data model
pub mod error;
pub mod event;
pub mod message;

// Infrastructure
pub mod bus;
pub mod memory;
pub mod state;

// Capabilities
pub mod knowledge;
pub mod prompts;
pub mod tool;

// Engine
pub mod agent;
pub mod context;
pub mod pattern;
pub mod provider;

pub use agent::{Agent, AgentBuilder, AgentSession};
pub use error::{AgentError, ErrorCode, Result};

/// Commonly used types and traits.
pub mod prelude {
    pub use crate::agent::{Agent, AgentBuilder, AgentSession};
    pub use crate::bus::EventBus;
    pub use crate::context::{AgentContext, ContextRules, RuleBasedContext};
    pub use crate::error::{AgentError, ErrorCode, Result};
    pub use crate::event::{
        Event, EventPayload, ExternalAction, ExternalActionResult, UserRequest, topics,
    };
    pub use crate::knowledge::{
        Document, Embedder, InMemoryKnowledgeStorage, KnowledgeBase, KnowledgeStorage,
        KnowledgeTool,
    };
    pub use crate::memory::{InMemoryMemory, Memory, MemoryItem};
    pub use crate::message::{
        FinishReason, Message, MessagePart, MessageRole, ToolCall, ToolCallResult,
    };
    pub use crate::pattern::{
        BehaviorPattern, CotPattern, GenericPattern, PlanExecuteOptions, PlanExecutePattern,
        ReactPattern,
    };
    pub use crate::provider::{
        Chat, ChatOptions, ChatProvider, ChatResponse, ChatStream, EmbedderProvider,
        MockChatProvider, ModelId,
    };
    pub use crate::state::{AgentState, FileState, InMemoryState};
    pub use crate::tool::{Schema, SchemaType, Tool, ToolDescriptor, ToolRegistry};
}
