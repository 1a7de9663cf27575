//! The agent: configuration, sessions, and the step loop.
//!
//! An [`Agent`] binds a context, a behavior pattern, and a provider.
//! [`Agent::run`] opens one session: a driver task that consumes input
//! events and runs one reasoning step per input, emitting lifecycle events
//! on the shared bus and the session's output channel.
//!
//! # Example
//!
//! ```rust,ignore
//! let agent = Agent::builder()
//!     .system_prompt("You are helpful.")
//!     .model(ModelId::new("mock", "test"))
//!     .provider(Arc::new(provider))
//!     .tool(WeatherTool)
//!     .auto_tool("weather")
//!     .build()?;
//!
//! let mut session = agent.run("session-1", CancellationToken::new()).await?;
//! session.send(Event::user_request(UserRequest::new(Message::user("hi")))).await?;
//! while let Some(event) = session.recv().await { /* observe */ }
//! ```

mod builder;
mod session;

pub use builder::AgentBuilder;
pub use session::AgentSession;

use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::bus::EventBus;
use crate::context::AgentContext;
use crate::error::Result;
use crate::pattern::BehaviorPattern;
use crate::provider::ChatProvider;

/// An autonomous conversational agent.
pub struct Agent {
    id: String,
    context: Arc<dyn AgentContext>,
    pattern: Arc<dyn BehaviorPattern>,
    provider: Arc<dyn ChatProvider>,
    bus: EventBus,
    step_seq: Arc<AtomicU64>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("pattern", &self.pattern.name())
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Create a new agent builder.
    #[inline]
    #[must_use]
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    /// The agent's id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The shared event bus.
    #[inline]
    #[must_use]
    pub const fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// The agent's context.
    #[inline]
    #[must_use]
    pub const fn context(&self) -> &Arc<dyn AgentContext> {
        &self.context
    }

    /// Mutate the context rules: mark tools as auto-callable (or not).
    ///
    /// The snapshot a running step took at entry is unaffected; the next
    /// step observes the update.
    pub async fn update_context_rules(&self, enable: &[String], disable: &[String]) {
        self.context.update_rules(enable, disable).await;
    }

    /// Open one session: a new provider chat plus a driver task consuming
    /// input events until cancellation (or until the input channel closes).
    ///
    /// # Errors
    ///
    /// Fails when the provider cannot open a chat session.
    #[instrument(skip(self, cancel), fields(agent_id = %self.id))]
    pub async fn run(
        &self,
        session_id: impl Into<String> + std::fmt::Debug,
        cancel: CancellationToken,
    ) -> Result<AgentSession> {
        let session_id = session_id.into();
        let system_instruction = self.pattern.system_instruction(self.context.system_prompt());
        let chat = self
            .provider
            .new_chat(&system_instruction, self.context.model())
            .await?;

        Ok(session::spawn_session(session::SessionConfig {
            agent_id: self.id.clone(),
            session_id,
            context: Arc::clone(&self.context),
            pattern: Arc::clone(&self.pattern),
            bus: self.bus.clone(),
            step_seq: Arc::clone(&self.step_seq),
            chat,
            cancel,
        }))
    }
}
