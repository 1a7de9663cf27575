//! The per-session driver task.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::bus::EventBus;
use crate::context::AgentContext;
use crate::error::AgentError;
use crate::event::{Event, EventPayload, UserRequest};
use crate::message::FinishReason;
use crate::pattern::{BehaviorPattern, StepContext, StepEmitter, StepInput};
use crate::provider::Chat;

const INPUT_BUFFER: usize = 16;
const OUTPUT_BUFFER: usize = 256;

/// One running session: the input sender, the output receiver, and the
/// driver task handle.
///
/// Dropping the session (or just its input sender) ends the driver once the
/// queued events are drained; cancellation ends it immediately after the
/// current step.
#[derive(Debug)]
pub struct AgentSession {
    input: mpsc::Sender<Event>,
    output: mpsc::Receiver<Event>,
    handle: JoinHandle<()>,
}

impl AgentSession {
    /// A clone of the input sender, for feeding events from elsewhere.
    #[must_use]
    pub fn input(&self) -> mpsc::Sender<Event> {
        self.input.clone()
    }

    /// Send one input event to the driver.
    ///
    /// # Errors
    ///
    /// Fails when the driver has exited.
    pub async fn send(&self, event: Event) -> crate::error::Result<()> {
        self.input
            .send(event)
            .await
            .map_err(|_| AgentError::internal("session driver has exited"))
    }

    /// Receive the next output event. `None` once the driver has exited and
    /// the channel drained.
    pub async fn recv(&mut self) -> Option<Event> {
        self.output.recv().await
    }

    /// Close the input and wait for the driver to finish.
    pub async fn shutdown(self) {
        drop(self.input);
        drop(self.output);
        let _ = self.handle.await;
    }
}

/// Everything the driver task owns.
pub(super) struct SessionConfig {
    pub agent_id: String,
    pub session_id: String,
    pub context: Arc<dyn AgentContext>,
    pub pattern: Arc<dyn BehaviorPattern>,
    pub bus: EventBus,
    pub step_seq: Arc<AtomicU64>,
    pub chat: Box<dyn Chat>,
    pub cancel: CancellationToken,
}

/// Allocate the channels, start the driver task, hand back the session.
pub(super) fn spawn_session(config: SessionConfig) -> AgentSession {
    let (input_tx, input_rx) = mpsc::channel(INPUT_BUFFER);
    let (output_tx, output_rx) = mpsc::channel(OUTPUT_BUFFER);

    let driver = Driver {
        agent_id: config.agent_id,
        session_id: config.session_id,
        context: config.context,
        pattern: config.pattern,
        emitter: StepEmitter::new(config.bus).with_output(output_tx),
        step_seq: config.step_seq,
        chat: config.chat,
        cancel: config.cancel,
    };
    let handle = tokio::spawn(driver.run(input_rx));

    AgentSession {
        input: input_tx,
        output: output_rx,
        handle,
    }
}

struct Driver {
    agent_id: String,
    session_id: String,
    context: Arc<dyn AgentContext>,
    pattern: Arc<dyn BehaviorPattern>,
    emitter: StepEmitter,
    step_seq: Arc<AtomicU64>,
    chat: Box<dyn Chat>,
    cancel: CancellationToken,
}

enum StepEnd {
    SessionContinues,
    SessionEnds,
}

impl Driver {
    fn trace_id(&self, index: u64) -> String {
        format!("step:{}:{}:{}", self.agent_id, self.session_id, index)
    }

    fn next_step_id(&self) -> String {
        let index = self.step_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.trace_id(index)
    }

    async fn run(mut self, mut input: mpsc::Receiver<Event>) {
        debug!(
            agent_id = %self.agent_id,
            session_id = %self.session_id,
            pattern = self.pattern.name(),
            "session started"
        );
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    let trace = self.trace_id(self.step_seq.load(Ordering::SeqCst));
                    self.emitter
                        .emit(Event::response_end(
                            trace,
                            FinishReason::Canceled,
                            Some(AgentError::ChatSessionAbort.to_string()),
                            true,
                        ))
                        .await;
                    break;
                }
                event = input.recv() => {
                    let Some(event) = event else { break };
                    if matches!(self.step(event).await, StepEnd::SessionEnds) {
                        break;
                    }
                }
            }
        }
        debug!(
            agent_id = %self.agent_id,
            session_id = %self.session_id,
            "session ended"
        );
    }

    async fn step(&mut self, event: Event) -> StepEnd {
        let input = match event.payload {
            EventPayload::UserRequest(request) => StepInput {
                user_request: Some(request),
                tool_call_result: None,
            },
            EventPayload::ExternalActionResult(result) => StepInput {
                user_request: result.message.map(UserRequest::new),
                tool_call_result: result.tool_call_result,
            },
            _ => {
                let err = AgentError::invalid_input_event(&event.topic);
                warn!(topic = %event.topic, "dropping invalid input event");
                let trace = self.trace_id(self.step_seq.load(Ordering::SeqCst));
                self.emitter
                    .emit(Event::response_end(
                        trace,
                        FinishReason::Error,
                        Some(err.to_string()),
                        false,
                    ))
                    .await;
                return StepEnd::SessionContinues;
            }
        };

        let step_id = self.next_step_id();
        self.emitter.emit(Event::response_start(&step_id)).await;

        let rules = self.context.rules_snapshot().await;
        let mut step = StepContext {
            step_id: step_id.clone(),
            context: Arc::clone(&self.context),
            chat: &mut *self.chat,
            emitter: self.emitter.clone(),
            cancel: self.cancel.clone(),
            rules,
            input,
        };

        match self.pattern.next_step(&mut step).await {
            Ok(terminal) => {
                let canceled_by_token = terminal.finish_reason == FinishReason::Canceled
                    && self.cancel.is_cancelled();
                self.emitter
                    .emit(Event::response_end(
                        &step_id,
                        terminal.finish_reason,
                        terminal.error,
                        terminal.abort,
                    ))
                    .await;
                if canceled_by_token {
                    StepEnd::SessionEnds
                } else {
                    StepEnd::SessionContinues
                }
            }
            Err(err) if err.is_canceled() => {
                self.emitter
                    .emit(Event::response_end(
                        &step_id,
                        FinishReason::Canceled,
                        Some(err.to_string()),
                        true,
                    ))
                    .await;
                StepEnd::SessionEnds
            }
            Err(err) => {
                warn!(step_id = %step_id, error = %err, "step failed");
                let abort = matches!(err, AgentError::ChatSessionFailed { .. });
                self.emitter
                    .emit(Event::response_end(
                        &step_id,
                        FinishReason::Error,
                        Some(err.to_string()),
                        abort,
                    ))
                    .await;
                StepEnd::SessionContinues
            }
        }
    }
}
