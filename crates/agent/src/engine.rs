//! The chat engine: the bounded loop that turns one user message into model
//! calls, tool invocations and delegations, all on one event stream.
//!
//! Per iteration:
//!
//! 1. call the model with the full history and the tool schemas;
//! 2. forward content deltas, collect requested tool calls;
//! 3. without tool calls, append the answer and emit `completed`;
//! 4. otherwise append the assistant message, run each call in order
//!    (appending its `tool` message right after), and loop.
//!
//! Hitting `max_tool_iterations` is a hard failure.

use agentrelay_core::context::ToolContext;
use agentrelay_core::error::{Error, ProviderError, StreamError};
use agentrelay_core::event::EventKind;
use agentrelay_core::history::HistoryStore;
use agentrelay_core::message::{History, Message, TokenUsage};
use agentrelay_core::provider::{ChunkStatus, LlmEngine, ToolDefinition};
use agentrelay_core::tool::{ToolCall, ToolOutcome};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::dispatcher::ToolDispatcher;

/// Everything one run needs, snapshotted when the run starts.
pub struct ChatEngine {
    llm: Arc<dyn LlmEngine>,
    dispatcher: ToolDispatcher,
    definitions: Vec<ToolDefinition>,
    system_prompt: Arc<str>,
    max_tool_iterations: u32,
    store: Option<Arc<dyn HistoryStore>>,
}

/// What one model turn produced.
struct ModelTurn {
    content: String,
    tool_calls: Vec<ToolCall>,
    usage: Option<TokenUsage>,
}

impl ChatEngine {
    pub fn new(
        llm: Arc<dyn LlmEngine>,
        dispatcher: ToolDispatcher,
        system_prompt: Arc<str>,
        max_tool_iterations: u32,
    ) -> Self {
        let definitions = dispatcher.tools().definitions();
        Self {
            llm,
            dispatcher,
            definitions,
            system_prompt,
            max_tool_iterations,
            store: None,
        }
    }

    pub fn with_store(mut self, store: Option<Arc<dyn HistoryStore>>) -> Self {
        self.store = store;
        self
    }

    /// Drive one run to its end and emit the terminal event.
    ///
    /// A cancelled or abandoned stream ends the run silently.
    pub async fn run(&self, history: &mut History, message: String, ctx: &ToolContext) {
        info!(
            agent = ctx.agent_name(),
            trace = ctx.trace(),
            depth = ctx.scope().depth(),
            "run started"
        );

        let terminal = match self.drive(history, message, ctx).await {
            Ok((content, usage)) => ctx.emit(EventKind::Completed {
                full_content: content,
                usage,
            }),
            Err(Error::Stream(reason)) => {
                debug!(agent = ctx.agent_name(), %reason, "run stopped");
                return;
            }
            Err(e) => {
                error!(agent = ctx.agent_name(), error = %e, "run failed");
                ctx.emit(EventKind::Error {
                    message: e.to_string(),
                })
            }
        };
        match terminal.await {
            Ok(()) => info!(agent = ctx.agent_name(), messages = history.len(), "run finished"),
            Err(reason) => debug!(agent = ctx.agent_name(), %reason, "terminal event not delivered"),
        }
    }

    async fn drive(
        &self,
        history: &mut History,
        message: String,
        ctx: &ToolContext,
    ) -> Result<(String, Option<TokenUsage>), Error> {
        if history.ensure_system(&self.system_prompt) {
            debug!(agent = ctx.agent_name(), "system prompt inserted");
        }
        history.push(Message::user(message))?;
        self.persist(history).await;

        let mut iterations = 0;
        loop {
            debug!(
                agent = ctx.agent_name(),
                iteration = iterations + 1,
                engine = self.llm.name(),
                "calling model"
            );
            let turn = self.model_turn(history, ctx).await?;

            if turn.tool_calls.is_empty() {
                history.push(Message::assistant(turn.content.clone(), turn.usage))?;
                self.persist(history).await;
                return Ok((turn.content, turn.usage));
            }

            history.push(Message::assistant_with_tool_calls(
                turn.content,
                turn.tool_calls.clone(),
                turn.usage,
            ))?;
            self.persist(history).await;

            for (index, call) in turn.tool_calls.iter().enumerate() {
                let outcome = match self.dispatcher.execute(call, ctx).await {
                    Ok(outcome) => outcome,
                    Err(reason) => {
                        // Every call in the assistant message still needs an
                        // answer, or the next run starts from a broken history.
                        for pending in &turn.tool_calls[index..] {
                            let failed =
                                ToolOutcome::failed(pending, format!("interrupted: {reason}"));
                            history.push(Message::tool_result(
                                &failed.tool_call_id,
                                failed.history_content(),
                            ))?;
                        }
                        self.persist(history).await;
                        return Err(reason.into());
                    }
                };
                history.push(Message::tool_result(
                    &outcome.tool_call_id,
                    outcome.history_content(),
                ))?;
                self.persist(history).await;
            }

            iterations += 1;
            if iterations >= self.max_tool_iterations {
                warn!(
                    agent = ctx.agent_name(),
                    max = self.max_tool_iterations,
                    "tool iteration limit reached"
                );
                return Err(Error::IterationsExhausted(self.max_tool_iterations));
            }
        }
    }

    /// Consume one streamed model turn, forwarding content as it arrives.
    async fn model_turn(&self, history: &History, ctx: &ToolContext) -> Result<ModelTurn, Error> {
        let cancel = ctx.scope().cancellation();
        let mut chunks = self
            .llm
            .chat_stream(history.messages(), &self.definitions)
            .await?;

        let mut turn = ModelTurn {
            content: String::new(),
            tool_calls: Vec::new(),
            usage: None,
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(StreamError::Cancelled.into()),
                next = chunks.recv() => next,
            };
            let Some(chunk) = next else {
                debug!(agent = ctx.agent_name(), "model stream closed without a terminal chunk");
                break;
            };
            let chunk = chunk?;

            match chunk.status {
                ChunkStatus::Streaming => {
                    if chunk.content.is_empty() {
                        continue;
                    }
                    turn.content.push_str(&chunk.content);
                    ctx.emit(EventKind::ContentDelta {
                        delta: chunk.content,
                        full_content: turn.content.clone(),
                    })
                    .await?;
                }
                ChunkStatus::ToolCall => {
                    ctx.emit(EventKind::ToolCallsRequested {
                        tool_calls: chunk.tool_calls.clone(),
                    })
                    .await?;
                    turn.tool_calls.extend(chunk.tool_calls);
                }
                ChunkStatus::Completed => {
                    if turn.content.is_empty() && !chunk.full_content.is_empty() {
                        turn.content = chunk.full_content;
                    }
                    turn.usage = chunk.usage;
                    break;
                }
                ChunkStatus::Error => {
                    return Err(ProviderError::StreamFailed(chunk.content).into());
                }
            }
        }
        Ok(turn)
    }

    /// Save the whole history. Failures are logged and otherwise ignored.
    async fn persist(&self, history: &History) {
        if let Some(store) = &self.store
            && let Err(e) = store.save_history(history.messages()).await
        {
            warn!(store = store.name(), error = %e, "failed to persist history");
        }
    }
}
