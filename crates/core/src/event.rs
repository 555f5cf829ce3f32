//! Run events and the bounded stream that carries them.
//!
//! One `Agent::run` produces one [`EventStream`]. The run task owns the
//! producing [`EventSender`]; clones of it are handed to tools as a side
//! channel. The stream ends after exactly one terminal event of the owning
//! agent (`Completed` or `Error`), or closes silently when the run was
//! cancelled or the producer went away.

use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::StreamError;
use crate::message::TokenUsage;
use crate::tool::{ToolCall, ToolOutcome};

/// Capacity of the producer → consumer channel. A slow consumer blocks the run.
pub const EVENT_BUFFER: usize = 16;

/// One element of an event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireEvent", try_from = "WireEvent")]
pub struct Event {
    /// Agent that produced the event
    pub agent_name: String,
    /// Logical role label (e.g. "reasoning")
    pub trace: String,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// A piece of model output.
    ContentDelta { delta: String, full_content: String },
    /// The model asked for tools this turn.
    ToolCallsRequested { tool_calls: Vec<ToolCall> },
    /// A tool is about to run.
    ToolExecuting { tool_call: ToolCall },
    /// A tool finished (successfully or not).
    ToolResult { outcome: ToolOutcome },
    /// A `delegate` call is handing over to a sub-agent.
    DelegationStarted { sub_agent: String },
    /// The sub-agent's stream closed.
    DelegationFinished { sub_agent: String, success: bool },
    /// The run finished normally.
    Completed {
        full_content: String,
        usage: Option<TokenUsage>,
    },
    /// The run failed.
    Error { message: String },
}

impl EventKind {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Error { .. })
    }

    /// Wire `status` value.
    pub fn status(&self) -> &'static str {
        match self {
            Self::ContentDelta { .. } => "streaming",
            Self::ToolCallsRequested { .. } => "tool-call",
            Self::ToolExecuting { .. } => "tool-executing",
            Self::ToolResult { .. } => "tool-result",
            Self::DelegationStarted { .. } => "delegation-start",
            Self::DelegationFinished { success: true, .. } => "delegation-end",
            Self::DelegationFinished { success: false, .. } => "delegation-failed",
            Self::Completed { .. } => "completed",
            Self::Error { .. } => "error",
        }
    }

    /// Wire `type` value.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ContentDelta { .. } => "content",
            Self::ToolCallsRequested { .. } => "tool-call",
            Self::ToolExecuting { .. } => "tool-executing",
            Self::ToolResult { .. } => "tool-result",
            Self::DelegationStarted { .. } | Self::DelegationFinished { .. } => "delegation",
            Self::Completed { .. } => "completion",
            Self::Error { .. } => "error",
        }
    }
}

impl Event {
    pub fn new(agent_name: impl Into<String>, trace: impl Into<String>, kind: EventKind) -> Self {
        Self {
            agent_name: agent_name.into(),
            trace: trace.into(),
            kind,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }

    /// Set identity fields that are still empty. Already-set fields are kept.
    pub fn fill_identity(&mut self, agent_name: &str, trace: &str) {
        if self.agent_name.is_empty() {
            self.agent_name = agent_name.to_string();
        }
        if self.trace.is_empty() {
            self.trace = trace.to_string();
        }
    }

    /// Text delta carried by this event, if any.
    pub fn delta(&self) -> Option<&str> {
        match &self.kind {
            EventKind::ContentDelta { delta, .. } => Some(delta),
            _ => None,
        }
    }
}

/// Flat wire form of an [`Event`], as sent across process boundaries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEvent {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub delta: String,
    #[serde(default)]
    pub full_content: String,
    pub status: String,
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_executing: Option<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_results: Option<Vec<ToolOutcome>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u32>,
    #[serde(default)]
    pub agent_name: String,
    #[serde(default)]
    pub trace: String,
}

impl From<Event> for WireEvent {
    fn from(event: Event) -> Self {
        let mut wire = WireEvent {
            status: event.kind.status().to_string(),
            event_type: event.kind.event_type().to_string(),
            agent_name: event.agent_name,
            trace: event.trace,
            ..WireEvent::default()
        };
        match event.kind {
            EventKind::ContentDelta { delta, full_content } => {
                wire.content = delta.clone();
                wire.delta = delta;
                wire.full_content = full_content;
            }
            EventKind::ToolCallsRequested { tool_calls } => wire.tool_calls = Some(tool_calls),
            EventKind::ToolExecuting { tool_call } => wire.tool_executing = Some(tool_call),
            EventKind::ToolResult { outcome } => wire.tool_results = Some(vec![outcome]),
            EventKind::DelegationStarted { sub_agent }
            | EventKind::DelegationFinished { sub_agent, .. } => wire.content = sub_agent,
            EventKind::Completed { full_content, usage } => {
                wire.full_content = full_content;
                if let Some(usage) = usage {
                    wire.prompt_tokens = Some(usage.prompt_tokens);
                    wire.completion_tokens = Some(usage.completion_tokens);
                    wire.total_tokens = Some(usage.total_tokens);
                }
            }
            EventKind::Error { message } => wire.content = message,
        }
        wire
    }
}

impl TryFrom<WireEvent> for Event {
    type Error = String;

    fn try_from(wire: WireEvent) -> Result<Self, String> {
        let kind = match wire.status.as_str() {
            "streaming" => EventKind::ContentDelta {
                delta: if wire.delta.is_empty() { wire.content } else { wire.delta },
                full_content: wire.full_content,
            },
            "tool-call" => EventKind::ToolCallsRequested {
                tool_calls: wire.tool_calls.unwrap_or_default(),
            },
            "tool-executing" => EventKind::ToolExecuting {
                tool_call: wire
                    .tool_executing
                    .ok_or("tool-executing event without toolExecuting")?,
            },
            "tool-result" => EventKind::ToolResult {
                outcome: wire
                    .tool_results
                    .and_then(|r| r.into_iter().next())
                    .ok_or("tool-result event without toolResults")?,
            },
            "delegation-start" => EventKind::DelegationStarted { sub_agent: wire.content },
            "delegation-end" => EventKind::DelegationFinished {
                sub_agent: wire.content,
                success: true,
            },
            "delegation-failed" => EventKind::DelegationFinished {
                sub_agent: wire.content,
                success: false,
            },
            "completed" => EventKind::Completed {
                full_content: wire.full_content,
                usage: match (wire.prompt_tokens, wire.completion_tokens, wire.total_tokens) {
                    (Some(prompt_tokens), Some(completion_tokens), Some(total_tokens)) => {
                        Some(TokenUsage { prompt_tokens, completion_tokens, total_tokens })
                    }
                    _ => None,
                },
            },
            "error" => EventKind::Error { message: wire.content },
            other => return Err(format!("unknown event status '{other}'")),
        };
        Ok(Event {
            agent_name: wire.agent_name,
            trace: wire.trace,
            kind,
        })
    }
}

/// Create a connected sender/stream pair for one run.
pub fn channel(
    agent_name: impl Into<String>,
    trace: impl Into<String>,
    cancel: CancellationToken,
) -> (EventSender, EventStream) {
    let agent_name: Arc<str> = Arc::from(agent_name.into());
    let trace: Arc<str> = Arc::from(trace.into());
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let sender = EventSender {
        tx,
        agent_name: agent_name.clone(),
        trace: trace.clone(),
        terminated: Arc::new(AtomicBool::new(false)),
        cancel,
    };
    let stream = EventStream {
        rx,
        agent_name,
        trace,
    };
    (sender, stream)
}

/// Producing half of an event stream. Clones share the terminal state.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Event>,
    agent_name: Arc<str>,
    trace: Arc<str>,
    terminated: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl EventSender {
    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    pub fn trace(&self) -> &str {
        &self.trace
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// Send an event stamped with this stream's identity.
    ///
    /// A terminal kind ends the stream: every later send fails with
    /// [`StreamError::Terminated`].
    pub async fn send(&self, kind: EventKind) -> Result<(), StreamError> {
        if kind.is_terminal() {
            if self.terminated.swap(true, Ordering::AcqRel) {
                return Err(StreamError::Terminated);
            }
        } else if self.is_terminated() {
            return Err(StreamError::Terminated);
        }
        let event = Event::new(self.agent_name.as_ref(), self.trace.as_ref(), kind);
        self.deliver(event).await
    }

    /// Relay an event produced elsewhere (a sub-agent). Identity is only
    /// filled where empty, and a relayed terminal event does not end this stream.
    pub async fn forward(&self, mut event: Event) -> Result<(), StreamError> {
        if self.is_terminated() {
            return Err(StreamError::Terminated);
        }
        event.fill_identity(&self.agent_name, &self.trace);
        self.deliver(event).await
    }

    pub async fn complete(
        &self,
        full_content: impl Into<String>,
        usage: Option<TokenUsage>,
    ) -> Result<(), StreamError> {
        self.send(EventKind::Completed {
            full_content: full_content.into(),
            usage,
        })
        .await
    }

    pub async fn fail(&self, message: impl Into<String>) -> Result<(), StreamError> {
        self.send(EventKind::Error {
            message: message.into(),
        })
        .await
    }

    async fn deliver(&self, event: Event) -> Result<(), StreamError> {
        if self.cancel.is_cancelled() {
            return Err(StreamError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(StreamError::Cancelled),
            sent = self.tx.send(event) => sent.map_err(|_| StreamError::Closed),
        }
    }
}

/// Consuming half of an event stream.
///
/// `recv()` returns `None` once every sender is gone; if no terminal event was
/// seen before that, the run ended without one (cancelled) and that is not an error.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<Event>,
    agent_name: Arc<str>,
    trace: Arc<str>,
}

impl EventStream {
    /// Agent that owns this stream.
    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    pub fn trace(&self) -> &str {
        &self.trace
    }

    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Drain the stream until it closes.
    pub async fn collect_all(mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Some(event) = self.rx.recv().await {
            events.push(event);
        }
        events
    }
}

impl futures::Stream for EventStream {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        self.rx.poll_recv(cx)
    }
}
