//! Scripted engine: replays canned chunk turns instead of calling a model.
//!
//! Used by the test suites of every crate and by `provider.name = "mock"`
//! for offline runs.

use async_trait::async_trait;
use agentrelay_core::error::ProviderError;
use agentrelay_core::message::{Message, TokenUsage};
use agentrelay_core::provider::{Chunk, ChunkReceiver, LlmEngine, ToolDefinition};
use agentrelay_core::tool::ToolCall;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// One scripted model turn.
pub type Turn = Vec<Result<Chunk, ProviderError>>;

/// An engine that answers each `chat_stream` call with the next scripted turn.
///
/// With [`ScriptedEngine::repeating`] the last turn is replayed forever.
pub struct ScriptedEngine {
    turns: Mutex<VecDeque<Turn>>,
    repeat_last: bool,
    calls: AtomicUsize,
    requests: Mutex<Vec<Vec<Message>>>,
    tool_names: Mutex<Vec<Vec<String>>>,
}

impl ScriptedEngine {
    pub fn new(turns: Vec<Turn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            repeat_last: false,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            tool_names: Mutex::new(Vec::new()),
        }
    }

    /// Keep replaying the final turn once the script runs out.
    pub fn repeating(turns: Vec<Turn>) -> Self {
        Self {
            repeat_last: true,
            ..Self::new(turns)
        }
    }

    /// A single plain-text answer.
    pub fn text(answer: &str) -> Self {
        Self::new(vec![text_turn(answer)])
    }

    /// Offline stand-in: answers every message with the same canned reply.
    pub fn echo_offline() -> Self {
        Self::repeating(vec![text_turn(
            "mock engine: configure a real provider to get model answers",
        )])
    }

    /// Number of `chat_stream` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// History passed to each call, in call order.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        lock(&self.requests).clone()
    }

    /// Tool names advertised on each call, in call order.
    pub fn advertised_tools(&self) -> Vec<Vec<String>> {
        lock(&self.tool_names).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl LlmEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn chat_stream(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ChunkReceiver, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.requests).push(messages.to_vec());
        lock(&self.tool_names).push(tools.iter().map(|t| t.name.clone()).collect());

        let turn = {
            let mut turns = lock(&self.turns);
            match (turns.len(), self.repeat_last) {
                (0, _) => None,
                (1, true) => turns.front().cloned(),
                _ => turns.pop_front(),
            }
        };
        let turn = turn.ok_or_else(|| {
            ProviderError::NotConfigured("scripted engine has no turns left".into())
        })?;

        let (tx, rx) = mpsc::channel(turn.len().max(1));
        for chunk in turn {
            // capacity covers the whole turn
            let _ = tx.try_send(chunk);
        }
        Ok(rx)
    }
}

/// Usage figures reported by scripted completion chunks.
pub fn scripted_usage() -> TokenUsage {
    TokenUsage::new(10, 5)
}

/// Word-by-word deltas followed by a completion chunk.
pub fn text_turn(answer: &str) -> Turn {
    let mut full = String::new();
    let mut chunks: Turn = answer
        .split_inclusive(' ')
        .map(|word| {
            full.push_str(word);
            Ok(Chunk::delta(word, full.clone()))
        })
        .collect();
    chunks.push(Ok(Chunk::completed(answer, Some(scripted_usage()))));
    chunks
}

/// Optional lead-in text, a tool-call chunk, then completion.
pub fn tool_call_turn(lead_in: &str, calls: Vec<ToolCall>) -> Turn {
    let mut chunks = if lead_in.is_empty() {
        Vec::new()
    } else {
        vec![Ok(Chunk::delta(lead_in, lead_in))]
    };
    chunks.push(Ok(Chunk::tool_calls(calls)));
    chunks.push(Ok(Chunk::completed(lead_in, Some(scripted_usage()))));
    chunks
}

/// Convenience for building a call from a JSON object literal.
pub fn call(id: &str, name: &str, arguments: serde_json::Value) -> ToolCall {
    ToolCall::new(id, name, arguments.as_object().cloned().unwrap_or_default())
}
