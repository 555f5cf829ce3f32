//! LLM engine trait: the abstraction over model backends.
//!
//! An engine takes the current history plus the declared tool schemas and
//! answers with a stream of chunks: content deltas, at most one tool-call
//! chunk, then a terminal `completed` or `error` chunk.
//!
//! Implementations: OpenAI-compatible endpoints, scripted engine for tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ProviderError;
use crate::message::{Message, TokenUsage};
use crate::tool::ToolCall;

/// A tool definition sent to the model so it knows what tools it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// Where a chunk sits in the turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChunkStatus {
    Streaming,
    ToolCall,
    Completed,
    Error,
}

/// A single chunk of a streamed model turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub status: ChunkStatus,

    /// Text delta carried by this chunk (error text for `Error`)
    #[serde(default)]
    pub content: String,

    /// Text accumulated so far in this turn
    #[serde(default)]
    pub full_content: String,

    /// Requested tool calls (`ToolCall` status only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Token usage (`Completed` status only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl Chunk {
    pub fn delta(content: impl Into<String>, full_content: impl Into<String>) -> Self {
        Self {
            status: ChunkStatus::Streaming,
            content: content.into(),
            full_content: full_content.into(),
            tool_calls: Vec::new(),
            usage: None,
        }
    }

    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls,
            ..Self::with_status(ChunkStatus::ToolCall)
        }
    }

    pub fn completed(full_content: impl Into<String>, usage: Option<TokenUsage>) -> Self {
        Self {
            full_content: full_content.into(),
            usage,
            ..Self::with_status(ChunkStatus::Completed)
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: message.into(),
            ..Self::with_status(ChunkStatus::Error)
        }
    }

    fn with_status(status: ChunkStatus) -> Self {
        Self {
            status,
            content: String::new(),
            full_content: String::new(),
            tool_calls: Vec::new(),
            usage: None,
        }
    }
}

/// The receiving half of a streamed model turn.
pub type ChunkReceiver = mpsc::Receiver<Result<Chunk, ProviderError>>;

/// The core LLM engine trait.
///
/// The chat engine calls `chat_stream()` once per iteration without knowing
/// which backend is behind it.
#[async_trait]
pub trait LlmEngine: Send + Sync {
    /// A human-readable name for this engine (e.g., "openai", "mock").
    fn name(&self) -> &str;

    /// Start one streamed model turn over `messages`, advertising `tools`.
    async fn chat_stream(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ChunkReceiver, ProviderError>;
}
