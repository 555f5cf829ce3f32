//! Message and History domain types.
//!
//! These are the core value objects that flow through a run:
//! user input → model turns → tool results, all appended to one History.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::HistoryError;
use crate::tool::ToolCall;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions (identity, rules)
    System,
    /// The end user, or the delegating parent agent
    User,
    /// The model
    Assistant,
    /// Tool execution result
    Tool,
}

/// Token usage reported by the model for one turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Token usage of the model turn that produced this message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            usage: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into())
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content.into())
    }

    /// Create a final assistant message.
    pub fn assistant(content: impl Into<String>, usage: Option<TokenUsage>) -> Self {
        let mut msg = Self::new(Role::Assistant, content.into());
        msg.usage = usage;
        msg
    }

    /// Create an assistant message that requests tool calls.
    pub fn assistant_with_tool_calls(
        content: impl Into<String>,
        tool_calls: Vec<ToolCall>,
        usage: Option<TokenUsage>,
    ) -> Self {
        let mut msg = Self::assistant(content, usage);
        msg.tool_calls = tool_calls;
        msg
    }

    /// Create a tool result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::new(Role::Tool, content.into());
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }
}

/// The ordered, append-only message history of one agent.
///
/// Invariants enforced on every append:
/// - at most one system message, and it sits at index 0;
/// - every tool message answers a tool call issued earlier by an assistant message.
#[derive(Debug, Clone, Default)]
pub struct History {
    messages: Vec<Message>,
    issued_calls: HashSet<String>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a history from persisted messages, re-checking the invariants.
    pub fn from_messages(messages: Vec<Message>) -> Result<Self, HistoryError> {
        let mut history = Self::new();
        for (index, message) in messages.into_iter().enumerate() {
            if message.role == Role::System && index != 0 {
                return Err(HistoryError::DuplicateSystemMessage);
            }
            if message.role == Role::System {
                history.messages.push(message);
            } else {
                history.push(message)?;
            }
        }
        Ok(history)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn has_system(&self) -> bool {
        self.messages.first().is_some_and(|m| m.role == Role::System)
    }

    /// Insert the system prompt at index 0 unless one is already present.
    ///
    /// Returns `true` when a message was inserted.
    pub fn ensure_system(&mut self, prompt: &str) -> bool {
        if self.has_system() {
            return false;
        }
        self.messages.insert(0, Message::system(prompt));
        true
    }

    /// Append a message. System messages must go through [`History::ensure_system`].
    pub fn push(&mut self, message: Message) -> Result<(), HistoryError> {
        match message.role {
            Role::System => return Err(HistoryError::DuplicateSystemMessage),
            Role::Tool => {
                let id = message
                    .tool_call_id
                    .as_deref()
                    .ok_or(HistoryError::MissingToolCallId)?;
                if !self.issued_calls.contains(id) {
                    return Err(HistoryError::UnknownToolCall(id.to_string()));
                }
            }
            Role::Assistant => {
                self.issued_calls
                    .extend(message.tool_calls.iter().map(|c| c.id.clone()));
            }
            Role::User => {}
        }
        self.messages.push(message);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.issued_calls.clear();
    }

    /// Total tokens reported across all assistant turns.
    pub fn total_tokens(&self) -> u32 {
        self.messages
            .iter()
            .filter_map(|m| m.usage)
            .map(|u| u.total_tokens)
            .sum()
    }
}

/// Page through a message list.
///
/// `limit == 0 && offset == 0` returns everything; `limit == 0` with an offset
/// returns the tail from `offset`; an offset at or past the end returns nothing.
pub fn paginate(messages: &[Message], limit: usize, offset: usize) -> Vec<Message> {
    if offset >= messages.len() {
        return Vec::new();
    }
    let tail = &messages[offset..];
    let take = if limit == 0 { tail.len() } else { limit.min(tail.len()) };
    tail[..take].to_vec()
}
