//! # agentrelay core
//!
//! Domain types, traits, and error definitions for the agentrelay engine.
//! This crate defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the chat engine is a trait here: the LLM engine, tools,
//! history persistence, sub-agents. Implementations live in their respective
//! crates, so tests swap in scripted engines and in-memory stores.

pub mod agent;
pub mod context;
pub mod error;
pub mod event;
pub mod history;
pub mod message;
pub mod provider;
pub mod tool;
pub mod validation;

// Re-export key types at crate root for ergonomics
pub use agent::{DelegationScope, SubAgent};
pub use context::{Capability, ToolContext};
pub use error::{Error, HistoryError, ProviderError, Result, StreamError, ToolError};
pub use event::{Event, EventKind, EventSender, EventStream};
pub use history::HistoryStore;
pub use message::{History, Message, Role, TokenUsage};
pub use provider::{Chunk, ChunkReceiver, ChunkStatus, LlmEngine, ToolDefinition};
pub use tool::{
    Discovery, ParamType, Parameter, Tool, ToolArgs, ToolCall, ToolOutcome, ToolOutput,
    ToolRegistry,
};
pub use tokio_util::sync::CancellationToken;
