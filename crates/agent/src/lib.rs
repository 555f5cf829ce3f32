//! Agents and the streaming chat engine.
//!
//! An [`Agent`] turns a user message into an [`EventStream`](agentrelay_core::event::EventStream):
//!
//! 1. **Record** the message in the agent's history
//! 2. **Stream** the model's answer, forwarding deltas as they arrive
//! 3. **If tool calls**: dispatch them through the [`ToolDispatcher`], append
//!    the results and call the model again
//! 4. **Otherwise**: emit `completed` with the full answer
//!
//! Sub-agents are reached through the `delegate` tool; their events are
//! forwarded into the parent stream.

pub mod agent;
pub mod dispatcher;
pub mod engine;
pub mod factory;
pub mod prompt;
pub mod template;

pub use agent::{Agent, AgentBuilder};
pub use dispatcher::ToolDispatcher;
pub use engine::ChatEngine;
pub use factory::build_main_agent;
pub use template::{AgentTemplate, reasoning_template};
