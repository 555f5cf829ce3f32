//! Read-only execution context handed to every tool call.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::agent::DelegationScope;
use crate::error::StreamError;
use crate::event::{Event, EventKind, EventSender};
use crate::tool::Discovery;

/// A tool or sub-agent as seen by introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    pub name: String,
    pub description: String,
    pub discovery: Option<Discovery>,
}

/// What a running tool may know about, and do to, the run that called it.
#[derive(Debug, Clone)]
pub struct ToolContext {
    events: EventSender,
    scope: DelegationScope,
    custom: Arc<HashMap<String, Value>>,
    tools: Arc<[Capability]>,
    sub_agents: Arc<[Capability]>,
}

impl ToolContext {
    pub fn new(events: EventSender, scope: DelegationScope) -> Self {
        Self {
            events,
            scope,
            custom: Arc::default(),
            tools: Arc::from(Vec::new()),
            sub_agents: Arc::from(Vec::new()),
        }
    }

    pub fn with_custom(mut self, custom: Arc<HashMap<String, Value>>) -> Self {
        self.custom = custom;
        self
    }

    pub fn with_tools(mut self, tools: Vec<Capability>) -> Self {
        self.tools = Arc::from(tools);
        self
    }

    pub fn with_sub_agents(mut self, sub_agents: Vec<Capability>) -> Self {
        self.sub_agents = Arc::from(sub_agents);
        self
    }

    pub fn agent_name(&self) -> &str {
        self.events.agent_name()
    }

    pub fn trace(&self) -> &str {
        self.events.trace()
    }

    /// Emit an event into the calling run's stream.
    pub async fn emit(&self, kind: EventKind) -> Result<(), StreamError> {
        self.events.send(kind).await
    }

    /// Relay an event produced by another agent into the calling run's stream.
    pub async fn forward(&self, event: Event) -> Result<(), StreamError> {
        self.events.forward(event).await
    }

    pub fn custom_value(&self, key: &str) -> Option<&Value> {
        self.custom.get(key)
    }

    pub fn tools(&self) -> &[Capability] {
        &self.tools
    }

    pub fn sub_agents(&self) -> &[Capability] {
        &self.sub_agents
    }

    pub fn scope(&self) -> &DelegationScope {
        &self.scope
    }
}
