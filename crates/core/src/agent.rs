//! Sub-agent seam and delegation bookkeeping.
//!
//! The `delegate` tool only needs to start a child run and read its events,
//! so it depends on the [`SubAgent`] trait instead of the concrete agent type.

use tokio_util::sync::CancellationToken;

use crate::event::EventStream;
use crate::tool::Discovery;

/// Default number of nested delegations allowed below the root agent.
pub const DEFAULT_MAX_DELEGATION_DEPTH: usize = 4;

/// An agent that can be handed a task by a parent.
pub trait SubAgent: Send + Sync {
    fn name(&self) -> &str;

    fn trace(&self) -> &str;

    fn discovery(&self) -> &Discovery;

    /// Start a run whose only input is `message`. The parent's history is not shared.
    fn delegate(&self, message: String, scope: DelegationScope) -> EventStream;
}

/// The chain of agents a run belongs to, with a shared depth budget.
#[derive(Debug, Clone)]
pub struct DelegationScope {
    lineage: Vec<String>,
    max_depth: usize,
    cancel: CancellationToken,
}

impl DelegationScope {
    /// Scope for a run started directly by a caller.
    pub fn root(agent_name: impl Into<String>, max_depth: usize, cancel: CancellationToken) -> Self {
        Self {
            lineage: vec![agent_name.into()],
            max_depth,
            cancel,
        }
    }

    /// Agents from the root down to the current one.
    pub fn lineage(&self) -> &[String] {
        &self.lineage
    }

    /// Number of delegations between the root and the current agent.
    pub fn depth(&self) -> usize {
        self.lineage.len().saturating_sub(1)
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Scope for a child run, or the reason the delegation is refused.
    ///
    /// The child gets a child cancellation token: cancelling any ancestor stops it.
    pub fn descend(&self, child: &str) -> Result<DelegationScope, String> {
        if self.lineage.iter().any(|name| name == child) {
            return Err(format!(
                "delegation cycle detected: {} -> {child}",
                self.lineage.join(" -> ")
            ));
        }
        if self.depth() >= self.max_depth {
            return Err(format!("delegation depth limit ({}) reached", self.max_depth));
        }
        let mut lineage = self.lineage.clone();
        lineage.push(child.to_string());
        Ok(Self {
            lineage,
            max_depth: self.max_depth,
            cancel: self.cancel.child_token(),
        })
    }
}
