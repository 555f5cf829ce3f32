//! Built-in tools for agentrelay.
//!
//! Provides calculator, sandboxed file read/write, progressive discovery
//! (`expand`) and the reserved `delegate` tool that hands work to sub-agents.

pub mod calculator;
pub mod delegate;
pub mod expand;
pub mod file_read;
pub mod file_write;
pub mod sandbox;

pub use delegate::{DELEGATE_TOOL_NAME, DelegateTool};

use agentrelay_core::tool::ToolRegistry;
use std::path::Path;
use std::sync::Arc;

/// Registry with every built-in tool. `delegate` is not included: agents
/// register it themselves when they have sub-agents.
pub fn default_registry(fs_root: &Path) -> ToolRegistry {
    ToolRegistry::new()
        .with(Arc::new(calculator::CalculatorTool::new()))
        .with(Arc::new(file_read::FileReadTool::new(fs_root)))
        .with(Arc::new(file_write::FileWriteTool::new(fs_root)))
        .with(Arc::new(expand::ExpandTool::new()))
}

#[cfg(test)]
pub(crate) mod test_support {
    use agentrelay_core::agent::{DelegationScope, SubAgent};
    use agentrelay_core::context::ToolContext;
    use agentrelay_core::event::{EventKind, EventStream, channel};
    use agentrelay_core::tool::{Discovery, ToolArgs};
    use agentrelay_core::CancellationToken;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub fn context() -> (ToolContext, EventStream) {
        context_with_scope(DelegationScope::root("main", 4, CancellationToken::new()))
    }

    pub fn context_with_scope(scope: DelegationScope) -> (ToolContext, EventStream) {
        let (tx, rx) = channel("main", "response", scope.cancellation().clone());
        (ToolContext::new(tx, scope), rx)
    }

    pub fn args(value: serde_json::Value) -> ToolArgs {
        value.as_object().cloned().unwrap_or_default()
    }

    /// A sub-agent that replays a fixed list of events.
    pub struct ScriptedSubAgent {
        name: String,
        trace: String,
        discovery: Discovery,
        script: Vec<EventKind>,
        started: AtomicUsize,
    }

    impl ScriptedSubAgent {
        pub fn new(name: &str, trace: &str, script: Vec<EventKind>) -> Self {
            Self {
                name: name.into(),
                trace: trace.into(),
                discovery: Discovery::new(format!("{name} sub agent")),
                script,
                started: AtomicUsize::new(0),
            }
        }

        pub fn started(&self) -> usize {
            self.started.load(Ordering::SeqCst)
        }
    }

    impl SubAgent for ScriptedSubAgent {
        fn name(&self) -> &str {
            &self.name
        }

        fn trace(&self) -> &str {
            &self.trace
        }

        fn discovery(&self) -> &Discovery {
            &self.discovery
        }

        fn delegate(&self, _message: String, scope: DelegationScope) -> EventStream {
            self.started.fetch_add(1, Ordering::SeqCst);
            let (tx, rx) = channel(&self.name, &self.trace, scope.cancellation().clone());
            let script = self.script.clone();
            tokio::spawn(async move {
                for kind in script {
                    if tx.send(kind).await.is_err() {
                        break;
                    }
                }
            });
            rx
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_builtins_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let registry = default_registry(dir.path());
        assert_eq!(
            registry.names(),
            ["calculator", "file_read", "file_write", "expand"]
        );
        assert!(registry.get(DELEGATE_TOOL_NAME).is_none());
    }

    #[test]
    fn select_builds_agent_toolsets() {
        let dir = tempfile::tempdir().unwrap();
        let registry = default_registry(dir.path());
        let picked = registry.select(&["expand", "calculator"]).unwrap();
        assert_eq!(picked.names(), ["expand", "calculator"]);
        assert!(registry.select(&["shell"]).is_err());
    }
}
