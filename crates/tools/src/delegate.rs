//! The reserved `delegate` tool: runs a named sub-agent and relays its
//! event stream into the parent's.
//!
//! Between the `DelegationStarted` and `DelegationFinished` markers the
//! parent stream carries every child event in the child's own order. The
//! tool call itself blocks until the child stream closes, so no
//! parent-originated event can land inside that span.

use agentrelay_core::agent::SubAgent;
use agentrelay_core::context::ToolContext;
use agentrelay_core::error::ToolError;
use agentrelay_core::event::EventKind;
use agentrelay_core::tool::{Discovery, ParamType, Parameter, Tool, ToolArgs, ToolOutput};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DELEGATE_TOOL_NAME: &str = "delegate";

pub struct DelegateTool {
    sub_agents: Vec<Arc<dyn SubAgent>>,
    params: Vec<Parameter>,
    discovery: Discovery,
}

impl DelegateTool {
    pub fn new(sub_agents: Vec<Arc<dyn SubAgent>>) -> Self {
        Self {
            sub_agents,
            params: vec![
                Parameter::required(
                    "subAgent",
                    ParamType::String,
                    "The name of the sub agent to delegate the task to",
                ),
                Parameter::required(
                    "message",
                    ParamType::String,
                    "The request to delegate to the sub agent",
                ),
            ],
            discovery: Discovery::new("Delegate a task to a sub agent.")
                .with_advanced(
                    "The sub agent streams its answer back through this agent and the full \
                     text becomes the tool result. Sub agents do not see this conversation, \
                     so the message must carry all the context they need.",
                )
                .with_troubleshooting(
                    "Sub agent names are case-sensitive. Delegating back to an agent already \
                     in the delegation chain is refused, as is nesting deeper than the \
                     configured delegation depth.",
                ),
        }
    }

    pub fn sub_agents(&self) -> &[Arc<dyn SubAgent>] {
        &self.sub_agents
    }

    fn find(&self, name: &str) -> Option<&Arc<dyn SubAgent>> {
        self.sub_agents.iter().find(|a| a.name() == name)
    }
}

#[async_trait]
impl Tool for DelegateTool {
    fn name(&self) -> &str {
        DELEGATE_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Delegate a task to a sub agent"
    }

    fn parameters(&self) -> &[Parameter] {
        &self.params
    }

    fn discovery(&self) -> Option<&Discovery> {
        Some(&self.discovery)
    }

    async fn call(&self, ctx: &ToolContext, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let target = args.get("subAgent").and_then(|v| v.as_str()).unwrap_or_default();
        let message = args.get("message").and_then(|v| v.as_str()).unwrap_or_default();

        let Some(sub_agent) = self.find(target) else {
            return Ok(ToolOutput::error(format!("sub agent '{target}' not found")));
        };

        let scope = match ctx.scope().descend(sub_agent.name()) {
            Ok(scope) => scope,
            Err(reason) => {
                warn!(parent = ctx.agent_name(), sub_agent = target, %reason, "delegation refused");
                return Ok(ToolOutput::error(reason));
            }
        };

        if let Err(e) = ctx
            .emit(EventKind::DelegationStarted {
                sub_agent: target.to_string(),
            })
            .await
        {
            return Ok(ToolOutput::error(format!("delegation interrupted: {e}")));
        }

        info!(
            parent = ctx.agent_name(),
            sub_agent = target,
            depth = scope.depth(),
            "delegating"
        );
        debug!(sub_agent = target, task = message, "delegation message");

        let mut child = sub_agent.delegate(message.to_string(), scope);
        let mut full_response = String::new();
        let mut error: Option<String> = None;
        let mut completed = false;

        while let Some(mut event) = child.recv().await {
            if let Some(delta) = event.delta() {
                full_response.push_str(delta);
            }
            match &event.kind {
                EventKind::Error { message } if event.agent_name == sub_agent.name() => {
                    error = Some(format!("delegation error: {message}"));
                }
                EventKind::Completed { .. } if event.agent_name == sub_agent.name() => {
                    completed = true;
                }
                _ => {}
            }

            event.fill_identity(sub_agent.name(), sub_agent.trace());
            if let Err(e) = ctx.forward(event).await {
                // Dropping `child` closes its stream, which stops the child run.
                return Ok(ToolOutput::failure(
                    format!("delegation interrupted: {e}"),
                    full_response,
                ));
            }
        }

        let error = error.or_else(|| {
            (!completed).then(|| format!("sub agent '{target}' stopped without completing"))
        });
        let success = error.is_none();

        if let Err(e) = ctx
            .emit(EventKind::DelegationFinished {
                sub_agent: target.to_string(),
                success,
            })
            .await
        {
            return Ok(ToolOutput::failure(
                format!("delegation interrupted: {e}"),
                full_response,
            ));
        }

        info!(
            parent = ctx.agent_name(),
            sub_agent = target,
            success,
            chars = full_response.len(),
            "delegation finished"
        );

        Ok(match error {
            Some(error) => ToolOutput::failure(error, full_response),
            None => ToolOutput::success(full_response),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedSubAgent, args, context, context_with_scope};
    use agentrelay_core::agent::DelegationScope;
    use agentrelay_core::message::TokenUsage;
    use agentrelay_core::CancellationToken;

    fn delegate_args(sub_agent: &str, message: &str) -> ToolArgs {
        args(serde_json::json!({"subAgent": sub_agent, "message": message}))
    }

    fn researcher(script: Vec<EventKind>) -> Arc<dyn SubAgent> {
        Arc::new(ScriptedSubAgent::new("researcher", "research", script))
    }

    fn deltas(parts: &[&str]) -> Vec<EventKind> {
        let mut full = String::new();
        parts
            .iter()
            .map(|p| {
                full.push_str(p);
                EventKind::ContentDelta {
                    delta: p.to_string(),
                    full_content: full.clone(),
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn forwards_child_events_between_markers_and_accumulates_text() {
        let mut script = deltas(&["Paris ", "is ", "the capital."]);
        script.push(EventKind::Completed {
            full_content: "Paris is the capital.".into(),
            usage: Some(TokenUsage::new(3, 4)),
        });
        let tool = DelegateTool::new(vec![researcher(script)]);
        let (ctx, events) = context();

        let out = tool
            .call(&ctx, delegate_args("researcher", "capital of France?"))
            .await
            .unwrap();
        drop(ctx);
        assert!(out.success);
        assert_eq!(out.result, "Paris is the capital.");

        let events = events.collect_all().await;
        let statuses: Vec<&str> = events.iter().map(|e| e.kind.status()).collect();
        assert_eq!(
            statuses,
            [
                "delegation-start",
                "streaming",
                "streaming",
                "streaming",
                "completed",
                "delegation-end"
            ]
        );
        assert_eq!(events[0].agent_name, "main");
        assert_eq!(events[1].agent_name, "researcher");
        assert_eq!(events[1].trace, "research");
        assert_eq!(events[5].agent_name, "main");
    }

    #[tokio::test]
    async fn child_error_becomes_failure_with_partial_text() {
        let mut script = deltas(&["half an ", "answer"]);
        script.push(EventKind::Error {
            message: "model went away".into(),
        });
        let tool = DelegateTool::new(vec![researcher(script)]);
        let (ctx, events) = context();

        let out = tool.call(&ctx, delegate_args("researcher", "go")).await.unwrap();
        drop(ctx);
        assert!(!out.success);
        assert_eq!(out.error, "delegation error: model went away");
        assert_eq!(out.result, "half an answer");

        let events = events.collect_all().await;
        assert_eq!(events.last().unwrap().kind.status(), "delegation-failed");
    }

    #[tokio::test]
    async fn unknown_sub_agent_is_reported() {
        let tool = DelegateTool::new(vec![researcher(Vec::new())]);
        let (ctx, _events) = context();
        let out = tool.call(&ctx, delegate_args("Researcher", "go")).await.unwrap();
        assert_eq!(out.error, "sub agent 'Researcher' not found");
    }

    #[tokio::test]
    async fn cycle_is_refused_without_starting_the_child() {
        let child = Arc::new(ScriptedSubAgent::new("main", "response", Vec::new()));
        let tool = DelegateTool::new(vec![child.clone() as Arc<dyn SubAgent>]);
        let (ctx, events) = context();

        let out = tool.call(&ctx, delegate_args("main", "loop")).await.unwrap();
        drop(ctx);
        assert!(out.error.contains("delegation cycle detected: main -> main"));
        assert_eq!(child.started(), 0);
        assert!(events.collect_all().await.is_empty());
    }

    #[tokio::test]
    async fn depth_limit_is_refused() {
        let tool = DelegateTool::new(vec![researcher(Vec::new())]);
        let scope = DelegationScope::root("main", 0, CancellationToken::new());
        let (ctx, _events) = context_with_scope(scope);
        let out = tool.call(&ctx, delegate_args("researcher", "go")).await.unwrap();
        assert_eq!(out.error, "delegation depth limit (0) reached");
    }

    #[tokio::test]
    async fn child_closing_early_is_a_failure() {
        let tool = DelegateTool::new(vec![researcher(deltas(&["partial"]))]);
        let (ctx, _events) = context();
        let out = tool.call(&ctx, delegate_args("researcher", "go")).await.unwrap();
        assert!(!out.success);
        assert!(out.error.contains("stopped without completing"));
        assert_eq!(out.result, "partial");
    }
}
