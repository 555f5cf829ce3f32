//! Tool dispatch: lookup, argument validation, execution and the
//! `tool-executing` / `tool-result` markers around each call.

use agentrelay_core::context::ToolContext;
use agentrelay_core::error::StreamError;
use agentrelay_core::event::EventKind;
use agentrelay_core::tool::{ToolCall, ToolOutcome, ToolRegistry};
use agentrelay_core::validation::validate_arguments;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs requested tool calls against one run's tool snapshot.
pub struct ToolDispatcher {
    tools: ToolRegistry,
}

impl ToolDispatcher {
    pub fn new(tools: ToolRegistry) -> Self {
        Self { tools }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Execute one call and produce its outcome.
    ///
    /// Lookup, validation and handler failures all become failed outcomes.
    /// Only a failure to emit onto the stream (cancelled or closed) is an `Err`.
    pub async fn execute(
        &self,
        call: &ToolCall,
        ctx: &ToolContext,
    ) -> Result<ToolOutcome, StreamError> {
        ctx.emit(EventKind::ToolExecuting {
            tool_call: call.clone(),
        })
        .await?;

        let started = Instant::now();
        let outcome = self.outcome_for(call, ctx).await;

        info!(
            agent = ctx.agent_name(),
            tool = %call.name,
            call_id = %call.id,
            success = outcome.success,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "tool call finished"
        );
        if !outcome.success {
            debug!(tool = %call.name, error = %outcome.error, "tool call failed");
        }

        ctx.emit(EventKind::ToolResult {
            outcome: outcome.clone(),
        })
        .await?;
        Ok(outcome)
    }

    async fn outcome_for(&self, call: &ToolCall, ctx: &ToolContext) -> ToolOutcome {
        let Some(tool) = self.tools.get(&call.name) else {
            warn!(tool = %call.name, "model requested an unknown tool");
            return ToolOutcome::failed(call, format!("tool not found: {}", call.name));
        };

        let args = match validate_arguments(tool.parameters(), call.arguments.clone()) {
            Ok(args) => args,
            Err(reason) => return ToolOutcome::failed(call, reason),
        };

        match tool.call(ctx, args).await {
            Ok(output) => ToolOutcome::from_output(call, output),
            Err(e) => ToolOutcome::failed(call, e.to_string()),
        }
    }
}
