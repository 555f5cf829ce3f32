//! System prompt composition.
//!
//! The prompt is a pure function of the agent's configuration and is computed
//! once at build time. Runs only insert it when the history has no system
//! message yet, so nothing is ever appended twice.

use agentrelay_core::agent::SubAgent;
use std::fmt::Write;
use std::sync::Arc;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant";

pub const MAIN_AGENT_ADDENDUM: &str = "
[SYSTEM] The following applies in addition to any instructions above.
You are the MAIN agent of a multi-agent team. You coordinate the team: ask the
sub agents precise questions, then read and understand their answers.

Tool calls are optional. Greetings, casual conversation, simple questions and
anything you can answer from your own context never need a tool call.

Delegate only when a task is complex, needs step-by-step analysis, and matches a
sub agent's specialization. When asked about your team, report only the agents
listed under SUB AGENTS.

Keep the user's goal and question in mind at all times.
";

const SUB_AGENTS_HEADER: &str = "
=== SUB AGENTS ===
You have sub agents with specific responsibilities. Delegate complex tasks to them
with the \"delegate\" tool, giving the sub agent every detail it needs: it does not
see this conversation.

";

/// Build the full system prompt for an agent.
pub fn compose(base: Option<&str>, main_agent: bool, sub_agents: &[Arc<dyn SubAgent>]) -> String {
    let mut prompt = base
        .filter(|p| !p.trim().is_empty())
        .unwrap_or(DEFAULT_SYSTEM_PROMPT)
        .to_string();

    if sub_agents.is_empty() {
        return prompt;
    }
    if main_agent {
        prompt.push('\n');
        prompt.push_str(MAIN_AGENT_ADDENDUM);
    }
    prompt.push_str(SUB_AGENTS_HEADER);
    for agent in sub_agents {
        let _ = writeln!(prompt, "- {}: {}", agent.name(), agent.discovery().basic);
    }
    prompt
}
