//! Templates for structured system agents.

use agentrelay_core::error::Error;
use agentrelay_core::provider::LlmEngine;
use agentrelay_core::tool::Discovery;
use std::fmt::Write;
use std::sync::Arc;

use crate::agent::{Agent, AgentBuilder};

/// A reusable agent definition whose prompt and description are assembled
/// from labelled sections.
#[derive(Debug, Clone, Default)]
pub struct AgentTemplate {
    pub name: String,
    pub trace: String,
    system_prompt: String,
    discovery: Discovery,
}

impl AgentTemplate {
    pub fn new(name: impl Into<String>, trace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            trace: trace.into(),
            ..Self::default()
        }
    }

    /// Render the prompt: incipit, numbered `STEPS:`, then `[OUTPUT]`,
    /// `[EXAMPLES]` and `[CRITICAL]`. Empty sections are left out.
    pub fn with_system_prompt(
        mut self,
        incipit: &str,
        steps: &[&str],
        output: &str,
        examples: &[&str],
        critical: &[&str],
    ) -> Self {
        let mut prompt = String::new();
        if !incipit.is_empty() {
            let _ = write!(prompt, "{incipit}\n\n");
        }
        if !steps.is_empty() {
            prompt.push_str("STEPS:\n");
            for (i, step) in steps.iter().enumerate() {
                let _ = writeln!(prompt, "- Step {}: {step}", i + 1);
            }
            prompt.push('\n');
        }
        if !output.is_empty() {
            let _ = write!(prompt, "[OUTPUT]\n{output}\n\n");
        }
        if !examples.is_empty() {
            prompt.push_str("[EXAMPLES]\n");
            for example in examples {
                let _ = write!(prompt, "{example}\n\n");
            }
        }
        if !critical.is_empty() {
            prompt.push_str("[CRITICAL]\n");
            for rule in critical {
                let _ = writeln!(prompt, "{rule}");
            }
        }
        self.system_prompt = prompt;
        self
    }

    /// The basic description: when and how to delegate to this agent.
    pub fn with_description(mut self, incipit: &str, examples: &[&str]) -> Self {
        let mut description = String::new();
        if !incipit.is_empty() {
            let _ = writeln!(description, "{incipit}");
        }
        if !examples.is_empty() {
            description.push_str("[EXAMPLES]\n");
            for example in examples {
                let _ = writeln!(description, "{example}");
            }
        }
        self.discovery.basic = description;
        self
    }

    pub fn with_advanced_description(mut self, advanced: impl Into<String>) -> Self {
        self.discovery.advanced = advanced.into();
        self
    }

    pub fn with_troubleshooting(mut self, troubleshooting: impl Into<String>) -> Self {
        self.discovery.troubleshooting = troubleshooting.into();
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn discovery(&self) -> &Discovery {
        &self.discovery
    }

    /// A builder preconfigured from this template. Template agents are never main agents.
    pub fn builder(&self, llm: Arc<dyn LlmEngine>) -> AgentBuilder {
        Agent::builder(&self.name, llm)
            .with_trace(&self.trace)
            .with_system_prompt(&self.system_prompt)
            .with_discovery(self.discovery.clone())
            .with_main_agent(false)
    }

    pub fn build(&self, llm: Arc<dyn LlmEngine>) -> Result<Agent, Error> {
        self.builder(llm).build()
    }
}

pub const REASONING_AGENT_NAME: &str = "system-reasoning";
pub const REASONING_TRACE: &str = "reasoning";

/// Sub-agent that breaks a "how do I" question into reasoning steps
/// without solving it.
pub fn reasoning_template() -> AgentTemplate {
    AgentTemplate::new(REASONING_AGENT_NAME, REASONING_TRACE)
        .with_system_prompt(
            "You are given a question or a task. Analyze it and break it down into a series \
             of logical steps. Ask yourself:\n\
             - What problem are we trying to solve?\n\
             - Is anything unclear that should be clarified?\n\
             - What are the key steps to solve it?",
            &[
                "Identify the question or task the user is asking about.",
                "List the main problems to consider.",
                "List the key steps to solve the problem.",
            ],
            "Express your reasoning one step per line, each prefixed with 🔎.\n\
             Then enumerate the steps that solve the problem.",
            &["'user': How do I plan a trip to Tokyo?\n\n\
               'assistant':\n\
               🔎 The user wants a step by step guide to plan a trip to Tokyo.\n\
               🔎 Business or personal trip? Travelling by plane?\n\
               🔎 Assume a personal trip by plane, three days long.\n\
               Steps to plan the trip:\n\
               1. Decide how many days to stay\n\
               2. Set a budget\n\
               3. Book flights and lodging\n\
               4. ..."],
            &[
                "If the request is not a \"how to\" question, reject it and explain that you only break problems down into steps.",
                "Give only the reasoning and the steps. Never give the solution itself.",
            ],
        )
        .with_description(
            "Breaks COMPLEX problems down into logical steps.\n\
             Use it when a problem needs several steps or systematic analysis.\n\
             Do not use it for simple questions, for questions about your own team or \
             capabilities, or for direct calculations.\n\
             Once it has produced the steps, carry them out one by one.\n\
             Ask it \"How do I ...?\" or \"What are the steps to ...?\".",
            &[
                "Wrong: What is the area of a trapezoid with bases 10 and 20 and height 10?",
                "Correct: How do I calculate the area of a trapezoid?",
                "Correct: What are the steps to build a fraud detection pipeline?",
            ],
        )
        .with_advanced_description(
            "Produces 🔎-prefixed reasoning followed by an ordered list of steps. It does not \
             execute the steps or give final answers, and it rejects questions that need no \
             decomposition.",
        )
        .with_troubleshooting(
            "A rejection means the request was not a \"how to\" question. Missing details are \
             filled with stated assumptions, so give concrete constraints for better steps. \
             No final answer is expected: the output is a roadmap.",
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentrelay_core::agent::SubAgent;
    use agentrelay_providers::mock::ScriptedEngine;

    #[test]
    fn renders_sections_in_order_and_skips_empty_ones() {
        let template = AgentTemplate::new("t", "trace").with_system_prompt(
            "Intro.",
            &["first", "second"],
            "",
            &[],
            &["never guess"],
        );
        assert_eq!(
            template.system_prompt(),
            "Intro.\n\nSTEPS:\n- Step 1: first\n- Step 2: second\n\n[CRITICAL]\nnever guess\n"
        );
    }

    #[test]
    fn description_lists_examples() {
        let template = AgentTemplate::new("t", "trace").with_description("Use me.", &["a", "b"]);
        assert_eq!(template.discovery().basic, "Use me.\n[EXAMPLES]\na\nb\n");
    }

    #[test]
    fn reasoning_template_builds_a_sub_agent() {
        let template = reasoning_template();
        assert!(template.system_prompt().contains("[OUTPUT]"));
        assert!(template.system_prompt().contains("[CRITICAL]"));

        let agent = template.build(Arc::new(ScriptedEngine::text("🔎"))).unwrap();
        assert_eq!(SubAgent::name(&agent), "system-reasoning");
        assert_eq!(SubAgent::trace(&agent), "reasoning");
        assert!(agent.discovery().advanced.contains("🔎"));
        assert!(!agent.is_main_agent());
    }
}
