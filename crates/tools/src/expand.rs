//! Progressive discovery: lets the model ask for the advanced description
//! and troubleshooting notes of a tool or sub-agent it can see.

use agentrelay_core::context::{Capability, ToolContext};
use agentrelay_core::error::ToolError;
use agentrelay_core::tool::{Discovery, ParamType, Parameter, Tool, ToolArgs, ToolOutput};
use async_trait::async_trait;
use std::fmt::Write;

pub struct ExpandTool {
    params: Vec<Parameter>,
    discovery: Discovery,
}

impl ExpandTool {
    pub fn new() -> Self {
        Self {
            params: vec![
                Parameter::required(
                    "subject_type",
                    ParamType::String,
                    "The type of subject to expand: 'tool' or 'agent'",
                ),
                Parameter::required(
                    "subject_name",
                    ParamType::String,
                    "The exact name of the tool or agent",
                ),
                Parameter::optional(
                    "troubleshoot",
                    ParamType::Boolean,
                    "Include troubleshooting information (default: false)",
                ),
            ],
            discovery: Discovery::new("Shows detailed information about a tool or sub-agent.")
                .with_advanced(
                    "Returns the basic and advanced description of the named subject, \
                     plus troubleshooting notes when troubleshoot is true.",
                )
                .with_troubleshooting(
                    "Names are case-sensitive. subject_type must be exactly 'tool' or 'agent'. \
                     Only tools and agents visible to the current agent can be expanded.",
                ),
        }
    }
}

impl Default for ExpandTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ExpandTool {
    fn name(&self) -> &str {
        "expand"
    }

    fn description(&self) -> &str {
        "Get detailed information about a tool or sub-agent, including advanced usage and troubleshooting."
    }

    fn parameters(&self) -> &[Parameter] {
        &self.params
    }

    fn discovery(&self) -> Option<&Discovery> {
        Some(&self.discovery)
    }

    async fn call(&self, ctx: &ToolContext, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let subject_type = args.get("subject_type").and_then(|v| v.as_str()).unwrap_or_default();
        let subject_name = args.get("subject_name").and_then(|v| v.as_str()).unwrap_or_default();
        let troubleshoot = args
            .get("troubleshoot")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let (label, candidates) = match subject_type {
            "tool" => ("TOOL", ctx.tools()),
            "agent" => ("AGENT", ctx.sub_agents()),
            other => {
                return Ok(ToolOutput::error(format!(
                    "invalid subject_type '{other}': must be 'tool' or 'agent'"
                )));
            }
        };

        let Some(subject) = candidates.iter().find(|c| c.name == subject_name) else {
            return Ok(ToolOutput::error(format!(
                "{subject_type} '{subject_name}' not found in context"
            )));
        };
        let Some(discovery) = &subject.discovery else {
            return Ok(ToolOutput::error(format!(
                "{subject_type} '{subject_name}' has no discovery information"
            )));
        };

        Ok(ToolOutput::success(render(label, subject, discovery, troubleshoot)))
    }
}

fn render(label: &str, subject: &Capability, discovery: &Discovery, troubleshoot: bool) -> String {
    let or_placeholder = |text: &str, placeholder: &'static str| -> String {
        if text.is_empty() {
            placeholder.to_string()
        } else {
            text.to_string()
        }
    };

    let mut out = String::new();
    let _ = writeln!(out, "=== {label}: {} ===\n", subject.name);
    let _ = writeln!(out, "Basic Description:\n{}\n", discovery.basic);
    let _ = writeln!(
        out,
        "Advanced Description:\n{}",
        or_placeholder(&discovery.advanced, "(No advanced description available)")
    );
    if troubleshoot {
        let _ = writeln!(
            out,
            "\nTroubleshooting:\n{}",
            or_placeholder(
                &discovery.troubleshooting,
                "(No troubleshooting information available)"
            )
        );
    }
    out
}
