//! `agentrelay chat`: interactive or single-message chat mode.

use agentrelay_agent::template::REASONING_TRACE;
use agentrelay_agent::{Agent, build_main_agent};
use agentrelay_config::AppConfig;
use agentrelay_core::CancellationToken;
use agentrelay_core::event::{Event, EventKind, EventStream};
use agentrelay_providers::build_engine;
use anyhow::Context;
use std::io::{self, Write};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

pub async fn run(config: &AppConfig, message: Option<String>, json: bool) -> anyhow::Result<()> {
    let llm = build_engine(&config.provider).context("failed to build the LLM engine")?;
    let agent = build_main_agent(config, llm).context("failed to build the agent team")?;

    if let Some(message) = message {
        return send(&agent, message, json).await;
    }

    if !json {
        print_banner(config, &agent);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt(json)?;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if matches!(line, "exit" | "quit") {
            break;
        }
        if !line.is_empty() {
            send(&agent, line.to_string(), json).await?;
        }
        prompt(json)?;
    }

    if !json {
        println!();
        println!("  Goodbye! 👋");
        println!();
    }
    Ok(())
}

fn print_banner(config: &AppConfig, agent: &Agent) {
    let sub_agents: Vec<&str> = agent.sub_agents().iter().map(|a| a.name()).collect();
    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        agentrelay · Interactive Chat         ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:    {}", config.provider.name);
    println!("  Model:       {}", config.provider.model);
    println!("  Agent:       {}", agent.name());
    println!("  Tools:       {}", agent.tools().names().join(", "));
    if !sub_agents.is_empty() {
        println!("  Sub-agents:  {}", sub_agents.join(", "));
    }
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' to quit. Ctrl+C stops the current answer.");
    println!();
}

fn prompt(json: bool) -> io::Result<()> {
    if !json {
        print!("  You > ");
        io::stdout().flush()?;
    }
    Ok(())
}

/// Run one message to the end, rendering events as they arrive.
/// Ctrl-C cancels the run; the stream then closes without a terminal event.
async fn send(agent: &Agent, message: String, json: bool) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let stream = agent.run_with_cancel(message, cancel.clone());
    let mut renderer = Renderer::new(agent.name(), json);

    let interrupted = drain(stream, &cancel, &mut renderer).await?;
    if interrupted && !json {
        eprintln!("\n  [cancelled]");
    }
    Ok(())
}

async fn drain(
    mut stream: EventStream,
    cancel: &CancellationToken,
    renderer: &mut Renderer,
) -> anyhow::Result<bool> {
    let mut interrupted = false;
    let stdout = io::stdout();
    let stderr = io::stderr();

    loop {
        let event = tokio::select! {
            event = stream.recv() => event,
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                if let Err(e) = signal {
                    warn!(error = %e, "failed to listen for Ctrl-C");
                }
                debug!("cancelling run");
                interrupted = true;
                cancel.cancel();
                continue;
            }
        };
        let Some(event) = event else { break };
        renderer.render(&event, &mut stdout.lock(), &mut stderr.lock())?;
    }
    renderer.finish(&mut stdout.lock())?;
    Ok(interrupted)
}

/// Turns events into terminal output.
///
/// Plain mode labels each agent's text when the speaker changes and prints
/// tool and delegation progress. JSON mode prints each event's wire form.
pub struct Renderer {
    root: String,
    json: bool,
    speaker: Option<String>,
    mid_line: bool,
}

impl Renderer {
    pub fn new(root: impl Into<String>, json: bool) -> Self {
        Self {
            root: root.into(),
            json,
            speaker: None,
            mid_line: false,
        }
    }

    pub fn render(&mut self, event: &Event, out: &mut impl Write, err: &mut impl Write) -> io::Result<()> {
        if self.json {
            let line = serde_json::to_string(event).map_err(io::Error::other)?;
            return writeln!(out, "{line}");
        }

        match &event.kind {
            EventKind::ContentDelta { delta, .. } => {
                if self.speaker.as_deref() != Some(event.agent_name.as_str()) {
                    self.break_line(out)?;
                    let icon = if event.trace == REASONING_TRACE { "🧠" } else { "💬" };
                    write!(out, "{icon} {}: ", event.agent_name)?;
                    self.speaker = Some(event.agent_name.clone());
                }
                write!(out, "{delta}")?;
                self.mid_line = !delta.ends_with('\n');
                out.flush()?;
            }
            EventKind::ToolCallsRequested { .. } => {}
            EventKind::ToolExecuting { tool_call } => {
                self.status(out, format_args!("⚙ Executing tool {}", tool_call.name))?;
            }
            EventKind::ToolResult { outcome } if outcome.success => {
                self.status(out, format_args!("✓ Tool {} completed", outcome.tool_name))?;
            }
            EventKind::ToolResult { outcome } => {
                self.status(
                    out,
                    format_args!("✗ Tool {} failed: {}", outcome.tool_name, outcome.error),
                )?;
            }
            EventKind::DelegationStarted { sub_agent } => {
                self.status(out, format_args!("→ Delegating to {sub_agent}"))?;
            }
            EventKind::DelegationFinished { sub_agent, success } => {
                let verb = if *success { "finished" } else { "failed" };
                self.status(out, format_args!("← {sub_agent} {verb}"))?;
            }
            // Sub-agent completions are already visible through their deltas.
            EventKind::Completed { .. } if event.agent_name != self.root => {}
            EventKind::Completed { usage, .. } => {
                self.break_line(out)?;
                if let Some(usage) = usage {
                    writeln!(
                        out,
                        "  [tokens: {} prompt + {} completion = {}]",
                        usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
                    )?;
                }
            }
            EventKind::Error { message } => {
                self.break_line(out)?;
                out.flush()?;
                if event.agent_name == self.root {
                    writeln!(err, "  [Error] {message}")?;
                } else {
                    writeln!(err, "  [Error from {}] {message}", event.agent_name)?;
                }
            }
        }
        Ok(())
    }

    /// End a dangling line of streamed text.
    pub fn finish(&mut self, out: &mut impl Write) -> io::Result<()> {
        self.break_line(out)?;
        out.flush()
    }

    fn status(&mut self, out: &mut impl Write, line: std::fmt::Arguments<'_>) -> io::Result<()> {
        self.break_line(out)?;
        writeln!(out, "  {line}")?;
        // Text after a status line gets a fresh label.
        self.speaker = None;
        Ok(())
    }

    fn break_line(&mut self, out: &mut impl Write) -> io::Result<()> {
        if self.mid_line {
            writeln!(out)?;
            self.mid_line = false;
        }
        Ok(())
    }
}
