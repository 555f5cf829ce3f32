//! `agentrelay history`: print a persisted conversation.

use agentrelay_core::history::HistoryStore;
use agentrelay_core::message::{Message, Role};
use agentrelay_history::JsonFileHistory;
use anyhow::Context;
use std::fmt::Write;
use std::path::Path;

pub async fn run(file: &Path, limit: usize, offset: usize) -> anyhow::Result<()> {
    if !file.exists() {
        anyhow::bail!("no history file at {}", file.display());
    }
    let store = JsonFileHistory::open(file)
        .with_context(|| format!("failed to open {}", file.display()))?;
    let messages = store.get_history(limit, offset).await?;

    if messages.is_empty() {
        println!("(no messages)");
    }
    for (i, message) in messages.iter().enumerate() {
        print!("{}", format_message(offset + i, message));
    }
    Ok(())
}

fn format_message(index: usize, message: &Message) -> String {
    let label = match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };
    let mut out = format!(
        "#{index} [{label}] {}\n",
        message.timestamp.format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(id) = &message.tool_call_id {
        let _ = writeln!(out, "  (result of {id})");
    }
    if !message.content.is_empty() {
        for line in message.content.lines() {
            let _ = writeln!(out, "  {line}");
        }
    }
    for call in &message.tool_calls {
        let args = serde_json::Value::Object(call.arguments.clone());
        let _ = writeln!(out, "  → {}({args}) [{}]", call.name, call.id);
    }
    if let Some(usage) = message.usage {
        let _ = writeln!(out, "  tokens: {}", usage.total_tokens);
    }
    out
}
