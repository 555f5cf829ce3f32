//! Build the configured agent team from an [`AppConfig`].

use agentrelay_config::{AgentSettings, AppConfig};
use agentrelay_core::error::Error;
use agentrelay_core::provider::LlmEngine;
use agentrelay_core::tool::ToolRegistry;
use agentrelay_history::build_store;
use agentrelay_tools::default_registry;
use std::sync::Arc;
use tracing::info;

use crate::agent::{Agent, AgentBuilder};

/// Build the main agent with its sub-agents, tools and history stores.
pub fn build_main_agent(config: &AppConfig, llm: Arc<dyn LlmEngine>) -> Result<Agent, Error> {
    let registry = default_registry(&config.tools.fs_root);

    let mut main = configured(&config.agent, llm.clone(), &registry, config)?;
    for settings in &config.sub_agents {
        let sub_agent = configured(settings, llm.clone(), &registry, config)?
            .with_main_agent(false)
            .with_max_delegation_depth(config.agent.max_delegation_depth)
            .build()?;
        main = main.with_sub_agent(Arc::new(sub_agent));
    }
    if config.agent.reasoning {
        main = main.with_reasoning(llm)?;
    }

    let agent = main.build()?;
    info!(
        agent = agent.name(),
        tools = ?agent.tools().names(),
        sub_agents = agent.sub_agents().len(),
        "agent ready"
    );
    Ok(agent)
}

fn configured(
    settings: &AgentSettings,
    llm: Arc<dyn LlmEngine>,
    registry: &ToolRegistry,
    config: &AppConfig,
) -> Result<AgentBuilder, Error> {
    let mut builder =
        AgentBuilder::from_settings(settings, llm).with_tools(registry.select(&settings.tools)?);
    if let Some(store) = build_store(&config.history, &settings.name) {
        builder = builder.with_history_store(store);
    }
    Ok(builder)
}
