//! History persistence backends for agentrelay.

pub mod in_memory;
pub mod json_file;

pub use in_memory::InMemoryHistory;
pub use json_file::JsonFileHistory;

use agentrelay_config::HistoryConfig;
use agentrelay_core::history::HistoryStore;
use std::sync::Arc;

/// Build the configured store for one agent. `"none"` disables persistence.
pub fn build_store(config: &HistoryConfig, agent_name: &str) -> Option<Arc<dyn HistoryStore>> {
    match config.backend.as_str() {
        "json" => Some(Arc::new(JsonFileHistory::for_agent(&config.dir, agent_name))),
        "memory" => Some(Arc::new(InMemoryHistory::new())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_picks_backend() {
        let mut config = HistoryConfig::default();
        assert_eq!(build_store(&config, "main").unwrap().name(), "memory");

        config.backend = "json".into();
        assert_eq!(build_store(&config, "main").unwrap().name(), "json");

        config.backend = "none".into();
        assert!(build_store(&config, "main").is_none());
    }
}
