pub mod chat;
pub mod config_cmd;
pub mod history;
pub mod init;

use agentrelay_config::AppConfig;
use anyhow::Context;
use std::path::{Path, PathBuf};

/// Config file used when no `--config` is given.
pub fn default_config_path() -> PathBuf {
    AppConfig::config_dir().join("config.toml")
}

/// Load `path` (or the default file), then apply environment overrides.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let Some(path) = path else {
        return AppConfig::load().context("failed to load config");
    };
    let mut config = AppConfig::load_from(path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    config.apply_env_overrides(|key| std::env::var(key).ok());
    config.validate().context("invalid configuration")?;
    Ok(config)
}
