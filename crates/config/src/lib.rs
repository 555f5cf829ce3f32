//! Configuration loading, validation, and management for agentrelay.
//!
//! Loads configuration from `~/.agentrelay/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Log levels accepted by `log_level` / `AGENTRELAY_LOG_LEVEL`.
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// History backends accepted by `[history] backend`.
pub const HISTORY_BACKENDS: [&str; 3] = ["json", "memory", "none"];

/// The root configuration structure.
///
/// Maps directly to `~/.agentrelay/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Minimum level for log output
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// LLM engine selection and credentials
    #[serde(default)]
    pub provider: ProviderConfig,

    /// The agent the user talks to
    #[serde(default)]
    pub agent: AgentSettings,

    /// Agents the main agent may delegate to
    #[serde(default)]
    pub sub_agents: Vec<AgentSettings>,

    /// History persistence
    #[serde(default)]
    pub history: HistoryConfig,

    /// Built-in tool settings
    #[serde(default)]
    pub tools: ToolsConfig,
}

fn default_log_level() -> String {
    "info".into()
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Engine kind: openai, openrouter, together, deepseek, ollama, custom, mock
    #[serde(default = "default_provider")]
    pub name: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Overrides the well-known base URL for `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider(),
            model: default_model(),
            api_key: None,
            api_url: None,
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Settings for one agent. `main_agent` and `reasoning` only apply to `[agent]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// One-line description shown to parent agents
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub advanced_description: String,

    #[serde(default)]
    pub troubleshooting: String,

    /// Label attached to every event this agent emits
    #[serde(default = "default_trace")]
    pub trace: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,

    #[serde(default = "default_true")]
    pub main_agent: bool,

    /// Attach the built-in reasoning sub-agent
    #[serde(default)]
    pub reasoning: bool,

    #[serde(default = "default_max_delegation_depth")]
    pub max_delegation_depth: usize,

    /// Built-in tool names to enable
    #[serde(default)]
    pub tools: Vec<String>,

    /// Free-form values handed to tools as custom context
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
}

fn default_agent_name() -> String {
    "Assistant".into()
}
fn default_trace() -> String {
    "response".into()
}
fn default_max_tool_iterations() -> u32 {
    10
}
fn default_max_delegation_depth() -> usize {
    4
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            description: "A general-purpose assistant".into(),
            advanced_description: String::new(),
            troubleshooting: String::new(),
            trace: default_trace(),
            system_prompt: None,
            max_tool_iterations: default_max_tool_iterations(),
            main_agent: true,
            reasoning: false,
            max_delegation_depth: default_max_delegation_depth(),
            tools: vec![
                "calculator".into(),
                "file_read".into(),
                "expand".into(),
            ],
            context: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// "json", "memory" or "none"
    #[serde(default = "default_history_backend")]
    pub backend: String,

    /// Directory for JSON history files
    #[serde(default = "default_history_dir")]
    pub dir: PathBuf,
}

fn default_history_backend() -> String {
    "memory".into()
}
fn default_history_dir() -> PathBuf {
    PathBuf::from("./history")
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            backend: default_history_backend(),
            dir: default_history_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Sandbox root for file_read / file_write
    #[serde(default = "default_fs_root")]
    pub fs_root: PathBuf,
}

fn default_fs_root() -> PathBuf {
    PathBuf::from(".")
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            fs_root: default_fs_root(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.agentrelay/config.toml),
    /// then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".agentrelay")
    }

    /// Apply environment overrides. `lookup` abstracts `std::env::var`.
    ///
    /// - `AGENTRELAY_LOG_LEVEL`, `AGENTRELAY_PROVIDER`, `AGENTRELAY_MODEL` always win.
    /// - `AGENTRELAY_API_KEY` wins over the file; the provider-specific key
    ///   (`OPENAI_API_KEY`, ...) only fills a missing key.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(level) = lookup("AGENTRELAY_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(provider) = lookup("AGENTRELAY_PROVIDER") {
            self.provider.name = provider;
        }
        if let Some(model) = lookup("AGENTRELAY_MODEL") {
            self.provider.model = model;
        }
        if let Some(key) = lookup("AGENTRELAY_API_KEY") {
            self.provider.api_key = Some(key);
        }
        if self.provider.api_key.is_none()
            && let Some(var) = provider_key_var(&self.provider.name)
        {
            self.provider.api_key = lookup(var);
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log_level must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.log_level
            )));
        }

        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !HISTORY_BACKENDS.contains(&self.history.backend.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "history.backend must be one of {}, got '{}'",
                HISTORY_BACKENDS.join(", "),
                self.history.backend
            )));
        }

        let mut seen = vec![self.agent.name.as_str()];
        for agent in std::iter::once(&self.agent).chain(&self.sub_agents) {
            if agent.name.trim().is_empty() {
                return Err(ConfigError::ValidationError("agent name must not be empty".into()));
            }
            if agent.max_tool_iterations == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "agent '{}': max_tool_iterations must be > 0",
                    agent.name
                )));
            }
        }
        for sub in &self.sub_agents {
            if seen.contains(&sub.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate agent name '{}'",
                    sub.name
                )));
            }
            seen.push(&sub.name);
        }

        Ok(())
    }

    /// Lower-case log level, suitable for an `EnvFilter` directive.
    pub fn log_filter(&self) -> String {
        self.log_level.to_ascii_lowercase()
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let body = toml::to_string_pretty(&Self::default()).unwrap_or_default();
        format!("# agentrelay configuration\n# Add sub-agents with [[sub_agents]] tables.\n\n{body}")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            provider: ProviderConfig::default(),
            agent: AgentSettings::default(),
            sub_agents: Vec::new(),
            history: HistoryConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

/// Provider-specific API key variable, if the provider has one.
fn provider_key_var(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some("OPENAI_API_KEY"),
        "openrouter" => Some("OPENROUTER_API_KEY"),
        "together" => Some("TOGETHER_API_KEY"),
        "deepseek" => Some("DEEPSEEK_API_KEY"),
        _ => None,
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
