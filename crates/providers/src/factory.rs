//! Engine factory: builds the configured LLM engine.

use agentrelay_config::ProviderConfig;
use agentrelay_core::error::ProviderError;
use agentrelay_core::provider::LlmEngine;
use std::sync::Arc;
use tracing::info;

use crate::mock::ScriptedEngine;
use crate::openai_compat::OpenAiCompatEngine;

/// Build the engine described by `config`.
///
/// `custom` requires `api_url`; `ollama` and `mock` need no key.
pub fn build_engine(config: &ProviderConfig) -> Result<Arc<dyn LlmEngine>, ProviderError> {
    if config.name == "mock" {
        info!("Using scripted mock engine");
        return Ok(Arc::new(ScriptedEngine::echo_offline()));
    }

    let base_url = match (&config.api_url, default_base_url(&config.name)) {
        (Some(url), _) => url.clone(),
        (None, Some(url)) => url.to_string(),
        (None, None) => {
            return Err(ProviderError::NotConfigured(format!(
                "unknown provider '{}' and no api_url given",
                config.name
            )));
        }
    };

    let api_key = match (&config.api_key, config.name.as_str()) {
        (Some(key), _) => key.clone(),
        (None, "ollama") => "ollama".to_string(),
        (None, _) => {
            return Err(ProviderError::NotConfigured(format!(
                "no API key for provider '{}'",
                config.name
            )));
        }
    };

    info!(provider = %config.name, model = %config.model, %base_url, "Building engine");
    let engine = OpenAiCompatEngine::new(&config.name, base_url, api_key, &config.model)?
        .with_temperature(config.temperature)
        .with_max_tokens(config.max_tokens);
    Ok(Arc::new(engine))
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> Option<&'static str> {
    match provider_name {
        "openai" => Some("https://api.openai.com/v1"),
        "openrouter" => Some("https://openrouter.ai/api/v1"),
        "together" => Some("https://api.together.xyz/v1"),
        "deepseek" => Some("https://api.deepseek.com/v1"),
        "ollama" => Some("http://localhost:11434/v1"),
        "groq" => Some("https://api.groq.com/openai/v1"),
        "vllm" => Some("http://localhost:8000/v1"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: &str) -> ProviderConfig {
        ProviderConfig {
            name: name.into(),
            ..ProviderConfig::default()
        }
    }

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("openai").unwrap().contains("api.openai.com"));
        assert!(default_base_url("ollama").unwrap().contains("localhost:11434"));
        assert!(default_base_url("custom").is_none());
    }

    #[test]
    fn mock_needs_nothing() {
        assert_eq!(build_engine(&config("mock")).unwrap().name(), "mock");
    }

    #[test]
    fn missing_key_is_reported() {
        let err = build_engine(&config("openai")).err().unwrap();
        assert!(err.to_string().contains("no API key"));
    }

    #[test]
    fn ollama_works_without_key() {
        assert_eq!(build_engine(&config("ollama")).unwrap().name(), "ollama");
    }

    #[test]
    fn custom_provider_needs_url() {
        let mut custom = config("custom");
        custom.api_key = Some("k".into());
        assert!(build_engine(&custom).is_err());

        custom.api_url = Some("http://localhost:9999/v1".into());
        assert_eq!(build_engine(&custom).unwrap().name(), "custom");
    }
}
