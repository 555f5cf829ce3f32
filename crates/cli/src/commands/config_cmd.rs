//! `agentrelay config`: print the effective configuration.

use agentrelay_config::AppConfig;

pub fn show(config: &AppConfig) -> anyhow::Result<()> {
    println!("{}", render(config)?);
    Ok(())
}

/// The effective config as TOML, with the API key masked.
fn render(config: &AppConfig) -> anyhow::Result<String> {
    let mut shown = config.clone();
    if shown.provider.api_key.is_some() {
        shown.provider.api_key = Some("[REDACTED]".into());
    }
    Ok(toml::to_string_pretty(&shown)?)
}
