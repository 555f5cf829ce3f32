//! `agentrelay init`: write the default config file.

use agentrelay_config::AppConfig;
use anyhow::{Context, bail};
use std::path::Path;

pub fn run(path: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(super::default_config_path);
    write_default(&path, force)?;

    println!("✅ Created config at: {}", path.display());
    println!("\n📝 Next steps:");
    println!("   1. Pick a provider and model in {}", path.display());
    println!("   2. Export its API key (e.g. OPENAI_API_KEY) or set provider.api_key");
    println!("   3. Run: agentrelay chat\n");
    Ok(())
}

fn write_default(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    std::fs::write(path, AppConfig::default_toml())
        .with_context(|| format!("failed to write {}", path.display()))
}
