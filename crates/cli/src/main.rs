//! agentrelay CLI: the main entry point.
//!
//! Commands:
//! - `chat`     : Interactive or single-message chat with the configured agent team
//! - `init`     : Write the default config file
//! - `config`   : Print the effective configuration
//! - `history`  : Print a persisted conversation

use agentrelay_config::AppConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "agentrelay",
    about = "agentrelay: streaming tool execution and agent delegation",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Config file to use instead of ~/.agentrelay/config.toml
    #[arg(short, long, global = true, env = "AGENTRELAY_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the main agent
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Print every event as one JSON line
        #[arg(long)]
        json: bool,
    },

    /// Write the default configuration file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration
    Config,

    /// Print a persisted history file
    History {
        /// JSON history file written by the `json` backend
        file: PathBuf,

        /// Maximum number of messages (0 = all)
        #[arg(long, default_value_t = 0)]
        limit: usize,

        /// Messages to skip from the start
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // `init` must work even when the existing config is broken.
    let config = match cli.command {
        Commands::Init { .. } => None,
        _ => Some(commands::load_config(cli.config.as_deref())?),
    };

    let level = if cli.verbose {
        "debug".to_string()
    } else {
        config
            .as_ref()
            .map(AppConfig::log_filter)
            .unwrap_or_else(|| "info".to_string())
    };
    init_tracing(&level, cli.log_json);

    let config = config.unwrap_or_default();
    match cli.command {
        Commands::Init { force } => commands::init::run(cli.config.as_deref(), force)?,
        Commands::Chat { message, json } => commands::chat::run(&config, message, json).await?,
        Commands::Config => commands::config_cmd::show(&config)?,
        Commands::History {
            file,
            limit,
            offset,
        } => commands::history::run(&file, limit, offset).await?,
    }

    Ok(())
}

/// `RUST_LOG` wins over `level`. Logs go to stderr so they never mix with
/// chat output or `--json` event lines.
fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
