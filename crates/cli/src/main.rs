//! GeoChain CLI
//!
//! Main entry point for the `geochain` command-line tool: cited answers over
//! a country corpus, raster hotspot reports and PMESII indicator grouping.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, HotspotsCommand, PmesiiCommand, PromptsCommand};
use geochain_core::{logging, AppConfig, AppResult};
use std::path::PathBuf;

/// GeoChain - multi-source cited answers about countries
#[derive(Parser, Debug)]
#[command(name = "geochain")]
#[command(about = "Multi-source cited answers about countries", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "GEOCHAIN_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "GEOCHAIN_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    /// LLM provider (ollama, openrouter, openai)
    #[arg(short, long, global = true, env = "GEOCHAIN_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "GEOCHAIN_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a question and get a cited answer
    Ask(AskCommand),

    /// Infrastructure hotspot report for a country
    Hotspots(HotspotsCommand),

    /// Group a country's indicators into PMESII domains
    Pmesii(PmesiiCommand),

    /// List built-in prompts and workspace overrides
    Prompts(PromptsCommand),
}

/// Defaults, `.geochain/config.yaml` and environment, then CLI flags.
///
/// `--config` or a `--workspace` other than the current directory names a
/// config file `AppConfig::load` did not see; it is merged before the flags.
fn load_config(cli: &Cli) -> AppResult<AppConfig> {
    let mut config = AppConfig::load()?;

    let extra = cli.config.clone().or_else(|| {
        cli.workspace
            .as_ref()
            .map(|ws| ws.join(".geochain").join("config.yaml"))
    });
    if let Some(path) = extra {
        if path.exists() && config.config_file.as_ref() != Some(&path) {
            config = config.merge_yaml(&path)?;
        }
    }

    Ok(config.with_overrides(
        cli.workspace.clone(),
        cli.config.clone(),
        cli.provider.clone(),
        cli.model.clone(),
        cli.log_level.clone(),
        cli.verbose,
        cli.no_color,
    ))
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let config = load_config(&cli)?;

    logging::init_logging(
        config.log_level.as_deref(),
        config.no_color,
        cli.log_json || config.log_json,
    )?;

    tracing::info!("GeoChain CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    config.ensure_geochain_dir()?;

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Hotspots(_) => "hotspots",
        Commands::Pmesii(_) => "pmesii",
        Commands::Prompts(_) => "prompts",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Hotspots(cmd) => cmd.execute(&config),
        Commands::Pmesii(cmd) => cmd.execute(&config).await,
        Commands::Prompts(cmd) => cmd.execute(&config),
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
