//! Comply CLI
//!
//! Main entry point for the compliance assistant.
//! Answers business compliance questions from a local corpus and the web.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, CorpusCommand, InspectCommand};
use comply_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// Comply - grounded answers to business compliance questions
#[derive(Parser, Debug)]
#[command(name = "comply")]
#[command(about = "Grounded answers to business compliance questions", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "COMPLY_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "COMPLY_CONFIG")]
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

    /// LLM provider (ollama, openai, groq)
    #[arg(short, long, global = true, env = "COMPLY_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "COMPLY_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a compliance question
    Ask(AskCommand),

    /// Show the fused evidence for a question without generating an answer
    Inspect(InspectCommand),

    /// Corpus index management
    Corpus(CorpusCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let config = AppConfig::load()?.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color, config.log_json)?;

    tracing::info!("Comply CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    config.ensure_comply_dir()?;

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Inspect(_) => "inspect",
        Commands::Corpus(_) => "corpus",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Inspect(cmd) => cmd.execute(&config).await,
        Commands::Corpus(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
