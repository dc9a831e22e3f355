//! Corpus command handler.

use super::{open_corpus, print_json};
use clap::{Args, Subcommand};
use comply_core::{config::AppConfig, AppResult};

/// Corpus index management
#[derive(Args, Debug)]
pub struct CorpusCommand {
    #[command(subcommand)]
    pub action: CorpusAction,
}

#[derive(Subcommand, Debug)]
pub enum CorpusAction {
    /// Show corpus index statistics
    Stats(CorpusStatsCommand),
}

impl CorpusCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        match &self.action {
            CorpusAction::Stats(cmd) => cmd.execute(config),
        }
    }
}

/// Show corpus index statistics
#[derive(Args, Debug)]
pub struct CorpusStatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl CorpusStatsCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing corpus stats command");

        let path = config.corpus_index_path();
        let stats = open_corpus(config)?.stats()?;

        if self.json {
            return print_json(&stats);
        }

        println!("Corpus index: {}", path.display());
        println!("  Sources:  {}", stats.sources_count);
        println!("  Chunks:   {}", stats.chunks_count);
        println!("  Size:     {} KB", stats.db_size_bytes / 1024);
        println!("  Embedder: {}", stats.embedder);
        Ok(())
    }
}
