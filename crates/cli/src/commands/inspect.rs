//! Inspect command handler.
//!
//! Retrieves and fuses evidence for a question without generating an answer.

use super::{build_pipeline, describe_status, print_json};
use clap::Args;
use comply_core::{config::AppConfig, AppResult};
use comply_pipeline::Inspection;

/// Show the fused evidence for a question
#[derive(Args, Debug)]
pub struct InspectCommand {
    /// The question to retrieve evidence for
    pub question: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl InspectCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing inspect command");

        let pipeline = build_pipeline(config)?;
        let inspection = pipeline.inspect(&self.question).await;

        if self.json {
            return print_json(&inspection);
        }

        print_inspection(&inspection);
        Ok(())
    }
}

fn print_inspection(inspection: &Inspection) {
    println!("Local: {}", describe_status(&inspection.local));
    println!("Web:   {}", describe_status(&inspection.web));

    let ctx = &inspection.context;
    if ctx.is_empty() {
        println!("\nNo evidence found.");
        return;
    }

    println!("\nEvidence ({} chunks):", ctx.chunks.len());
    for chunk in &ctx.chunks {
        let year = chunk
            .published_year()
            .map(|y| y.to_string())
            .unwrap_or_else(|| "undated".to_string());
        println!(
            "\n[{}] {} {} ({}, relevance {:.2})",
            chunk.id(),
            chunk.source_type(),
            chunk.source_id(),
            year,
            chunk.relevance()
        );
        println!("  {}", chunk.content());
    }

    if !ctx.conflicts.is_empty() {
        println!("\nConflicts:");
        for note in &ctx.conflicts {
            println!(
                "  {}: [{}] over [{}] ({:?})",
                note.topic, note.newer, note.older, note.resolution
            );
        }
    }

    let freshness = &inspection.freshness;
    if freshness.needs_warning() {
        println!(
            "\nWarning: local evidence is stale (latest {}) and no web evidence was found.",
            freshness
                .latest_year
                .map(|y| y.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );
    }
}
