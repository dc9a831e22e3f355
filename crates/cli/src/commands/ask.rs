//! Ask command handler.
//!
//! Runs one question through the answering pipeline and prints the answer
//! with its citations.

use super::{build_pipeline, print_json};
use clap::Args;
use comply_core::{config::AppConfig, AppError, AppResult};
use comply_pipeline::{AskResponse, ProfileContext};
use tokio_util::sync::CancellationToken;

/// Ask a compliance question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Business profile attribute, e.g. `--profile state=Delhi` (repeatable)
    #[arg(long = "profile", value_name = "KEY=VALUE", value_parser = parse_profile_pair)]
    pub profile: Vec<(String, String)>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

fn parse_profile_pair(raw: &str) -> Result<(String, String), String> {
    ProfileContext::parse_pair(raw).ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");

        let pipeline = build_pipeline(config)?;
        let profile: ProfileContext = self.profile.iter().cloned().collect();
        let profile = (!profile.is_empty()).then_some(profile);

        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, cancelling request");
                on_interrupt.cancel();
            }
        });

        let result = pipeline
            .ask_with_cancel(&self.question, profile.as_ref(), cancel)
            .await;
        interrupt.abort();

        let response = match result {
            Ok(response) => response,
            Err(AppError::Cancelled) => {
                eprintln!("Cancelled.");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if self.json {
            print_json(&response)
        } else {
            print_answer(&response);
            Ok(())
        }
    }
}

fn print_answer(response: &AskResponse) {
    println!("{}", response.answer);

    if !response.citations.is_empty() {
        println!("\nSources:");
        for (i, citation) in response.citations.iter().enumerate() {
            println!("  [{}] {} - \"{}\"", i + 1, citation.source_id, citation.quote);
        }
    }

    if let Some(ref disclaimer) = response.disclaimer {
        println!("\nNote: {}", disclaimer);
    }

    tracing::debug!(
        request_id = %response.trace.request_id,
        grounded = response.grounded,
        attempt = response.trace.attempt,
        synthesizer_calls = response.trace.synthesizer_calls,
        "Answer delivered"
    );
}
