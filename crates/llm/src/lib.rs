//! Text generation clients for the compliance assistant.
//!
//! A provider-agnostic [`LlmClient`] trait with two implementations:
//! - **Ollama**: Local LLM runtime (default)
//! - **OpenAI-compatible**: OpenAI and Groq chat completion APIs
//!
//! # Example
//! ```no_run
//! use comply_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("What is the MSME turnover limit?", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::{OllamaClient, OpenAiCompatClient};
