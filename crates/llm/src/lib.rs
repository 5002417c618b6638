//! LLM integration crate for GeoChain.
//!
//! Provider-agnostic completion interface used by the answerer, the
//! decision-support chain and the PMESII grouper.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//! - **OpenRouter / OpenAI**: Any OpenAI-compatible chat-completions endpoint
//!
//! # Example
//! ```no_run
//! use geochain_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("Summarize Mali's ethnic composition.", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::{client_from_config, create_client};
pub use providers::{OllamaClient, OpenAiCompatClient};
pub use types::ProviderType;
