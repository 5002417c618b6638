//! Concrete LLM provider implementations.

pub mod ollama;
pub mod openai_compat;

pub use ollama::OllamaClient;
pub use openai_compat::OpenAiCompatClient;
