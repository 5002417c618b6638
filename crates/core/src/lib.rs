//! GeoChain Core Library
//!
//! This crate provides the foundational utilities shared by every GeoChain crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management (LLM providers, retrieval and hotspot tuning)

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{
    AppConfig, CapTier, DiversitySettings, HotspotSettings, RetrievalSettings, SourceCapPolicy,
};
pub use error::{AppError, AppResult};
