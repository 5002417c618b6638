//! Error types for GeoChain.
//!
//! This module defines a unified error enum that covers all error categories
//! in the application: configuration, I/O, LLM, retrieval, answer generation,
//! raster analysis, prompt and serialization errors.

use thiserror::Error;

/// Unified error type for GeoChain.
///
/// All fallible functions in the workspace return `Result<T, AppError>`.
/// External-service failures are converted into one of these variants at the
/// component boundary.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Vector index and candidate retrieval errors
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Answer generation errors
    #[error("Generation error: {0}")]
    Generation(String),

    /// Raster loading and spatial analysis errors
    #[error("Raster error: {0}")]
    Raster(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AppError::Retrieval("index unavailable".to_string());
        assert_eq!(err.to_string(), "Retrieval error: index unavailable");
    }

    #[test]
    fn test_serde_json_conversion() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: AppError = parse.unwrap_err().into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
