//! Vector index abstraction.
//!
//! The engine only reads from the index; population happens elsewhere.

use crate::types::Document;
use geochain_core::{AppResult, DiversitySettings};

/// How candidates are ranked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchMode {
    /// Plain top-k by similarity
    Similarity,
    /// Maximal marginal relevance over the top `fetch_k` candidates
    Diverse { fetch_k: usize, lambda: f32 },
}

impl SearchMode {
    pub fn from_settings(diversity: Option<&DiversitySettings>) -> Self {
        match diversity {
            Some(d) => Self::Diverse {
                fetch_k: d.fetch_k,
                lambda: d.lambda,
            },
            None => Self::Similarity,
        }
    }
}

/// Trait for vector index backends.
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    /// Return up to `k` documents for `query`, most relevant first.
    async fn search(&self, query: &str, k: usize, mode: SearchMode) -> AppResult<Vec<Document>>;
}
