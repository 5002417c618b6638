//! Multi-query aggregation into a single deduplicated candidate pool.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;

use crate::types::{CandidatePool, Document};
use crate::vector_index::{SearchMode, VectorIndex};
use geochain_core::{AppError, AppResult, RetrievalSettings};

pub struct MultiQueryAggregator {
    index: Arc<dyn VectorIndex>,
    per_variant_k: usize,
    pool_budget: usize,
    fingerprint_chars: usize,
    mode: SearchMode,
}

impl MultiQueryAggregator {
    pub fn new(index: Arc<dyn VectorIndex>, settings: &RetrievalSettings) -> Self {
        Self {
            index,
            per_variant_k: settings.per_variant_k,
            pool_budget: settings.pool_budget,
            fingerprint_chars: settings.fingerprint_chars,
            mode: SearchMode::from_settings(settings.diversity.as_ref()),
        }
    }

    /// Fetch every distinct variant concurrently and merge the results.
    ///
    /// Batches are interleaved by rank in variant order (rank 1 of every
    /// variant, then rank 2, ...), keeping the first document seen for each
    /// fingerprint, until the pool budget is reached. Failed variants are
    /// logged and skipped; the call fails only when every variant failed.
    pub async fn aggregate(&self, variants: &[String]) -> AppResult<CandidatePool> {
        let mut seen = HashSet::new();
        let unique: Vec<&str> = variants
            .iter()
            .map(String::as_str)
            .filter(|v| seen.insert(*v))
            .collect();

        let results = join_all(
            unique
                .iter()
                .map(|variant| self.index.search(variant, self.per_variant_k, self.mode)),
        )
        .await;

        let mut batches: Vec<Vec<Document>> = Vec::with_capacity(results.len());
        for (variant, result) in unique.iter().zip(results) {
            match result {
                Ok(docs) => {
                    tracing::debug!(variant, hits = docs.len(), "Variant retrieved");
                    batches.push(docs);
                }
                Err(e) => tracing::warn!(variant, error = %e, "Variant retrieval failed, skipping"),
            }
        }

        if batches.is_empty() && !unique.is_empty() {
            return Err(AppError::Retrieval(format!(
                "All {} query variants failed",
                unique.len()
            )));
        }

        let pool = self.interleave(batches);
        tracing::info!(
            variants = unique.len(),
            pool = pool.len(),
            sources = pool.distinct_sources(),
            "Aggregated candidate pool"
        );
        Ok(pool)
    }

    fn interleave(&self, batches: Vec<Vec<Document>>) -> CandidatePool {
        let mut pool = CandidatePool::new(self.fingerprint_chars);
        let depth = batches.iter().map(Vec::len).max().unwrap_or(0);
        let mut iters: Vec<_> = batches.into_iter().map(Vec::into_iter).collect();

        'ranks: for _ in 0..depth {
            for iter in iters.iter_mut() {
                if pool.len() >= self.pool_budget {
                    break 'ranks;
                }
                if let Some(doc) = iter.next() {
                    pool.insert(doc);
                }
            }
        }

        pool
    }
}
