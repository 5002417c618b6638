//! GeoChain retrieval engine.
//!
//! Answers questions over a multi-source country corpus with inline
//! citations:
//!
//! 1. [`expansion`] derives query variants for related indicator families
//! 2. [`aggregate`] fetches every variant and deduplicates into one pool
//! 3. [`balance`] picks a working set round-robin across sources
//! 4. [`answer`] generates a cited answer and appends the references
//! 5. [`verify`] reverts any later rewrite that dropped the citations
//!
//! [`engine::QueryEngine`] ties the pipeline together and dispatches the
//! other intents (maps, hotspots, decision support, PMESII grouping).

pub mod aggregate;
pub mod answer;
pub mod balance;
pub mod decision;
pub mod engine;
pub mod expansion;
pub mod intent;
pub mod map;
pub mod memory_index;
pub mod pmesii;
pub mod text;
pub mod types;
pub mod vector_index;
pub mod verify;

#[cfg(test)]
mod tests;

pub use aggregate::MultiQueryAggregator;
pub use answer::CitationAnswerer;
pub use balance::SourceBalancer;
pub use decision::{DecisionReport, DecisionStep, DecisionSupport};
pub use engine::QueryEngine;
pub use expansion::QueryExpander;
pub use intent::{classify, extract_country, Intent};
pub use map::MapRenderer;
pub use memory_index::InMemoryIndex;
pub use pmesii::{GroupingCache, PmesiiAnalyzer, PmesiiDomain, PmesiiGrouping};
pub use types::{
    Answer, AnswerKind, CandidatePool, CitationIndex, Document, QueryRequest, QueryResponse,
    SourceKey, SourceRef, WorkingSet,
};
pub use vector_index::{SearchMode, VectorIndex};
pub use verify::{guarded_transform, verify, AnswerTransform, LlmRewriter, Verification, VerificationOutcome};
