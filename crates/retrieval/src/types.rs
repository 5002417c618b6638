//! Core retrieval types: documents, source identity, pools, working sets,
//! citation numbering and query responses.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::text::{fingerprint, truncate_snippet};

pub const UNKNOWN_SOURCE: &str = "Unknown";
pub const UNKNOWN_YEAR: &str = "unknown";

/// Maximum snippet length for source references.
const MAX_SNIPPET_LENGTH: usize = 200;

/// A retrievable passage plus provenance metadata.
///
/// Source identity lives in `metadata` under `source_name` and
/// `source_year`; the year may be stored as a string or a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,

    #[serde(default)]
    pub metadata: Map<String, Value>,

    /// Similarity score assigned by the index, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Map::new(),
            score: None,
        }
    }

    pub fn with_source(self, name: impl Into<String>, year: impl Into<String>) -> Self {
        self.with_metadata("source_name", name.into())
            .with_metadata("source_year", year.into())
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }

    fn metadata_str(&self, key: &str) -> Option<String> {
        match self.metadata.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn source_name(&self) -> String {
        self.metadata_str("source_name")
            .unwrap_or_else(|| UNKNOWN_SOURCE.to_string())
    }

    pub fn source_year(&self) -> String {
        self.metadata_str("source_year")
            .unwrap_or_else(|| UNKNOWN_YEAR.to_string())
    }

    pub fn source_key(&self) -> SourceKey {
        SourceKey {
            name: self.source_name(),
            year: self.source_year(),
        }
    }

    pub fn country(&self) -> Option<String> {
        self.metadata_str("country")
    }

    pub fn indicator(&self) -> Option<String> {
        self.metadata_str("indicator")
    }
}

/// Provenance identity `(source_name, source_year)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SourceKey {
    pub name: String,
    pub year: String,
}

impl SourceKey {
    pub fn new(name: impl Into<String>, year: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            year: year.into(),
        }
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.year)
    }
}

/// Ordered, fingerprint-unique documents gathered for one question.
#[derive(Debug, Clone)]
pub struct CandidatePool {
    documents: Vec<Document>,
    fingerprints: HashSet<String>,
    fingerprint_chars: usize,
}

impl CandidatePool {
    pub fn new(fingerprint_chars: usize) -> Self {
        Self {
            documents: Vec::new(),
            fingerprints: HashSet::new(),
            fingerprint_chars,
        }
    }

    /// Build a pool from documents in order, keeping the first of any
    /// fingerprint duplicates.
    pub fn from_documents(
        documents: impl IntoIterator<Item = Document>,
        fingerprint_chars: usize,
    ) -> Self {
        let mut pool = Self::new(fingerprint_chars);
        for doc in documents {
            pool.insert(doc);
        }
        pool
    }

    /// Append `doc` unless a document with the same fingerprint is present.
    pub fn insert(&mut self, doc: Document) -> bool {
        let fp = fingerprint(&doc.content, self.fingerprint_chars);
        if self.fingerprints.insert(fp) {
            self.documents.push(doc);
            true
        } else {
            false
        }
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn distinct_sources(&self) -> usize {
        self.documents
            .iter()
            .map(Document::source_key)
            .collect::<HashSet<_>>()
            .len()
    }
}

/// Bounded, source-balanced selection handed to the answerer.
#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
    pub documents: Vec<Document>,
    /// Documents taken per source, in group order
    pub per_source: Vec<(SourceKey, usize)>,
}

impl WorkingSet {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn source_keys(&self) -> Vec<SourceKey> {
        self.per_source.iter().map(|(key, _)| key.clone()).collect()
    }

    /// Highest similarity score, if the index reported any.
    pub fn max_score(&self) -> Option<f32> {
        self.documents
            .iter()
            .filter_map(|d| d.score)
            .fold(None, |acc, s| Some(acc.map_or(s, |m: f32| m.max(s))))
    }

    pub fn citation_index(&self) -> CitationIndex {
        CitationIndex {
            labels: self
                .documents
                .iter()
                .map(|d| d.source_key().to_string())
                .collect(),
        }
    }
}

/// 1-based numbering of working-set entries to their reference labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CitationIndex {
    labels: Vec<String>,
}

impl CitationIndex {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn contains(&self, number: usize) -> bool {
        (1..=self.labels.len()).contains(&number)
    }

    pub fn label(&self, number: usize) -> Option<&str> {
        number
            .checked_sub(1)
            .and_then(|i| self.labels.get(i))
            .map(String::as_str)
    }

    /// `(number, label)` pairs in citation order.
    pub fn entries(&self) -> impl Iterator<Item = (usize, &str)> {
        self.labels
            .iter()
            .enumerate()
            .map(|(i, label)| (i + 1, label.as_str()))
    }

    /// The appended references block, starting with the separator.
    pub fn references_block(&self) -> String {
        let mut block = String::from("\n\n---\n**References**");
        for (n, label) in self.entries() {
            block.push_str(&format!("\n{}. {}", n, label));
        }
        block
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKind {
    Cited,
    NoInformation,
    GenerationFailed,
}

/// Answerer output. For `Cited` answers `text` ends with the references block.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub kind: AnswerKind,
    pub citations: CitationIndex,
}

impl Answer {
    pub fn cited(text: String, citations: CitationIndex) -> Self {
        Self {
            text,
            kind: AnswerKind::Cited,
            citations,
        }
    }

    pub fn no_information(question: &str) -> Self {
        Self {
            text: format!(
                "I could not find relevant information about \"{}\" in the available sources.",
                question
            ),
            kind: AnswerKind::NoInformation,
            citations: CitationIndex::default(),
        }
    }

    pub fn generation_failed(reason: impl fmt::Display) -> Self {
        Self {
            text: format!("Error generating answer: {}", reason),
            kind: AnswerKind::GenerationFailed,
            citations: CitationIndex::default(),
        }
    }
}

/// User-facing reference to a supporting document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    /// "{source_name} ({source_year})"
    pub citation: String,
    pub source_name: String,
    pub source_year: String,
    pub snippet: String,
}

impl SourceRef {
    pub fn from_document(doc: &Document) -> Self {
        let key = doc.source_key();
        Self {
            citation: key.to_string(),
            snippet: truncate_snippet(&doc.content, MAX_SNIPPET_LENGTH),
            source_name: key.name,
            source_year: key.year,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl QueryRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            country: None,
        }
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    /// Final answer; may end with an opaque `MAP:<html>` suffix
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub confidence: f32,
}

impl QueryResponse {
    pub fn new(answer: String, sources: Vec<SourceRef>, confidence: f32) -> Self {
        Self {
            answer,
            sources,
            confidence,
        }
    }

    /// Response without sources and zero confidence.
    pub fn unsupported(answer: String) -> Self {
        Self::new(answer, Vec::new(), 0.0)
    }
}
