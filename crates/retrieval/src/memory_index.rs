//! In-memory vector index over a JSONL corpus.
//!
//! Documents are embedded with deterministic character-trigram vectors and
//! ranked by cosine similarity. Suitable for local use and tests; it has no
//! semantic understanding beyond shared word fragments.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::types::Document;
use crate::vector_index::{SearchMode, VectorIndex};
use geochain_core::{AppError, AppResult};

pub const DEFAULT_DIMENSIONS: usize = 384;

const STOP_WORDS: [&str; 33] = [
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "what",
];

pub struct InMemoryIndex {
    dimensions: usize,
    entries: Vec<(Document, Vec<f32>)>,
}

impl InMemoryIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            entries: Vec::new(),
        }
    }

    pub fn from_documents(documents: impl IntoIterator<Item = Document>) -> Self {
        let mut index = Self::new(DEFAULT_DIMENSIONS);
        for doc in documents {
            index.insert(doc);
        }
        index
    }

    /// Load one JSON document per line; blank lines are skipped.
    pub fn load_jsonl(path: &Path) -> AppResult<Self> {
        let file = File::open(path).map_err(|e| {
            AppError::Retrieval(format!("Failed to open corpus {:?}: {}", path, e))
        })?;

        let mut index = Self::new(DEFAULT_DIMENSIONS);
        for (line_num, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| {
                AppError::Retrieval(format!("Failed to read line {}: {}", line_num + 1, e))
            })?;

            if line.trim().is_empty() {
                continue;
            }

            let doc: Document = serde_json::from_str(&line).map_err(|e| {
                AppError::Retrieval(format!(
                    "Failed to parse line {} in {:?}: {}",
                    line_num + 1,
                    path,
                    e
                ))
            })?;
            index.insert(doc);
        }

        tracing::info!("Loaded {} documents from {:?}", index.len(), path);
        Ok(index)
    }

    pub fn insert(&mut self, mut doc: Document) {
        doc.score = None;
        let embedding = self.embed(&doc.content);
        self.entries.push((doc, embedding));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Unit-length trigram embedding of `text`; the zero vector when the
    /// text has no content words.
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];
        let lower = text.to_lowercase();
        let stop_words: HashSet<&str> = STOP_WORDS.iter().copied().collect();

        let mut word_freq: HashMap<&str, usize> = HashMap::new();
        for word in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 2 && !stop_words.contains(w))
        {
            *word_freq.entry(word).or_insert(0) += 1;
        }

        for (word, freq) in &word_freq {
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let hash = window
                    .iter()
                    .fold(0u64, |acc, c| acc.wrapping_mul(37).wrapping_add(*c as u64));
                embedding[(hash as usize) % self.dimensions] += (*freq as f32).sqrt();
            }

            let word_hash = word
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            embedding[(word_hash as usize) % self.dimensions] += *freq as f32;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }
        embedding
    }

    /// Entry indices with positive similarity, best first (ties keep
    /// insertion order).
    fn ranked(&self, query: &[f32]) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, (_, emb))| (i, dot(query, emb)))
            .filter(|(_, score)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
    }

    /// Maximal marginal relevance selection of `k` from `candidates`.
    fn mmr(&self, candidates: &[(usize, f32)], k: usize, lambda: f32) -> Vec<(usize, f32)> {
        let mut remaining: Vec<(usize, f32)> = candidates.to_vec();
        let mut selected: Vec<(usize, f32)> = Vec::with_capacity(k);

        while selected.len() < k && !remaining.is_empty() {
            let mut best = 0;
            let mut best_score = f32::NEG_INFINITY;
            for (pos, (idx, relevance)) in remaining.iter().enumerate() {
                let redundancy = selected
                    .iter()
                    .map(|(s, _)| dot(&self.entries[*idx].1, &self.entries[*s].1))
                    .fold(0.0f32, f32::max);
                let score = lambda * relevance - (1.0 - lambda) * redundancy;
                if score > best_score {
                    best = pos;
                    best_score = score;
                }
            }
            selected.push(remaining.remove(best));
        }

        selected
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[async_trait::async_trait]
impl VectorIndex for InMemoryIndex {
    async fn search(&self, query: &str, k: usize, mode: SearchMode) -> AppResult<Vec<Document>> {
        let query_embedding = self.embed(query);
        let ranked = self.ranked(&query_embedding);

        let picked: Vec<(usize, f32)> = match mode {
            SearchMode::Similarity => ranked.into_iter().take(k).collect(),
            SearchMode::Diverse { fetch_k, lambda } => {
                let pool: Vec<(usize, f32)> = ranked.into_iter().take(fetch_k.max(k)).collect();
                self.mmr(&pool, k, lambda)
            }
        };

        tracing::debug!(query, hits = picked.len(), "In-memory search");

        Ok(picked
            .into_iter()
            .map(|(idx, score)| self.entries[idx].0.clone().with_score(score))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn corpus() -> InMemoryIndex {
        InMemoryIndex::from_documents(vec![
            Document::new("Mali ethnic groups include Bambara, Fulani and Tuareg populations")
                .with_source("EPR", "2021"),
            Document::new("Mali economy depends on gold exports and agriculture")
                .with_source("CIA World Factbook", "2024"),
            Document::new("Cooking recipes for pasta with tomato sauce")
                .with_source("Cookbook", "1999"),
        ])
    }

    #[test]
    fn test_embedding_normalized_and_deterministic() {
        let index = InMemoryIndex::new(DEFAULT_DIMENSIONS);
        let a = index.embed("Political situation in Mali");
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.001);
        assert_eq!(a, index.embed("Political situation in Mali"));
    }

    #[test]
    fn test_empty_text_zero_vector() {
        let index = InMemoryIndex::new(DEFAULT_DIMENSIONS);
        assert!(index.embed("").iter().all(|&x| x == 0.0));
    }

    #[tokio::test]
    async fn test_relevant_ranked_first() {
        let results = corpus()
            .search("ethnic groups in Mali", 3, SearchMode::Similarity)
            .await
            .unwrap();

        assert!(!results.is_empty());
        assert_eq!(results[0].source_name(), "EPR");
        assert!(results.iter().all(|d| d.score.unwrap_or(0.0) > 0.0));
    }

    #[tokio::test]
    async fn test_stop_word_query_returns_nothing() {
        let results = corpus()
            .search("what is the", 5, SearchMode::Similarity)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_diverse_mode_respects_k() {
        let mode = SearchMode::Diverse {
            fetch_k: 10,
            lambda: 0.3,
        };
        let results = corpus().search("Mali", 1, mode).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_load_jsonl_reports_line() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"content": "ok", "metadata": {{"source_name": "EPR"}}}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, "not json").unwrap();

        let err = InMemoryIndex::load_jsonl(file.path()).err().unwrap();
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_load_jsonl() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"content": "Mali borders Niger", "metadata": {{"source_name": "Wikipedia", "source_year": "2024"}}}}"#).unwrap();
        let index = InMemoryIndex::load_jsonl(file.path()).unwrap();
        assert_eq!(index.len(), 1);
    }
}
