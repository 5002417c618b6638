//! End-to-end behaviour of the cited retrieval pipeline.

use std::sync::Arc;

use super::fakes::{ScriptedIndex, ScriptedLlm};
use crate::types::{CandidatePool, Document, QueryRequest, SourceKey};
use crate::verify::{citation_markers, has_references, AnswerTransform};
use crate::{MultiQueryAggregator, QueryEngine, SourceBalancer};
use geochain_core::{AppResult, RetrievalSettings, SourceCapPolicy};

fn epr(n: usize) -> Document {
    Document::new(format!("EPR records ethnic group {} holding regional power in Mali.", n))
        .with_source("EPR", "2021")
}

fn factbook(n: usize) -> Document {
    Document::new(format!("Factbook entry {}: Mali population and ethnic composition.", n))
        .with_metadata("source_name", "CIA World Factbook")
        .with_metadata("source_year", 2024)
}

/// Three EPR passages ahead of two Factbook passages, as a plain
/// similarity ranking tends to return them.
fn mali_index() -> ScriptedIndex {
    ScriptedIndex::new().with_fallback(vec![epr(1), epr(2), epr(3), factbook(1), factbook(2)])
}

fn settings(working_set_size: usize) -> RetrievalSettings {
    RetrievalSettings {
        working_set_size,
        rewrite_final: false,
        ..RetrievalSettings::default()
    }
}

fn engine(llm: Arc<ScriptedLlm>, working_set_size: usize) -> QueryEngine {
    QueryEngine::new(
        Arc::new(mali_index()),
        llm,
        "test-model",
        std::env::temp_dir(),
        settings(working_set_size),
    )
    .unwrap()
}

struct Stripper;

#[async_trait::async_trait]
impl AnswerTransform for Stripper {
    fn name(&self) -> &str {
        "stripper"
    }

    async fn transform(&self, _text: &str) -> AppResult<String> {
        Ok("Mali is diverse.".to_string())
    }
}

#[tokio::test]
async fn test_mali_answer_cites_both_sources() {
    let llm = Arc::new(ScriptedLlm::replying(
        "Mali's groups hold regional power<sup>[1]</sup> and the population is mixed<sup>[2]</sup>.",
    ));
    let response = engine(llm, 4)
        .query(QueryRequest::new("What is the political situation in Mali?"))
        .await;

    let citations: Vec<&str> = response.sources.iter().map(|s| s.citation.as_str()).collect();
    assert_eq!(citations.len(), 4);
    assert!(citations.contains(&"EPR (2021)"));
    assert!(citations.contains(&"CIA World Factbook (2024)"));
    assert_eq!(
        citations,
        vec![
            "EPR (2021)",
            "CIA World Factbook (2024)",
            "EPR (2021)",
            "CIA World Factbook (2024)"
        ]
    );
    assert!(response
        .answer
        .ends_with("**References**\n1. EPR (2021)\n2. CIA World Factbook (2024)\n3. EPR (2021)\n4. CIA World Factbook (2024)"));
}

#[tokio::test]
async fn test_no_starvation_with_tight_budget() {
    let pool = CandidatePool::from_documents(
        vec![epr(1), epr(2), epr(3), epr(4), factbook(1)],
        200,
    );
    for policy in [None, Some(SourceCapPolicy::default())] {
        let ws = SourceBalancer::new(2, policy).unwrap().select(&pool);
        let keys = ws.source_keys();
        assert!(keys.contains(&SourceKey::new("EPR", "2021")));
        assert!(keys.contains(&SourceKey::new("CIA World Factbook", "2024")));
    }
}

async fn selected_contents(
    aggregator: &MultiQueryAggregator,
    balancer: &SourceBalancer,
    variants: &[String],
) -> Vec<String> {
    let pool = aggregator.aggregate(variants).await.unwrap();
    balancer
        .select(&pool)
        .documents
        .into_iter()
        .map(|d| d.content)
        .collect()
}

#[tokio::test]
async fn test_pipeline_is_deterministic() {
    let index: Arc<ScriptedIndex> = Arc::new(mali_index());
    let settings = settings(4);
    let aggregator = MultiQueryAggregator::new(index, &settings);
    let balancer = SourceBalancer::new(4, settings.source_caps.clone()).unwrap();
    let variants = vec![
        "ethnic groups in Mali".to_string(),
        "political groups in Mali".to_string(),
    ];

    let first = selected_contents(&aggregator, &balancer, &variants).await;
    let second = selected_contents(&aggregator, &balancer, &variants).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_duplicate_variant_fetched_once() {
    let index = Arc::new(mali_index());
    let aggregator = MultiQueryAggregator::new(index.clone(), &settings(4));
    let q = "ethnic groups in Mali".to_string();

    let pool = aggregator.aggregate(&[q.clone(), q.clone()]).await.unwrap();

    assert_eq!(index.total_calls(), 1);
    assert_eq!(pool.len(), 5);
}

#[tokio::test]
async fn test_markers_stay_within_working_set() {
    let llm = Arc::new(ScriptedLlm::replying(
        "Claim<sup>[1]</sup>, another<sup>[4][12]</sup> and a stray one<sup>[0]</sup>.",
    ));
    let response = engine(llm, 3)
        .query(QueryRequest::new("Describe Mali"))
        .await;

    let markers = citation_markers(&response.answer);
    assert!(!markers.is_empty());
    assert!(markers.iter().all(|n| (1..=3).contains(n)));
    assert_eq!(markers, vec![1]);
}

#[tokio::test]
async fn test_stripping_rewrite_is_reverted() {
    let llm = Arc::new(ScriptedLlm::replying("Mali is diverse<sup>[1]</sup>."));
    let engine = engine(llm, 4).with_transform(Some(Arc::new(Stripper) as Arc<dyn AnswerTransform>));

    let response = engine.query(QueryRequest::new("Describe Mali")).await;

    assert!(has_references(&response.answer));
    assert!(response.answer.starts_with("Mali is diverse<sup>[1]</sup>."));
}

#[tokio::test]
async fn test_llm_rewrite_kept_when_citations_survive() {
    let rewritten = "Mali is *very* diverse<sup>[1]</sup>.\n\n---\n**References**\n1. EPR (2021)";
    let llm = Arc::new(
        ScriptedLlm::replying("Mali is diverse<sup>[1]</sup>.").when("Rewrite the answer", rewritten),
    );
    let settings = RetrievalSettings {
        rewrite_final: true,
        ..settings(4)
    };
    let engine = QueryEngine::new(
        Arc::new(mali_index()),
        llm.clone(),
        "test-model",
        std::env::temp_dir(),
        settings,
    )
    .unwrap();

    let response = engine.query(QueryRequest::new("Describe Mali")).await;

    assert_eq!(response.answer, rewritten);
    assert_eq!(llm.requests().len(), 2);
}

#[tokio::test]
async fn test_empty_retrieval_is_informational() {
    let engine = QueryEngine::new(
        Arc::new(ScriptedIndex::new()),
        Arc::new(ScriptedLlm::replying("unused")),
        "test-model",
        std::env::temp_dir(),
        settings(4),
    )
    .unwrap();

    let response = engine.query(QueryRequest::new("Describe Atlantis")).await;

    assert!(response.answer.starts_with("I could not find relevant information"));
    assert_eq!(response.confidence, 0.0);
    assert!(response.sources.is_empty());
}
