//! Query engine: intent dispatch over the cited retrieval pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::Instrument;
use uuid::Uuid;

use crate::aggregate::MultiQueryAggregator;
use crate::answer::CitationAnswerer;
use crate::balance::SourceBalancer;
use crate::decision::DecisionSupport;
use crate::expansion::QueryExpander;
use crate::intent::{classify, Intent};
use crate::map::{self, MapRenderer};
use crate::pmesii::{
    grouping_markdown, indicators_from, GroupingCache, PmesiiAnalyzer, PmesiiDomain, PmesiiGrouping,
};
use crate::types::{Answer, AnswerKind, QueryRequest, QueryResponse, SourceRef};
use crate::vector_index::{SearchMode, VectorIndex};
use crate::verify::{guarded_transform, AnswerTransform, LlmRewriter};
use geochain_core::{AppResult, RetrievalSettings};
use geochain_geo::{CountryAnalysis, HotspotAnalyzer};
use geochain_llm::LlmClient;

pub struct QueryEngine {
    index: Arc<dyn VectorIndex>,
    llm: Arc<dyn LlmClient>,
    model: String,
    workspace: PathBuf,
    settings: RetrievalSettings,
    expander: QueryExpander,
    aggregator: MultiQueryAggregator,
    balancer: SourceBalancer,
    answerer: CitationAnswerer,
    transform: Option<Arc<dyn AnswerTransform>>,
    map_renderer: Option<Arc<dyn MapRenderer>>,
    hotspots: Option<Arc<HotspotAnalyzer>>,
    pmesii: PmesiiAnalyzer,
    decision: DecisionSupport,
}

impl QueryEngine {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        llm: Arc<dyn LlmClient>,
        model: impl Into<String>,
        workspace: impl Into<PathBuf>,
        settings: RetrievalSettings,
    ) -> AppResult<Self> {
        settings.validate()?;
        let model = model.into();
        let workspace = workspace.into();

        let transform: Option<Arc<dyn AnswerTransform>> = if settings.rewrite_final {
            Some(Arc::new(
                LlmRewriter::new(llm.clone(), model.clone(), workspace.clone())
                    .with_sampling(settings.temperature, settings.max_tokens),
            ))
        } else {
            None
        };

        Ok(Self {
            expander: QueryExpander::new(settings.max_variants),
            aggregator: MultiQueryAggregator::new(index.clone(), &settings),
            balancer: SourceBalancer::new(settings.working_set_size, settings.source_caps.clone())?,
            answerer: CitationAnswerer::new(llm.clone(), model.clone(), workspace.clone(), &settings),
            pmesii: PmesiiAnalyzer::new(
                llm.clone(),
                model.clone(),
                workspace.clone(),
                Arc::new(GroupingCache::new()),
            ),
            decision: DecisionSupport::new(llm.clone(), model.clone(), workspace.clone(), index.clone()),
            transform,
            map_renderer: None,
            hotspots: None,
            index,
            llm,
            model,
            workspace,
            settings,
        })
    }

    pub fn with_map_renderer(mut self, renderer: Arc<dyn MapRenderer>) -> Self {
        self.map_renderer = Some(renderer);
        self
    }

    pub fn with_hotspot_analyzer(mut self, analyzer: Arc<HotspotAnalyzer>) -> Self {
        self.hotspots = Some(analyzer);
        self
    }

    /// Share a grouping cache between engines.
    pub fn with_grouping_cache(mut self, cache: Arc<GroupingCache>) -> Self {
        self.pmesii = PmesiiAnalyzer::new(
            self.llm.clone(),
            self.model.clone(),
            self.workspace.clone(),
            cache,
        );
        self
    }

    /// Replace the final presentation step; `None` returns the cited
    /// answer as generated.
    pub fn with_transform(mut self, transform: Option<Arc<dyn AnswerTransform>>) -> Self {
        self.transform = transform;
        self
    }

    pub fn grouping_cache(&self) -> &Arc<GroupingCache> {
        self.pmesii.cache()
    }

    /// Answer a question scoped to one country.
    pub async fn query_country(&self, country: &str, question: &str) -> QueryResponse {
        self.query(QueryRequest::new(question).with_country(country))
            .await
    }

    pub async fn query(&self, request: QueryRequest) -> QueryResponse {
        let span = tracing::info_span!("query", request_id = %Uuid::new_v4());
        async move {
            let intent = classify(&request.question, request.country.as_deref());
            tracing::info!(intent = intent.name(), question = %request.question, "Handling query");

            let question = match &request.country {
                Some(country) => format!("Regarding {}: {}", country, request.question),
                None => request.question.clone(),
            };

            match intent {
                Intent::Factual => self.answer_factual(&question).await,
                Intent::Map { country: Some(country) } => {
                    self.answer_map(&question, &request.question, &country).await
                }
                Intent::Hotspots { country: Some(country) } if self.hotspots.is_some() => {
                    self.answer_hotspots(&country)
                }
                Intent::DecisionSupport => self.answer_decision(&question).await,
                Intent::Pmesii { country: Some(country) } => self.answer_pmesii(&country).await,
                other => {
                    tracing::debug!(intent = other.name(), "Intent not serviceable, answering directly");
                    self.answer_factual(&question).await
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Expand, aggregate, balance, answer, then run the guarded final step.
    pub async fn answer_factual(&self, question: &str) -> QueryResponse {
        let variants = self.expander.expand(question);

        let pool = match self.aggregator.aggregate(&variants).await {
            Ok(pool) if !pool.is_empty() => pool,
            Ok(_) => {
                tracing::info!("No candidates retrieved");
                return QueryResponse::unsupported(Answer::no_information(question).text);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Retrieval failed");
                return QueryResponse::unsupported(Answer::no_information(question).text);
            }
        };

        let working_set = self.balancer.select(&pool);
        let answer = self.answerer.answer(question, &working_set).await;
        if answer.kind != AnswerKind::Cited {
            return QueryResponse::unsupported(answer.text);
        }

        let text = match &self.transform {
            Some(transform) => guarded_transform(transform.as_ref(), &answer.text).await.text,
            None => answer.text,
        };

        let confidence = working_set
            .max_score()
            .unwrap_or(self.settings.default_confidence)
            .clamp(0.0, 1.0);
        let sources = working_set
            .documents
            .iter()
            .map(SourceRef::from_document)
            .collect();

        QueryResponse::new(text, sources, confidence)
    }

    async fn answer_map(&self, question: &str, original: &str, country: &str) -> QueryResponse {
        let Some(renderer) = &self.map_renderer else {
            return self.answer_factual(question).await;
        };

        let html = match renderer.render(country).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(country, error = %e, "Map rendering failed, answering directly");
                return self.answer_factual(question).await;
            }
        };

        let intro = map::introduction(self.llm.as_ref(), &self.model, &self.workspace, original, country)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Map introduction failed");
                format!("Map of {}.", country)
            });

        QueryResponse::new(
            map::with_map(&intro, &html),
            Vec::new(),
            self.settings.default_confidence,
        )
    }

    fn answer_hotspots(&self, country: &str) -> QueryResponse {
        let Some(analyzer) = &self.hotspots else {
            return QueryResponse::unsupported("Hotspot analysis is not configured.".to_string());
        };

        match analyzer.analyze_country(country) {
            report @ CountryAnalysis::Report(_) => {
                QueryResponse::new(report.to_markdown(), Vec::new(), self.settings.default_confidence)
            }
            error @ CountryAnalysis::Error(_) => QueryResponse::unsupported(error.to_markdown()),
        }
    }

    async fn answer_decision(&self, question: &str) -> QueryResponse {
        match self.decision.analyze(question).await {
            Ok(report) => QueryResponse::new(
                report.to_markdown(),
                report.sources.clone(),
                self.settings.default_confidence,
            ),
            Err(e) => {
                tracing::error!(error = %e, "Decision support failed");
                QueryResponse::unsupported(Answer::generation_failed(e).text)
            }
        }
    }

    async fn answer_pmesii(&self, country: &str) -> QueryResponse {
        let indicators = match self.country_indicators(country).await {
            Ok(indicators) => indicators,
            Err(e) => {
                tracing::warn!(country, error = %e, "Indicator lookup failed");
                Vec::new()
            }
        };

        match self.pmesii.group(country, &indicators).await {
            Ok(grouping) => QueryResponse::new(
                grouping_markdown(country, &grouping),
                Vec::new(),
                self.settings.default_confidence,
            ),
            Err(e) => QueryResponse::unsupported(format!("PMESII analysis for {} failed: {}", country, e)),
        }
    }

    /// Indicator names the corpus holds for `country`.
    pub async fn country_indicators(&self, country: &str) -> AppResult<Vec<String>> {
        let docs = self
            .index
            .search(
                &format!("{} indicators", country),
                self.settings.pool_budget,
                SearchMode::Similarity,
            )
            .await?;

        let for_country: Vec<_> = docs
            .into_iter()
            .filter(|d| {
                d.country()
                    .map_or(true, |c| c.eq_ignore_ascii_case(country))
            })
            .collect();
        Ok(indicators_from(&for_country))
    }

    /// Group the corpus indicators for `country`, using the shared cache.
    pub async fn pmesii_grouping(&self, country: &str) -> AppResult<PmesiiGrouping> {
        if let Some(cached) = self.grouping_cache().get(country) {
            return Ok(cached);
        }
        let indicators = self.country_indicators(country).await?;
        self.pmesii.group(country, &indicators).await
    }

    /// Cited summary of one PMESII domain, focused on its indicators.
    pub async fn domain_summary(
        &self,
        country: &str,
        domain: PmesiiDomain,
        indicators: &[String],
    ) -> QueryResponse {
        let mut focus = indicators.iter().take(10).cloned().collect::<Vec<_>>().join(", ");
        if indicators.len() > 10 {
            focus.push_str(&format!(", and {} more indicators", indicators.len() - 10));
        }

        let question = format!(
            "Provide a comprehensive summary of all available {} data for {}. \
             Focus on these indicators: {}. Include key statistics, trends over time and notable issues.",
            domain, country, focus
        );
        self.answer_factual(&question).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fakes::{ScriptedIndex, ScriptedLlm};
    use crate::types::Document;
    use geochain_core::{AppError, HotspotSettings};
    use geochain_geo::{Bounds, BoundsTable, GeoTransform, Raster};

    struct StaticMap;

    #[async_trait::async_trait]
    impl MapRenderer for StaticMap {
        async fn render(&self, country: &str) -> AppResult<String> {
            if country == "Atlantis" {
                return Err(AppError::Other("no polygons".to_string()));
            }
            Ok(format!("<div id=\"map\">{}</div>", country))
        }
    }

    fn settings() -> RetrievalSettings {
        RetrievalSettings {
            rewrite_final: false,
            ..RetrievalSettings::default()
        }
    }

    fn index() -> ScriptedIndex {
        ScriptedIndex::new().with_fallback(vec![
            Document::new("Mali GDP grew 5% in 2023.")
                .with_source("World Bank", "2023")
                .with_metadata("country", "Mali")
                .with_metadata("indicator", "GDP growth"),
        ])
    }

    fn engine(llm: ScriptedLlm) -> QueryEngine {
        QueryEngine::new(
            Arc::new(index()),
            Arc::new(llm),
            "test-model",
            std::env::temp_dir(),
            settings(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_country_scoped_question() {
        let llm = Arc::new(ScriptedLlm::replying("Growth was 5%<sup>[1]</sup>."));
        let engine = QueryEngine::new(
            Arc::new(index()),
            llm.clone(),
            "test-model",
            std::env::temp_dir(),
            settings(),
        )
        .unwrap();

        let response = engine.query_country("Mali", "How fast is GDP growing?").await;

        assert!(llm.requests()[0]
            .prompt
            .contains("Question: Regarding Mali: How fast is GDP growing?"));
        assert!(response.answer.ends_with("**References**\n1. World Bank (2023)"));
        assert_eq!(response.sources.len(), 1);
        assert!((response.confidence - 0.8).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_map_intent_appends_payload() {
        let engine = engine(ScriptedLlm::replying("This map shows ethnic groups."))
            .with_map_renderer(Arc::new(StaticMap));
        let response = engine
            .query(QueryRequest::new("Show me ethnic groups in Mali"))
            .await;

        assert_eq!(
            response.answer,
            "This map shows ethnic groups.\n\nMAP:<div id=\"map\">Mali</div>"
        );
    }

    #[tokio::test]
    async fn test_map_failure_falls_back_to_factual() {
        let engine = engine(ScriptedLlm::replying("Answer<sup>[1]</sup>."))
            .with_map_renderer(Arc::new(StaticMap));
        let response = engine
            .query(QueryRequest::new("Show me ethnic groups in Atlantis"))
            .await;

        assert!(!response.answer.contains("MAP:"));
        assert!(response.answer.contains("**References**"));
    }

    #[tokio::test]
    async fn test_hotspot_intent() {
        let raster = Raster::new(
            3,
            3,
            vec![1.0, 1.0, 1.0, 1.0, 9.0, 1.0, 1.0, 1.0, 1.0],
            GeoTransform::north_up(0.0, 3.0, 1.0),
        )
        .unwrap();
        let mut table = BoundsTable::new();
        table.insert("Mali", Bounds::new(0.0, 0.0, 3.0, 3.0).unwrap());
        let settings = HotspotSettings {
            min_cluster_size: 1,
            ..HotspotSettings::default()
        };
        let analyzer = HotspotAnalyzer::new(Arc::new(raster), Arc::new(table), &settings).unwrap();

        let engine = engine(ScriptedLlm::replying("unused")).with_hotspot_analyzer(Arc::new(analyzer));

        let response = engine
            .query(QueryRequest::new("Where are infrastructure hotspots in Mali?"))
            .await;
        assert!(response.answer.contains("Mali"));
        assert!(response.confidence > 0.0);

        let missing = engine
            .query(QueryRequest::new("Where are infrastructure hotspots in Atlantis?"))
            .await;
        assert!(missing.answer.contains("Country bounds not found"));
        assert_eq!(missing.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_pmesii_intent_caches_grouping() {
        let engine = engine(ScriptedLlm::replying(r#"{"Economic": ["GDP growth"]}"#));
        let response = engine
            .query(QueryRequest::new("PMESII breakdown").with_country("Mali"))
            .await;

        assert!(response.answer.contains("## Economic (1 indicators)\n- GDP growth"));
        assert!(engine.grouping_cache().get("mali").is_some());

        engine.grouping_cache().clear(Some("Mali"));
        assert!(engine.grouping_cache().is_empty());
    }

    #[tokio::test]
    async fn test_decision_intent() {
        let engine = engine(ScriptedLlm::replying("step output"));
        let response = engine
            .query(QueryRequest::new("What strategy would stabilize Mali?"))
            .await;

        assert!(response.answer.starts_with("# Decision Support Analysis:"));
        assert_eq!(response.sources.len(), 1);
    }

    #[tokio::test]
    async fn test_generation_failure_has_zero_confidence() {
        let response = engine(ScriptedLlm::failing("timeout"))
            .query(QueryRequest::new("What is Mali's GDP?"))
            .await;

        assert!(response.answer.starts_with("Error generating answer:"));
        assert_eq!(response.confidence, 0.0);
        assert!(response.sources.is_empty());
    }

    #[test]
    fn test_zero_working_set_rejected() {
        let settings = RetrievalSettings {
            working_set_size: 0,
            ..settings()
        };
        let result = QueryEngine::new(
            Arc::new(index()),
            Arc::new(ScriptedLlm::replying("")),
            "m",
            std::env::temp_dir(),
            settings,
        );
        assert!(result.is_err());
    }
}
