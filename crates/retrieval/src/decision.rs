//! Multi-step decision support analysis.
//!
//! Six chained LLM calls, each seeing the question, the retrieved context
//! and every earlier step's output:
//! situation → root causes → stakeholders → options → impact →
//! recommendations.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::text::truncate_chars;
use crate::types::{Document, SourceRef};
use crate::vector_index::{SearchMode, VectorIndex};
use geochain_core::{AppError, AppResult};
use geochain_llm::{LlmClient, LlmRequest};
use geochain_prompt::{build_prompt, load_prompt};

const CONTEXT_DOCUMENTS: usize = 10;
const EXCERPT_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStep {
    Situation,
    RootCauses,
    Stakeholders,
    Options,
    Impact,
    Recommendations,
}

impl DecisionStep {
    pub const ALL: [DecisionStep; 6] = [
        Self::Situation,
        Self::RootCauses,
        Self::Stakeholders,
        Self::Options,
        Self::Impact,
        Self::Recommendations,
    ];

    pub fn prompt_id(&self) -> &'static str {
        match self {
            Self::Situation => "decision.situation",
            Self::RootCauses => "decision.root_causes",
            Self::Stakeholders => "decision.stakeholders",
            Self::Options => "decision.options",
            Self::Impact => "decision.impact",
            Self::Recommendations => "decision.recommendations",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Situation => "Situation Analysis",
            Self::RootCauses => "Root Cause Analysis",
            Self::Stakeholders => "Stakeholder Analysis",
            Self::Options => "Policy Options",
            Self::Impact => "Impact Assessment",
            Self::Recommendations => "Final Recommendations",
        }
    }

    /// Template variable later steps read this step's output from.
    pub fn variable(&self) -> &'static str {
        match self {
            Self::Situation => "situation",
            Self::RootCauses => "root_causes",
            Self::Stakeholders => "stakeholders",
            Self::Options => "options",
            Self::Impact => "impact",
            Self::Recommendations => "recommendations",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub step: DecisionStep,
    pub analysis: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DecisionReport {
    pub question: String,
    pub steps: Vec<StepResult>,
    pub sources: Vec<SourceRef>,
    pub generated_at: DateTime<Utc>,
}

impl DecisionReport {
    pub fn to_markdown(&self) -> String {
        let mut out = format!("# Decision Support Analysis: {}\n", self.question);
        for (i, result) in self.steps.iter().enumerate() {
            out.push_str(&format!(
                "\n## {}. {}\n\n{}\n",
                i + 1,
                result.step.title(),
                result.analysis.trim()
            ));
        }
        out.push_str(&format!(
            "\n---\n*Generated {}*\n",
            self.generated_at.format("%Y-%m-%d %H:%M UTC")
        ));
        out
    }
}

pub struct DecisionSupport {
    llm: Arc<dyn LlmClient>,
    model: String,
    workspace: PathBuf,
    index: Arc<dyn VectorIndex>,
}

impl DecisionSupport {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        model: impl Into<String>,
        workspace: impl Into<PathBuf>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            llm,
            model: model.into(),
            workspace: workspace.into(),
            index,
        }
    }

    pub async fn analyze(&self, question: &str) -> AppResult<DecisionReport> {
        let documents = match self
            .index
            .search(question, CONTEXT_DOCUMENTS, SearchMode::Similarity)
            .await
        {
            Ok(docs) => docs,
            Err(e) => {
                tracing::warn!(error = %e, "Decision support retrieval failed");
                Vec::new()
            }
        };

        let mut variables = HashMap::new();
        variables.insert("question".to_string(), question.to_string());
        variables.insert("context".to_string(), excerpts(&documents));

        let mut steps = Vec::with_capacity(DecisionStep::ALL.len());
        for step in DecisionStep::ALL {
            tracing::info!(step = step.title(), "Decision support step");
            let analysis = self.run_step(step, &variables).await?;
            variables.insert(step.variable().to_string(), analysis.clone());
            steps.push(StepResult { step, analysis });
        }

        Ok(DecisionReport {
            question: question.to_string(),
            steps,
            sources: documents.iter().map(SourceRef::from_document).collect(),
            generated_at: Utc::now(),
        })
    }

    async fn run_step(
        &self,
        step: DecisionStep,
        variables: &HashMap<String, String>,
    ) -> AppResult<String> {
        let definition = load_prompt(&self.workspace, step.prompt_id())?;
        let built = build_prompt(&definition, variables.clone())?;

        let mut request = LlmRequest::new(built.user, &self.model)
            .with_temperature(0.3)
            .with_max_tokens(1500);
        if let Some(system) = built.system {
            request = request.with_system(system);
        }

        let response = self.llm.complete(&request).await?;
        if response.is_blank() {
            return Err(AppError::Generation(format!(
                "{} produced no text",
                step.title()
            )));
        }
        Ok(response.content)
    }
}

fn excerpts(documents: &[Document]) -> String {
    if documents.is_empty() {
        return "No relevant documents found.".to_string();
    }

    documents
        .iter()
        .enumerate()
        .map(|(i, doc)| {
            format!(
                "[{}] {}:\n{}",
                i + 1,
                doc.source_key(),
                truncate_chars(&doc.content, EXCERPT_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
