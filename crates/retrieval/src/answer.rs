//! Citation-aware answer generation.
//!
//! The working set is numbered 1..=N and shown to the model as a context
//! block. The model is asked to cite with `<sup>[n]</sup>`; whatever it
//! returns, the references section is rebuilt here from the citation index
//! so numbering always matches what the model saw.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use regex::{Captures, Regex};

use crate::text::truncate_chars;
use crate::types::{Answer, CitationIndex, WorkingSet};
use crate::verify::{marker_numbers, MARKER_RE};
use geochain_core::{AppError, AppResult, RetrievalSettings};
use geochain_llm::{LlmClient, LlmRequest};
use geochain_prompt::{build_prompt, load_prompt};

const PROMPT_ID: &str = "answer.cited";

static REFERENCES_HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*(?:#{1,6}[ \t]*)?(?:\*\*)?(?:references|sources|bibliography|works cited)(?:\*\*)?[ \t]*:?(?:\*\*)?[ \t]*$")
        .expect("references heading regex is valid")
});

pub struct CitationAnswerer {
    llm: Arc<dyn LlmClient>,
    model: String,
    workspace: PathBuf,
    context_chars: usize,
    temperature: f32,
    max_tokens: u32,
}

impl CitationAnswerer {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        model: impl Into<String>,
        workspace: impl Into<PathBuf>,
        settings: &RetrievalSettings,
    ) -> Self {
        Self {
            llm,
            model: model.into(),
            workspace: workspace.into(),
            context_chars: settings.context_chars,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }

    /// Generate a cited answer for `question` over `working_set`.
    ///
    /// Never fails: an empty working set gives a no-information answer and
    /// any generation problem gives a generation-failure answer.
    pub async fn answer(&self, question: &str, working_set: &WorkingSet) -> Answer {
        if working_set.is_empty() {
            return Answer::no_information(question);
        }

        let citations = working_set.citation_index();
        match self.generate(question, working_set, &citations).await {
            Ok(raw) => {
                let body = sanitize_markers(&strip_model_references(&raw), &citations);
                Answer::cited(format!("{}{}", body, citations.references_block()), citations)
            }
            Err(e) => {
                tracing::error!(error = %e, "Answer generation failed");
                Answer::generation_failed(e)
            }
        }
    }

    async fn generate(
        &self,
        question: &str,
        working_set: &WorkingSet,
        citations: &CitationIndex,
    ) -> AppResult<String> {
        let definition = load_prompt(&self.workspace, PROMPT_ID)?;

        let mut variables = HashMap::new();
        variables.insert("question".to_string(), question.to_string());
        variables.insert(
            "context".to_string(),
            context_block(working_set, citations, self.context_chars),
        );
        let built = build_prompt(&definition, variables)?;

        let mut request = LlmRequest::new(built.user, &self.model)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        if let Some(system) = built.system {
            request = request.with_system(system);
        }

        tracing::debug!(
            provider = self.llm.provider_name(),
            passages = working_set.len(),
            "Requesting cited answer"
        );

        let response = self.llm.complete(&request).await?;
        if response.is_blank() {
            return Err(AppError::Generation("Model returned an empty answer".to_string()));
        }
        Ok(response.content)
    }
}

/// Numbered passages as shown to the model.
pub fn context_block(working_set: &WorkingSet, citations: &CitationIndex, max_chars: usize) -> String {
    citations
        .entries()
        .zip(&working_set.documents)
        .map(|((n, label), doc)| format!("[{}] {}:\n{}", n, label, truncate_chars(&doc.content, max_chars)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Drop any references section the model wrote despite being told not to,
/// along with a dangling `---` separator before it.
pub fn strip_model_references(text: &str) -> String {
    let body = match REFERENCES_HEADING_RE.find(text) {
        Some(m) => &text[..m.start()],
        None => text,
    };

    let mut body = body.trim_end();
    while let Some(rest) = body.strip_suffix("---") {
        body = rest.trim_end();
    }
    body.to_string()
}

/// Keep only citation numbers present in `citations`; a marker left with
/// no valid number is removed along with the whitespace before it.
///
/// Superscript markers come out as `<sup>[a][b]</sup>`, bare ones as
/// `[a][b]`.
pub fn sanitize_markers(text: &str, citations: &CitationIndex) -> String {
    MARKER_RE
        .replace_all(text, |caps: &Captures| {
            let valid: String = marker_numbers(caps)
                .into_iter()
                .filter(|n| citations.contains(*n))
                .map(|n| format!("[{}]", n))
                .collect();

            if valid.is_empty() {
                tracing::debug!(marker = caps[0].trim(), "Removed out-of-range citation");
                return String::new();
            }

            let lead = caps.name("lead").map_or("", |m| m.as_str());
            if caps.name("sup").is_some() {
                format!("{}<sup>{}</sup>", lead, valid)
            } else {
                format!("{}{}", lead, valid)
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fakes::ScriptedLlm;
    use crate::types::{AnswerKind, Document};

    fn working_set() -> WorkingSet {
        WorkingSet {
            documents: vec![
                Document::new("Mali has several ethnic groups.").with_source("EPR", "2021"),
                Document::new("Mali's population is about 22 million.")
                    .with_source("CIA World Factbook", "2024"),
            ],
            per_source: Vec::new(),
        }
    }

    fn answerer(llm: ScriptedLlm) -> CitationAnswerer {
        CitationAnswerer::new(
            Arc::new(llm),
            "test-model",
            std::env::temp_dir(),
            &RetrievalSettings::default(),
        )
    }

    #[test]
    fn test_context_block_numbering() {
        let ws = working_set();
        let block = context_block(&ws, &ws.citation_index(), 800);
        assert!(block.starts_with("[1] EPR (2021):\nMali has several ethnic groups."));
        assert!(block.contains("\n\n[2] CIA World Factbook (2024):\n"));
    }

    #[test]
    fn test_context_block_truncates() {
        let ws = working_set();
        let block = context_block(&ws, &ws.citation_index(), 4);
        assert!(block.contains("[1] EPR (2021):\nMali..."));
    }

    #[test]
    fn test_sanitize_drops_out_of_range() {
        let citations = working_set().citation_index();
        let text = "A<sup>[1][7]</sup>. B<sup>[9]</sup>. C<sup>[2]</sup>.";
        assert_eq!(
            sanitize_markers(text, &citations),
            "A<sup>[1]</sup>. B. C<sup>[2]</sup>."
        );
    }

    #[test]
    fn test_sanitize_bare_and_list_markers() {
        let citations = working_set().citation_index();
        assert_eq!(
            sanitize_markers("Claim<sup>[1]</sup> and another claim [7].", &citations),
            "Claim<sup>[1]</sup> and another claim."
        );
        assert_eq!(
            sanitize_markers("Claim<sup>[1, 9]</sup>. Other [2; 4].", &citations),
            "Claim<sup>[1]</sup>. Other [2]."
        );
    }

    #[tokio::test]
    async fn test_answer_markers_within_working_set() {
        let llm = ScriptedLlm::replying("Claim<sup>[1, 9]</sup> and another claim [7].");
        let answer = answerer(llm).answer("Tell me about Mali", &working_set()).await;

        assert!(answer.text.starts_with("Claim<sup>[1]</sup> and another claim.\n\n---"));
        assert!(crate::verify::citation_markers(&answer.text)
            .iter()
            .all(|n| (1..=2).contains(n)));
    }

    #[test]
    fn test_strip_model_references() {
        let text = "Answer<sup>[1]</sup>.\n\n---\n**References**\n1. Made up (1900)";
        assert_eq!(strip_model_references(text), "Answer<sup>[1]</sup>.");

        let text = "Answer.\n\n## Sources\n- something";
        assert_eq!(strip_model_references(text), "Answer.");

        assert_eq!(strip_model_references("Plain answer."), "Plain answer.");
    }

    #[tokio::test]
    async fn test_answer_appends_references() {
        let llm = ScriptedLlm::replying(
            "Mali is diverse<sup>[1]</sup> with 22 million people<sup>[2]</sup>.\n\nReferences:\n1. Wrong",
        );
        let answer = answerer(llm).answer("Tell me about Mali", &working_set()).await;

        assert_eq!(answer.kind, AnswerKind::Cited);
        assert_eq!(
            answer.text,
            "Mali is diverse<sup>[1]</sup> with 22 million people<sup>[2]</sup>.\
             \n\n---\n**References**\n1. EPR (2021)\n2. CIA World Factbook (2024)"
        );
    }

    #[tokio::test]
    async fn test_prompt_contains_numbered_context() {
        let llm = Arc::new(ScriptedLlm::replying("ok<sup>[1]</sup>"));
        let answerer = CitationAnswerer::new(
            llm.clone(),
            "test-model",
            std::env::temp_dir(),
            &RetrievalSettings::default(),
        );
        answerer.answer("Tell me about Mali", &working_set()).await;

        let requests = llm.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].prompt.contains("[2] CIA World Factbook (2024):"));
        assert!(requests[0].system.as_deref().unwrap_or("").contains("<sup>[n]</sup>"));
        assert_eq!(requests[0].temperature, Some(0.3));
    }

    #[tokio::test]
    async fn test_blank_completion_is_failure() {
        let answer = answerer(ScriptedLlm::replying("   ")).answer("q", &working_set()).await;
        assert_eq!(answer.kind, AnswerKind::GenerationFailed);
        assert!(answer.text.starts_with("Error generating answer:"));
    }

    #[tokio::test]
    async fn test_llm_error_is_failure() {
        let answer = answerer(ScriptedLlm::failing("connection refused"))
            .answer("q", &working_set())
            .await;
        assert_eq!(answer.kind, AnswerKind::GenerationFailed);
        assert!(answer.text.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_empty_working_set() {
        let answer = answerer(ScriptedLlm::replying("unused"))
            .answer("q", &WorkingSet::default())
            .await;
        assert_eq!(answer.kind, AnswerKind::NoInformation);
    }
}
