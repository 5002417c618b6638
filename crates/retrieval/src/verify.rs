//! Citation integrity checks for text that passes through untrusted steps.
//!
//! A cited answer may be handed to another generation step (a presentation
//! rewrite, an agent's final message). If that step drops the references
//! section or every inline marker, the cited answer is restored.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use regex::{Captures, Regex};
use serde::Serialize;

use geochain_core::{AppError, AppResult};
use geochain_llm::{LlmClient, LlmRequest};
use geochain_prompt::{build_prompt, load_prompt};

pub const REFERENCES_MARKER: &str = "**References**";

/// One inline citation: `<sup>[1][2]</sup>`, `<sup>[1, 2]</sup>` or a bare
/// `[1]` / `[1, 2]`. `lead` is the whitespace before the marker, `sup` or
/// `bare` the bracketed numbers.
pub(crate) static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?P<lead>[ \t]*)(?:<sup>\s*(?P<sup>(?:\[\s*\d+(?:\s*[,;]\s*\d+)*\s*\]\s*)+)</sup>|(?P<bare>(?:\[\s*\d+(?:\s*[,;]\s*\d+)*\s*\])+))",
    )
    .expect("citation marker regex is valid")
});

static MARKER_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("number regex is valid"));

pub fn has_references(text: &str) -> bool {
    text.contains(REFERENCES_MARKER)
}

/// Bracketed numbers of a marker match, whichever form it took.
pub(crate) fn marker_numbers(caps: &Captures) -> Vec<usize> {
    let inner = caps
        .name("sup")
        .or_else(|| caps.name("bare"))
        .map_or("", |m| m.as_str());
    MARKER_NUMBER_RE
        .find_iter(inner)
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

/// Every citation number in inline markers, in order of appearance.
pub fn citation_markers(text: &str) -> Vec<usize> {
    MARKER_RE
        .captures_iter(text)
        .flat_map(|caps| marker_numbers(&caps))
        .collect()
}

pub fn has_citation_markers(text: &str) -> bool {
    MARKER_RE.is_match(text)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationOutcome {
    /// The final text kept its citations
    Preserved,
    /// The final text lost the references section
    RecoveredReferences,
    /// The final text lost every inline marker
    RecoveredCitations,
    /// The transform failed or returned nothing
    RecoveredFromError,
}

impl VerificationOutcome {
    pub fn recovered(&self) -> bool {
        !matches!(self, Self::Preserved)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub text: String,
    pub outcome: VerificationOutcome,
}

/// Compare the cited `observation` with the `final_text` produced from it.
pub fn verify(observation: &str, final_text: String) -> Verification {
    let outcome = if has_references(observation) && !has_references(&final_text) {
        VerificationOutcome::RecoveredReferences
    } else if has_citation_markers(observation) && !has_citation_markers(&final_text) {
        VerificationOutcome::RecoveredCitations
    } else {
        VerificationOutcome::Preserved
    };

    if outcome.recovered() {
        tracing::warn!(?outcome, "Final answer lost citations; restoring cited answer");
        Verification {
            text: observation.to_string(),
            outcome,
        }
    } else {
        Verification {
            text: final_text,
            outcome,
        }
    }
}

/// A step allowed to reformat a cited answer.
#[async_trait::async_trait]
pub trait AnswerTransform: Send + Sync {
    fn name(&self) -> &str;

    async fn transform(&self, text: &str) -> AppResult<String>;
}

/// Run `transform` over `observation` and verify its output.
///
/// Errors and blank output fall back to `observation`.
pub async fn guarded_transform(transform: &dyn AnswerTransform, observation: &str) -> Verification {
    match transform.transform(observation).await {
        Ok(text) if !text.trim().is_empty() => verify(observation, text),
        Ok(_) => {
            tracing::warn!(transform = transform.name(), "Transform returned empty text");
            Verification {
                text: observation.to_string(),
                outcome: VerificationOutcome::RecoveredFromError,
            }
        }
        Err(e) => {
            tracing::warn!(transform = transform.name(), error = %e, "Transform failed");
            Verification {
                text: observation.to_string(),
                outcome: VerificationOutcome::RecoveredFromError,
            }
        }
    }
}

/// Presentation rewrite through the LLM using the `answer.rewrite` prompt.
pub struct LlmRewriter {
    llm: Arc<dyn LlmClient>,
    model: String,
    workspace: PathBuf,
    temperature: f32,
    max_tokens: u32,
}

impl LlmRewriter {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        model: impl Into<String>,
        workspace: impl Into<PathBuf>,
    ) -> Self {
        Self {
            llm,
            model: model.into(),
            workspace: workspace.into(),
            temperature: 0.3,
            max_tokens: 2000,
        }
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait::async_trait]
impl AnswerTransform for LlmRewriter {
    fn name(&self) -> &str {
        "llm-rewrite"
    }

    async fn transform(&self, text: &str) -> AppResult<String> {
        let definition = load_prompt(&self.workspace, "answer.rewrite")?;
        let mut variables = HashMap::new();
        variables.insert("answer".to_string(), text.to_string());
        let built = build_prompt(&definition, variables)?;

        let mut request = LlmRequest::new(built.user, &self.model)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        if let Some(system) = built.system {
            request = request.with_system(system);
        }

        let response = self.llm.complete(&request).await?;
        if response.is_blank() {
            return Err(AppError::Generation("Rewrite returned no text".to_string()));
        }
        Ok(response.content)
    }
}
