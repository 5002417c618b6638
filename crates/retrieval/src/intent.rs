//! Question intent classification and country extraction.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

const HOTSPOT_KEYWORDS: [&str; 4] = [
    "hotspot",
    "infrastructure density",
    "cisi",
    "critical infrastructure",
];
const MAP_KEYWORDS: [&str; 5] = ["map", "plot", "visualize", "show me", "display"];
const LOCATION_KEYWORDS: [&str; 5] = ["ethnic", "groups", "territories", "epr", "geoepr"];
const DECISION_KEYWORDS: [&str; 6] = [
    "how to",
    "strategy",
    "should we",
    "recommend",
    "policy options",
    "stabilize",
];

static COUNTRY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\b(?:in|of|for)\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)?)",
        r"\b([A-Z][a-z]+(?:\s+[A-Z][a-z]+)?)\s+ethnic",
        r"\b([A-Z][a-z]+(?:\s+[A-Z][a-z]+)?)[\s?.!]*$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("country pattern is valid"))
    .collect()
});

/// What the user is asking for; each variant has one handler in the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    Factual,
    Map { country: Option<String> },
    Hotspots { country: Option<String> },
    DecisionSupport,
    Pmesii { country: Option<String> },
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Factual => "factual",
            Self::Map { .. } => "map",
            Self::Hotspots { .. } => "hotspots",
            Self::DecisionSupport => "decision_support",
            Self::Pmesii { .. } => "pmesii",
        }
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Classify `question`. An explicit `country_hint` wins over extraction.
pub fn classify(question: &str, country_hint: Option<&str>) -> Intent {
    let lower = question.to_lowercase();
    let country = || {
        country_hint
            .map(str::to_string)
            .or_else(|| extract_country(question))
    };

    let intent = if contains_any(&lower, &HOTSPOT_KEYWORDS) {
        Intent::Hotspots { country: country() }
    } else if lower.contains("pmesii") {
        Intent::Pmesii { country: country() }
    } else if contains_any(&lower, &MAP_KEYWORDS) && contains_any(&lower, &LOCATION_KEYWORDS) {
        Intent::Map { country: country() }
    } else if contains_any(&lower, &DECISION_KEYWORDS) {
        Intent::DecisionSupport
    } else {
        Intent::Factual
    };

    tracing::debug!(intent = intent.name(), "Classified question");
    intent
}

/// Best-effort country name from capitalized words in `question`.
pub fn extract_country(question: &str) -> Option<String> {
    COUNTRY_PATTERNS.iter().find_map(|re| {
        re.captures(question)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    })
}
