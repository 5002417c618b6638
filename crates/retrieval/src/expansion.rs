//! Query expansion across indicator families.
//!
//! A question that mentions one family ("political situation") is widened
//! with variants that swap in the other families ("ethnic situation",
//! "demographic situation") so retrieval reaches datasets the wording alone
//! would miss. Pure string work; no I/O.

use std::sync::LazyLock;

use regex::Regex;

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z]+").expect("word regex is valid"));

/// Coarse topical families of country indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorFamily {
    Political,
    Ethnic,
    Demographic,
    Economic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Form {
    Adjective,
    Noun,
}

impl IndicatorFamily {
    pub const ALL: [IndicatorFamily; 4] = [
        Self::Political,
        Self::Ethnic,
        Self::Demographic,
        Self::Economic,
    ];

    fn term(&self, form: Form) -> &'static str {
        match (self, form) {
            (Self::Political, Form::Adjective) => "political",
            (Self::Political, Form::Noun) => "politics",
            (Self::Ethnic, Form::Adjective) => "ethnic",
            (Self::Ethnic, Form::Noun) => "ethnicity",
            (Self::Demographic, Form::Adjective) => "demographic",
            (Self::Demographic, Form::Noun) => "demographics",
            (Self::Economic, Form::Adjective) => "economic",
            (Self::Economic, Form::Noun) => "economy",
        }
    }

    fn match_word(word: &str) -> Option<(Self, Form)> {
        let lower = word.to_lowercase();
        Self::ALL.iter().find_map(|family| {
            [Form::Adjective, Form::Noun]
                .into_iter()
                .find(|form| family.term(*form) == lower)
                .map(|form| (*family, form))
        })
    }
}

#[derive(Debug, Clone)]
pub struct QueryExpander {
    max_variants: usize,
}

impl Default for QueryExpander {
    fn default() -> Self {
        Self::new(3)
    }
}

impl QueryExpander {
    /// `max_variants` counts the original question; values below 1 are
    /// treated as 1.
    pub fn new(max_variants: usize) -> Self {
        Self {
            max_variants: max_variants.max(1),
        }
    }

    /// Ordered variants, the original question first.
    pub fn expand(&self, question: &str) -> Vec<String> {
        let mut variants = vec![question.to_string()];

        let mut anchor = None;
        let mut present = Vec::new();
        for m in WORD_RE.find_iter(question) {
            if let Some((family, form)) = IndicatorFamily::match_word(m.as_str()) {
                if anchor.is_none() {
                    anchor = Some((m, form));
                }
                if !present.contains(&family) {
                    present.push(family);
                }
            }
        }

        let Some((anchor, form)) = anchor else {
            return variants;
        };

        for family in IndicatorFamily::ALL {
            if variants.len() >= self.max_variants {
                break;
            }
            if present.contains(&family) {
                continue;
            }

            let replacement = match_case(anchor.as_str(), family.term(form));
            let variant = format!(
                "{}{}{}",
                &question[..anchor.start()],
                replacement,
                &question[anchor.end()..]
            );
            if !variants.contains(&variant) {
                variants.push(variant);
            }
        }

        tracing::debug!(?variants, "Expanded query");
        variants
    }
}

/// Capitalize `replacement` when `original` starts with an uppercase letter.
fn match_case(original: &str, replacement: &str) -> String {
    let upper = original.chars().next().is_some_and(char::is_uppercase);
    let mut chars = replacement.chars();
    match chars.next() {
        Some(first) if upper => first.to_uppercase().chain(chars).collect(),
        _ => replacement.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_political_question_expands() {
        let variants = QueryExpander::default().expand("What is the political situation in Mali?");
        assert_eq!(
            variants,
            vec![
                "What is the political situation in Mali?",
                "What is the ethnic situation in Mali?",
                "What is the demographic situation in Mali?",
            ]
        );
    }

    #[test]
    fn test_max_variants_includes_economic() {
        let variants = QueryExpander::new(4).expand("What is the political situation in Mali?");
        assert_eq!(variants.len(), 4);
        assert_eq!(variants[3], "What is the economic situation in Mali?");
    }

    #[test]
    fn test_noun_form_and_capital_preserved() {
        let variants = QueryExpander::default().expand("Economy of Niger");
        assert_eq!(variants, vec!["Economy of Niger", "Politics of Niger", "Ethnicity of Niger"]);
    }

    #[test]
    fn test_present_families_skipped() {
        let variants =
            QueryExpander::new(4).expand("Political and economic outlook for Burkina Faso");
        assert_eq!(
            variants,
            vec![
                "Political and economic outlook for Burkina Faso",
                "Ethnic and economic outlook for Burkina Faso",
                "Demographic and economic outlook for Burkina Faso",
            ]
        );
    }

    #[test]
    fn test_no_family_is_singleton() {
        assert_eq!(
            QueryExpander::default().expand("Population of Chad"),
            vec!["Population of Chad"]
        );
    }

    #[test]
    fn test_single_variant_cap() {
        assert_eq!(QueryExpander::new(0).expand("ethnic map").len(), 1);
    }

    #[test]
    fn test_deterministic() {
        let expander = QueryExpander::default();
        let q = "Describe demographic trends in Senegal";
        assert_eq!(expander.expand(q), expander.expand(q));
    }
}
