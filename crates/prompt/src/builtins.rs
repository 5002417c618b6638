//! Built-in prompt definitions.
//!
//! Variables available to each template are listed next to its entry.

use crate::types::{PromptDefinition, PromptOutputSpec};

const API_VERSION: &str = "1.0";

struct Builtin {
    id: &'static str,
    title: &'static str,
    system: Option<&'static str>,
    template: &'static str,
    format: &'static str,
}

const ANALYST_SYSTEM: &str = "You are a geopolitical analyst. Ground every statement in the \
provided context and say so plainly when the context does not contain the answer.";

const CITED_SYSTEM: &str = "You are a geopolitical analyst answering from numbered source passages.

CITATION RULES:
1. Every factual claim must carry an inline citation in the form <sup>[n]</sup>, where n is the passage number.
2. Place the citation immediately after the claim and before trailing punctuation.
3. When several passages support a claim, combine them: <sup>[1][3]</sup>.
4. Use information from several different sources where they are relevant.
5. Do NOT write a references, sources or bibliography section; it is added automatically.
6. If the passages do not answer the question, say so.";

const BUILTINS: &[Builtin] = &[
    // question, context
    Builtin {
        id: "answer.cited",
        title: "Cited multi-source answer",
        system: Some(CITED_SYSTEM),
        template: "Context passages:\n\n{{context}}\n\nQuestion: {{question}}\n\nAnswer with inline citations:",
        format: "markdown",
    },
    // answer
    Builtin {
        id: "answer.rewrite",
        title: "Presentation rewrite",
        system: Some("You improve the readability of analytical answers without changing their content."),
        template: "Rewrite the answer below for clarity. Keep every <sup>[n]</sup> citation marker exactly \
where it supports a claim and keep the References section unchanged.\n\n{{answer}}",
        format: "markdown",
    },
    // question, country
    Builtin {
        id: "map.intro",
        title: "Map introduction",
        system: Some(ANALYST_SYSTEM),
        template: "The user asked: {{question}}\n\nWrite a brief introduction (2-3 sentences) for a map \
of {{country}}. Describe what the map shows and note any key patterns a reader should look for.",
        format: "text",
    },
    // country, domains, indicators
    Builtin {
        id: "pmesii.group",
        title: "PMESII indicator grouping",
        system: None,
        template: "Group the following indicators available for {{country}} into PMESII domains.\n\n\
Domains:\n{{domains}}\n\nIndicators:\n{{indicators}}\n\n\
Respond with a single JSON object whose keys are domain names and whose values are arrays of \
indicator names taken verbatim from the list. Omit domains with no indicators.",
        format: "json",
    },
    // question, context
    Builtin {
        id: "decision.situation",
        title: "Situation assessment",
        system: Some(ANALYST_SYSTEM),
        template: "Question: {{question}}\n\nContext:\n{{context}}\n\n\
Assess the current situation: the key facts, recent developments and the most important indicators.",
        format: "markdown",
    },
    // question, context, situation
    Builtin {
        id: "decision.root_causes",
        title: "Root cause analysis",
        system: Some(ANALYST_SYSTEM),
        template: "Question: {{question}}\n\nSituation assessment:\n{{situation}}\n\nContext:\n{{context}}\n\n\
Identify the underlying root causes and distinguish structural drivers from proximate triggers.",
        format: "markdown",
    },
    // question, situation, root_causes
    Builtin {
        id: "decision.stakeholders",
        title: "Stakeholder mapping",
        system: Some(ANALYST_SYSTEM),
        template: "Question: {{question}}\n\nSituation:\n{{situation}}\n\nRoot causes:\n{{root_causes}}\n\n\
Map the key stakeholders, their interests, their influence and how they relate to each other.",
        format: "markdown",
    },
    // question, situation, root_causes, stakeholders
    Builtin {
        id: "decision.options",
        title: "Policy options",
        system: Some(ANALYST_SYSTEM),
        template: "Question: {{question}}\n\nSituation:\n{{situation}}\n\nRoot causes:\n{{root_causes}}\n\n\
Stakeholders:\n{{stakeholders}}\n\nGenerate three to five distinct policy options with their mechanisms \
and preconditions.",
        format: "markdown",
    },
    // question, options, stakeholders
    Builtin {
        id: "decision.impact",
        title: "Impact assessment",
        system: Some(ANALYST_SYSTEM),
        template: "Question: {{question}}\n\nOptions:\n{{options}}\n\nStakeholders:\n{{stakeholders}}\n\n\
For each option assess likely impacts, risks, costs and second-order effects.",
        format: "markdown",
    },
    // question, options, impact
    Builtin {
        id: "decision.recommendations",
        title: "Recommendations",
        system: Some(ANALYST_SYSTEM),
        template: "Question: {{question}}\n\nOptions:\n{{options}}\n\nImpact assessment:\n{{impact}}\n\n\
Recommend a course of action with sequencing, success indicators and fallback options.",
        format: "markdown",
    },
];

/// Look up a built-in prompt by id.
pub fn builtin_prompt(id: &str) -> Option<PromptDefinition> {
    BUILTINS.iter().find(|b| b.id == id).map(|b| PromptDefinition {
        id: b.id.to_string(),
        title: b.title.to_string(),
        api_version: API_VERSION.to_string(),
        system: b.system.map(str::to_string),
        template: b.template.to_string(),
        output: PromptOutputSpec {
            format: b.format.to_string(),
        },
    })
}

/// Ids of every built-in prompt, in definition order.
pub fn builtin_ids() -> Vec<&'static str> {
    BUILTINS.iter().map(|b| b.id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let def = builtin_prompt("answer.cited").unwrap();
        assert!(def.template.contains("{{context}}"));
        assert!(def.system.unwrap().contains("<sup>[n]</sup>"));
        assert!(builtin_prompt("missing").is_none());
    }

    #[test]
    fn test_decision_chain_present() {
        let ids = builtin_ids();
        for step in [
            "decision.situation",
            "decision.root_causes",
            "decision.stakeholders",
            "decision.options",
            "decision.impact",
            "decision.recommendations",
        ] {
            assert!(ids.contains(&step), "missing {}", step);
        }
    }

    #[test]
    fn test_ids_unique() {
        let mut ids = builtin_ids();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), BUILTINS.len());
    }
}
