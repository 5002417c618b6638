//! PMESII grouping of country indicators.
//!
//! Indicator names found in the corpus are sorted into the seven PMESII
//! domains by the LLM. Results are cached per country because the grouping
//! is slow and rarely changes between requests.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use serde::Serialize;

use crate::types::Document;
use geochain_core::{AppError, AppResult};
use geochain_llm::{LlmClient, LlmRequest};
use geochain_prompt::{build_prompt, load_prompt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum PmesiiDomain {
    Political,
    Military,
    Economic,
    Social,
    Infrastructure,
    Information,
    Geo,
}

impl PmesiiDomain {
    pub const ALL: [PmesiiDomain; 7] = [
        Self::Political,
        Self::Military,
        Self::Economic,
        Self::Social,
        Self::Infrastructure,
        Self::Information,
        Self::Geo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Political => "Political",
            Self::Military => "Military",
            Self::Economic => "Economic",
            Self::Social => "Social",
            Self::Infrastructure => "Infrastructure",
            Self::Information => "Information",
            Self::Geo => "Geo",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Political => "Political system, government, governance, parliament, elections, diplomacy, international relations, political stability",
            Self::Military => "Military forces, defense, security, armed conflicts, peacekeeping, military expenditure, arms",
            Self::Economic => "GDP, economy, trade, employment, unemployment, inflation, fiscal and monetary policy, industry, commerce, development assistance",
            Self::Social => "Population, demographics, health, education, human rights, gender equality, migration, refugees, crime, mortality, fertility, life expectancy",
            Self::Infrastructure => "Transportation, energy, utilities, telecommunications, water, sanitation, public works, facilities",
            Self::Information => "Media, communications, internet, information technology, digital access, connectivity",
            Self::Geo => "Geography, natural resources, environment, climate, land use, biodiversity, emissions, pollution, terrain, natural disasters",
        }
    }

    /// Case-insensitive domain name lookup.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for PmesiiDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type PmesiiGrouping = BTreeMap<PmesiiDomain, Vec<String>>;

/// Country grouping cache keyed by lowercased country name.
///
/// Entries are advisory; concurrent inserts for the same country keep the
/// last one written.
#[derive(Debug, Default)]
pub struct GroupingCache {
    entries: RwLock<HashMap<String, PmesiiGrouping>>,
}

impl GroupingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, country: &str) -> Option<PmesiiGrouping> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(&country.to_lowercase()).cloned()
    }

    pub fn insert(&self, country: &str, grouping: PmesiiGrouping) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(country.to_lowercase(), grouping);
    }

    /// Clear one country, or everything when `country` is `None`.
    pub fn clear(&self, country: Option<&str>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        match country {
            Some(c) => {
                entries.remove(&c.to_lowercase());
            }
            None => entries.clear(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Distinct `indicator` metadata values, sorted.
pub fn indicators_from(documents: &[Document]) -> Vec<String> {
    documents
        .iter()
        .filter_map(Document::indicator)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub struct PmesiiAnalyzer {
    llm: Arc<dyn LlmClient>,
    model: String,
    workspace: PathBuf,
    cache: Arc<GroupingCache>,
}

impl PmesiiAnalyzer {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        model: impl Into<String>,
        workspace: impl Into<PathBuf>,
        cache: Arc<GroupingCache>,
    ) -> Self {
        Self {
            llm,
            model: model.into(),
            workspace: workspace.into(),
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<GroupingCache> {
        &self.cache
    }

    /// Group `indicators` for `country`, consulting the cache first.
    pub async fn group(&self, country: &str, indicators: &[String]) -> AppResult<PmesiiGrouping> {
        if let Some(cached) = self.cache.get(country) {
            tracing::debug!(country, "PMESII grouping cache hit");
            return Ok(cached);
        }

        if indicators.is_empty() {
            return Err(AppError::Retrieval(format!(
                "No indicators found for {}",
                country
            )));
        }

        let domains = PmesiiDomain::ALL
            .iter()
            .map(|d| format!("- {}: {}", d, d.description()))
            .collect::<Vec<_>>()
            .join("\n");
        let indicator_list = indicators
            .iter()
            .map(|i| format!("- {}", i))
            .collect::<Vec<_>>()
            .join("\n");

        let definition = load_prompt(&self.workspace, "pmesii.group")?;
        let mut variables = HashMap::new();
        variables.insert("country".to_string(), country.to_string());
        variables.insert("domains".to_string(), domains);
        variables.insert("indicators".to_string(), indicator_list);
        let built = build_prompt(&definition, variables)?;

        let mut request = LlmRequest::new(built.user, &self.model)
            .with_temperature(0.3)
            .with_max_tokens(4000);
        if let Some(system) = built.system {
            request = request.with_system(system);
        }

        let response = self.llm.complete(&request).await?;
        let grouping = parse_grouping(&response.content, indicators)?;

        tracing::info!(
            country,
            domains = grouping.len(),
            indicators = indicators.len(),
            "Grouped indicators into PMESII domains"
        );
        self.cache.insert(country, grouping.clone());
        Ok(grouping)
    }
}

/// Parse the model's JSON object, tolerating Markdown code fences.
///
/// Unknown domains and indicators not in `known` are dropped. Keys naming
/// the same domain in different case are merged in key order; each domain
/// lists an indicator once.
pub fn parse_grouping(raw: &str, known: &[String]) -> AppResult<PmesiiGrouping> {
    let json = strip_code_fence(raw);
    let parsed: BTreeMap<String, Vec<String>> = serde_json::from_str(json).map_err(|e| {
        AppError::Generation(format!("PMESII grouping was not valid JSON: {}", e))
    })?;

    let known: BTreeSet<&str> = known.iter().map(String::as_str).collect();
    let mut grouping = PmesiiGrouping::new();
    for (name, indicators) in parsed {
        let Some(domain) = PmesiiDomain::parse(&name) else {
            tracing::debug!(domain = %name, "Dropping unknown PMESII domain");
            continue;
        };
        let entry = grouping.entry(domain).or_default();
        for indicator in indicators {
            if known.contains(indicator.as_str()) && !entry.contains(&indicator) {
                entry.push(indicator);
            }
        }
    }
    grouping.retain(|_, indicators| !indicators.is_empty());

    Ok(grouping)
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };

    let after = &trimmed[start + 3..];
    let after = after.strip_prefix("json").unwrap_or(after);
    match after.find("```") {
        Some(end) => after[..end].trim(),
        None => after.trim(),
    }
}

/// Markdown listing of a grouping in domain order.
pub fn grouping_markdown(country: &str, grouping: &PmesiiGrouping) -> String {
    let mut out = format!("# PMESII Analysis: {}\n", country);
    for domain in PmesiiDomain::ALL {
        let indicators = grouping.get(&domain).map(Vec::as_slice).unwrap_or(&[]);
        out.push_str(&format!("\n## {} ({} indicators)\n", domain, indicators.len()));
        for indicator in indicators {
            out.push_str(&format!("- {}\n", indicator));
        }
    }
    out
}
