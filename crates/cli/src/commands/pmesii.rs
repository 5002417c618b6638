//! PMESII command handler.
//!
//! Groups the corpus indicators for a country into PMESII domains, or with
//! `--domain` produces a cited summary of one domain.

use super::{build_engine, print_json};
use clap::Args;
use geochain_core::{AppConfig, AppError, AppResult};
use geochain_retrieval::pmesii::grouping_markdown;
use geochain_retrieval::PmesiiDomain;
use std::path::PathBuf;

/// Group a country's indicators into PMESII domains
#[derive(Args, Debug)]
pub struct PmesiiCommand {
    /// Country to analyze
    pub country: String,

    /// Summarize one domain (Political, Military, Economic, Social,
    /// Infrastructure, Information, Geo)
    #[arg(long)]
    pub domain: Option<String>,

    /// JSONL corpus to search (overrides retrieval.corpusFile)
    #[arg(long)]
    pub corpus: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl PmesiiCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing pmesii command for {}", self.country);

        let domain = self
            .domain
            .as_deref()
            .map(|name| {
                PmesiiDomain::parse(name)
                    .ok_or_else(|| AppError::Config(format!("Unknown PMESII domain: {}", name)))
            })
            .transpose()?;

        let engine = build_engine(config, self.corpus.as_deref(), true)?;
        let grouping = engine.pmesii_grouping(&self.country).await?;

        let Some(domain) = domain else {
            if self.json {
                print_json(&grouping)?;
            } else {
                println!("{}", grouping_markdown(&self.country, &grouping));
            }
            return Ok(());
        };

        let indicators = grouping.get(&domain).cloned().unwrap_or_default();
        if indicators.is_empty() {
            return Err(AppError::Retrieval(format!(
                "No {} indicators found for {}",
                domain, self.country
            )));
        }

        let response = engine
            .domain_summary(&self.country, domain, &indicators)
            .await;
        if self.json {
            print_json(&response)?;
        } else {
            println!("{}", response.answer);
        }

        Ok(())
    }
}
