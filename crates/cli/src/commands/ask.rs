//! Ask command handler.
//!
//! Runs one question through the intent-dispatched query engine and prints
//! the cited answer.

use super::{build_engine, print_json};
use clap::Args;
use geochain_core::{AppConfig, AppError, AppResult};
use geochain_retrieval::QueryRequest;
use std::path::PathBuf;

/// Ask a question and get a cited answer
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: Option<String>,

    /// Read the question from a file
    #[arg(short, long, conflicts_with = "question")]
    pub file: Option<PathBuf>,

    /// Scope the question to a country
    #[arg(long)]
    pub country: Option<String>,

    /// JSONL corpus to search (overrides retrieval.corpusFile)
    #[arg(long)]
    pub corpus: Option<PathBuf>,

    /// Return the cited answer without the presentation rewrite
    #[arg(long)]
    pub no_rewrite: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let question = self.get_question()?;
        let engine = build_engine(config, self.corpus.as_deref(), !self.no_rewrite)?;

        let mut request = QueryRequest::new(question);
        if let Some(country) = &self.country {
            request = request.with_country(country.clone());
        }

        let response = engine.query(request).await;

        if self.json {
            print_json(&response)?;
        } else {
            println!("{}", response.answer);
            tracing::debug!(
                "Confidence {:.2} from {} sources",
                response.confidence,
                response.sources.len()
            );
        }

        Ok(())
    }

    fn get_question(&self) -> AppResult<String> {
        if let Some(question) = &self.question {
            return Ok(question.clone());
        }

        match &self.file {
            Some(path) => std::fs::read_to_string(path)
                .map(|s| s.trim().to_string())
                .map_err(|e| AppError::Config(format!("Failed to read question file {:?}: {}", path, e))),
            None => Err(AppError::Config("No question provided".to_string())),
        }
    }
}
