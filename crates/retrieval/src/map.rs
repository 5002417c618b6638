//! Map rendering seam and the short introduction shown above a map.

use std::collections::HashMap;
use std::path::Path;

use geochain_core::{AppError, AppResult};
use geochain_llm::{LlmClient, LlmRequest};
use geochain_prompt::{build_prompt, load_prompt};

/// Prefix marking the opaque map payload appended to an answer.
pub const MAP_PREFIX: &str = "MAP:";

/// Produces map HTML for a country. The HTML is passed through verbatim.
#[async_trait::async_trait]
pub trait MapRenderer: Send + Sync {
    async fn render(&self, country: &str) -> AppResult<String>;
}

/// Two or three sentences introducing the map of `country`.
pub async fn introduction(
    llm: &dyn LlmClient,
    model: &str,
    workspace: &Path,
    question: &str,
    country: &str,
) -> AppResult<String> {
    let definition = load_prompt(workspace, "map.intro")?;
    let mut variables = HashMap::new();
    variables.insert("question".to_string(), question.to_string());
    variables.insert("country".to_string(), country.to_string());
    let built = build_prompt(&definition, variables)?;

    let mut request = LlmRequest::new(built.user, model)
        .with_temperature(0.3)
        .with_max_tokens(300);
    if let Some(system) = built.system {
        request = request.with_system(system);
    }

    let response = llm.complete(&request).await?;
    if response.is_blank() {
        return Err(AppError::Generation("Empty map introduction".to_string()));
    }
    Ok(response.content.trim().to_string())
}

/// Introduction followed by the `MAP:` payload.
pub fn with_map(intro: &str, html: &str) -> String {
    format!("{}\n\n{}{}", intro, MAP_PREFIX, html)
}
