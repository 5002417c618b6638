//! LLM provider factory.
//!
//! Resolves a provider name (plus optional endpoint and key) into a shared
//! `LlmClient` trait object.

use std::sync::Arc;
use std::time::Duration;

use crate::client::LlmClient;
use crate::providers::ollama::DEFAULT_OLLAMA_URL;
use crate::providers::{OllamaClient, OpenAiCompatClient};
use crate::types::ProviderType;
use geochain_core::config::ProviderConfig;
use geochain_core::{AppConfig, AppError, AppResult};

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama", "openrouter", "openai")
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - Optional API key (required by hosted providers)
///
/// # Errors
/// Returns error if the provider is unknown or a required key is missing.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
) -> Result<Arc<dyn LlmClient>, String> {
    let provider_type =
        ProviderType::parse(provider).ok_or_else(|| format!("Unknown provider: {}", provider))?;

    match provider_type {
        ProviderType::Ollama => Ok(Arc::new(OllamaClient::with_base_url(
            endpoint.unwrap_or(DEFAULT_OLLAMA_URL),
        ))),
        ProviderType::OpenRouter | ProviderType::OpenAI => {
            let key = api_key.ok_or_else(|| {
                format!("{} provider requires API key", provider_type.as_str())
            })?;
            let client = match (provider_type, endpoint) {
                (_, Some(url)) => OpenAiCompatClient::with_base_url(provider_type.as_str(), url, key),
                (ProviderType::OpenAI, None) => OpenAiCompatClient::openai(key),
                _ => OpenAiCompatClient::openrouter(key),
            };
            Ok(Arc::new(client))
        }
    }
}

/// Build the active provider's client from application configuration,
/// applying per-provider timeout and attribution settings.
pub fn client_from_config(config: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    let provider = config.provider.to_lowercase();
    let endpoint = config.provider_endpoint(&provider);
    let api_key = config.resolve_api_key(&provider);

    match config.get_provider_config(&provider) {
        Some(ProviderConfig::Ollama {
            endpoint,
            timeout: Some(secs),
            ..
        }) => {
            let client = OllamaClient::with_timeout(endpoint.as_str(), Duration::from_secs(*secs))?;
            Ok(Arc::new(client))
        }
        Some(ProviderConfig::OpenRouter {
            app_name, site_url, ..
        }) => {
            let key = api_key.ok_or_else(|| {
                AppError::Config(format!("Provider '{}' requires an API key", provider))
            })?;
            let base = endpoint.unwrap_or_else(|| {
                if provider == "openai" {
                    crate::providers::openai_compat::OPENAI_URL.to_string()
                } else {
                    crate::providers::openai_compat::OPENROUTER_URL.to_string()
                }
            });
            let client = OpenAiCompatClient::with_base_url(provider.as_str(), base, key)
                .with_attribution(app_name.clone(), site_url.clone());
            Ok(Arc::new(client))
        }
        _ => create_client(&provider, endpoint.as_deref(), api_key.as_deref())
            .map_err(AppError::Llm),
    }
}
