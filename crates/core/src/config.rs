//! Configuration management for GeoChain.
//!
//! Configuration is layered, later sources winning:
//! - Built-in defaults
//! - The workspace config file (`.geochain/config.yaml`, or `GEOCHAIN_CONFIG`)
//! - Environment variables
//! - Command-line flags (applied by the CLI through [`AppConfig::with_overrides`])

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Providers the LLM factory knows how to build.
pub const KNOWN_PROVIDERS: [&str; 3] = ["ollama", "openrouter", "openai"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .geochain/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Active completion provider ("ollama", "openrouter", "openai")
    pub provider: String,

    /// Default model identifier
    pub model: String,

    /// API key for the LLM provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit logs as JSON lines
    pub log_json: bool,

    /// LLM provider configurations
    pub llm: Option<LlmConfig>,

    /// Retrieval, balancing and answering knobs
    pub retrieval: RetrievalSettings,

    /// Raster hotspot analysis knobs
    pub hotspots: HotspotSettings,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    /// Any OpenAI-compatible chat-completions endpoint (OpenRouter by default).
    OpenRouter {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        endpoint: Option<String>,
        #[serde(rename = "appName")]
        app_name: Option<String>,
        #[serde(rename = "siteUrl")]
        site_url: Option<String>,
    },
    Ollama {
        endpoint: String,
        model: String,
        timeout: Option<u64>,
    },
}

impl ProviderConfig {
    /// Model configured for this provider.
    pub fn model(&self) -> &str {
        match self {
            Self::OpenRouter { model, .. } => model,
            Self::Ollama { model, .. } => model,
        }
    }

    /// Endpoint override, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::OpenRouter { endpoint, .. } => endpoint.as_deref(),
            Self::Ollama { endpoint, .. } => Some(endpoint.as_str()),
        }
    }
}

/// One breakpoint of the per-source cap policy.
///
/// Applies when the number of distinct sources in the pool is strictly
/// greater than `more_than`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapTier {
    pub more_than: usize,
    pub cap: usize,
}

/// Maximum documents taken from one source, scaled by how many distinct
/// sources the candidate pool contains: many sources means a tight cap
/// (breadth), few sources means a loose one (depth).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceCapPolicy {
    /// Checked in order; the first matching tier wins.
    pub tiers: Vec<CapTier>,

    /// Cap used when no tier matches.
    pub fallback_cap: usize,
}

impl Default for SourceCapPolicy {
    fn default() -> Self {
        Self {
            tiers: vec![
                CapTier {
                    more_than: 4,
                    cap: 2,
                },
                CapTier {
                    more_than: 2,
                    cap: 4,
                },
            ],
            fallback_cap: 8,
        }
    }
}

impl SourceCapPolicy {
    /// Cap for a pool containing `distinct_sources` source keys.
    pub fn cap_for(&self, distinct_sources: usize) -> usize {
        self.tiers
            .iter()
            .find(|tier| distinct_sources > tier.more_than)
            .map(|tier| tier.cap)
            .unwrap_or(self.fallback_cap)
    }

    fn validate(&self) -> AppResult<()> {
        if self.fallback_cap == 0 || self.tiers.iter().any(|t| t.cap == 0) {
            return Err(AppError::Config(
                "sourceCaps: every cap must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Maximal-marginal-relevance retrieval parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiversitySettings {
    /// Candidates fetched before re-ranking
    pub fetch_k: usize,

    /// 1.0 = pure relevance, 0.0 = pure diversity
    pub lambda: f32,
}

impl Default for DiversitySettings {
    fn default() -> Self {
        Self {
            fetch_k: 80,
            lambda: 0.3,
        }
    }
}

/// Retrieval, balancing and answering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrievalSettings {
    /// JSONL corpus loaded by the in-memory index
    pub corpus_file: Option<PathBuf>,

    /// Documents fetched per query variant
    pub per_variant_k: usize,

    /// Maximum size of the aggregated candidate pool
    pub pool_budget: usize,

    /// Maximum documents handed to the answerer
    pub working_set_size: usize,

    /// Characters of content hashed for deduplication
    pub fingerprint_chars: usize,

    /// Maximum query variants including the original question
    pub max_variants: usize,

    /// Characters of each passage shown to the model
    pub context_chars: usize,

    /// Use MMR retrieval instead of plain similarity
    pub diversity: Option<DiversitySettings>,

    /// Per-source cap; `None` disables capping
    pub source_caps: Option<SourceCapPolicy>,

    /// Run the final presentation rewrite (guarded by citation verification)
    pub rewrite_final: bool,

    /// Confidence reported when the index supplies no scores
    pub default_confidence: f32,

    /// Sampling temperature for answer generation
    pub temperature: f32,

    /// Token limit for answer generation
    pub max_tokens: u32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            corpus_file: None,
            per_variant_k: 15,
            pool_budget: 60,
            working_set_size: 15,
            fingerprint_chars: 200,
            max_variants: 3,
            context_chars: 800,
            diversity: None,
            source_caps: Some(SourceCapPolicy::default()),
            rewrite_final: true,
            default_confidence: 0.8,
            temperature: 0.3,
            max_tokens: 1500,
        }
    }
}

impl RetrievalSettings {
    /// Reject settings that would make the pipeline meaningless.
    pub fn validate(&self) -> AppResult<()> {
        let positive = [
            ("perVariantK", self.per_variant_k),
            ("poolBudget", self.pool_budget),
            ("workingSetSize", self.working_set_size),
            ("fingerprintChars", self.fingerprint_chars),
            ("maxVariants", self.max_variants),
            ("contextChars", self.context_chars),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(AppError::Config(format!(
                    "retrieval.{} must be greater than zero",
                    name
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.default_confidence) {
            return Err(AppError::Config(format!(
                "retrieval.defaultConfidence must be within 0..=1, got {}",
                self.default_confidence
            )));
        }
        if let Some(diversity) = &self.diversity {
            if !(0.0..=1.0).contains(&diversity.lambda) {
                return Err(AppError::Config(format!(
                    "retrieval.diversity.lambda must be within 0..=1, got {}",
                    diversity.lambda
                )));
            }
        }
        if let Some(caps) = &self.source_caps {
            caps.validate()?;
        }
        Ok(())
    }
}

/// Raster hotspot analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HotspotSettings {
    /// ESRI ASCII grid holding the intensity raster
    pub raster_file: Option<PathBuf>,

    /// YAML/JSON table of country bounding boxes
    pub bounds_file: Option<PathBuf>,

    /// Percentile of valid cells used as the hotspot threshold
    pub threshold_percentile: f64,

    /// Smallest cluster (in pixels) reported as a hotspot
    pub min_cluster_size: usize,

    /// Pixel neighbourhood: 4 or 8
    pub connectivity: u8,

    /// Hotspots kept in a country report
    pub max_hotspots: usize,
}

impl Default for HotspotSettings {
    fn default() -> Self {
        Self {
            raster_file: None,
            bounds_file: None,
            threshold_percentile: 90.0,
            min_cluster_size: 5,
            connectivity: 4,
            max_hotspots: 10,
        }
    }
}

impl HotspotSettings {
    pub fn validate(&self) -> AppResult<()> {
        if !(0.0..=100.0).contains(&self.threshold_percentile) {
            return Err(AppError::Config(format!(
                "hotspots.thresholdPercentile must be within 0..=100, got {}",
                self.threshold_percentile
            )));
        }
        if self.connectivity != 4 && self.connectivity != 8 {
            return Err(AppError::Config(format!(
                "hotspots.connectivity must be 4 or 8, got {}",
                self.connectivity
            )));
        }
        Ok(())
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    retrieval: Option<RetrievalSettings>,
    hotspots: Option<HotspotSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            log_json: false,
            llm: None,
            retrieval: RetrievalSettings::default(),
            hotspots: HotspotSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the workspace config file and the
    /// environment.
    ///
    /// Environment variables:
    /// - `GEOCHAIN_WORKSPACE`: Override workspace path
    /// - `GEOCHAIN_CONFIG`: Path to config file
    /// - `GEOCHAIN_PROVIDER`: LLM provider
    /// - `GEOCHAIN_MODEL`: Model identifier
    /// - `GEOCHAIN_API_KEY`: API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("GEOCHAIN_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("GEOCHAIN_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.geochain_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        if let Ok(provider) = std::env::var("GEOCHAIN_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("GEOCHAIN_MODEL") {
            config.model = model;
        }

        if let Ok(key) = std::env::var("GEOCHAIN_API_KEY") {
            config.api_key = Some(key);
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var_os("NO_COLOR").is_some() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into a copy of this config.
    pub fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(json) = logging.json {
                result.log_json = json;
            }
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();
            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model().to_string();
            }
            result.llm = Some(llm);
        }

        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }

        if let Some(hotspots) = config_file.hotspots {
            result.hotspots = hotspots;
        }

        tracing::debug!("Merged configuration from {:?}", path);
        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .geochain directory.
    pub fn geochain_dir(&self) -> PathBuf {
        self.workspace.join(".geochain")
    }

    /// Ensure the .geochain directory exists.
    pub fn ensure_geochain_dir(&self) -> AppResult<()> {
        let dir = self.geochain_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
            tracing::debug!("Created .geochain directory: {:?}", dir);
        }
        Ok(())
    }

    /// Resolve a possibly relative path against the workspace.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }

    /// Get the configuration block for a provider.
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.llm.as_ref().and_then(|llm| llm.providers.get(provider))
    }

    /// Endpoint configured for a provider, if any.
    pub fn provider_endpoint(&self, provider: &str) -> Option<String> {
        self.get_provider_config(provider)
            .and_then(|pc| pc.endpoint().map(str::to_string))
    }

    /// Resolve the API key: `GEOCHAIN_API_KEY` first, then the provider's
    /// configured environment variable.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        match self.get_provider_config(provider) {
            Some(ProviderConfig::OpenRouter { api_key_env, .. }) => std::env::var(api_key_env).ok(),
            _ => None,
        }
    }

    /// Validate configuration for the active provider and tuning sections.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.provider.to_lowercase();

        if !KNOWN_PROVIDERS.contains(&provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if provider != "ollama" && self.resolve_api_key(&provider).is_none() {
            return Err(AppError::Config(format!(
                "Provider '{}' requires an API key (GEOCHAIN_API_KEY or apiKeyEnv)",
                self.provider
            )));
        }

        self.retrieval.validate()?;
        self.hotspots.validate()?;

        Ok(())
    }
}
