//! Command handlers for the GeoChain CLI.
//!
//! Each subcommand lives in its own module; the helpers below wire
//! configuration into the corpus, the engine and the raster analyzer.

pub mod ask;
pub mod hotspots;
pub mod pmesii;
pub mod prompts;

pub use ask::AskCommand;
pub use hotspots::HotspotsCommand;
pub use pmesii::PmesiiCommand;
pub use prompts::PromptsCommand;

use geochain_core::{AppConfig, AppError, AppResult, HotspotSettings};
use geochain_geo::{read_ascii_grid, BoundsTable, HotspotAnalyzer};
use geochain_llm::client_from_config;
use geochain_retrieval::{InMemoryIndex, QueryEngine};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Corpus path from the flag or `retrieval.corpusFile`, resolved against
/// the workspace.
pub(crate) fn corpus_path(config: &AppConfig, flag: Option<&Path>) -> AppResult<PathBuf> {
    let path = flag
        .map(Path::to_path_buf)
        .or_else(|| config.retrieval.corpus_file.clone())
        .ok_or_else(|| {
            AppError::Config(
                "No corpus given: pass --corpus or set retrieval.corpusFile".to_string(),
            )
        })?;
    Ok(config.resolve_path(&path))
}

/// Build the query engine over the JSONL corpus with the configured LLM.
pub(crate) fn build_engine(
    config: &AppConfig,
    corpus: Option<&Path>,
    rewrite_final: bool,
) -> AppResult<QueryEngine> {
    config.validate()?;

    let index = Arc::new(InMemoryIndex::load_jsonl(&corpus_path(config, corpus)?)?);
    let llm = client_from_config(config)?;
    tracing::debug!("Using LLM provider: {}", llm.provider_name());

    let mut settings = config.retrieval.clone();
    settings.rewrite_final = settings.rewrite_final && rewrite_final;

    let mut engine = QueryEngine::new(
        index,
        llm,
        config.model.clone(),
        config.workspace.clone(),
        settings,
    )?;

    if config.hotspots.raster_file.is_some() && config.hotspots.bounds_file.is_some() {
        match hotspot_analyzer(config, &config.hotspots, None, None) {
            Ok(analyzer) => engine = engine.with_hotspot_analyzer(Arc::new(analyzer)),
            Err(e) => tracing::warn!("Hotspot analysis unavailable: {}", e),
        }
    }

    Ok(engine)
}

/// Load the raster and bounds table named by the flags or `settings`.
pub(crate) fn hotspot_analyzer(
    config: &AppConfig,
    settings: &HotspotSettings,
    raster: Option<&Path>,
    bounds: Option<&Path>,
) -> AppResult<HotspotAnalyzer> {
    let raster_path = raster
        .map(Path::to_path_buf)
        .or_else(|| settings.raster_file.clone())
        .ok_or_else(|| {
            AppError::Config("No raster given: pass --raster or set hotspots.rasterFile".to_string())
        })?;
    let bounds_path = bounds
        .map(Path::to_path_buf)
        .or_else(|| settings.bounds_file.clone())
        .ok_or_else(|| {
            AppError::Config("No bounds table given: pass --bounds or set hotspots.boundsFile".to_string())
        })?;

    let raster = read_ascii_grid(&config.resolve_path(&raster_path))?;
    let table = BoundsTable::load(&config.resolve_path(&bounds_path))?;
    tracing::debug!(
        "Loaded {}x{} raster and {} country bounds",
        raster.width(),
        raster.height(),
        table.len()
    );

    HotspotAnalyzer::new(Arc::new(raster), Arc::new(table), settings)
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}
