//! Country bounding boxes.

use geochain_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Geographic bounding box in degrees (WGS84 longitude/latitude).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl Bounds {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> AppResult<Self> {
        let bounds = Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        };
        bounds.validate()?;
        Ok(bounds)
    }

    fn validate(&self) -> AppResult<()> {
        let finite = [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.min_lon > self.max_lon || self.min_lat > self.max_lat {
            return Err(AppError::Raster(format!("Invalid bounds: {:?}", self)));
        }
        Ok(())
    }
}

/// Accepts `[min_lon, min_lat, max_lon, max_lat]` or the named form.
#[derive(Deserialize)]
#[serde(untagged)]
enum BoundsRepr {
    Array([f64; 4]),
    Named(Bounds),
}

impl BoundsRepr {
    fn into_bounds(self) -> AppResult<Bounds> {
        match self {
            Self::Array([min_lon, min_lat, max_lon, max_lat]) => {
                Bounds::new(min_lon, min_lat, max_lon, max_lat)
            }
            Self::Named(bounds) => {
                bounds.validate()?;
                Ok(bounds)
            }
        }
    }
}

/// Resolves a country name to its bounding box.
pub trait BoundsResolver: Send + Sync {
    fn resolve(&self, country: &str) -> Option<Bounds>;
}

/// Bounds lookup table keyed by lowercased country name.
#[derive(Debug, Clone, Default)]
pub struct BoundsTable {
    entries: HashMap<String, Bounds>,
}

impl BoundsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, country: &str, bounds: Bounds) {
        self.entries.insert(normalize(country), bounds);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse a YAML mapping of country name to bounds.
    pub fn from_yaml_str(contents: &str) -> AppResult<Self> {
        let raw: HashMap<String, BoundsRepr> = serde_yaml::from_str(contents)
            .map_err(|e| AppError::Raster(format!("Failed to parse bounds table: {}", e)))?;
        Self::from_raw(raw)
    }

    /// Parse a JSON object of country name to bounds.
    pub fn from_json_str(contents: &str) -> AppResult<Self> {
        let raw: HashMap<String, BoundsRepr> = serde_json::from_str(contents)
            .map_err(|e| AppError::Raster(format!("Failed to parse bounds table: {}", e)))?;
        Self::from_raw(raw)
    }

    /// Load a table from disk; `.json` files are read as JSON, anything else as YAML.
    pub fn load(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Raster(format!("Failed to read bounds table {:?}: {}", path, e))
        })?;

        let table = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&contents)?,
            _ => Self::from_yaml_str(&contents)?,
        };

        tracing::debug!("Loaded {} country bounds from {:?}", table.len(), path);
        Ok(table)
    }

    fn from_raw(raw: HashMap<String, BoundsRepr>) -> AppResult<Self> {
        let mut table = Self::new();
        for (country, repr) in raw {
            let bounds = repr
                .into_bounds()
                .map_err(|e| AppError::Raster(format!("{}: {}", country, e)))?;
            table.insert(&country, bounds);
        }
        Ok(table)
    }
}

impl BoundsResolver for BoundsTable {
    fn resolve(&self, country: &str) -> Option<Bounds> {
        self.entries.get(&normalize(country)).copied()
    }
}

fn normalize(country: &str) -> String {
    country.trim().to_lowercase()
}
