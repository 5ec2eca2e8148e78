//! # Configuration
//!
//! Every tunable of the terrain system in one serde-backed struct. Missing
//! fields fall back to the built-in defaults, so a config file only needs the
//! values it changes.
//!
//! ```json
//! {
//!   "near": { "cell_size": 64.0, "resolution": 48, "view_radius": 4 },
//!   "heightfield": { "ridge_height": 40.0 },
//!   "worker_threads": 8
//! }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::rendering::shading::TerrainShading;
use super::terrain::grid_index::{Exclusion, TierParams};
use super::terrain::heightfield::HeightfieldParams;
use super::terrain::spawn::SpawnParams;
use super::terrain::vegetation::VegetationParams;

/// Largest accepted view radius, in cells, for any tier.
pub const MAX_VIEW_RADIUS: u32 = 64;

/// Largest accepted quads-per-edge for a terrain tier.
pub const MAX_RESOLUTION: u32 = 512;

/// Errors raised while loading or validating a [`TerrainConfig`].
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "cannot read config {}: {}", path.display(), source)
            }
            ConfigError::Parse(error) => write!(f, "malformed config: {error}"),
            ConfigError::Invalid(reason) => write!(f, "invalid config: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse(error) => Some(error),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(error: serde_json::Error) -> Self {
        ConfigError::Parse(error)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    pub heightfield: HeightfieldParams,
    pub near: TierParams,
    pub far: TierParams,
    /// Radial far-tier exclusion. When unset the far tier drops exactly the
    /// cells that lie inside the near tier's live square.
    pub far_cutoff_override: Option<f64>,
    pub vegetation: VegetationParams,
    pub spawn: SpawnParams,
    pub shading: TerrainShading,
    /// Chunk build threads. `0` builds on the calling thread.
    pub worker_threads: usize,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            heightfield: HeightfieldParams::default(),
            near: TierParams::near(),
            far: TierParams::far(),
            far_cutoff_override: None,
            vegetation: VegetationParams::default(),
            spawn: SpawnParams::default(),
            shading: TerrainShading::default(),
            worker_threads: 4,
        }
    }
}

impl TerrainConfig {
    /// Parses and validates a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: TerrainConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&json)?;
        log::info!("Loaded terrain config from {}", path.display());
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Which far cells are left to the near tier.
    pub fn far_exclusion(&self) -> Exclusion {
        match self.far_cutoff_override {
            Some(radius) => Exclusion::Radius(radius),
            None => Exclusion::covered_by(&self.near),
        }
    }

    /// Rejects values that would make streaming degenerate.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| Err(ConfigError::Invalid(reason));

        for (name, tier) in [("near", &self.near), ("far", &self.far)] {
            if !(tier.cell_size.is_finite() && tier.cell_size > 0.0) {
                return invalid(format!("{name}.cell_size must be positive, got {}", tier.cell_size));
            }
            if tier.resolution == 0 {
                return invalid(format!("{name}.resolution must be at least 1"));
            }
            if tier.resolution > MAX_RESOLUTION {
                return invalid(format!(
                    "{name}.resolution must be at most {MAX_RESOLUTION}, got {}",
                    tier.resolution
                ));
            }
        }

        for (name, radius) in [
            ("near.view_radius", self.near.view_radius),
            ("far.view_radius", self.far.view_radius),
            ("vegetation.view_radius", self.vegetation.view_radius),
        ] {
            if radius > MAX_VIEW_RADIUS {
                return invalid(format!("{name} must be at most {MAX_VIEW_RADIUS}, got {radius}"));
            }
        }

        if !(self.vegetation.cell_size.is_finite() && self.vegetation.cell_size > 0.0) {
            return invalid(format!(
                "vegetation.cell_size must be positive, got {}",
                self.vegetation.cell_size
            ));
        }

        for (name, octaves) in self.heightfield.octave_counts() {
            if octaves == 0 {
                return invalid(format!("heightfield.{name} must be at least 1"));
            }
        }

        if let Some(radius) = self.far_cutoff_override {
            if !(radius.is_finite() && radius >= 0.0) {
                return invalid(format!("far_cutoff_override must be non-negative, got {radius}"));
            }
        }

        if self.spawn.min_radius > self.spawn.max_radius {
            return invalid("spawn.min_radius exceeds spawn.max_radius".to_string());
        }

        Ok(())
    }
}
