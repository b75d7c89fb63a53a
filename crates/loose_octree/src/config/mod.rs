//! Configuration system
//!
//! Octree construction parameters, loadable from TOML or RON files.

pub use serde::{Serialize, Deserialize};

use crate::foundation::math::{utils, Vec3};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(ConfigError::Io)?;

        // Try different formats
        if path.ends_with(".toml") {
            Self::from_toml_str(&contents)
        } else if path.ends_with(".ron") {
            Self::from_ron_str(&contents)
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }

    /// Parse configuration from a TOML document
    fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Parse configuration from a RON document
    fn from_ron_str(contents: &str) -> Result<Self, ConfigError> {
        ron::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Smallest allowed looseness; 1.0 is a regular octree
pub const MIN_LOOSENESS: f32 = 1.0;

/// Largest allowed looseness
pub const MAX_LOOSENESS: f32 = 2.0;

/// Hard ceiling on `max_depth`
///
/// Node side length halves per level, so deeper trees only produce nodes
/// smaller than anything f32 coordinates can usefully separate.
pub const DEPTH_LIMIT: u32 = 21;

/// Configuration for octree behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OctreeConfig {
    /// Side length of the root node on creation
    pub initial_world_size: f32,

    /// Center of the root node on creation
    pub initial_world_center: Vec3,

    /// Multiplier applied to every node's base size, clamped to `[1, 2]`
    pub looseness: f32,

    /// Entries a leaf holds before it attempts to split
    pub capacity: usize,

    /// Maximum subdivision depth below the root
    pub max_depth: u32,

    /// Root growth attempts allowed for a single insert
    pub max_growth_attempts: u32,

    /// Expected number of entries, used to pre-size the pools
    pub capacity_hint: usize,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            initial_world_size: 100.0,
            initial_world_center: Vec3::zeros(),
            looseness: 1.25,
            capacity: 8,
            max_depth: 10,
            max_growth_attempts: 20,
            capacity_hint: 64,
        }
    }
}

impl Config for OctreeConfig {}

impl OctreeConfig {
    /// Return a copy with every out-of-range value corrected
    ///
    /// Corrections are silent for callers; each one is logged as a warning.
    #[must_use]
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();

        if !(MIN_LOOSENESS..=MAX_LOOSENESS).contains(&self.looseness) {
            let clamped = if self.looseness.is_nan() {
                defaults.looseness
            } else {
                self.looseness.clamp(MIN_LOOSENESS, MAX_LOOSENESS)
            };
            log::warn!(
                "Octree looseness must be between {MIN_LOOSENESS} and {MAX_LOOSENESS}. Was: {} Adjusted to: {clamped}",
                self.looseness
            );
            self.looseness = clamped;
        }

        if !self.initial_world_size.is_finite() || self.initial_world_size <= 0.0 {
            log::warn!(
                "Initial world size must be positive and finite. Was: {} Adjusted to: {}",
                self.initial_world_size, defaults.initial_world_size
            );
            self.initial_world_size = defaults.initial_world_size;
        }

        if !utils::is_finite(&self.initial_world_center) {
            log::warn!(
                "Initial world center must be finite. Was: {:?} Adjusted to the origin",
                self.initial_world_center
            );
            self.initial_world_center = Vec3::zeros();
        }

        if self.capacity == 0 {
            log::warn!("Node capacity must be at least 1. Adjusted to 1");
            self.capacity = 1;
        }

        if self.max_depth > DEPTH_LIMIT {
            log::warn!("Max depth {} exceeds the limit. Adjusted to {DEPTH_LIMIT}", self.max_depth);
            self.max_depth = DEPTH_LIMIT;
        }

        self
    }
}
