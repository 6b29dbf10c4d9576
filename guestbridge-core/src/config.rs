//! Host configuration.
//!
//! Every field has a default, so an empty JSON object (or no file at all) is a valid
//! configuration. The CLI overrides individual fields after loading.

use crate::abi::{Feature, FeatureSet};
use crate::layout::PointerWidth;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown feature `{0}` in enable_features")]
    UnknownFeature(String),

    #[error("viewport must be non-empty, got {width}x{height}")]
    EmptyViewport { width: u32, height: u32 },
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Guest address width: 32 or 64.
    pub pointer_width: PointerWidth,
    /// Default `env_logger` filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Frames to run before exiting.
    pub frames: u32,
    pub frame_delta_ms: f64,
    pub viewport: Viewport,
    /// Features the host allows. `None` allows everything the guest asks for.
    pub enable_features: Option<Vec<String>>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            pointer_width: PointerWidth::W32,
            log_level: "info".to_owned(),
            frames: 1,
            frame_delta_ms: 16.0,
            viewport: Viewport::default(),
            enable_features: None,
        }
    }
}

impl BridgeConfig {
    pub fn from_json(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: BridgeConfig =
            serde_json::from_str(text).map_err(|source| ConfigError::Parse {
                path: origin.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text, path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.allowed_features()?;
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(ConfigError::EmptyViewport {
                width: self.viewport.width,
                height: self.viewport.height,
            });
        }
        Ok(())
    }

    /// The feature whitelist as a set.
    pub fn allowed_features(&self) -> Result<FeatureSet, ConfigError> {
        let Some(names) = &self.enable_features else {
            return Ok(FeatureSet::all());
        };
        let mut set = FeatureSet::default();
        for name in names {
            let feature = Feature::from_name(name)
                .ok_or_else(|| ConfigError::UnknownFeature(name.clone()))?;
            set.insert(feature);
        }
        Ok(set)
    }
}
