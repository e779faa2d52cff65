//! JSON configuration for the embedding model, training and ONNX Runtime.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::classifier::preprocess::{MAX_IMAGE_DIMENSION, MODEL_INPUT_SIZE};

/// Embedding model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Path to the ONNX artifact; resolved through `ModelManager` when unset
    pub path: Option<PathBuf>,
    /// Expected SHA-256 of the artifact, checked before loading when set
    pub sha256: Option<String>,
    /// Square input resolution of the model
    pub input_size: u32,
    /// Uploads larger than this on either side are downscaled first
    pub max_dimension: u32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            path: None,
            sha256: None,
            input_size: MODEL_INPUT_SIZE,
            max_dimension: MAX_IMAGE_DIMENSION,
        }
    }
}

/// Classifier head training settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSettings {
    pub epochs: usize,
    pub batch_size: usize,
    pub shuffle_buffer: usize,
    pub hidden_units: usize,
    pub learning_rate: f64,
    pub seed: Option<u64>,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            epochs: 10,
            batch_size: 32,
            shuffle_buffer: 100,
            hidden_units: 128,
            learning_rate: 1e-3,
            seed: None,
        }
    }
}

/// ONNX Runtime threading; `0` lets the runtime decide
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    pub inter_threads: usize,
    pub intra_threads: usize,
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeachableConfig {
    pub model: ModelSettings,
    pub training: TrainingSettings,
    pub runtime: RuntimeSettings,
}

impl TeachableConfig {
    /// Reads a configuration file. Missing fields take their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Like [`TeachableConfig::load`], but falls back to defaults when the
    /// file is missing or invalid.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("Config file {} not found, using defaults", path.display());
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                warn!("{:#}. Using defaults", e);
                Self::default()
            }
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config {}", path.as_ref().display()))?;
        Ok(())
    }
}
