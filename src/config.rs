//! Application configuration
//!
//! All settings have defaults and can be loaded from (or saved to) a JSON
//! file. Command-line flags are applied on top of the loaded values.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dataset::AugmentationConfig;
use crate::training::TrainingConfig;
use crate::utils::error::{FishError, Result};
use crate::{CLASS_INDEX_FILE_NAME, MODEL_FILE_NAME};

/// Filesystem locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Dataset root: one subdirectory of images per species
    pub dataset_dir: PathBuf,
    /// Species description files (`<name>.txt`)
    pub info_dir: PathBuf,
    /// Directory receiving the model artifact and the class index
    pub output_dir: PathBuf,
    /// Cache for the downloaded ImageNet backbone weights
    pub weights_cache_dir: PathBuf,
    /// Local backbone checkpoint; skips the download when set
    pub weights_file: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            dataset_dir: PathBuf::from("data/BD_Freshwater_Fish"),
            info_dir: PathBuf::from("data/Fish_information"),
            output_dir: PathBuf::from("."),
            weights_cache_dir: PathBuf::from("models/pretrained"),
            weights_file: None,
        }
    }
}

impl PathsConfig {
    pub fn model_path(&self) -> PathBuf {
        self.output_dir.join(MODEL_FILE_NAME)
    }

    pub fn class_index_path(&self) -> PathBuf {
        self.output_dir.join(CLASS_INDEX_FILE_NAME)
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FishConfig {
    pub paths: PathsConfig,
    pub training: TrainingConfig,
    pub augmentation: AugmentationConfig,
}

impl FishConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            FishError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: FishConfig = serde_json::from_str(&json)?;
        config.validate()?;
        debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load from `path` when given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.training.validate().map_err(FishError::Config)?;
        self.augmentation.validate().map_err(FishError::Config)?;
        Ok(())
    }
}
