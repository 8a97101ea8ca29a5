//! Model artifact persistence
//!
//! The classifier configuration (as JSON) and every weight are stored in one
//! named MessagePack record, so a model can be rebuilt without the training
//! code path.

use std::path::Path;

use burn::{
    module::Module,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Record, Recorder},
    tensor::backend::Backend,
};
use tracing::info;

use super::classifier::{FishClassifier, FishClassifierConfig, FishClassifierRecord};
use crate::utils::error::{FishError, Result};

/// Everything needed to rebuild a trained classifier
#[derive(Record)]
pub struct ModelArtifactRecord<B: Backend> {
    /// `FishClassifierConfig` serialized as JSON
    pub config: String,
    pub model: FishClassifierRecord<B>,
}

fn recorder() -> NamedMpkFileRecorder<FullPrecisionSettings> {
    NamedMpkFileRecorder::<FullPrecisionSettings>::new()
}

/// Save a classifier and its configuration
///
/// The recorder always writes with an `.mpk` extension. An existing file at
/// the same path is replaced.
pub fn save_model<B: Backend>(
    model: &FishClassifier<B>,
    config: &FishClassifierConfig,
    path: &Path,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let record = ModelArtifactRecord {
        config: serde_json::to_string(config)?,
        model: model.clone().into_record(),
    };

    recorder()
        .record(record, path.to_path_buf())
        .map_err(|e| FishError::Model(format!("failed to save {}: {e}", path.display())))?;

    info!("Model saved to {:?}", path.with_extension("mpk"));
    Ok(())
}

/// Load a classifier saved by [`save_model`]
pub fn load_model<B: Backend>(
    path: &Path,
    device: &B::Device,
) -> Result<(FishClassifier<B>, FishClassifierConfig)> {
    let file = path.with_extension("mpk");
    if !file.is_file() {
        return Err(FishError::Model(format!(
            "model file {} not found",
            file.display()
        )));
    }

    let record: ModelArtifactRecord<B> = recorder()
        .load(path.to_path_buf(), device)
        .map_err(|e| FishError::Model(format!("failed to load {}: {e}", file.display())))?;

    let config: FishClassifierConfig = serde_json::from_str(&record.config)?;
    config.validate()?;

    let model = config.init::<B>(device).load_record(record.model);
    info!(
        "Loaded model from {:?} ({} classes, {}x{} input)",
        file, config.num_classes, config.image_size, config.image_size
    );

    Ok((model, config))
}
