//! Dataset module for the freshwater fish image collection
//!
//! This module provides:
//! - Scanning a `<root>/<species>/<image>` directory tree
//! - The class index mapping persisted next to the model
//! - The shared preprocessing used at train and predict time
//! - Training-only augmentation
//! - Burn batching into image and one-hot label tensors

pub mod augmentation;
pub mod burn_dataset;
pub mod class_index;
pub mod loader;
pub mod preprocess;

use std::path::Path;

pub use augmentation::{AugmentationConfig, Augmenter};
pub use burn_dataset::{BatchSource, Batches, FishBatch, FishBatcher, FishItem};
pub use class_index::{ClassIndex, LabelMap};
pub use loader::{DatasetSplits, DatasetStats, FishDataset, ImageSample};
pub use preprocess::{load_resized, preprocess_image, preprocess_path, to_chw_unit};

/// File extensions accepted as images (compared case-insensitively)
pub const VALID_IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "bmp", "tiff"];

/// Check whether a file name carries one of the accepted image extensions
pub fn is_valid_image_name(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    VALID_IMAGE_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(&format!(".{}", ext)))
}

/// Check whether a path points at a file with an accepted image extension
pub fn has_image_extension(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(is_valid_image_name)
        .unwrap_or(false)
}
