//! Error Handling Module
//!
//! Defines the error type shared by the dataset, model, training and
//! inference layers. Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for fish classifier operations
#[derive(Error, Debug)]
pub enum FishError {
    /// Dataset root is missing or not a directory
    #[error("Dataset directory not found: {0}")]
    DatasetNotFound(PathBuf),

    /// Dataset root contains no usable images
    #[error("No images found in dataset directory: {0}")]
    EmptyDataset(PathBuf),

    /// Fewer than two classes were discovered
    #[error("Dataset directory {path} contains {found} class(es); at least two are required")]
    TooFewClasses { path: PathBuf, found: usize },

    /// A class ends up with no images in one of the partitions
    #[error("Class directory {class_dir} has no images in the {partition} partition")]
    EmptyPartition {
        class_dir: PathBuf,
        partition: &'static str,
    },

    /// Image could not be opened or decoded
    #[error("File not found or unreadable: {path} ({reason})")]
    ImageLoad { path: PathBuf, reason: String },

    /// Pretrained backbone weights could not be fetched or decoded
    #[error("Pretrained weights unavailable: {0}")]
    PretrainedWeights(String),

    /// Error with model construction, saving or loading
    #[error("Model error: {0}")]
    Model(String),

    /// Error raised inside a training epoch
    #[error("Training error: {0}")]
    Training(String),

    /// Error with inference
    #[error("Inference error: {0}")]
    Inference(String),

    /// Class index file is malformed or inconsistent
    #[error("Class index error: {0}")]
    ClassIndex(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FishError {
    /// Build an image loading error for the given path
    pub fn image_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        FishError::ImageLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Convenience Result type for fish classifier operations
pub type Result<T> = std::result::Result<T, FishError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FishError::Training("out of memory".to_string());
        assert_eq!(format!("{}", err), "Training error: out of memory");
    }

    #[test]
    fn test_dataset_errors_name_the_path() {
        let err = FishError::DatasetNotFound(PathBuf::from("/data/missing"));
        assert!(err.to_string().contains("/data/missing"));

        let err = FishError::EmptyPartition {
            class_dir: PathBuf::from("/data/Rui"),
            partition: "validation",
        };
        let msg = err.to_string();
        assert!(msg.contains("/data/Rui"));
        assert!(msg.contains("validation"));
    }

    #[test]
    fn test_image_load_error() {
        let err = FishError::image_load("/path/to/photo.jpg", "no such file");
        let msg = err.to_string();
        assert!(msg.starts_with("File not found or unreadable"));
        assert!(msg.contains("photo.jpg"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: FishError = io.into();
        assert!(matches!(err, FishError::Io(_)));
    }
}
