//! Training module
//!
//! This module provides:
//! - Training hyperparameters
//! - Categorical cross-entropy on one-hot targets
//! - The epoch loop with per-epoch validation and a failure boundary

pub mod loss;
pub mod trainer;

use serde::{Deserialize, Serialize};

pub use loss::{categorical_cross_entropy, correct_predictions};
pub use trainer::{EpochMetrics, Trainer, TrainingHistory, TrainingOutcome};

/// Default number of training epochs
pub const DEFAULT_EPOCHS: usize = 10;

/// Default batch size
pub const DEFAULT_BATCH_SIZE: usize = 16;

/// Default learning rate
pub const DEFAULT_LEARNING_RATE: f64 = 1e-4;

/// Training hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of passes over the training partition
    pub epochs: usize,

    /// Batch size for training and validation
    pub batch_size: usize,

    /// Fixed Adam learning rate
    pub learning_rate: f64,

    /// Fraction of each class held out for validation
    pub validation_split: f64,

    /// Square input size fed to the network
    pub image_size: usize,

    /// Seed for shuffling and augmentation
    pub seed: u64,

    /// Keep the pretrained backbone fixed and train only the head
    pub freeze_backbone: bool,

    /// Save the model even when training stops early on an error
    pub persist_on_failure: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: DEFAULT_EPOCHS,
            batch_size: DEFAULT_BATCH_SIZE,
            learning_rate: DEFAULT_LEARNING_RATE,
            validation_split: 0.2,
            image_size: crate::IMAGE_SIZE,
            seed: 42,
            freeze_backbone: false,
            persist_on_failure: true,
        }
    }
}

impl TrainingConfig {
    /// Validate the hyperparameters
    pub fn validate(&self) -> Result<(), String> {
        if self.epochs == 0 {
            return Err("epochs must be > 0".to_string());
        }
        if self.batch_size == 0 {
            return Err("batch_size must be > 0".to_string());
        }
        if self.learning_rate <= 0.0 {
            return Err("learning_rate must be > 0".to_string());
        }
        if !(self.validation_split > 0.0 && self.validation_split < 1.0) {
            return Err("validation_split must be in range (0, 1)".to_string());
        }
        if self.image_size < 32 {
            return Err("image_size must be at least 32".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TrainingConfig::default();
        assert_eq!(config.epochs, 10);
        assert_eq!(config.batch_size, 16);
        assert_eq!(config.image_size, 128);
        assert!(config.persist_on_failure);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: TrainingConfig = serde_json::from_str(r#"{"epochs": 3}"#).unwrap();
        assert_eq!(config.epochs, 3);
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_invalid_split() {
        let config = TrainingConfig {
            validation_split: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
