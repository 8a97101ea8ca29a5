//! Model module built on the Burn framework
//!
//! This module provides:
//! - A MobileNetV2 feature extractor laid out like torchvision's
//! - Import of the ImageNet weights for that backbone
//! - The fish classifier head on top of it
//! - Saving and loading of the trained model artifact

pub mod artifact;
pub mod classifier;
pub mod mobilenet;
pub mod weights;

pub use artifact::{load_model, save_model, ModelArtifactRecord};
pub use classifier::{build_pretrained, FishClassifier, FishClassifierConfig};
pub use mobilenet::{feature_map_size, MobileNetV2};
pub use weights::{WeightsSource, IMAGENET_WEIGHTS_URL};

/// Default dropout rate before each dense layer
pub const DEFAULT_DROPOUT: f64 = 0.5;

/// Default width of the hidden dense layer
pub const DEFAULT_HIDDEN_UNITS: usize = 512;
