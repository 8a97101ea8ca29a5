//! # Fish Classifier
//!
//! Freshwater fish species classification by transfer learning on an
//! ImageNet-pretrained MobileNetV2, built with the Burn framework.
//!
//! ## Modules
//!
//! - `dataset`: Directory scanning, class index, preprocessing, augmentation and batching
//! - `model`: MobileNetV2 backbone, pretrained weights, classifier head and artifact persistence
//! - `training`: Epoch loop with validation and a failure boundary
//! - `inference`: Species prediction from images
//! - `reference`: Species description files and sample images
//! - `session`: The interactive command loop
//! - `config`: JSON configuration
//! - `utils`: Errors, logging and formatting helpers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fish_classifier::backend::{default_device, DefaultBackend};
//! use fish_classifier::inference::{BurnSpeciesModel, Predictor};
//!
//! let predictor = Predictor::<BurnSpeciesModel<DefaultBackend>>::load(
//!     "fish_classification_model.mpk".as_ref(),
//!     "class_indices.json".as_ref(),
//!     default_device(),
//! )?;
//! let prediction = predictor.predict_path("rui.jpg".as_ref())?;
//! println!("{} ({:.1}%)", prediction.species, prediction.confidence * 100.0);
//! ```

pub mod backend;
pub mod config;
pub mod dataset;
pub mod inference;
pub mod model;
pub mod reference;
pub mod session;
pub mod training;
pub mod utils;

pub use config::{FishConfig, PathsConfig};
pub use dataset::{ClassIndex, FishDataset, LabelMap};
pub use inference::{Prediction, Predictor, SpeciesModel};
pub use model::{FishClassifier, FishClassifierConfig};
pub use reference::ReferenceLibrary;
pub use training::{Trainer, TrainingConfig, TrainingOutcome};
pub use utils::error::{FishError, Result};

/// File name of the saved model artifact
pub const MODEL_FILE_NAME: &str = "fish_classification_model.mpk";

/// File name of the saved class index mapping
pub const CLASS_INDEX_FILE_NAME: &str = "class_indices.json";

/// Default square input size
pub const IMAGE_SIZE: usize = 128;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
