//! Species predictor
//!
//! Holds a trained model together with the label map it was trained with.
//! Images go through the same preprocessing as training (resize, rescale to
//! `[0, 1]`, no augmentation) before the forward pass.

use std::path::Path;
use std::time::{Duration, Instant};

use burn::prelude::*;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dataset::class_index::{ClassIndex, LabelMap};
use crate::dataset::preprocess::{open_image, preprocess_image};
use crate::model::{load_model, FishClassifier};
use crate::utils::error::{FishError, Result};

/// A model that maps preprocessed pixels to class probabilities
pub trait SpeciesModel {
    /// Square input size the model expects
    fn image_size(&self) -> usize;

    /// Number of output classes
    fn num_classes(&self) -> usize;

    /// Class probabilities for one CHW image in `[0, 1]`
    fn probabilities(&self, pixels: &[f32]) -> Result<Vec<f32>>;
}

/// [`SpeciesModel`] backed by a Burn classifier
///
/// Use a non-autodiff backend so dropout is off and BatchNorm uses its
/// running statistics.
#[derive(Debug)]
pub struct BurnSpeciesModel<B: Backend> {
    model: FishClassifier<B>,
    device: B::Device,
}

impl<B: Backend> BurnSpeciesModel<B> {
    pub fn new(model: FishClassifier<B>, device: B::Device) -> Self {
        Self { model, device }
    }

    /// Load a model artifact written by [`crate::model::save_model`]
    pub fn load(path: &Path, device: B::Device) -> Result<Self> {
        let (model, _) = load_model::<B>(path, &device)?;
        Ok(Self::new(model, device))
    }
}

impl<B: Backend> SpeciesModel for BurnSpeciesModel<B> {
    fn image_size(&self) -> usize {
        self.model.image_size()
    }

    fn num_classes(&self) -> usize {
        self.model.num_classes()
    }

    fn probabilities(&self, pixels: &[f32]) -> Result<Vec<f32>> {
        let size = self.image_size();
        if pixels.len() != 3 * size * size {
            return Err(FishError::Inference(format!(
                "expected {} values for a {}x{} image, got {}",
                3 * size * size,
                size,
                size,
                pixels.len()
            )));
        }

        let input = Tensor::<B, 4>::from_floats(
            TensorData::new(pixels.to_vec(), [1, 3, size, size]),
            &self.device,
        );

        self.model
            .forward_probabilities(input)
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| FishError::Inference(format!("cannot read model output: {e:?}")))
    }
}

/// Result of a single prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted class index
    pub class_index: usize,
    /// Predicted species name
    pub species: String,
    /// Probability of the predicted class
    pub confidence: f32,
    /// Full probability distribution over all classes
    pub probabilities: Vec<f32>,
    /// Inference time in milliseconds
    pub inference_time_ms: f64,
}

impl Prediction {
    /// The `k` most probable (index, probability) pairs, highest first
    pub fn top_k(&self, k: usize) -> Vec<(usize, f32)> {
        let mut indexed: Vec<(usize, f32)> =
            self.probabilities.iter().copied().enumerate().collect();
        indexed.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        indexed.truncate(k);
        indexed
    }
}

/// Index and value of the first maximum
///
/// Ties go to the lowest index. NaN entries are never selected.
pub fn argmax_first(values: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, current)) if v <= current => {}
            _ => best = Some((idx, v)),
        }
    }
    best
}

/// Predictor for running inference with a trained model
pub struct Predictor<M: SpeciesModel> {
    model: M,
    labels: LabelMap,
}

impl<M: SpeciesModel> Predictor<M> {
    /// Pair a model with its label map
    ///
    /// Fails when the model's output width differs from the number of labels.
    pub fn new(model: M, labels: LabelMap) -> Result<Self> {
        if model.num_classes() != labels.len() {
            return Err(FishError::ClassIndex(format!(
                "model predicts {} classes but the class index lists {}",
                model.num_classes(),
                labels.len()
            )));
        }
        Ok(Self { model, labels })
    }

    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn image_size(&self) -> usize {
        self.model.image_size()
    }

    /// Predict from preprocessed CHW pixels
    pub fn predict_pixels(&self, pixels: &[f32]) -> Result<Prediction> {
        let start = Instant::now();
        let probabilities = self.model.probabilities(pixels)?;
        let elapsed: Duration = start.elapsed();

        let (class_index, confidence) = argmax_first(&probabilities)
            .ok_or_else(|| FishError::Inference("model returned no probabilities".to_string()))?;
        let species = self
            .labels
            .species(class_index)
            .ok_or_else(|| {
                FishError::Inference(format!("no species for class index {class_index}"))
            })?
            .to_string();

        debug!(
            "Predicted {} ({:.2}%) in {:.2} ms",
            species,
            confidence * 100.0,
            elapsed.as_secs_f64() * 1000.0
        );

        Ok(Prediction {
            class_index,
            species,
            confidence,
            probabilities,
            inference_time_ms: elapsed.as_secs_f64() * 1000.0,
        })
    }

    /// Predict from a decoded image
    pub fn predict_image(&self, image: &DynamicImage) -> Result<Prediction> {
        self.predict_pixels(&preprocess_image(image, self.image_size()))
    }

    /// Predict from encoded image bytes; `name` identifies the source in errors
    pub fn predict_bytes(&self, name: &str, bytes: &[u8]) -> Result<Prediction> {
        let image =
            image::load_from_memory(bytes).map_err(|e| FishError::image_load(name, e))?;
        self.predict_image(&image)
    }

    /// Predict from an image file
    pub fn predict_path(&self, path: &Path) -> Result<Prediction> {
        let image = open_image(path)?;
        self.predict_image(&image)
    }
}

impl<B: Backend> Predictor<BurnSpeciesModel<B>> {
    /// Load the model artifact and class index written by training
    pub fn load(model_path: &Path, class_index_path: &Path, device: B::Device) -> Result<Self> {
        info!("Loading model from {:?}", model_path);
        let model = BurnSpeciesModel::<B>::load(model_path, device)?;

        info!("Loading class index from {:?}", class_index_path);
        let labels = ClassIndex::load(class_index_path)?.label_map();

        let predictor = Self::new(model, labels)?;
        info!(
            "Predictor ready: {} species, {}x{} input",
            predictor.labels.len(),
            predictor.image_size(),
            predictor.image_size()
        );
        Ok(predictor)
    }
}
