//! Inference module for species prediction
//!
//! This module provides:
//! - The `SpeciesModel` seam between the predictor and the numeric model
//! - Single-image prediction from a path, raw bytes or a decoded image

pub mod predictor;

pub use predictor::{argmax_first, BurnSpeciesModel, Prediction, Predictor, SpeciesModel};
