//! Training loop for the fish classifier
//!
//! Adam at a fixed learning rate, categorical cross-entropy on one-hot
//! targets, and a read-only validation pass after every epoch.
//!
//! Each epoch runs against a snapshot of the model. If loading data fails or
//! anything panics inside the epoch, training stops and the caller receives
//! [`TrainingOutcome::Failed`] with the model from the last completed epoch.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use burn::{
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::{backend::AutodiffBackend, backend::Backend, ElementConversion},
};
use colored::Colorize;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::loss::{categorical_cross_entropy, correct_predictions};
use super::TrainingConfig;
use crate::dataset::BatchSource;
use crate::model::FishClassifier;
use crate::utils::error::{FishError, Result};
use crate::utils::format_duration;
use crate::utils::logging::TrainingLogger;

/// Metrics for one completed epoch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub train_loss: f64,
    pub train_accuracy: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
}

/// Per-epoch metrics of a training run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochMetrics>,
    /// Wall-clock training time in seconds
    pub duration_secs: f64,
}

impl TrainingHistory {
    /// Number of completed epochs
    pub fn completed_epochs(&self) -> usize {
        self.epochs.len()
    }

    pub fn last(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }

    /// Validation accuracy after the last completed epoch
    pub fn final_val_accuracy(&self) -> Option<f64> {
        self.last().map(|m| m.val_accuracy)
    }

    /// Print a per-epoch table
    pub fn print_summary(&self) {
        println!();
        println!("{}", "Training History:".cyan().bold());
        println!(
            "  {:>5}  {:>10}  {:>9}  {:>10}  {:>9}",
            "Epoch", "Loss", "Acc", "Val Loss", "Val Acc"
        );
        for m in &self.epochs {
            println!(
                "  {:>5}  {:>10.4}  {:>8.2}%  {:>10.4}  {:>8.2}%",
                m.epoch + 1,
                m.train_loss,
                m.train_accuracy * 100.0,
                m.val_loss,
                m.val_accuracy * 100.0
            );
        }
        println!("  Time: {}", format_duration(self.duration_secs));
    }
}

/// Result of [`Trainer::fit`]
#[derive(Debug)]
pub enum TrainingOutcome<B: Backend> {
    /// Every epoch ran
    Completed {
        model: FishClassifier<B>,
        history: TrainingHistory,
    },
    /// Training stopped early; `model` is the state after the last completed epoch
    Failed {
        model: FishClassifier<B>,
        history: TrainingHistory,
        cause: String,
    },
}

impl<B: Backend> TrainingOutcome<B> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn history(&self) -> &TrainingHistory {
        match self {
            Self::Completed { history, .. } | Self::Failed { history, .. } => history,
        }
    }

    pub fn model(&self) -> &FishClassifier<B> {
        match self {
            Self::Completed { model, .. } | Self::Failed { model, .. } => model,
        }
    }

    /// Failure message, if training stopped early
    pub fn cause(&self) -> Option<&str> {
        match self {
            Self::Completed { .. } => None,
            Self::Failed { cause, .. } => Some(cause),
        }
    }

    pub fn into_model(self) -> FishClassifier<B> {
        match self {
            Self::Completed { model, .. } | Self::Failed { model, .. } => model,
        }
    }
}

/// Epoch-loop trainer
#[derive(Debug, Clone)]
pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Train for the configured number of epochs
    ///
    /// Never returns an error: failures inside an epoch are converted into
    /// [`TrainingOutcome::Failed`].
    pub fn fit<B: AutodiffBackend>(
        &self,
        model: FishClassifier<B>,
        train: &BatchSource<B>,
        valid: &BatchSource<B::InnerBackend>,
    ) -> TrainingOutcome<B> {
        let mut model = model;
        let mut optimizer = AdamConfig::new().init::<B, FishClassifier<B>>();
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let mut history = TrainingHistory::default();
        let mut logger = TrainingLogger::new(self.config.epochs);
        let start = Instant::now();

        for epoch in 0..self.config.epochs {
            logger.start_epoch(epoch);

            let snapshot = model.clone();
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                let (trained, train_loss, train_accuracy) =
                    self.train_epoch(snapshot, &mut optimizer, train, &mut rng)?;
                let (val_loss, val_accuracy) = evaluate(&trained, valid)?;
                Ok::<_, FishError>((
                    trained,
                    EpochMetrics {
                        epoch,
                        train_loss,
                        train_accuracy,
                        val_loss,
                        val_accuracy,
                    },
                ))
            }));

            let cause = match result {
                Ok(Ok((trained, metrics))) => {
                    model = trained;
                    logger.end_epoch(metrics.train_loss, metrics.val_loss, metrics.val_accuracy);
                    history.epochs.push(metrics);
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(payload) => format!("panic during training: {}", panic_message(payload.as_ref())),
            };

            history.duration_secs = start.elapsed().as_secs_f64();
            logger.log_failure(history.completed_epochs(), &cause);
            return TrainingOutcome::Failed {
                model,
                history,
                cause,
            };
        }

        history.duration_secs = start.elapsed().as_secs_f64();
        logger.log_complete(history.final_val_accuracy().unwrap_or(0.0));

        TrainingOutcome::Completed { model, history }
    }

    /// One pass over the training source; returns (model, mean loss, accuracy)
    fn train_epoch<B, O>(
        &self,
        mut model: FishClassifier<B>,
        optimizer: &mut O,
        source: &BatchSource<B>,
        rng: &mut ChaCha8Rng,
    ) -> Result<(FishClassifier<B>, f64, f64)>
    where
        B: AutodiffBackend,
        O: Optimizer<FishClassifier<B>, B>,
    {
        let num_batches = source.num_batches();
        let mut loss = RunningLoss::default();
        let mut correct = 0usize;
        let mut seen = 0usize;

        for (batch_idx, batch) in source.batches(rng).enumerate() {
            let batch = batch?;

            let n = batch.targets.dims()[0];
            let output = model.forward(batch.images);
            let batch_loss = categorical_cross_entropy(output.clone(), batch.one_hot);

            let loss_value: f64 = batch_loss.clone().into_scalar().elem();
            if !loss_value.is_finite() {
                return Err(FishError::Training(format!(
                    "loss became {} at batch {}",
                    loss_value,
                    batch_idx + 1
                )));
            }
            loss.add(loss_value, n);

            seen += n;
            correct += correct_predictions(output, batch.targets);

            let grads = batch_loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optimizer.step(self.config.learning_rate, model, grads);

            if (batch_idx + 1) % 10 == 0 || batch_idx + 1 == num_batches {
                debug!(
                    "  Batch {:>4}/{}: loss = {:.4}, acc = {:.2}%",
                    batch_idx + 1,
                    num_batches,
                    loss_value,
                    100.0 * correct as f64 / seen.max(1) as f64
                );
            }
        }

        Ok((model, loss.mean(), correct as f64 / seen.max(1) as f64))
    }
}

/// Mean loss over samples, from per-batch means
///
/// A short final batch counts in proportion to its size.
#[derive(Debug, Clone, Copy, Default)]
struct RunningLoss {
    sum: f64,
    samples: usize,
}

impl RunningLoss {
    fn add(&mut self, batch_mean: f64, batch_size: usize) {
        self.sum += batch_mean * batch_size as f64;
        self.samples += batch_size;
    }

    fn mean(&self) -> f64 {
        self.sum / self.samples.max(1) as f64
    }
}

/// Validation loss and accuracy on the inner backend (dropout off, running BatchNorm stats)
pub fn evaluate<B: AutodiffBackend>(
    model: &FishClassifier<B>,
    source: &BatchSource<B::InnerBackend>,
) -> Result<(f64, f64)> {
    let model = model.valid();
    // Validation neither shuffles nor augments; the RNG is never drawn from
    let mut rng = ChaCha8Rng::seed_from_u64(0);

    let mut running = RunningLoss::default();
    let mut correct = 0usize;
    let mut seen = 0usize;

    for batch in source.batches(&mut rng) {
        let batch = batch?;
        let n = batch.targets.dims()[0];

        let output = model.forward(batch.images);
        let loss: f64 = categorical_cross_entropy(output.clone(), batch.one_hot)
            .into_scalar()
            .elem();

        running.add(loss, n);
        correct += correct_predictions(output, batch.targets);
        seen += n;
    }

    if seen == 0 {
        return Err(FishError::Training(
            "validation partition is empty".to_string(),
        ));
    }

    Ok((running.mean(), correct as f64 / seen as f64))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::loader::tests::write_class;
    use crate::dataset::{AugmentationConfig, DatasetSplits, FishDataset, ImageSample};
    use crate::model::FishClassifierConfig;
    use burn::backend::{Autodiff, NdArray};
    use tempfile::TempDir;

    type Inner = NdArray;
    type TestBackend = Autodiff<Inner>;

    const IMAGE_SIZE: usize = 32;

    fn small_splits(dir: &TempDir) -> DatasetSplits {
        write_class(dir.path(), "Boal", 5, 220);
        write_class(dir.path(), "Rui", 5, 20);
        FishDataset::scan(dir.path()).unwrap().split(0.2).unwrap()
    }

    fn config(epochs: usize) -> TrainingConfig {
        TrainingConfig {
            epochs,
            batch_size: 4,
            image_size: IMAGE_SIZE,
            ..Default::default()
        }
    }

    fn sources(
        splits: DatasetSplits,
        augmentation: AugmentationConfig,
    ) -> (BatchSource<TestBackend>, BatchSource<Inner>) {
        let train = BatchSource::<TestBackend>::training(
            splits.train,
            2,
            IMAGE_SIZE,
            4,
            augmentation,
            Default::default(),
        );
        let valid =
            BatchSource::<Inner>::validation(splits.validation, 2, IMAGE_SIZE, 4, Default::default());
        (train, valid)
    }

    fn model() -> FishClassifier<TestBackend> {
        FishClassifierConfig::new(2)
            .with_image_size(IMAGE_SIZE)
            .init(&Default::default())
    }

    #[test]
    fn test_running_loss_weights_partial_batch() {
        let mut loss = RunningLoss::default();
        loss.add(1.0, 4);
        loss.add(4.0, 1);
        assert!((loss.mean() - 1.6).abs() < 1e-12);
        assert_eq!(RunningLoss::default().mean(), 0.0);
    }

    #[test]
    fn test_fit_completes_and_records_history() {
        let dir = TempDir::new().unwrap();
        let (train, valid) = sources(small_splits(&dir), AugmentationConfig::default());

        let outcome = Trainer::new(config(2)).fit(model(), &train, &valid);

        assert!(outcome.is_completed());
        assert!(outcome.cause().is_none());
        let history = outcome.history();
        assert_eq!(history.completed_epochs(), 2);
        for m in &history.epochs {
            assert!(m.train_loss.is_finite());
            assert!(m.val_loss.is_finite());
            assert!((0.0..=1.0).contains(&m.val_accuracy));
        }
        assert_eq!(outcome.into_model().num_classes(), 2);
    }

    #[test]
    fn test_unreadable_training_image_fails_with_cause() {
        let dir = TempDir::new().unwrap();
        let splits = small_splits(&dir);
        let broken = splits.train[0].path.clone();
        std::fs::write(&broken, b"not an image").unwrap();
        let (train, valid) = sources(splits, AugmentationConfig::none());

        let outcome = Trainer::new(config(3)).fit(model(), &train, &valid);

        match outcome {
            TrainingOutcome::Failed { history, cause, model } => {
                assert_eq!(history.completed_epochs(), 0);
                assert!(cause.contains(&broken.display().to_string()));
                assert_eq!(model.num_classes(), 2);
            }
            TrainingOutcome::Completed { .. } => panic!("training should have failed"),
        }
    }

    #[test]
    fn test_panic_inside_epoch_is_caught() {
        let dir = TempDir::new().unwrap();
        let splits = small_splits(&dir);

        // A label outside the one-hot width makes batching panic
        let bad = vec![ImageSample {
            path: splits.train[0].path.clone(),
            label: 7,
        }];
        let train = BatchSource::<TestBackend>::training(
            bad,
            2,
            IMAGE_SIZE,
            4,
            AugmentationConfig::none(),
            Default::default(),
        );
        let valid =
            BatchSource::<Inner>::validation(splits.validation, 2, IMAGE_SIZE, 4, Default::default());

        let outcome = Trainer::new(config(1)).fit(model(), &train, &valid);

        assert!(!outcome.is_completed());
        assert!(outcome.cause().unwrap().starts_with("panic during training"));
    }

    #[test]
    fn test_history_accessors() {
        let mut history = TrainingHistory::default();
        assert_eq!(history.final_val_accuracy(), None);

        history.epochs.push(EpochMetrics {
            epoch: 0,
            train_loss: 0.9,
            train_accuracy: 0.5,
            val_loss: 0.8,
            val_accuracy: 0.625,
        });
        assert_eq!(history.completed_epochs(), 1);
        assert_eq!(history.final_val_accuracy(), Some(0.625));
    }
}
