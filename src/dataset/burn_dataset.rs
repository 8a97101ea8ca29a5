//! Burn batching for the fish dataset
//!
//! `FishBatcher` turns preprocessed items into image, one-hot and target
//! tensors. `BatchSource` walks a partition in batches, loading images on
//! demand. The training source reshuffles every epoch and augments; the
//! validation source keeps enumeration order and never augments.

use burn::data::dataloader::batcher::Batcher;
use burn::prelude::*;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::augmentation::{AugmentationConfig, Augmenter};
use super::loader::ImageSample;
use super::preprocess::{load_resized, to_chw_unit};
use crate::utils::error::Result;

/// A single fish image ready for Burn
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FishItem {
    /// Image data as flattened CHW float array [3 * H * W], values in [0, 1]
    pub image: Vec<f32>,
    /// Class label
    pub label: usize,
    /// Image path (for debugging/logging)
    pub path: String,
}

/// A batch of fish images
#[derive(Clone, Debug)]
pub struct FishBatch<B: Backend> {
    /// Images with shape [batch_size, 3, height, width]
    pub images: Tensor<B, 4>,
    /// One-hot labels with shape [batch_size, num_classes]
    pub one_hot: Tensor<B, 2>,
    /// Class indices with shape [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

/// Batcher for fish items
#[derive(Clone, Debug)]
pub struct FishBatcher {
    num_classes: usize,
    image_size: usize,
}

impl FishBatcher {
    pub fn new(num_classes: usize, image_size: usize) -> Self {
        Self {
            num_classes,
            image_size,
        }
    }
}

impl<B: Backend> Batcher<B, FishItem, FishBatch<B>> for FishBatcher {
    fn batch(&self, items: Vec<FishItem>, device: &B::Device) -> FishBatch<B> {
        let batch_size = items.len();
        let size = self.image_size;

        let images_data: Vec<f32> = items.iter().flat_map(|item| item.image.clone()).collect();
        let images = Tensor::<B, 4>::from_floats(
            TensorData::new(images_data, [batch_size, 3, size, size]),
            device,
        );

        let mut one_hot_data = vec![0.0f32; batch_size * self.num_classes];
        for (row, item) in items.iter().enumerate() {
            one_hot_data[row * self.num_classes + item.label] = 1.0;
        }
        let one_hot = Tensor::<B, 2>::from_floats(
            TensorData::new(one_hot_data, [batch_size, self.num_classes]),
            device,
        );

        let targets_data: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let targets =
            Tensor::<B, 1, Int>::from_data(TensorData::new(targets_data, [batch_size]), device);

        FishBatch {
            images,
            one_hot,
            targets,
        }
    }
}

/// Batched iteration over one dataset partition
#[derive(Clone, Debug)]
pub struct BatchSource<B: Backend> {
    samples: Vec<ImageSample>,
    batcher: FishBatcher,
    batch_size: usize,
    image_size: usize,
    shuffle: bool,
    augmenter: Option<Augmenter>,
    device: B::Device,
}

impl<B: Backend> BatchSource<B> {
    /// Training source: shuffled every epoch, augmented when enabled
    pub fn training(
        samples: Vec<ImageSample>,
        num_classes: usize,
        image_size: usize,
        batch_size: usize,
        augmentation: AugmentationConfig,
        device: B::Device,
    ) -> Self {
        let augmenter = augmentation
            .is_enabled()
            .then(|| Augmenter::new(augmentation));
        Self {
            samples,
            batcher: FishBatcher::new(num_classes, image_size),
            batch_size: batch_size.max(1),
            image_size,
            shuffle: true,
            augmenter,
            device,
        }
    }

    /// Validation source: enumeration order, no augmentation
    pub fn validation(
        samples: Vec<ImageSample>,
        num_classes: usize,
        image_size: usize,
        batch_size: usize,
        device: B::Device,
    ) -> Self {
        Self {
            samples,
            batcher: FishBatcher::new(num_classes, image_size),
            batch_size: batch_size.max(1),
            image_size,
            shuffle: false,
            augmenter: None,
            device,
        }
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of batches per pass (the last one may be partial)
    pub fn num_batches(&self) -> usize {
        self.samples.len().div_ceil(self.batch_size)
    }

    pub fn is_augmenting(&self) -> bool {
        self.augmenter.is_some()
    }

    pub fn samples(&self) -> &[ImageSample] {
        &self.samples
    }

    /// Load one sample: resize, augment (training only), rescale
    pub fn load_item(&self, sample: &ImageSample, rng: &mut ChaCha8Rng) -> Result<FishItem> {
        let mut image = load_resized(&sample.path, self.image_size)?;
        if let Some(augmenter) = &self.augmenter {
            image = augmenter.augment(image, rng);
        }

        Ok(FishItem {
            image: to_chw_unit(&image),
            label: sample.label,
            path: sample.path.to_string_lossy().to_string(),
        })
    }

    /// Iterate over one pass of batches
    ///
    /// The RNG drives both the epoch shuffle and per-image augmentation, so a
    /// fixed seed reproduces the whole pass.
    pub fn batches<'a>(&'a self, rng: &'a mut ChaCha8Rng) -> Batches<'a, B> {
        let mut order: Vec<usize> = (0..self.samples.len()).collect();
        if self.shuffle {
            order.shuffle(rng);
        }

        Batches {
            source: self,
            order,
            position: 0,
            rng,
        }
    }
}

/// Iterator returned by [`BatchSource::batches`]
pub struct Batches<'a, B: Backend> {
    source: &'a BatchSource<B>,
    order: Vec<usize>,
    position: usize,
    rng: &'a mut ChaCha8Rng,
}

impl<B: Backend> Iterator for Batches<'_, B> {
    type Item = Result<FishBatch<B>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.order.len() {
            return None;
        }

        let end = (self.position + self.source.batch_size).min(self.order.len());
        let indices = &self.order[self.position..end];
        self.position = end;

        let mut items = Vec::with_capacity(indices.len());
        for &idx in indices {
            match self.source.load_item(&self.source.samples[idx], self.rng) {
                Ok(item) => items.push(item),
                Err(e) => {
                    // Abandon the rest of the pass
                    self.position = self.order.len();
                    return Some(Err(e));
                }
            }
        }

        let batch = <FishBatcher as Batcher<B, FishItem, FishBatch<B>>>::batch(
            &self.source.batcher,
            items,
            &self.source.device,
        );
        Some(Ok(batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::loader::tests::write_class;
    use crate::dataset::loader::FishDataset;
    use crate::dataset::preprocess::preprocess_path;
    use burn::backend::NdArray;
    use rand::SeedableRng;
    use tempfile::TempDir;

    type TestBackend = NdArray;

    fn splits(dir: &TempDir) -> (FishDataset, crate::dataset::DatasetSplits) {
        write_class(dir.path(), "Boal", 10, 200);
        write_class(dir.path(), "Rui", 10, 10);
        let dataset = FishDataset::scan(dir.path()).unwrap();
        let splits = dataset.split(0.2).unwrap();
        (dataset, splits)
    }

    #[test]
    fn test_batch_shapes_and_one_hot() {
        let dir = TempDir::new().unwrap();
        let (_, splits) = splits(&dir);
        let device = Default::default();
        let source = BatchSource::<TestBackend>::validation(splits.validation, 2, 8, 3, device);

        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let batches: Vec<_> = source.batches(&mut rng).map(|b| b.unwrap()).collect();

        assert_eq!(source.num_batches(), 2);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].images.dims(), [3, 3, 8, 8]);
        assert_eq!(batches[1].images.dims(), [1, 3, 8, 8]);
        assert_eq!(batches[0].one_hot.dims(), [3, 2]);

        let row_sums: Vec<f32> = batches[0].one_hot.clone().sum_dim(1).into_data().to_vec().unwrap();
        assert!(row_sums.iter().all(|s| (*s - 1.0).abs() < 1e-6));

        // Validation keeps enumeration order: Boal, Boal, Rui
        let targets: Vec<i64> = batches[0].targets.clone().into_data().to_vec().unwrap();
        assert_eq!(targets, vec![0, 0, 1]);
    }

    #[test]
    fn test_validation_item_matches_predict_preprocessing() {
        let dir = TempDir::new().unwrap();
        let (_, splits) = splits(&dir);
        let sample = splits.validation[0].clone();
        let source =
            BatchSource::<TestBackend>::validation(vec![sample.clone()], 2, 16, 1, Default::default());

        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let item = source.load_item(&sample, &mut rng).unwrap();
        assert_eq!(item.image, preprocess_path(&sample.path, 16).unwrap());
    }

    #[test]
    fn test_unaugmented_training_item_matches_predict_preprocessing() {
        let dir = TempDir::new().unwrap();
        let (_, splits) = splits(&dir);
        let sample = splits.train[0].clone();
        let source = BatchSource::<TestBackend>::training(
            vec![sample.clone()],
            2,
            16,
            1,
            AugmentationConfig::none(),
            Default::default(),
        );
        assert!(!source.is_augmenting());

        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let item = source.load_item(&sample, &mut rng).unwrap();
        assert_eq!(item.image, preprocess_path(&sample.path, 16).unwrap());
    }

    #[test]
    fn test_training_shuffle_is_seeded() {
        let dir = TempDir::new().unwrap();
        let (_, splits) = splits(&dir);
        let source = BatchSource::<TestBackend>::training(
            splits.train,
            2,
            8,
            16,
            AugmentationConfig::none(),
            Default::default(),
        );

        let targets = |seed: u64| -> Vec<i64> {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            source
                .batches(&mut rng)
                .flat_map(|b| b.unwrap().targets.into_data().to_vec::<i64>().unwrap())
                .collect()
        };

        assert_eq!(targets(42), targets(42));
        assert_eq!(targets(42).len(), 16);
    }

    #[test]
    fn test_unreadable_image_surfaces_as_error() {
        let dir = TempDir::new().unwrap();
        let (_, splits) = splits(&dir);
        let broken = &splits.validation[0].path;
        std::fs::write(broken, b"corrupt").unwrap();

        let source =
            BatchSource::<TestBackend>::validation(splits.validation, 2, 8, 2, Default::default());
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut batches = source.batches(&mut rng);

        assert!(batches.next().unwrap().is_err());
        assert!(batches.next().is_none());
    }
}
