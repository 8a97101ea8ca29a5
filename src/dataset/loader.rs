//! Fish Dataset Loader
//!
//! Scans a dataset directory laid out as one subdirectory per species and
//! splits it into training and validation partitions.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use super::class_index::ClassIndex;
use super::has_image_extension;
use crate::utils::error::{FishError, Result};

/// A single image sample with its label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSample {
    /// Path to the image file
    pub path: PathBuf,
    /// Class label index
    pub label: usize,
}

/// Fish image dataset discovered on disk
#[derive(Debug, Clone)]
pub struct FishDataset {
    /// Root directory of the dataset
    pub root_dir: PathBuf,
    /// Class name <-> index mapping, in sorted directory order
    pub class_index: ClassIndex,
    /// Image paths per class, sorted, indexed by label
    pub files_by_class: Vec<Vec<PathBuf>>,
}

impl FishDataset {
    /// Scan a dataset directory
    ///
    /// The directory should be structured as:
    /// ```text
    /// root_dir/
    /// ├── Boal/
    /// │   ├── boal_001.jpg
    /// │   └── boal_002.jpg
    /// ├── Rui/
    /// │   └── ...
    /// └── ...
    /// ```
    ///
    /// Classes and files are enumerated in sorted order so the class index is
    /// stable across platforms.
    pub fn scan<P: AsRef<Path>>(root_dir: P) -> Result<Self> {
        let root_dir = root_dir.as_ref().to_path_buf();
        info!("Scanning fish dataset at: {:?}", root_dir);

        if !root_dir.is_dir() {
            return Err(FishError::DatasetNotFound(root_dir));
        }

        let mut class_dirs: Vec<String> = Vec::new();
        for entry in std::fs::read_dir(&root_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    class_dirs.push(name.to_string());
                }
            }
        }
        class_dirs.sort();

        let mut files_by_class = Vec::with_capacity(class_dirs.len());
        for class_name in &class_dirs {
            let files = list_images(&root_dir.join(class_name));
            debug!("Class '{}': {} images", class_name, files.len());
            files_by_class.push(files);
        }

        if files_by_class.iter().all(Vec::is_empty) {
            return Err(FishError::EmptyDataset(root_dir));
        }

        if class_dirs.len() < 2 {
            return Err(FishError::TooFewClasses {
                path: root_dir,
                found: class_dirs.len(),
            });
        }

        let class_index = ClassIndex::from_names(class_dirs)?;
        let dataset = Self {
            root_dir,
            class_index,
            files_by_class,
        };

        info!(
            "Found {} classes, {} images",
            dataset.num_classes(),
            dataset.len()
        );

        Ok(dataset)
    }

    /// Total number of images
    pub fn len(&self) -> usize {
        self.files_by_class.iter().map(Vec::len).sum()
    }

    /// Check if the dataset has no images
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of classes
    pub fn num_classes(&self) -> usize {
        self.class_index.len()
    }

    /// Directory holding a class's images
    pub fn class_dir(&self, label: usize) -> PathBuf {
        let name = self.class_index.name_of(label).unwrap_or_default();
        self.root_dir.join(name)
    }

    /// Split every class into training and validation partitions
    ///
    /// Within each class the first `floor(validation_fraction * n)` files (in
    /// sorted order) form the validation partition and the rest the training
    /// partition. Every class must end up with at least one image in each.
    pub fn split(&self, validation_fraction: f64) -> Result<DatasetSplits> {
        if !(validation_fraction > 0.0 && validation_fraction < 1.0) {
            return Err(FishError::Config(format!(
                "validation fraction must be in (0, 1), got {}",
                validation_fraction
            )));
        }

        let mut train = Vec::new();
        let mut validation = Vec::new();

        for (label, files) in self.files_by_class.iter().enumerate() {
            let n_val = (validation_fraction * files.len() as f64).floor() as usize;

            if n_val == 0 {
                return Err(FishError::EmptyPartition {
                    class_dir: self.class_dir(label),
                    partition: "validation",
                });
            }
            if n_val == files.len() {
                return Err(FishError::EmptyPartition {
                    class_dir: self.class_dir(label),
                    partition: "training",
                });
            }

            let (val_files, train_files) = files.split_at(n_val);
            validation.extend(val_files.iter().map(|path| ImageSample {
                path: path.clone(),
                label,
            }));
            train.extend(train_files.iter().map(|path| ImageSample {
                path: path.clone(),
                label,
            }));
        }

        info!(
            "Split {} images into {} training / {} validation",
            self.len(),
            train.len(),
            validation.len()
        );

        Ok(DatasetSplits {
            train,
            validation,
            num_classes: self.num_classes(),
        })
    }

    /// Get statistics about the dataset
    pub fn stats(&self) -> DatasetStats {
        DatasetStats {
            total_samples: self.len(),
            num_classes: self.num_classes(),
            class_names: self.class_index.names().to_vec(),
            class_counts: self.files_by_class.iter().map(Vec::len).collect(),
        }
    }
}

/// List image files directly inside a directory, sorted by path
fn list_images(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| has_image_extension(p))
        .collect();
    files.sort();
    files
}

/// Training and validation partitions
#[derive(Debug, Clone)]
pub struct DatasetSplits {
    pub train: Vec<ImageSample>,
    pub validation: Vec<ImageSample>,
    pub num_classes: usize,
}

/// Statistics about the dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStats {
    pub total_samples: usize,
    pub num_classes: usize,
    pub class_names: Vec<String>,
    pub class_counts: Vec<usize>,
}

impl DatasetStats {
    /// Validation images a class receives for a given fraction
    pub fn validation_count(&self, label: usize, validation_fraction: f64) -> usize {
        let n = self.class_counts.get(label).copied().unwrap_or(0);
        (validation_fraction * n as f64).floor() as usize
    }
}
