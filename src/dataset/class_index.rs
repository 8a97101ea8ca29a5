//! Class index mapping
//!
//! The classifier's output order follows the order in which species
//! directories were enumerated when training started. That order is persisted
//! as a flat JSON object (`{"species": index}`) so that inference can map a
//! predicted index back to a species name.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::utils::error::{FishError, Result};

/// Bijection between species names and dense indices `0..len`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, usize>", into = "BTreeMap<String, usize>")]
pub struct ClassIndex {
    names: Vec<String>,
}

impl ClassIndex {
    /// Build from class names in enumeration order
    ///
    /// Duplicate names are rejected since they would break the bijection.
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let mut seen = std::collections::HashSet::new();
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(FishError::ClassIndex(format!(
                    "duplicate class name '{}'",
                    name
                )));
            }
        }
        Ok(Self { names })
    }

    /// Number of classes
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if there are no classes
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Index of a class name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Class name at an index
    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Class names in index order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The name -> index mapping
    pub fn to_map(&self) -> BTreeMap<String, usize> {
        self.names
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect()
    }

    /// Invert into an index -> name label map
    pub fn label_map(&self) -> LabelMap {
        LabelMap {
            names: self.names.clone(),
        }
    }

    /// Write the mapping as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        debug!("Wrote class index with {} classes to {:?}", self.len(), path);
        Ok(())
    }

    /// Read a mapping written by [`ClassIndex::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            FishError::ClassIndex(format!("cannot read {}: {}", path.display(), e))
        })?;
        let index: ClassIndex = serde_json::from_str(&json)?;
        debug!("Loaded class index with {} classes from {:?}", index.len(), path);
        Ok(index)
    }
}

impl TryFrom<BTreeMap<String, usize>> for ClassIndex {
    type Error = FishError;

    fn try_from(map: BTreeMap<String, usize>) -> Result<Self> {
        let len = map.len();
        let mut slots: Vec<Option<String>> = vec![None; len];

        for (name, idx) in map {
            if idx >= len {
                return Err(FishError::ClassIndex(format!(
                    "index {} for '{}' is outside 0..{}",
                    idx, name, len
                )));
            }
            if let Some(existing) = &slots[idx] {
                return Err(FishError::ClassIndex(format!(
                    "index {} assigned to both '{}' and '{}'",
                    idx, existing, name
                )));
            }
            slots[idx] = Some(name);
        }

        // Every slot is filled: len distinct in-range indices for len keys.
        let names = slots.into_iter().flatten().collect();
        Ok(Self { names })
    }
}

impl From<ClassIndex> for BTreeMap<String, usize> {
    fn from(index: ClassIndex) -> Self {
        index.to_map()
    }
}

/// Inverse of the class index: predicted index -> species name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    names: Vec<String>,
}

impl LabelMap {
    /// Species name for a predicted index
    pub fn species(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Number of labels
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if the map is empty
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
