//! ImageNet weights for the MobileNetV2 backbone
//!
//! The torchvision checkpoint is fetched once into a cache directory (or read
//! from a local file) and imported through `burn-import`'s PyTorch recorder.
//! torchvision's `features.N...` keys are remapped onto [`MobileNetV2`] field
//! names.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::record::{FullPrecisionSettings, Recorder};
use burn::tensor::backend::Backend;
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use super::mobilenet::{MobileNetV2, MobileNetV2Record, INVERTED_RESIDUAL_SETTINGS};
use crate::utils::error::{FishError, Result};

/// torchvision MobileNetV2 ImageNet-1k checkpoint
pub const IMAGENET_WEIGHTS_URL: &str =
    "https://download.pytorch.org/models/mobilenet_v2-b0353104.pth";

/// Where the pretrained backbone weights come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeightsSource {
    /// Download `url` into `cache_dir` unless it is already there
    Download { url: String, cache_dir: PathBuf },
    /// Use a checkpoint already on disk
    File(PathBuf),
}

impl WeightsSource {
    /// ImageNet weights cached under `cache_dir`
    pub fn imagenet(cache_dir: impl Into<PathBuf>) -> Self {
        Self::Download {
            url: IMAGENET_WEIGHTS_URL.to_string(),
            cache_dir: cache_dir.into(),
        }
    }

    /// Path of a local checkpoint, downloading it first if needed
    pub fn resolve(&self) -> Result<PathBuf> {
        match self {
            Self::File(path) => {
                if path.is_file() {
                    Ok(path.clone())
                } else {
                    Err(FishError::PretrainedWeights(format!(
                        "weights file {} does not exist",
                        path.display()
                    )))
                }
            }
            Self::Download { url, cache_dir } => {
                let file_name = url
                    .rsplit('/')
                    .next()
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| {
                        FishError::PretrainedWeights(format!("cannot derive file name from {url}"))
                    })?;
                let target = cache_dir.join(file_name);

                if target.is_file() {
                    debug!("Using cached weights at {:?}", target);
                    return Ok(target);
                }

                download(url, &target)?;
                Ok(target)
            }
        }
    }
}

/// Stream a URL to disk with a progress bar
fn download(url: &str, target: &Path) -> Result<()> {
    info!("Downloading pretrained weights from {}", url);

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| FishError::PretrainedWeights(format!("failed to download {url}: {e}")))?;

    let pb = match response.content_length() {
        Some(len) => {
            let pb = ProgressBar::new(len);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("  {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb
        }
        None => ProgressBar::new_spinner(),
    };

    // Write to a temporary name so an interrupted download is never reused
    let partial = target.with_extension("part");
    let result = (|| -> io::Result<()> {
        let mut reader = pb.wrap_read(response);
        let mut writer = BufWriter::new(File::create(&partial)?);
        io::copy(&mut reader, &mut writer)?;
        writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;
        std::fs::rename(&partial, target)
    })();
    pb.finish_and_clear();

    result.map_err(|e| {
        let _ = std::fs::remove_file(&partial);
        FishError::PretrainedWeights(format!("failed to save {}: {e}", target.display()))
    })?;

    info!("Saved pretrained weights to {:?}", target);
    Ok(())
}

/// Key remappings from torchvision names to [`MobileNetV2`] field names
pub fn torchvision_key_remaps() -> Vec<(String, String)> {
    let mut remaps = vec![
        (r"^features\.0\.0\.(.+)$".to_string(), "stem.conv.$1".to_string()),
        (r"^features\.0\.1\.(.+)$".to_string(), "stem.norm.$1".to_string()),
    ];

    let num_blocks: usize = INVERTED_RESIDUAL_SETTINGS.iter().map(|s| s.2).sum();
    for block in 0..num_blocks {
        let feature = block + 1;
        let expands = block_expansion(block) != 1;

        // torchvision numbers the layers inside `conv` sequentially, so the
        // indices shift by one when the expansion layer is present.
        let offset = usize::from(expands);
        if expands {
            remaps.push((
                format!(r"^features\.{feature}\.conv\.0\.0\.(.+)$"),
                format!("blocks.{block}.expand.conv.$1"),
            ));
            remaps.push((
                format!(r"^features\.{feature}\.conv\.0\.1\.(.+)$"),
                format!("blocks.{block}.expand.norm.$1"),
            ));
        }
        remaps.push((
            format!(r"^features\.{feature}\.conv\.{offset}\.0\.(.+)$"),
            format!("blocks.{block}.depthwise.conv.$1"),
        ));
        remaps.push((
            format!(r"^features\.{feature}\.conv\.{offset}\.1\.(.+)$"),
            format!("blocks.{block}.depthwise.norm.$1"),
        ));
        remaps.push((
            format!(r"^features\.{feature}\.conv\.{}\.(.+)$", offset + 1),
            format!("blocks.{block}.project.$1"),
        ));
        remaps.push((
            format!(r"^features\.{feature}\.conv\.{}\.(.+)$", offset + 2),
            format!("blocks.{block}.project_norm.$1"),
        ));
    }

    let head = num_blocks + 1;
    remaps.push((format!(r"^features\.{head}\.0\.(.+)$"), "head.conv.$1".to_string()));
    remaps.push((format!(r"^features\.{head}\.1\.(.+)$"), "head.norm.$1".to_string()));

    remaps
}

/// Expansion factor of the `block`-th inverted residual block
fn block_expansion(block: usize) -> usize {
    let mut remaining = block;
    for (expansion, _, repeats, _) in INVERTED_RESIDUAL_SETTINGS {
        if remaining < repeats {
            return expansion;
        }
        remaining -= repeats;
    }
    0
}

/// Build a backbone with ImageNet weights
///
/// Any failure to obtain or decode the checkpoint is fatal.
pub fn load_pretrained<B: Backend>(
    source: &WeightsSource,
    device: &B::Device,
) -> Result<MobileNetV2<B>> {
    let path = source.resolve()?;
    info!("Loading MobileNetV2 ImageNet weights from {:?}", path);

    let mut args = LoadArgs::new(path.clone());
    for (pattern, replacement) in torchvision_key_remaps() {
        args = args.with_key_remap(&pattern, &replacement);
    }

    let record: MobileNetV2Record<B> = PyTorchFileRecorder::<FullPrecisionSettings>::default()
        .load(args, device)
        .map_err(|e| {
            FishError::PretrainedWeights(format!("cannot decode {}: {e}", path.display()))
        })?;

    Ok(MobileNetV2::new(device).load_record(record))
}

#[cfg(test)]
mod tests {
    use super::*;

    use regex::Regex;

    /// Apply every remap in order, as the PyTorch recorder does for each key
    fn remap(key: &str) -> String {
        torchvision_key_remaps()
            .iter()
            .fold(key.to_string(), |name, (pattern, replacement)| {
                Regex::new(pattern)
                    .unwrap()
                    .replace_all(&name, replacement.as_str())
                    .into_owned()
            })
    }

    #[test]
    fn test_all_patterns_compile() {
        for (pattern, _) in torchvision_key_remaps() {
            assert!(Regex::new(&pattern).is_ok(), "bad pattern {pattern}");
        }
    }

    #[test]
    fn test_stem_and_head_remaps() {
        assert_eq!(remap("features.0.0.weight"), "stem.conv.weight");
        assert_eq!(remap("features.0.1.running_var"), "stem.norm.running_var");
        assert_eq!(remap("features.18.0.weight"), "head.conv.weight");
        assert_eq!(remap("features.18.1.bias"), "head.norm.bias");
    }

    #[test]
    fn test_first_block_has_no_expansion() {
        assert_eq!(
            remap("features.1.conv.0.0.weight"),
            "blocks.0.depthwise.conv.weight"
        );
        assert_eq!(remap("features.1.conv.1.weight"), "blocks.0.project.weight");
        assert_eq!(
            remap("features.1.conv.2.weight"),
            "blocks.0.project_norm.weight"
        );
    }

    #[test]
    fn test_expanded_block_remaps() {
        assert_eq!(
            remap("features.2.conv.0.0.weight"),
            "blocks.1.expand.conv.weight"
        );
        assert_eq!(
            remap("features.17.conv.1.1.running_mean"),
            "blocks.16.depthwise.norm.running_mean"
        );
        assert_eq!(remap("features.17.conv.2.weight"), "blocks.16.project.weight");
        assert_eq!(
            remap("features.17.conv.3.bias"),
            "blocks.16.project_norm.bias"
        );
    }

    #[test]
    fn test_classifier_keys_are_not_remapped() {
        assert_eq!(remap("classifier.1.weight"), "classifier.1.weight");
    }

    #[test]
    fn test_missing_weights_file_is_fatal() {
        let source = WeightsSource::File(PathBuf::from("/no/such/mobilenet.pth"));
        assert!(matches!(source.resolve(), Err(FishError::PretrainedWeights(_))));
    }

    #[test]
    fn test_cached_download_is_reused() {
        let dir = tempfile::TempDir::new().unwrap();
        let cached = dir.path().join("mobilenet_v2-b0353104.pth");
        std::fs::write(&cached, b"cached").unwrap();

        let source = WeightsSource::imagenet(dir.path());
        assert_eq!(source.resolve().unwrap(), cached);
    }
}
