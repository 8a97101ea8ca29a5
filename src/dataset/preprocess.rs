//! Image preprocessing shared by training, validation and prediction
//!
//! Decode, resize to a square target, lay out as CHW and rescale to `[0, 1]`.
//! Training applies augmentation between the resize and the rescale; every
//! other consumer goes straight from [`load_resized`] to [`to_chw_unit`].

use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};

use crate::utils::error::{FishError, Result};

/// Resampling filter used for every resize
pub const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// Open and decode an image file
pub fn open_image(path: &Path) -> Result<DynamicImage> {
    ImageReader::open(path)
        .map_err(|e| FishError::image_load(path, e))?
        .with_guessed_format()
        .map_err(|e| FishError::image_load(path, e))?
        .decode()
        .map_err(|e| FishError::image_load(path, e))
}

/// Resize to `image_size x image_size`, ignoring aspect ratio
pub fn resize(image: &DynamicImage, image_size: usize) -> DynamicImage {
    image.resize_exact(image_size as u32, image_size as u32, RESIZE_FILTER)
}

/// Open, decode and resize an image file
pub fn load_resized(path: &Path, image_size: usize) -> Result<DynamicImage> {
    Ok(resize(&open_image(path)?, image_size))
}

/// Convert an image to a CHW float buffer rescaled by 1/255
pub fn to_chw_unit(image: &DynamicImage) -> Vec<f32> {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    let plane = (width * height) as usize;

    let mut data = vec![0.0f32; 3 * plane];
    for (i, pixel) in rgb.pixels().enumerate() {
        data[i] = pixel[0] as f32 / 255.0;
        data[plane + i] = pixel[1] as f32 / 255.0;
        data[2 * plane + i] = pixel[2] as f32 / 255.0;
    }

    data
}

/// Full preprocessing of an in-memory image
pub fn preprocess_image(image: &DynamicImage, image_size: usize) -> Vec<f32> {
    to_chw_unit(&resize(image, image_size))
}

/// Full preprocessing of an image file
pub fn preprocess_path(path: &Path, image_size: usize) -> Result<Vec<f32>> {
    Ok(to_chw_unit(&load_resized(path, image_size)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    #[test]
    fn test_chw_layout_and_range() {
        let img = RgbImage::from_fn(4, 2, |x, _| {
            if x == 0 {
                Rgb([255, 0, 51])
            } else {
                Rgb([0, 0, 0])
            }
        });
        let data = to_chw_unit(&DynamicImage::ImageRgb8(img));

        assert_eq!(data.len(), 3 * 4 * 2);
        assert_eq!(data[0], 1.0); // R plane, pixel (0,0)
        assert_eq!(data[8], 0.0); // G plane, pixel (0,0)
        assert!((data[16] - 0.2).abs() < 1e-6); // B plane, pixel (0,0)
        assert!(data.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_resize_is_exact() {
        let img = DynamicImage::new_rgb8(100, 40);
        let resized = resize(&img, 128);
        assert_eq!((resized.width(), resized.height()), (128, 128));
    }

    #[test]
    fn test_path_and_memory_paths_agree() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fish.png");
        let img = RgbImage::from_fn(37, 23, |x, y| Rgb([(x * 7) as u8, (y * 11) as u8, 90]));
        img.save(&path).unwrap();

        let from_path = preprocess_path(&path, 16).unwrap();
        let decoded = image::open(&path).unwrap();
        let from_memory = preprocess_image(&decoded, 16);

        assert_eq!(from_path, from_memory);
    }

    #[test]
    fn test_missing_file_is_image_load_error() {
        let err = preprocess_path(Path::new("/definitely/not/here.jpg"), 8).unwrap_err();
        assert!(matches!(err, FishError::ImageLoad { .. }));
    }

    #[test]
    fn test_undecodable_file_is_image_load_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not an image").unwrap();

        let err = preprocess_path(&path, 8).unwrap_err();
        assert!(matches!(err, FishError::ImageLoad { .. }));
    }
}
