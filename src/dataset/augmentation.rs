//! Data Augmentation Module
//!
//! On-the-fly augmentation for the training source: random rotation, random
//! zoom and random horizontal flip. The validation source and the predictor
//! never augment.
//!
//! Rotation and zoom are combined into a single affine resample around the
//! image centre. Samples that fall outside the frame take the value of the
//! nearest edge pixel.

use image::{DynamicImage, GenericImageView, ImageBuffer, Rgb, RgbImage};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Configuration for data augmentation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentationConfig {
    /// Maximum rotation angle in degrees (applies ±rotation_degrees)
    pub rotation_degrees: f32,
    /// Zoom range; per-axis factors are drawn from `[1 - zoom_range, 1 + zoom_range]`
    pub zoom_range: f32,
    /// Whether to flip horizontally with probability 0.5
    pub horizontal_flip: bool,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            rotation_degrees: 30.0,
            zoom_range: 0.2,
            horizontal_flip: true,
        }
    }
}

impl AugmentationConfig {
    /// Disable all augmentations
    pub fn none() -> Self {
        Self {
            rotation_degrees: 0.0,
            zoom_range: 0.0,
            horizontal_flip: false,
        }
    }

    /// Check if any augmentation is enabled
    pub fn is_enabled(&self) -> bool {
        self.rotation_degrees > 0.0 || self.zoom_range > 0.0 || self.horizontal_flip
    }

    /// Validate the ranges
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=180.0).contains(&self.rotation_degrees) {
            return Err("rotation_degrees must be in range [0, 180]".to_string());
        }
        if !(0.0..1.0).contains(&self.zoom_range) {
            return Err("zoom_range must be in range [0, 1)".to_string());
        }
        Ok(())
    }
}

/// Random transform drawn for one image
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    /// Rotation in degrees
    pub angle_degrees: f32,
    /// Zoom factor along x (> 1 zooms out)
    pub zoom_x: f32,
    /// Zoom factor along y (> 1 zooms out)
    pub zoom_y: f32,
    /// Mirror left-right
    pub flip: bool,
}

impl Transform {
    /// The identity transform
    pub fn identity() -> Self {
        Self {
            angle_degrees: 0.0,
            zoom_x: 1.0,
            zoom_y: 1.0,
            flip: false,
        }
    }

    fn is_affine_identity(&self) -> bool {
        self.angle_degrees.abs() < 1e-3
            && (self.zoom_x - 1.0).abs() < 1e-6
            && (self.zoom_y - 1.0).abs() < 1e-6
    }
}

/// Image augmenter that applies random transformations
#[derive(Clone, Debug)]
pub struct Augmenter {
    config: AugmentationConfig,
}

impl Augmenter {
    /// Create a new augmenter with the given configuration
    pub fn new(config: AugmentationConfig) -> Self {
        Self { config }
    }

    /// The active configuration
    pub fn config(&self) -> &AugmentationConfig {
        &self.config
    }

    /// Draw a random transform within the configured bounds
    pub fn sample(&self, rng: &mut ChaCha8Rng) -> Transform {
        let angle_degrees = if self.config.rotation_degrees > 0.0 {
            rng.gen_range(-self.config.rotation_degrees..=self.config.rotation_degrees)
        } else {
            0.0
        };

        let (zoom_x, zoom_y) = if self.config.zoom_range > 0.0 {
            let lo = 1.0 - self.config.zoom_range;
            let hi = 1.0 + self.config.zoom_range;
            (rng.gen_range(lo..=hi), rng.gen_range(lo..=hi))
        } else {
            (1.0, 1.0)
        };

        let flip = self.config.horizontal_flip && rng.gen::<f32>() < 0.5;

        Transform {
            angle_degrees,
            zoom_x,
            zoom_y,
            flip,
        }
    }

    /// Apply a random augmentation to an image
    pub fn augment(&self, img: DynamicImage, rng: &mut ChaCha8Rng) -> DynamicImage {
        let transform = self.sample(rng);
        apply(img, &transform)
    }
}

/// Apply a transform to an image, keeping its dimensions
pub fn apply(img: DynamicImage, transform: &Transform) -> DynamicImage {
    let mut result = if transform.is_affine_identity() {
        img
    } else {
        affine(&img, transform)
    };

    if transform.flip {
        result = result.fliph();
    }

    result
}

/// Resample through the inverse rotation+zoom mapping around the centre
fn affine(img: &DynamicImage, transform: &Transform) -> DynamicImage {
    let (width, height) = img.dimensions();
    let rgb = img.to_rgb8();

    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;

    let (sin_a, cos_a) = transform.angle_degrees.to_radians().sin_cos();

    let mut output = ImageBuffer::new(width, height);

    for y in 0..height {
        for x in 0..width {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;

            // Output -> input: rotate, then scale by the zoom factors
            let src_x = cx + transform.zoom_x * (dx * cos_a - dy * sin_a);
            let src_y = cy + transform.zoom_y * (dx * sin_a + dy * cos_a);

            output.put_pixel(x, y, bilinear_sample(&rgb, src_x, src_y));
        }
    }

    DynamicImage::ImageRgb8(output)
}

/// Bilinear sample with nearest-edge fill outside the frame
fn bilinear_sample(img: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let (width, height) = img.dimensions();
    let max_x = (width - 1) as f32;
    let max_y = (height - 1) as f32;

    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = img.get_pixel(x0, y0);
    let p10 = img.get_pixel(x1, y0);
    let p01 = img.get_pixel(x0, y1);
    let p11 = img.get_pixel(x1, y1);

    let mut result = [0u8; 3];
    for c in 0..3 {
        let v = p00[c] as f32 * (1.0 - fx) * (1.0 - fy)
            + p10[c] as f32 * fx * (1.0 - fy)
            + p01[c] as f32 * (1.0 - fx) * fy
            + p11[c] as f32 * fx * fy;

        result[c] = v.round().clamp(0.0, 255.0) as u8;
    }

    Rgb(result)
}
