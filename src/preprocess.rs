//! Leaf-image preprocessing into normalized model input tensors.
//!
//! The cascade core consumes the CHW tensor this module produces and never
//! touches raw image bytes. Resize target and normalization statistics must
//! match what the classifiers were trained with.

use crate::models::inference::{INPUT_CHANNELS, INPUT_HEIGHT, INPUT_WIDTH};
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array3;

/// Per-channel means of the training distribution (ImageNet).
pub const NORMALIZE_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// Per-channel standard deviations of the training distribution (ImageNet).
pub const NORMALIZE_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Decodes image payloads and converts them into normalized CHW tensors.
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Decode raw image bytes (PNG, JPEG, ...) and normalize.
    pub fn from_bytes(&self, bytes: &[u8]) -> Result<Array3<f32>> {
        let image = image::load_from_memory(bytes).context("Failed to decode image")?;
        Ok(self.normalize(&image))
    }

    /// Decode a base64 image payload and normalize. A `data:` URL prefix is
    /// stripped when present.
    pub fn from_base64(&self, data: &str) -> Result<Array3<f32>> {
        let encoded = match data.split_once(',') {
            Some((prefix, rest)) if prefix.starts_with("data:") => rest,
            _ => data,
        };
        let bytes = BASE64
            .decode(encoded.trim())
            .context("Failed to decode base64 image payload")?;
        self.from_bytes(&bytes)
    }

    /// Resize to the fixed model input size and normalize each channel,
    /// producing a CHW tensor.
    fn normalize(&self, image: &DynamicImage) -> Array3<f32> {
        // Bilinear resize, matching the training-time transform.
        let resized = image
            .resize_exact(INPUT_WIDTH as u32, INPUT_HEIGHT as u32, FilterType::Triangle)
            .to_rgb8();

        let mut tensor = Array3::<f32>::zeros((INPUT_CHANNELS, INPUT_HEIGHT, INPUT_WIDTH));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..INPUT_CHANNELS {
                let value = pixel[c] as f32 / 255.0;
                tensor[[c, y as usize, x as usize]] =
                    (value - NORMALIZE_MEAN[c]) / NORMALIZE_STD[c];
            }
        }
        tensor
    }
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new()
    }
}
