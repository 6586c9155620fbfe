// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing for PaddleOCR
//!
//! - Detection: stride-aligned resize under a side limit, ImageNet normalisation
//! - Orientation / recognition: fixed-height crop resize, `(x - 127.5) / 127.5`

use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;
use tracing::debug;

/// Default cap on the longer side of the detection input
pub const DEFAULT_LIMIT_SIDE_LEN: u32 = 960;

/// Detection input sides are multiples of this stride
pub const DETECTION_STRIDE: u32 = 32;

/// Recognition / orientation model input height
pub const REC_INPUT_HEIGHT: u32 = 48;

/// Orientation classifier input width (crops are padded up to it)
pub const CLS_INPUT_WIDTH: u32 = 192;

/// Mean values for normalization (ImageNet, RGB order)
pub const MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Std values for normalization (ImageNet, RGB order)
pub const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Centre and half-range used for crop normalization
const CROP_PIXEL_CENTER: f32 = 127.5;

/// Scaling information recorded during detection preprocessing
///
/// Needed to map heatmap coordinates back onto the original frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreprocessInfo {
    /// Side-limit factor applied before stride rounding (1.0 when not downscaled)
    pub scale: f32,
    /// Width of the model input
    pub resized_width: u32,
    /// Height of the model input
    pub resized_height: u32,
    /// Original frame width
    pub original_width: u32,
    /// Original frame height
    pub original_height: u32,
}

impl PreprocessInfo {
    /// Map a point from a `map_width` x `map_height` grid back to original frame space
    pub fn map_to_original(&self, x: f32, y: f32, map_width: usize, map_height: usize) -> (f32, f32) {
        let orig_x = x / map_width as f32 * self.original_width as f32;
        let orig_y = y / map_height as f32 * self.original_height as f32;
        (orig_x, orig_y)
    }
}

/// Output of the detection preprocessing step
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    /// NCHW tensor `[1, 3, H', W']`
    pub tensor: Array4<f32>,
    /// Geometry needed to undo the resize
    pub info: PreprocessInfo,
}

/// Resizes frames to a stride-aligned size and normalises them for detection
#[derive(Debug, Clone, Copy)]
pub struct ImageNormalizer {
    limit_side_len: u32,
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT_SIDE_LEN)
    }
}

impl ImageNormalizer {
    pub fn new(limit_side_len: u32) -> Self {
        Self {
            limit_side_len: limit_side_len.max(DETECTION_STRIDE),
        }
    }

    pub fn limit_side_len(&self) -> u32 {
        self.limit_side_len
    }

    /// Compute the detection input size for a frame
    ///
    /// Returns `(width, height, scale)`.
    pub fn target_size(&self, width: u32, height: u32) -> (u32, u32, f32) {
        let limit = self.limit_side_len as f32;
        let (w, h) = (width as f32, height as f32);
        let max_side = width.max(height);

        let (obj_w, obj_h, scale) = if max_side > self.limit_side_len {
            if width > height {
                (limit, limit / w * h, limit / w)
            } else {
                (limit / h * w, limit, limit / h)
            }
        } else {
            (w, h, 1.0)
        };

        (align_to_stride(obj_w), align_to_stride(obj_h), scale)
    }

    /// Resize and normalise a frame for the detection model
    ///
    /// Steps:
    /// 1. Cap the longer side at `limit_side_len`, preserving aspect ratio
    /// 2. Round each side to the nearest multiple of 32 (minimum 32)
    /// 3. Normalize with ImageNet mean/std: (pixel/255 - mean) / std
    /// 4. Convert to NCHW tensor format [1, 3, H, W]
    pub fn normalize(&self, frame: &RgbImage) -> NormalizedImage {
        let (orig_w, orig_h) = frame.dimensions();
        let (obj_w, obj_h, scale) = self.target_size(orig_w, orig_h);

        let resized = if (obj_w, obj_h) == (orig_w, orig_h) {
            frame.clone()
        } else {
            image::imageops::resize(frame, obj_w, obj_h, FilterType::Triangle)
        };

        debug!(
            "Detection preprocess: {}x{} -> {}x{} (scale {:.4})",
            orig_w, orig_h, obj_w, obj_h, scale
        );

        let mut tensor = Array4::zeros((1, 3, obj_h as usize, obj_w as usize));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                let normalized = (pixel[c] as f32 / 255.0 - MEAN[c]) / STD[c];
                tensor[[0, c, y as usize, x as usize]] = normalized;
            }
        }

        NormalizedImage {
            tensor,
            info: PreprocessInfo {
                scale,
                resized_width: obj_w,
                resized_height: obj_h,
                original_width: orig_w,
                original_height: orig_h,
            },
        }
    }
}

/// Round half to even onto the detection stride, never below one stride
fn align_to_stride(side: f32) -> u32 {
    let stride = DETECTION_STRIDE as f32;
    let aligned = (side / stride).round_ties_even() * stride;
    (aligned as u32).max(DETECTION_STRIDE)
}

/// Preprocess a rectified crop for the orientation or recognition model
///
/// The crop is resized to `target_height`, width scaled by the same factor
/// and rounded up. With `fixed_width` the resized width is capped at that
/// value and the tensor is zero-padded on the right to exactly that width.
pub fn preprocess_crop(crop: &RgbImage, target_height: u32, fixed_width: Option<u32>) -> Array4<f32> {
    let (orig_w, orig_h) = crop.dimensions();
    let orig_w = orig_w.max(1);
    let orig_h = orig_h.max(1);

    let scale = target_height as f32 / orig_h as f32;
    let mut new_width = ((orig_w as f32 * scale).ceil() as u32).max(1);
    if let Some(max_width) = fixed_width {
        new_width = new_width.min(max_width);
    }

    // Area-style filtering when shrinking, cubic when enlarging
    let filter = if scale <= 1.0 {
        FilterType::Triangle
    } else {
        FilterType::CatmullRom
    };
    let resized = image::imageops::resize(crop, new_width, target_height, filter);

    let tensor_width = fixed_width.unwrap_or(new_width) as usize;
    let mut tensor = Array4::zeros((1, 3, target_height as usize, tensor_width));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] =
                (pixel[c] as f32 - CROP_PIXEL_CENTER) / CROP_PIXEL_CENTER;
        }
    }

    tensor
}

/// Recognition input: height 48, width follows the crop's aspect ratio
pub fn preprocess_for_recognition(crop: &RgbImage) -> Array4<f32> {
    preprocess_crop(crop, REC_INPUT_HEIGHT, None)
}

/// Orientation input: fixed `[1, 3, 48, 192]`
pub fn preprocess_for_orientation(crop: &RgbImage) -> Array4<f32> {
    preprocess_crop(crop, REC_INPUT_HEIGHT, Some(CLS_INPUT_WIDTH))
}
