// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Frame loading for the OCR pipeline
//!
//! A frame can arrive as a file path, an encoded byte buffer, or an
//! already-decoded raster. All three are normalised to an 8-bit RGB image.

use image::{DynamicImage, ImageFormat, RgbImage};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Maximum encoded image size (10MB)
const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

/// Errors raised while turning an input into a raster
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Image file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read image file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image data is too large: {0} bytes (max: {1} bytes)")]
    TooLarge(usize, usize),

    #[error("Unsupported image format")]
    UnsupportedFormat,

    #[error("Failed to decode image: {0}")]
    DecodeFailed(String),

    #[error("Image data is empty")]
    EmptyData,

    #[error("Image raster has zero width or height")]
    EmptyRaster,
}

/// An input frame in any of the accepted representations
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Path to an encoded image on disk
    Path(PathBuf),
    /// Encoded image bytes (PNG, JPEG, WebP, GIF, BMP, TIFF)
    Bytes(Vec<u8>),
    /// Already decoded raster (grayscale and RGBA are converted to RGB)
    Raster(DynamicImage),
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        ImageSource::Path(path)
    }
}

impl From<&Path> for ImageSource {
    fn from(path: &Path) -> Self {
        ImageSource::Path(path.to_path_buf())
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        ImageSource::Bytes(bytes)
    }
}

impl From<DynamicImage> for ImageSource {
    fn from(image: DynamicImage) -> Self {
        ImageSource::Raster(image)
    }
}

impl From<RgbImage> for ImageSource {
    fn from(image: RgbImage) -> Self {
        ImageSource::Raster(DynamicImage::ImageRgb8(image))
    }
}

impl ImageSource {
    /// Decode the source into an RGB frame
    pub fn load(&self) -> Result<RgbImage, ImageError> {
        let image = match self {
            ImageSource::Path(path) => load_image_file(path)?,
            ImageSource::Bytes(bytes) => decode_image_bytes(bytes)?,
            ImageSource::Raster(image) => image.clone(),
        };

        if image.width() == 0 || image.height() == 0 {
            return Err(ImageError::EmptyRaster);
        }

        Ok(image.to_rgb8())
    }
}

/// Read and decode an image file
pub fn load_image_file(path: &Path) -> Result<DynamicImage, ImageError> {
    if !path.exists() {
        return Err(ImageError::NotFound(path.to_path_buf()));
    }

    let bytes = std::fs::read(path)?;
    debug!("Read {} bytes from {}", bytes.len(), path.display());
    decode_image_bytes(&bytes)
}

/// Decode raw encoded image bytes
pub fn decode_image_bytes(bytes: &[u8]) -> Result<DynamicImage, ImageError> {
    if bytes.len() > MAX_IMAGE_SIZE {
        return Err(ImageError::TooLarge(bytes.len(), MAX_IMAGE_SIZE));
    }

    if bytes.is_empty() {
        return Err(ImageError::EmptyData);
    }

    let format = detect_format(bytes)?;

    image::load_from_memory_with_format(bytes, format)
        .map_err(|e| ImageError::DecodeFailed(e.to_string()))
}

/// Detect image format from magic bytes
pub fn detect_format(bytes: &[u8]) -> Result<ImageFormat, ImageError> {
    if bytes.len() < 4 {
        return Err(ImageError::UnsupportedFormat);
    }

    match bytes {
        // PNG: 89 50 4E 47 (0x89 P N G)
        [0x89, 0x50, 0x4E, 0x47, ..] => Ok(ImageFormat::Png),

        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Ok(ImageFormat::Jpeg),

        // WebP: RIFF .... WEBP
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Ok(ImageFormat::WebP),

        // GIF: GIF87a or GIF89a
        [0x47, 0x49, 0x46, 0x38, x, ..] if *x == 0x37 || *x == 0x39 => Ok(ImageFormat::Gif),

        // BMP: BM
        [0x42, 0x4D, ..] => Ok(ImageFormat::Bmp),

        // TIFF: II (little-endian) or MM (big-endian)
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => Ok(ImageFormat::Tiff),

        _ => Err(ImageError::UnsupportedFormat),
    }
}
