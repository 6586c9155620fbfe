// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision processing module for CPU-based text extraction
//!
//! This module provides:
//! - Frame loading from paths, encoded bytes or rasters
//! - OCR (Optical Character Recognition) via PaddleOCR models

pub mod image_utils;
pub mod ocr;

pub use image_utils::{decode_image_bytes, detect_format, load_image_file, ImageError, ImageSource};
