// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Scene-text OCR core
//!
//! Finds text regions in a frame, rectifies each region, optionally fixes
//! upside-down crops, and decodes the text with a greedy CTC-style decoder.
//! Inference runs through ONNX Runtime on CPU, or through any backend that
//! implements the inference traits.

pub mod config;
pub mod errors;
pub mod version;
pub mod vision;

pub use config::{DetectionConfig, OcrConfig, OrientationConfig, RecognitionConfig, RuntimeConfig};
pub use errors::{ImageError, InferenceError, InferenceStage, OcrError};
pub use vision::ocr::{OcrResult, PaddleOcrModel, RecognizedText, ResultOrder, TextRegion};
pub use vision::ImageSource;
