// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! PaddleOCR integration for text extraction from frames
//!
//! Components:
//! - `preprocessing` - Detection input normalisation and crop tensors
//! - `detection` - Heatmap to text region extraction (DB post-processing)
//! - `geometry` - Rotated rectangles, polygon offset, corner ordering
//! - `rectify` - Perspective warp of regions into upright crops
//! - `classification` - Optional 0/180 degree orientation stage
//! - `recognition` - Vocabulary and greedy CTC-style decoding
//! - `inference` - Backend traits and the ONNX Runtime session
//! - `model` - Combined OCR pipeline
//! - `collector` - Distinct-text accumulation across frames

pub mod classification;
pub mod collector;
pub mod detection;
pub mod geometry;
pub mod inference;
pub mod model;
pub mod preprocessing;
pub mod recognition;
pub mod rectify;

pub use classification::{OcrOrientationModel, OrientationClassifier, TextOrientation};
pub use collector::TextCollector;
pub use detection::{OcrDetectionModel, RegionExtractor, TextRegion};
pub use inference::{DetectionInference, OnnxSession, OrientationInference, RecognitionInference};
pub use model::{OcrResult, PaddleOcrModel, RecognizedText, ResultOrder};
pub use preprocessing::{ImageNormalizer, NormalizedImage, PreprocessInfo};
pub use recognition::{CollapseRule, DecodedText, OcrRecognitionModel, SequenceDecoder, TextRecognizer, Vocabulary};
pub use rectify::{Crops, PerspectiveRectifier};
