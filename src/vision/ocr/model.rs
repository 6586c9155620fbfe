// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! PaddleOCR pipeline: detection, rectification, orientation and recognition
//!
//! One call processes one frame synchronously. The only state shared between
//! calls is the loaded backends and the vocabulary, none of which change
//! after construction.

use anyhow::{Context, Result};
use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace};

use super::classification::{OcrOrientationModel, OrientationClassifier};
use super::detection::{OcrDetectionModel, RegionExtractor, TextRegion};
use super::inference::{DetectionInference, OrientationInference, RecognitionInference};
use super::preprocessing::ImageNormalizer;
use super::rectify::PerspectiveRectifier;
use super::recognition::{CollapseRule, OcrRecognitionModel, SequenceDecoder, TextRecognizer, Vocabulary};
use crate::config::OcrConfig;
use crate::errors::OcrError;
use crate::version;
use crate::vision::image_utils::ImageSource;

/// Order of the regions returned for a frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultOrder {
    /// Last recognised region first
    #[default]
    Reversed,
    /// Contour discovery order
    Discovery,
}

/// A text region with its recognised content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedText {
    /// Detected region in original-frame coordinates
    pub region: TextRegion,
    /// Decoded text, never empty
    pub content: String,
    /// Mean argmax probability of the decoded characters
    pub confidence: f32,
}

/// Result of OCR processing
#[derive(Debug, Clone)]
pub struct OcrResult {
    /// Full extracted text (region contents joined by newlines)
    pub text: String,
    /// Average region confidence
    pub confidence: f32,
    /// Individual regions, in pipeline output order
    pub regions: Vec<RecognizedText>,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

impl OcrResult {
    pub fn from_regions(regions: Vec<RecognizedText>, processing_time_ms: u64) -> Self {
        let text = regions
            .iter()
            .map(|r| r.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let confidence = if regions.is_empty() {
            0.0
        } else {
            regions.iter().map(|r| r.confidence).sum::<f32>() / regions.len() as f32
        };

        Self {
            text,
            confidence,
            regions,
            processing_time_ms,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// PaddleOCR model for text extraction
///
/// Combines text detection, an optional orientation classifier and text
/// recognition for end-to-end OCR.
#[derive(Clone)]
pub struct PaddleOcrModel {
    normalizer: ImageNormalizer,
    detector: Arc<dyn DetectionInference>,
    extractor: RegionExtractor,
    rectifier: PerspectiveRectifier,
    classifier: Option<OrientationClassifier>,
    recognizer: TextRecognizer,
    result_order: ResultOrder,
}

impl std::fmt::Debug for PaddleOcrModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaddleOcrModel")
            .field("normalizer", &self.normalizer)
            .field("extractor", &self.extractor)
            .field("classifier", &self.classifier)
            .field("recognizer", &self.recognizer)
            .field("result_order", &self.result_order)
            .finish_non_exhaustive()
    }
}

impl PaddleOcrModel {
    /// Assemble a pipeline from inference backends and a vocabulary
    ///
    /// Starts with default thresholds and no orientation stage.
    pub fn new(
        detector: Arc<dyn DetectionInference>,
        recognizer: Arc<dyn RecognitionInference>,
        vocabulary: Arc<Vocabulary>,
    ) -> Self {
        Self {
            normalizer: ImageNormalizer::default(),
            detector,
            extractor: RegionExtractor::default(),
            rectifier: PerspectiveRectifier::default(),
            classifier: None,
            recognizer: TextRecognizer::new(recognizer, SequenceDecoder::new(vocabulary)),
            result_order: ResultOrder::default(),
        }
    }

    /// Load every model named in the configuration
    ///
    /// The orientation model is loaded only when the stage is enabled.
    pub fn from_config(config: &OcrConfig) -> Result<Self> {
        config.validate().map_err(OcrError::Config)?;
        info!("Initialising {}", version::get_version_string());

        let threads = config.runtime.intra_threads;
        let detector = OcrDetectionModel::with_intra_threads(&config.detection.model_path, threads)?;
        let recognizer =
            OcrRecognitionModel::with_intra_threads(&config.recognition.model_path, threads)?;
        let vocabulary = Vocabulary::from_file(&config.recognition.vocabulary_path)?;

        let mut model = Self::new(Arc::new(detector), Arc::new(recognizer), Arc::new(vocabulary))
            .with_normalizer(ImageNormalizer::new(config.detection.limit_side_len))
            .with_region_extractor(RegionExtractor::from(&config.detection))
            .with_collapse_rule(config.recognition.collapse)
            .with_result_order(config.result_order);

        if config.orientation.enabled {
            let path = config
                .orientation
                .model_path
                .as_ref()
                .context("Orientation stage enabled without a model path")?;
            let backend = OcrOrientationModel::with_intra_threads(path, threads)?;
            model = model.with_orientation(
                OrientationClassifier::new(Arc::new(backend))
                    .with_threshold(config.orientation.threshold),
            );
        }

        info!(
            "✅ OCR pipeline ready (orientation: {})",
            if model.has_orientation() { "on" } else { "off" }
        );
        Ok(model)
    }

    /// Enable the orientation stage
    pub fn with_orientation(mut self, classifier: OrientationClassifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Enable the orientation stage from a raw backend with the default threshold
    pub fn with_orientation_backend(self, backend: Arc<dyn OrientationInference>) -> Self {
        self.with_orientation(OrientationClassifier::new(backend))
    }

    pub fn without_orientation(mut self) -> Self {
        self.classifier = None;
        self
    }

    pub fn with_normalizer(mut self, normalizer: ImageNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_region_extractor(mut self, extractor: RegionExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_rectifier(mut self, rectifier: PerspectiveRectifier) -> Self {
        self.rectifier = rectifier;
        self
    }

    pub fn with_collapse_rule(mut self, collapse: CollapseRule) -> Self {
        let decoder = self.recognizer.decoder().clone().with_collapse_rule(collapse);
        self.recognizer = TextRecognizer::new(self.recognizer.backend(), decoder);
        self
    }

    pub fn with_result_order(mut self, order: ResultOrder) -> Self {
        self.result_order = order;
        self
    }

    pub fn has_orientation(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn result_order(&self) -> ResultOrder {
        self.result_order
    }

    /// Detect text regions without recognising them
    pub fn detect(&self, frame: &RgbImage) -> Result<Vec<TextRegion>, OcrError> {
        let normalized = self.normalizer.normalize(frame);
        let heatmap = self.detector.infer(&normalized.tensor)?;
        Ok(self.extractor.extract(&heatmap, &normalized.info))
    }

    /// Recognise all text in a frame
    ///
    /// Regions whose decoded text is empty are dropped. Any inference failure
    /// aborts the whole frame.
    pub fn recognize(&self, frame: &RgbImage) -> Result<Vec<RecognizedText>, OcrError> {
        let regions = self.detect(frame)?;
        debug!("Recognising {} regions", regions.len());

        let mut results = Vec::with_capacity(regions.len());
        for (region, crop) in regions.iter().zip(self.rectifier.crops(frame, &regions)) {
            let crop = match &self.classifier {
                Some(classifier) => classifier.correct(crop)?,
                None => crop,
            };

            let decoded = self.recognizer.recognize(&crop)?;
            if decoded.is_empty() {
                trace!("Dropping region at {:?}: empty decode", region.center);
                continue;
            }

            results.push(RecognizedText {
                region: *region,
                content: decoded.text,
                confidence: decoded.confidence,
            });
        }

        if self.result_order == ResultOrder::Reversed {
            results.reverse();
        }

        Ok(results)
    }

    /// Recognise all text in a frame given as a path, encoded bytes or raster
    pub fn recognize_source<S: Into<ImageSource>>(&self, source: S) -> Result<Vec<RecognizedText>, OcrError> {
        let frame = source.into().load()?;
        self.recognize(&frame)
    }

    /// Process an image and extract text with timing
    pub fn process(&self, image: &DynamicImage) -> Result<OcrResult, OcrError> {
        let start = Instant::now();
        let frame = ImageSource::from(image.clone()).load()?;
        let regions = self.recognize(&frame)?;
        let result = OcrResult::from_regions(regions, start.elapsed().as_millis() as u64);

        info!(
            "OCR processed {}x{} frame: {} regions in {}ms",
            frame.width(),
            frame.height(),
            result.regions.len(),
            result.processing_time_ms
        );
        Ok(result)
    }
}
