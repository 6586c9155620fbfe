// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Text orientation classification (0 / 180 degrees)

use anyhow::Result;
use image::{imageops, RgbImage};
use ndarray::{Array1, Array4};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

use super::inference::{orientation_probabilities, OnnxSession, OrientationInference, DEFAULT_INTRA_THREADS};
use super::preprocessing::preprocess_for_orientation;
use crate::errors::{InferenceError, InferenceStage};

/// Default minimum probability for accepting the upside-down class
pub const DEFAULT_ORIENTATION_THRESHOLD: f32 = 0.9;

/// Orientation of a text crop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextOrientation {
    Deg0,
    Deg180,
}

impl TextOrientation {
    pub fn degrees(&self) -> u32 {
        match self {
            TextOrientation::Deg0 => 0,
            TextOrientation::Deg180 => 180,
        }
    }

    /// Undo the detected rotation
    pub fn correct(&self, crop: RgbImage) -> RgbImage {
        match self {
            TextOrientation::Deg0 => crop,
            TextOrientation::Deg180 => imageops::rotate180(&crop),
        }
    }
}

/// Decides whether a crop is upside down
///
/// Stateless apart from its backend and threshold.
#[derive(Clone)]
pub struct OrientationClassifier {
    backend: Arc<dyn OrientationInference>,
    threshold: f32,
}

impl std::fmt::Debug for OrientationClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrientationClassifier")
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

impl OrientationClassifier {
    pub fn new(backend: Arc<dyn OrientationInference>) -> Self {
        Self {
            backend,
            threshold: DEFAULT_ORIENTATION_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Classify a rectified crop
    pub fn classify(&self, crop: &RgbImage) -> Result<TextOrientation, InferenceError> {
        let input = preprocess_for_orientation(crop);
        let probs = self.backend.infer(&input)?;
        if probs.len() != 2 {
            return Err(InferenceError::malformed(
                InferenceStage::Orientation,
                "(2)",
                probs.shape(),
            ));
        }

        let orientation = orientation_from_probabilities(&probs, self.threshold);
        trace!("Orientation probs {:?} -> {} deg", probs.to_vec(), orientation.degrees());
        Ok(orientation)
    }

    /// Classify and rotate the crop upright if needed
    pub fn correct(&self, crop: RgbImage) -> Result<RgbImage, InferenceError> {
        let orientation = self.classify(&crop)?;
        Ok(orientation.correct(crop))
    }
}

/// 180 degrees only when it is the argmax and meets the threshold
///
/// Ties favour 0 degrees.
pub fn orientation_from_probabilities(probs: &Array1<f32>, threshold: f32) -> TextOrientation {
    let (p0, p180) = (probs[0], probs[1]);
    if p180 > p0 && p180 >= threshold {
        TextOrientation::Deg180
    } else {
        TextOrientation::Deg0
    }
}

/// PaddleOCR text direction classifier
#[derive(Clone, Debug)]
pub struct OcrOrientationModel {
    session: OnnxSession,
}

impl OcrOrientationModel {
    /// Load the orientation model from a file
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        Self::with_intra_threads(model_path, DEFAULT_INTRA_THREADS)
    }

    pub fn with_intra_threads<P: AsRef<Path>>(model_path: P, intra_threads: usize) -> Result<Self> {
        let session = OnnxSession::load(model_path.as_ref(), InferenceStage::Orientation, intra_threads)?;
        Ok(Self { session })
    }
}

impl OrientationInference for OcrOrientationModel {
    fn infer(&self, input: &Array4<f32>) -> Result<Array1<f32>, InferenceError> {
        let probs = orientation_probabilities(self.session.run(input)?)?;
        debug!("Orientation output: {:?}", probs.to_vec());
        Ok(probs)
    }
}
