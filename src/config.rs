// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Configuration for the OCR pipeline
//!
//! Values come from defaults, a TOML file, or `OCR_*` environment variables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::vision::ocr::classification::DEFAULT_ORIENTATION_THRESHOLD;
use crate::vision::ocr::detection::{
    DEFAULT_BINARIZATION_THRESHOLD, DEFAULT_BOX_SCORE_THRESHOLD, DEFAULT_EXPANSION_RATIO,
    DEFAULT_MAX_CANDIDATES, DEFAULT_MIN_SIZE,
};
use crate::vision::ocr::inference::DEFAULT_INTRA_THREADS;
use crate::vision::ocr::model::ResultOrder;
use crate::vision::ocr::preprocessing::DEFAULT_LIMIT_SIDE_LEN;
use crate::vision::ocr::recognition::CollapseRule;

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub detection: DetectionConfig,
    pub orientation: OrientationConfig,
    pub recognition: RecognitionConfig,
    pub runtime: RuntimeConfig,
    /// Order of the returned regions
    pub result_order: ResultOrder,
}

/// Detection model and region extraction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Path to the detection ONNX model
    pub model_path: PathBuf,
    /// Longer side cap for the detection input
    pub limit_side_len: u32,
    /// Heatmap values above this are text pixels
    pub binarization_threshold: f32,
    /// Minimum mean heatmap score of a region
    pub box_score_threshold: f32,
    /// Minimum short side of a region (heatmap pixels)
    pub min_size: f32,
    /// Contours examined per frame
    pub max_candidates: usize,
    /// Unclip ratio for region expansion
    pub expansion_ratio: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/paddleocr/det_model.onnx"),
            limit_side_len: DEFAULT_LIMIT_SIDE_LEN,
            binarization_threshold: DEFAULT_BINARIZATION_THRESHOLD,
            box_score_threshold: DEFAULT_BOX_SCORE_THRESHOLD,
            min_size: DEFAULT_MIN_SIZE,
            max_candidates: DEFAULT_MAX_CANDIDATES,
            expansion_ratio: DEFAULT_EXPANSION_RATIO,
        }
    }
}

/// Optional orientation stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrientationConfig {
    pub enabled: bool,
    /// Minimum probability to accept the 180 degree class
    pub threshold: f32,
    pub model_path: Option<PathBuf>,
}

impl Default for OrientationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: DEFAULT_ORIENTATION_THRESHOLD,
            model_path: None,
        }
    }
}

/// Recognition model and decoding settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    pub model_path: PathBuf,
    /// Character dictionary paired with the model
    pub vocabulary_path: PathBuf,
    pub collapse: CollapseRule,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/paddleocr/rec_model.onnx"),
            vocabulary_path: PathBuf::from("models/paddleocr/ppocr_keys.txt"),
            collapse: CollapseRule::default(),
        }
    }
}

/// ONNX Runtime execution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Intra-op threads per session
    pub intra_threads: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            intra_threads: DEFAULT_INTRA_THREADS,
        }
    }
}

impl OcrConfig {
    /// Load configuration from a TOML file
    ///
    /// Missing keys fall back to their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read OCR config: {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: OcrConfig = toml::from_str(content).context("Failed to parse OCR config")?;
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by `OCR_*` variables from `lookup`
    ///
    /// Unparsable values are ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("OCR_DET_MODEL_PATH") {
            config.detection.model_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("OCR_REC_MODEL_PATH") {
            config.recognition.model_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("OCR_VOCAB_PATH") {
            config.recognition.vocabulary_path = PathBuf::from(path);
        }
        // A classifier model path switches the orientation stage on
        if let Some(path) = lookup("OCR_CLS_MODEL_PATH").filter(|p| !p.is_empty()) {
            config.orientation.model_path = Some(PathBuf::from(path));
            config.orientation.enabled = true;
        }

        config.detection.limit_side_len = lookup("OCR_LIMIT_SIDE_LEN")
            .and_then(|v| v.parse().ok())
            .unwrap_or(config.detection.limit_side_len);
        config.detection.binarization_threshold = lookup("OCR_DET_THRESHOLD")
            .and_then(|v| v.parse().ok())
            .unwrap_or(config.detection.binarization_threshold);
        config.detection.box_score_threshold = lookup("OCR_BOX_THRESHOLD")
            .and_then(|v| v.parse().ok())
            .unwrap_or(config.detection.box_score_threshold);
        config.orientation.threshold = lookup("OCR_CLS_THRESHOLD")
            .and_then(|v| v.parse().ok())
            .unwrap_or(config.orientation.threshold);
        config.runtime.intra_threads = lookup("OCR_INTRA_THREADS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(config.runtime.intra_threads);

        config
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        let unit = |name: &str, value: f32| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(format!("{} must be within [0, 1], got {}", name, value))
            }
        };

        unit("Binarization threshold", self.detection.binarization_threshold)?;
        unit("Box score threshold", self.detection.box_score_threshold)?;
        unit("Orientation threshold", self.orientation.threshold)?;

        if self.detection.limit_side_len == 0 {
            return Err("Side length limit must be greater than 0".to_string());
        }
        if self.detection.max_candidates == 0 {
            return Err("Max candidates must be greater than 0".to_string());
        }
        if self.detection.min_size < 0.0 {
            return Err("Minimum region size must not be negative".to_string());
        }
        if self.detection.expansion_ratio < 0.0 {
            return Err("Expansion ratio must not be negative".to_string());
        }
        if self.runtime.intra_threads == 0 {
            return Err("Intra-op threads must be greater than 0".to_string());
        }
        if self.orientation.enabled && self.orientation.model_path.is_none() {
            return Err("Orientation stage enabled without a model path".to_string());
        }
        Ok(())
    }
}
