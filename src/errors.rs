// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for the OCR pipeline
//!
//! A pipeline call fails for one of two reasons:
//! - the input could not be turned into a raster (`InvalidImage`)
//! - an external inference call failed or produced malformed output (`Inference`)
//!
//! Rejected candidate regions and empty decodes are not errors; they are
//! simply absent from the result list.

use std::fmt;
use thiserror::Error;

pub use crate::vision::image_utils::ImageError;

/// The external inference stage an error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceStage {
    Detection,
    Orientation,
    Recognition,
}

impl fmt::Display for InferenceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InferenceStage::Detection => "detection",
            InferenceStage::Orientation => "orientation",
            InferenceStage::Recognition => "recognition",
        };
        f.write_str(name)
    }
}

/// Failure of an external inference call
#[derive(Debug, Error)]
pub enum InferenceError {
    /// The runtime itself raised (session poisoned, run failed, bad input tensor)
    #[error("{stage} inference failed: {message}")]
    Backend {
        stage: InferenceStage,
        message: String,
    },

    /// The output tensor does not have the boundary shape
    #[error("{stage} inference returned malformed output: expected {expected}, got shape {actual:?}")]
    MalformedOutput {
        stage: InferenceStage,
        expected: &'static str,
        actual: Vec<usize>,
    },

    /// Recognition class count does not pair with the loaded vocabulary
    #[error("recognition output has {classes} classes but vocabulary expects {} (blank + {vocabulary})", .vocabulary + 1)]
    ClassCountMismatch { classes: usize, vocabulary: usize },
}

impl InferenceError {
    /// Wrap a runtime error message for the given stage
    pub fn backend(stage: InferenceStage, message: impl fmt::Display) -> Self {
        InferenceError::Backend {
            stage,
            message: message.to_string(),
        }
    }

    /// Build a malformed-output error from an offending shape
    pub fn malformed(stage: InferenceStage, expected: &'static str, actual: &[usize]) -> Self {
        InferenceError::MalformedOutput {
            stage,
            expected,
            actual: actual.to_vec(),
        }
    }
}

/// Top-level error returned by a pipeline call
#[derive(Debug, Error)]
pub enum OcrError {
    /// Input could not be decoded into a raster
    #[error("Invalid image: {0}")]
    InvalidImage(#[from] ImageError),

    /// An external inference call failed
    #[error(transparent)]
    Inference(#[from] InferenceError),

    /// Vocabulary could not be loaded or is empty
    #[error("Invalid vocabulary: {0}")]
    Vocabulary(String),

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    Config(String),
}
