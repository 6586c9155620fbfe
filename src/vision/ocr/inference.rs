// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Inference backends for the three PaddleOCR networks
//!
//! The pipeline only talks to the traits in this module. Production code
//! plugs in ONNX Runtime sessions; tests plug in deterministic stubs.
//!
//! Boundary shapes:
//! - detection: `[1, 3, H, W]` in, `(H, W)` probability map out
//! - orientation: `[1, 3, 48, 192]` in, two class probabilities out
//! - recognition: `[1, 3, 48, W]` in, `(T, C)` per-step class probabilities out

use anyhow::{Context, Result};
use ndarray::{Array, Array1, Array2, Array4, ArrayD, Axis, Dimension};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, trace};

use crate::errors::{InferenceError, InferenceStage};

/// Default number of intra-op threads per session
pub const DEFAULT_INTRA_THREADS: usize = 4;

/// Text-probability inference over a normalised frame
pub trait DetectionInference: Send + Sync {
    /// Returns a heatmap with values in `[0, 1]`
    fn infer(&self, input: &Array4<f32>) -> Result<Array2<f32>, InferenceError>;
}

/// Two-way (0 / 180 degree) orientation inference over a crop
pub trait OrientationInference: Send + Sync {
    /// Returns `[p(0), p(180)]`
    fn infer(&self, input: &Array4<f32>) -> Result<Array1<f32>, InferenceError>;
}

/// Per-timestep character-class inference over a crop
pub trait RecognitionInference: Send + Sync {
    /// Returns a `(T, C)` matrix, class 0 being blank
    fn infer(&self, input: &Array4<f32>) -> Result<Array2<f32>, InferenceError>;
}

/// Thread-safe ONNX Runtime session running on CPU
#[derive(Clone)]
pub struct OnnxSession {
    session: Arc<Mutex<Session>>,
    input_name: String,
    stage: InferenceStage,
}

impl std::fmt::Debug for OnnxSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxSession")
            .field("input_name", &self.input_name)
            .field("stage", &self.stage)
            .finish_non_exhaustive()
    }
}

impl OnnxSession {
    /// Load a model file into a CPU session
    ///
    /// # Errors
    /// Returns error if:
    /// - Model file not found
    /// - ONNX Runtime initialization fails
    pub fn load(model_path: &Path, stage: InferenceStage, intra_threads: usize) -> Result<Self> {
        if !model_path.exists() {
            anyhow::bail!("OCR {} model not found: {}", stage, model_path.display());
        }

        info!("Loading OCR {} model from {}", stage, model_path.display());

        let session = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(intra_threads.max(1))
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .context(format!(
                "Failed to load OCR {} model from {}",
                stage,
                model_path.display()
            ))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "x".to_string());

        if let Some(input) = session.inputs.first() {
            debug!("{} model input {}: {:?}", stage, input_name, input.input_type);
        }

        info!("✅ OCR {} model loaded (CPU, {} threads)", stage, intra_threads);

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            stage,
        })
    }

    pub fn stage(&self) -> InferenceStage {
        self.stage
    }

    /// Run the session on a single NCHW tensor and return the first output
    pub fn run(&self, input: &Array4<f32>) -> Result<ArrayD<f32>, InferenceError> {
        let stage = self.stage;

        let mut session = self
            .session
            .lock()
            .map_err(|_| InferenceError::backend(stage, "session lock poisoned"))?;

        let input_value = Value::from_array(input.to_owned())
            .map_err(|e| InferenceError::backend(stage, format!("failed to create input tensor: {}", e)))?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .map_err(|e| InferenceError::backend(stage, e))?;

        let output = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| InferenceError::backend(stage, format!("failed to extract output tensor: {}", e)))?
            .to_owned();

        trace!("{} output shape: {:?}", stage, output.shape());
        Ok(output)
    }
}

/// Drop leading singleton axes until the array has `D`'s rank
///
/// `(1, 1, H, W)`, `(1, H, W)` and `(H, W)` all reduce to `(H, W)`. Any
/// other shape, or a result with a zero-length axis, is reported as malformed.
pub fn squeeze_leading<D: Dimension>(
    output: ArrayD<f32>,
    stage: InferenceStage,
    expected: &'static str,
) -> Result<Array<f32, D>, InferenceError> {
    let original_shape = output.shape().to_vec();
    let target_rank = D::NDIM.unwrap_or(output.ndim());

    let mut output = output;
    while output.ndim() > target_rank && output.shape()[0] == 1 {
        output = output.index_axis_move(Axis(0), 0);
    }

    let output = output
        .into_dimensionality::<D>()
        .map_err(|_| InferenceError::malformed(stage, expected, &original_shape))?;

    if output.is_empty() {
        return Err(InferenceError::malformed(stage, expected, &original_shape));
    }
    Ok(output)
}

/// Reduce a detection output to an `(H, W)` heatmap
pub fn detection_heatmap(output: ArrayD<f32>) -> Result<Array2<f32>, InferenceError> {
    squeeze_leading(output, InferenceStage::Detection, "(1, 1, H, W), (1, H, W) or (H, W)")
}

/// Reduce an orientation output to its two class probabilities
pub fn orientation_probabilities(output: ArrayD<f32>) -> Result<Array1<f32>, InferenceError> {
    let shape = output.shape().to_vec();
    let probs: Array1<f32> = squeeze_leading(output, InferenceStage::Orientation, "(1, 2) or (2)")?;
    if probs.len() != 2 {
        return Err(InferenceError::malformed(
            InferenceStage::Orientation,
            "(1, 2) or (2)",
            &shape,
        ));
    }
    Ok(probs)
}

/// Reduce a recognition output to a `(T, C)` matrix
pub fn recognition_matrix(output: ArrayD<f32>) -> Result<Array2<f32>, InferenceError> {
    squeeze_leading(output, InferenceStage::Recognition, "(1, T, C) or (T, C)")
}
