// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! PaddleOCR text recognition
//!
//! The recognition network emits a `(T, C)` matrix of per-timestep class
//! probabilities. Class 0 is the blank; class `i > 0` maps to vocabulary
//! slot `i - 1`. Decoding is greedy (best path), no beam search.

use anyhow::{Context, Result};
use image::RgbImage;
use ndarray::{Array2, Array4};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::inference::{recognition_matrix, OnnxSession, RecognitionInference, DEFAULT_INTRA_THREADS};
use super::preprocessing::{preprocess_for_recognition, REC_INPUT_HEIGHT};
use crate::errors::{InferenceError, InferenceStage, OcrError};

/// Trailing character appended to every vocabulary
pub const VOCABULARY_SENTINEL: char = ' ';

/// Index of the blank class
pub const BLANK_INDEX: usize = 0;

/// Character table paired with a recognition model
///
/// Built from the dictionary text with newlines removed, plus one trailing
/// sentinel. Its length is always the model's class count minus one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    chars: Vec<char>,
}

impl Vocabulary {
    /// Build from raw dictionary text
    ///
    /// # Errors
    /// Returns `OcrError::Vocabulary` if the text holds no characters.
    pub fn from_text(text: &str) -> Result<Self, OcrError> {
        let mut chars: Vec<char> = text.chars().filter(|&c| c != '\n').collect();
        if chars.is_empty() {
            return Err(OcrError::Vocabulary(
                "dictionary contains no characters".to_string(),
            ));
        }
        chars.push(VOCABULARY_SENTINEL);
        Ok(Self { chars })
    }

    /// Load a UTF-8 dictionary file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("OCR character dictionary not found: {}", path.display());
        }

        let text = std::fs::read_to_string(path)
            .context(format!("Failed to read dictionary: {}", path.display()))?;
        let vocabulary = Self::from_text(&text)
            .context(format!("Failed to load dictionary: {}", path.display()))?;

        info!(
            "Loaded character dictionary with {} characters (including sentinel)",
            vocabulary.len()
        );
        Ok(vocabulary)
    }

    /// Number of slots, sentinel included
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Number of model classes this vocabulary pairs with (blank included)
    pub fn class_count(&self) -> usize {
        self.chars.len() + 1
    }

    /// Character for a non-blank class index
    pub fn char_for_class(&self, class: usize) -> Option<char> {
        class
            .checked_sub(1)
            .and_then(|slot| self.chars.get(slot))
            .copied()
    }

    pub fn chars(&self) -> &[char] {
        &self.chars
    }
}

/// How repeated classes are collapsed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollapseRule {
    /// Drop a class when the immediately preceding raw argmax is the same class
    #[default]
    PreviousRaw,
    /// Drop a class when it equals the last emitted class; blanks do not reset
    LastEmitted,
}

/// Decoded string with per-character argmax probabilities
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedText {
    pub text: String,
    /// Mean of `char_confidences`, 0 when nothing was emitted
    pub confidence: f32,
    pub char_confidences: Vec<f32>,
}

impl DecodedText {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Greedy CTC-style decoder
#[derive(Debug, Clone)]
pub struct SequenceDecoder {
    vocabulary: Arc<Vocabulary>,
    collapse: CollapseRule,
}

impl SequenceDecoder {
    pub fn new(vocabulary: Arc<Vocabulary>) -> Self {
        Self {
            vocabulary,
            collapse: CollapseRule::default(),
        }
    }

    pub fn with_collapse_rule(mut self, collapse: CollapseRule) -> Self {
        self.collapse = collapse;
        self
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn collapse_rule(&self) -> CollapseRule {
        self.collapse
    }

    /// Decode a `(T, C)` probability matrix
    ///
    /// # Errors
    /// `InferenceError::ClassCountMismatch` when `C` is not the vocabulary
    /// length plus one.
    pub fn decode(&self, probs: &Array2<f32>) -> Result<DecodedText, InferenceError> {
        let (_, classes) = probs.dim();
        if classes != self.vocabulary.class_count() {
            return Err(InferenceError::ClassCountMismatch {
                classes,
                vocabulary: self.vocabulary.len(),
            });
        }

        let path = best_path(probs);
        let kept = collapse_path(&path.iter().map(|(class, _)| *class).collect::<Vec<_>>(), self.collapse);

        let mut text = String::new();
        let mut char_confidences = Vec::with_capacity(kept.len());
        for t in kept {
            let (class, prob) = path[t];
            if let Some(ch) = self.vocabulary.char_for_class(class) {
                text.push(ch);
                char_confidences.push(prob);
            }
        }

        let confidence = if char_confidences.is_empty() {
            0.0
        } else {
            char_confidences.iter().sum::<f32>() / char_confidences.len() as f32
        };

        Ok(DecodedText {
            text,
            confidence,
            char_confidences,
        })
    }

    /// Decode an already-computed argmax path
    pub fn decode_path(&self, path: &[usize]) -> String {
        collapse_path(path, self.collapse)
            .into_iter()
            .filter_map(|t| self.vocabulary.char_for_class(path[t]))
            .collect()
    }
}

/// Per-timestep argmax class and its probability
///
/// Ties resolve to the lowest class index.
pub fn best_path(probs: &Array2<f32>) -> Vec<(usize, f32)> {
    probs
        .rows()
        .into_iter()
        .map(|row| {
            let mut best = (BLANK_INDEX, f32::NEG_INFINITY);
            for (class, &prob) in row.iter().enumerate() {
                if prob > best.1 {
                    best = (class, prob);
                }
            }
            best
        })
        .collect()
}

/// Timesteps whose class survives blank removal and duplicate suppression
pub fn collapse_path(path: &[usize], rule: CollapseRule) -> Vec<usize> {
    let mut kept = Vec::new();
    let mut last_emitted: Option<usize> = None;

    for (t, &class) in path.iter().enumerate() {
        if class == BLANK_INDEX {
            continue;
        }
        let repeated = match rule {
            CollapseRule::PreviousRaw => t > 0 && path[t - 1] == class,
            CollapseRule::LastEmitted => last_emitted == Some(class),
        };
        if !repeated {
            kept.push(t);
            last_emitted = Some(class);
        }
    }

    kept
}

/// Crop-level recognizer: preprocessing, inference and decoding
#[derive(Clone)]
pub struct TextRecognizer {
    backend: Arc<dyn RecognitionInference>,
    decoder: SequenceDecoder,
}

impl std::fmt::Debug for TextRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextRecognizer")
            .field("decoder", &self.decoder)
            .finish_non_exhaustive()
    }
}

impl TextRecognizer {
    pub fn new(backend: Arc<dyn RecognitionInference>, decoder: SequenceDecoder) -> Self {
        Self { backend, decoder }
    }

    pub fn decoder(&self) -> &SequenceDecoder {
        &self.decoder
    }

    pub fn backend(&self) -> Arc<dyn RecognitionInference> {
        Arc::clone(&self.backend)
    }

    /// Recognize the text in a rectified crop
    pub fn recognize(&self, crop: &RgbImage) -> Result<DecodedText, InferenceError> {
        let input = preprocess_for_recognition(crop);
        let probs = self.backend.infer(&input)?;
        self.decoder.decode(&probs)
    }
}

/// PaddleOCR text recognition model
///
/// Runs on CPU; the input width follows the crop's aspect ratio.
#[derive(Clone, Debug)]
pub struct OcrRecognitionModel {
    session: OnnxSession,
}

impl OcrRecognitionModel {
    /// Load the recognition model from a file
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        Self::with_intra_threads(model_path, DEFAULT_INTRA_THREADS)
    }

    pub fn with_intra_threads<P: AsRef<Path>>(model_path: P, intra_threads: usize) -> Result<Self> {
        let session = OnnxSession::load(model_path.as_ref(), InferenceStage::Recognition, intra_threads)?;
        Ok(Self { session })
    }
}

impl RecognitionInference for OcrRecognitionModel {
    fn infer(&self, input: &Array4<f32>) -> Result<Array2<f32>, InferenceError> {
        let shape = input.shape();
        if shape[0] != 1 || shape[1] != 3 || shape[2] != REC_INPUT_HEIGHT as usize {
            return Err(InferenceError::backend(
                InferenceStage::Recognition,
                format!(
                    "invalid input shape {:?}, expected [1, 3, {}, W]",
                    shape, REC_INPUT_HEIGHT
                ),
            ));
        }

        let probs = recognition_matrix(self.session.run(input)?)?;
        debug!("Recognition output shape: {:?}", probs.dim());
        Ok(probs)
    }
}
