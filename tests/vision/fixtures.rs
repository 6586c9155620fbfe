// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Synthetic frames and deterministic inference stubs shared by the vision tests
#![allow(dead_code)]

use fabstir_ocr::errors::{InferenceError, InferenceStage};
use fabstir_ocr::vision::ocr::{
    DetectionInference, OrientationInference, PaddleOcrModel, RecognitionInference, Vocabulary,
};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use ndarray::{Array1, Array2, Array4};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_target(false)
            .with_test_writer()
            .try_init();
    });
}

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
pub const MAGENTA: Rgb<u8> = Rgb([255, 0, 255]);
pub const BLUE: Rgb<u8> = Rgb([0, 0, 255]);
pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// Dictionary text for the stub recognizer
pub const VOCABULARY_TEXT: &str = "H\nE\nL\nO\nW\nR\nD\n";

/// Class indices into `VOCABULARY_TEXT` (blank = 0)
pub const HELLO_PATH: &[usize] = &[1, 1, 2, 3, 0, 3, 4, 0];
pub const OLLEH_PATH: &[usize] = &[4, 3, 0, 3, 2, 1];
pub const WORLD_PATH: &[usize] = &[5, 4, 6, 3, 7];

/// Timesteps in every stub recognition output
pub const STUB_TIMESTEPS: usize = 16;

/// Per-channel comparison that tolerates interpolation rounding
pub fn is_close(pixel: &Rgb<u8>, expected: Rgb<u8>) -> bool {
    pixel
        .0
        .iter()
        .zip(expected.0.iter())
        .all(|(&a, &b)| (a as i16 - b as i16).abs() <= 8)
}

pub fn vocabulary() -> Arc<Vocabulary> {
    Arc::new(Vocabulary::from_text(VOCABULARY_TEXT).unwrap())
}

pub fn blank_frame(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, WHITE)
}

/// Paint a solid block; all fixture text colours have a zero green channel
pub fn paint(frame: &mut RgbImage, x: i32, y: i32, width: u32, height: u32, color: Rgb<u8>) {
    draw_filled_rect_mut(frame, Rect::at(x, y).of_size(width, height), color);
}

/// A "printed word": red on its left half, magenta on its right half
///
/// The two halves let tests observe a 180 degree rotation.
pub fn paint_word(frame: &mut RgbImage, x: i32, y: i32, width: u32, height: u32) {
    let half = width / 2;
    paint(frame, x, y, half, height, RED);
    paint(frame, x + half as i32, y, width - half, height, MAGENTA);
}

/// 320x160 frame with one red/magenta word near the top
pub fn single_word_frame() -> RgbImage {
    let mut frame = blank_frame(320, 160);
    paint_word(&mut frame, 40, 20, 160, 30);
    frame
}

/// 320x160 frame with a red/magenta word above a blue word
pub fn two_word_frame() -> RgbImage {
    let mut frame = single_word_frame();
    paint(&mut frame, 60, 90, 200, 30, BLUE);
    frame
}

/// Per-timestep probability matrix peaking on `path`
pub fn one_hot(path: &[usize], classes: usize) -> Array2<f32> {
    let off = 0.1 / (classes - 1) as f32;
    let mut probs = Array2::from_elem((STUB_TIMESTEPS, classes), off);
    for t in 0..STUB_TIMESTEPS {
        let class = path.get(t).copied().unwrap_or(0);
        probs[[t, class]] = 0.9;
    }
    probs
}

/// Marks dark-green pixels (text in the fixtures) as 0.9
pub struct GreenChannelDetection;

impl DetectionInference for GreenChannelDetection {
    fn infer(&self, input: &Array4<f32>) -> Result<Array2<f32>, InferenceError> {
        let shape = input.shape();
        let (height, width) = (shape[2], shape[3]);
        Ok(Array2::from_shape_fn((height, width), |(y, x)| {
            if input[[0, 1, y, x]] < 0.0 {
                0.9
            } else {
                0.0
            }
        }))
    }
}

/// Always fails
pub struct FailingDetection;

impl DetectionInference for FailingDetection {
    fn infer(&self, _input: &Array4<f32>) -> Result<Array2<f32>, InferenceError> {
        Err(InferenceError::backend(InferenceStage::Detection, "runtime exploded"))
    }
}

/// Reads the colour a quarter of the way across the crop
///
/// red -> HELLO, magenta -> OLLEH (upside-down word), blue -> WORLD,
/// anything else decodes to nothing.
pub struct ColorRecognition {
    pub classes: usize,
    pub calls: AtomicUsize,
}

impl ColorRecognition {
    pub fn new() -> Self {
        Self {
            classes: vocabulary().class_count(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_classes(classes: usize) -> Self {
        Self {
            classes,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RecognitionInference for ColorRecognition {
    fn infer(&self, input: &Array4<f32>) -> Result<Array2<f32>, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let shape = input.shape();
        assert_eq!(shape[1], 3);
        assert_eq!(shape[2], 48);
        assert!(shape[3] >= 1, "zero-width crop reached recognition");

        let x = shape[3] / 4;
        let r = input[[0, 0, 24, x]];
        let b = input[[0, 2, 24, x]];

        let path: &[usize] = match (r > 0.5, b > 0.5) {
            (true, false) => HELLO_PATH,
            (true, true) => OLLEH_PATH,
            (false, true) => WORLD_PATH,
            (false, false) => &[],
        };
        Ok(one_hot(path, self.classes))
    }
}

/// Returns fixed orientation probabilities and counts calls
pub struct FixedOrientation {
    pub probs: Vec<f32>,
    pub calls: AtomicUsize,
}

impl FixedOrientation {
    pub fn new(probs: Vec<f32>) -> Self {
        Self {
            probs,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OrientationInference for FixedOrientation {
    fn infer(&self, input: &Array4<f32>) -> Result<Array1<f32>, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(input.shape(), &[1, 3, 48, 192]);
        Ok(Array1::from(self.probs.clone()))
    }
}

/// Pipeline over the colour stubs, no orientation stage
pub fn stub_pipeline() -> PaddleOcrModel {
    PaddleOcrModel::new(
        Arc::new(GreenChannelDetection),
        Arc::new(ColorRecognition::new()),
        vocabulary(),
    )
}
