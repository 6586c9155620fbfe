// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! PaddleOCR text detection
//!
//! The detection network turns a normalised frame into a text-probability
//! heatmap. `RegionExtractor` converts that heatmap into quadrilateral text
//! regions in original-frame coordinates (DB post-processing).

use anyhow::Result;
use image::{GrayImage, Luma};
use imageproc::contours::find_contours;
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point as PixelPoint;
use ndarray::{Array2, Array4};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, trace};

use super::geometry::{self, Point, Quad};
use super::inference::{detection_heatmap, DetectionInference, OnnxSession, DEFAULT_INTRA_THREADS};
use super::preprocessing::PreprocessInfo;
use crate::config::DetectionConfig;
use crate::errors::{InferenceError, InferenceStage};

/// Default heatmap binarization threshold
pub const DEFAULT_BINARIZATION_THRESHOLD: f32 = 0.3;

/// Default minimum mean heatmap score for a region
pub const DEFAULT_BOX_SCORE_THRESHOLD: f32 = 0.6;

/// Default minimum short side (heatmap pixels)
pub const DEFAULT_MIN_SIZE: f32 = 4.0;

/// Default cap on contours examined per frame
pub const DEFAULT_MAX_CANDIDATES: usize = 1000;

/// Default unclip ratio
pub const DEFAULT_EXPANSION_RATIO: f32 = 1.6;

/// Zero padding around the binary mask before contour tracing
const MASK_BORDER: i32 = 1;

/// Extra short-side margin required after expansion
const EXPANDED_MIN_SIZE_MARGIN: f32 = 2.0;

/// A detected text region in original-frame coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextRegion {
    /// Corners in clockwise order starting from the smallest `x + y`
    pub polygon: Quad,
    /// Mean heatmap value under the contour, in `[0, 1]`
    pub score: f32,
    /// Centre of the expanded rectangle
    pub center: Point,
}

impl TextRegion {
    /// Length of the top edge
    pub fn width(&self) -> f32 {
        geometry::distance(self.polygon[0], self.polygon[1])
    }

    /// Length of the left edge
    pub fn height(&self) -> f32 {
        geometry::distance(self.polygon[0], self.polygon[3])
    }
}

/// Converts a detection heatmap into text regions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionExtractor {
    binarization_threshold: f32,
    box_score_threshold: f32,
    min_size: f32,
    max_candidates: usize,
    expansion_ratio: f32,
}

impl Default for RegionExtractor {
    fn default() -> Self {
        Self {
            binarization_threshold: DEFAULT_BINARIZATION_THRESHOLD,
            box_score_threshold: DEFAULT_BOX_SCORE_THRESHOLD,
            min_size: DEFAULT_MIN_SIZE,
            max_candidates: DEFAULT_MAX_CANDIDATES,
            expansion_ratio: DEFAULT_EXPANSION_RATIO,
        }
    }
}

impl From<&DetectionConfig> for RegionExtractor {
    fn from(config: &DetectionConfig) -> Self {
        Self {
            binarization_threshold: config.binarization_threshold,
            box_score_threshold: config.box_score_threshold,
            min_size: config.min_size,
            max_candidates: config.max_candidates,
            expansion_ratio: config.expansion_ratio,
        }
    }
}

impl RegionExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binarization_threshold(mut self, threshold: f32) -> Self {
        self.binarization_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_box_score_threshold(mut self, threshold: f32) -> Self {
        self.box_score_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_min_size(mut self, min_size: f32) -> Self {
        self.min_size = min_size.max(0.0);
        self
    }

    pub fn with_max_candidates(mut self, max_candidates: usize) -> Self {
        self.max_candidates = max_candidates;
        self
    }

    pub fn with_expansion_ratio(mut self, ratio: f32) -> Self {
        self.expansion_ratio = ratio.max(0.0);
        self
    }

    pub fn binarization_threshold(&self) -> f32 {
        self.binarization_threshold
    }

    pub fn box_score_threshold(&self) -> f32 {
        self.box_score_threshold
    }

    pub fn min_size(&self) -> f32 {
        self.min_size
    }

    pub fn max_candidates(&self) -> usize {
        self.max_candidates
    }

    pub fn expansion_ratio(&self) -> f32 {
        self.expansion_ratio
    }

    /// Extract text regions from a heatmap
    ///
    /// Regions come back in contour discovery order. Candidates that are too
    /// small or score too low are dropped silently, and contours beyond
    /// `max_candidates` are never examined.
    pub fn extract(&self, heatmap: &Array2<f32>, info: &PreprocessInfo) -> Vec<TextRegion> {
        let (map_height, map_width) = heatmap.dim();
        if map_height == 0 || map_width == 0 {
            return Vec::new();
        }

        let mask = self.binarize(heatmap);
        let contours = find_contours::<i32>(&mask);
        debug!(
            "Found {} contours on {}x{} heatmap (examining at most {})",
            contours.len(),
            map_width,
            map_height,
            self.max_candidates
        );

        let mut regions = Vec::new();
        for (index, contour) in contours.iter().take(self.max_candidates).enumerate() {
            let points: Vec<PixelPoint<i32>> = contour
                .points
                .iter()
                .map(|p| PixelPoint::new(p.x - MASK_BORDER, p.y - MASK_BORDER))
                .collect();
            if let Some(region) = self.region_from_contour(heatmap, &points, info) {
                regions.push(region);
            } else {
                trace!("Contour {} rejected", index);
            }
        }

        debug!("Extracted {} text regions", regions.len());
        regions
    }

    /// Binary mask with a zero border of `MASK_BORDER` pixels
    ///
    /// Contour tracing never starts on the image edge, so a heatmap that is
    /// foreground everywhere would otherwise yield no contour at all.
    fn binarize(&self, heatmap: &Array2<f32>) -> GrayImage {
        let (height, width) = heatmap.dim();
        let border = MASK_BORDER as u32;
        let mut mask = GrayImage::new(width as u32 + 2 * border, height as u32 + 2 * border);
        for ((y, x), &value) in heatmap.indexed_iter() {
            if value > self.binarization_threshold {
                mask.put_pixel(x as u32 + border, y as u32 + border, Luma([255]));
            }
        }
        mask
    }

    fn region_from_contour(
        &self,
        heatmap: &Array2<f32>,
        contour: &[PixelPoint<i32>],
        info: &PreprocessInfo,
    ) -> Option<TextRegion> {
        let points: Vec<Point> = contour.iter().map(|p| [p.x as f32, p.y as f32]).collect();

        let rect = geometry::min_area_rect(&points)?;
        if rect.min_side() < self.min_size {
            trace!("Rejected: short side {:.2} < {}", rect.min_side(), self.min_size);
            return None;
        }

        let score = contour_score(heatmap, contour);
        if score < self.box_score_threshold {
            trace!("Rejected: score {:.3} < {}", score, self.box_score_threshold);
            return None;
        }

        let expanded = geometry::expand_polygon(&rect.corners, self.expansion_ratio)?;
        let expanded_rect = geometry::min_area_rect(&expanded)?;
        let min_expanded = self.min_size + EXPANDED_MIN_SIZE_MARGIN;
        if expanded_rect.min_side() < min_expanded {
            trace!(
                "Rejected: expanded short side {:.2} < {}",
                expanded_rect.min_side(),
                min_expanded
            );
            return None;
        }

        let (map_height, map_width) = heatmap.dim();
        let to_original = |p: Point| {
            let (x, y) = info.map_to_original(p[0], p[1], map_width, map_height);
            [x, y]
        };

        let polygon = geometry::order_clockwise(expanded_rect.corners.map(to_original));

        Some(TextRegion {
            polygon,
            score,
            center: to_original(expanded_rect.center),
        })
    }
}

/// Mean heatmap value inside a filled contour
///
/// The contour is rasterised (boundary included) into a mask covering its
/// axis-aligned bounding box.
pub fn contour_score(heatmap: &Array2<f32>, contour: &[PixelPoint<i32>]) -> f32 {
    let (map_height, map_width) = heatmap.dim();
    if contour.is_empty() || map_height == 0 || map_width == 0 {
        return 0.0;
    }

    let clamp_x = |x: i32| x.clamp(0, map_width as i32 - 1);
    let clamp_y = |y: i32| y.clamp(0, map_height as i32 - 1);

    let min_x = clamp_x(contour.iter().map(|p| p.x).min().unwrap_or(0));
    let max_x = clamp_x(contour.iter().map(|p| p.x).max().unwrap_or(0));
    let min_y = clamp_y(contour.iter().map(|p| p.y).min().unwrap_or(0));
    let max_y = clamp_y(contour.iter().map(|p| p.y).max().unwrap_or(0));

    let box_width = (max_x - min_x + 1) as u32;
    let box_height = (max_y - min_y + 1) as u32;
    let mut mask = GrayImage::new(box_width, box_height);

    let mut local: Vec<PixelPoint<i32>> = contour
        .iter()
        .map(|p| PixelPoint::new(p.x - min_x, p.y - min_y))
        .collect();
    local.dedup();
    while local.len() > 1 && local.first() == local.last() {
        local.pop();
    }

    if local.len() >= 3 {
        draw_polygon_mut(&mut mask, &local, Luma([1]));
    }
    // Boundary pixels (also covers contours too thin to fill)
    for p in &local {
        if p.x >= 0 && p.y >= 0 && (p.x as u32) < box_width && (p.y as u32) < box_height {
            mask.put_pixel(p.x as u32, p.y as u32, Luma([1]));
        }
    }

    let mut sum = 0.0f64;
    let mut count = 0usize;
    for (x, y, pixel) in mask.enumerate_pixels() {
        if pixel[0] > 0 {
            let hy = (min_y as u32 + y) as usize;
            let hx = (min_x as u32 + x) as usize;
            sum += f64::from(heatmap[[hy, hx]]);
            count += 1;
        }
    }

    if count > 0 {
        (sum / count as f64) as f32
    } else {
        0.0
    }
}

/// PaddleOCR text detection model
///
/// Runs the DB detection network on CPU and returns the squeezed heatmap.
#[derive(Clone, Debug)]
pub struct OcrDetectionModel {
    session: OnnxSession,
}

impl OcrDetectionModel {
    /// Load the OCR detection model from a file
    ///
    /// # Errors
    /// Returns error if the model file is missing or ONNX Runtime fails to
    /// initialise.
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        Self::with_intra_threads(model_path, DEFAULT_INTRA_THREADS)
    }

    pub fn with_intra_threads<P: AsRef<Path>>(model_path: P, intra_threads: usize) -> Result<Self> {
        let session = OnnxSession::load(model_path.as_ref(), InferenceStage::Detection, intra_threads)?;
        Ok(Self { session })
    }
}

impl DetectionInference for OcrDetectionModel {
    fn infer(&self, input: &Array4<f32>) -> Result<Array2<f32>, InferenceError> {
        let shape = input.shape();
        if shape[0] != 1 || shape[1] != 3 {
            return Err(InferenceError::backend(
                InferenceStage::Detection,
                format!("invalid input shape {:?}, expected [1, 3, H, W]", shape),
            ));
        }

        let heatmap = detection_heatmap(self.session.run(input)?)?;

        let (min_val, max_val) = heatmap
            .iter()
            .fold((f32::MAX, f32::MIN), |(min, max), &v| (min.min(v), max.max(v)));
        debug!(
            "Detection heatmap {:?}, range min={:.4} max={:.4}",
            heatmap.dim(),
            min_val,
            max_val
        );

        Ok(heatmap)
    }
}
