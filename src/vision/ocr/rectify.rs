// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Perspective rectification of detected regions
//!
//! Each quadrilateral region is warped onto an axis-aligned raster. Tall,
//! narrow crops are treated as vertical text and turned a quarter turn
//! counter-clockwise so the recognizer always reads horizontally.

use image::{imageops, Rgb, RgbImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use std::iter::FusedIterator;
use tracing::{trace, warn};

use super::detection::TextRegion;
use super::geometry::{self, Quad};

/// Crops with `height / width` at or above this ratio are rotated
pub const DEFAULT_VERTICAL_ASPECT_RATIO: f32 = 1.5;

/// Warps detected regions out of a frame
#[derive(Debug, Clone, Copy)]
pub struct PerspectiveRectifier {
    vertical_aspect_ratio: f32,
}

impl Default for PerspectiveRectifier {
    fn default() -> Self {
        Self {
            vertical_aspect_ratio: DEFAULT_VERTICAL_ASPECT_RATIO,
        }
    }
}

impl PerspectiveRectifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vertical_aspect_ratio(mut self, ratio: f32) -> Self {
        self.vertical_aspect_ratio = ratio;
        self
    }

    /// Target raster size for a quad, after rolling to its start corner
    ///
    /// Returns `(width, height)`; both are at least 1.
    pub fn target_size(quad: &Quad) -> (u32, u32) {
        let q = geometry::roll_to_start_corner(quad);
        let width = geometry::distance(q[0], q[1]).round() as u32 + 1;
        let height = geometry::distance(q[0], q[3]).round() as u32 + 1;
        (width, height)
    }

    /// Warp one region out of the frame
    pub fn rectify(&self, frame: &RgbImage, region: &TextRegion) -> RgbImage {
        let source = geometry::roll_to_start_corner(&region.polygon);
        let (width, height) = Self::target_size(&source);
        let (w, h) = (width as f32, height as f32);

        let from = source.map(|p| (p[0], p[1]));
        let to = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];

        let mut crop = RgbImage::new(width, height);
        match Projection::from_control_points(from, to) {
            Some(projection) => {
                warp_into(frame, &projection, Interpolation::Bilinear, Rgb([0, 0, 0]), &mut crop);
            }
            None => {
                warn!("Degenerate perspective transform for region {:?}", region.polygon);
            }
        }

        if h / w >= self.vertical_aspect_ratio {
            trace!("Rotating {}x{} crop as vertical text", width, height);
            crop = imageops::rotate270(&crop);
        }

        crop
    }

    /// Lazily produce one crop per region, in region order
    pub fn crops<'a>(&self, frame: &'a RgbImage, regions: &'a [TextRegion]) -> Crops<'a> {
        Crops {
            rectifier: *self,
            frame,
            regions: regions.iter(),
        }
    }
}

/// Single-pass sequence of rectified crops
#[derive(Debug)]
pub struct Crops<'a> {
    rectifier: PerspectiveRectifier,
    frame: &'a RgbImage,
    regions: std::slice::Iter<'a, TextRegion>,
}

impl Iterator for Crops<'_> {
    type Item = RgbImage;

    fn next(&mut self) -> Option<Self::Item> {
        let region = self.regions.next()?;
        Some(self.rectifier.rectify(self.frame, region))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.regions.size_hint()
    }
}

impl ExactSizeIterator for Crops<'_> {}

impl FusedIterator for Crops<'_> {}
