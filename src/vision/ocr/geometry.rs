// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Planar geometry used by region extraction and rectification
//!
//! Points are `[x, y]` in image coordinates (y grows downwards). Quads are
//! kept in visual clockwise order starting from the corner with the smallest
//! `x + y`, i.e. top-left, top-right, bottom-right, bottom-left for an
//! upright box.

use geo::{Area, Coord, EuclideanLength, LineString, MinimumRotatedRect, MultiPoint, Point as GeoPoint, Polygon};
use geo_clipper::{ClipperInt, EndType, JoinType};

/// A 2-D point `[x, y]`
pub type Point = [f32; 2];

/// Four ordered corner points
pub type Quad = [Point; 4];

/// Arc tolerance for round joins (ClipperLib default)
const ROUND_JOIN_ARC_TOLERANCE: f64 = 0.25;

/// Offsets below this are treated as no expansion
const MIN_OFFSET_DISTANCE: f64 = 1e-6;

/// Minimum-area rectangle enclosing a point set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    /// Corners in clockwise order from the smallest `x + y`
    pub corners: Quad,
    pub center: Point,
    /// Length of the first edge (`corners[0]` to `corners[1]`)
    pub width: f32,
    /// Length of the second edge (`corners[1]` to `corners[2]`)
    pub height: f32,
}

impl RotatedRect {
    /// Length of the shorter side
    pub fn min_side(&self) -> f32 {
        self.width.min(self.height)
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}

/// Euclidean distance between two points
pub fn distance(a: Point, b: Point) -> f32 {
    (a[0] - b[0]).hypot(a[1] - b[1])
}

fn to_polygon(points: &[Point]) -> Polygon<f64> {
    let coords: Vec<Coord<f64>> = points
        .iter()
        .map(|p| Coord {
            x: f64::from(p[0]),
            y: f64::from(p[1]),
        })
        .collect();
    Polygon::new(LineString::from(coords), vec![])
}

/// Unsigned area of a closed polygon
pub fn polygon_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    to_polygon(points).unsigned_area()
}

/// Perimeter of a closed polygon
pub fn polygon_perimeter(points: &[Point]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    to_polygon(points).exterior().euclidean_length()
}

/// Shoelace sum; positive for visual clockwise order in y-down coordinates
fn signed_area(quad: &Quad) -> f32 {
    (0..4)
        .map(|i| {
            let [x1, y1] = quad[i];
            let [x2, y2] = quad[(i + 1) % 4];
            x1 * y2 - x2 * y1
        })
        .sum::<f32>()
        / 2.0
}

/// Index of the corner with the smallest `x + y`
///
/// Ties resolve to the lowest index.
pub fn start_corner_index(quad: &Quad) -> usize {
    let mut best = 0;
    for i in 1..4 {
        if quad[i][0] + quad[i][1] < quad[best][0] + quad[best][1] {
            best = i;
        }
    }
    best
}

/// Rotate the corner array so the smallest `x + y` corner comes first
pub fn roll_to_start_corner(quad: &Quad) -> Quad {
    let start = start_corner_index(quad);
    [
        quad[start],
        quad[(start + 1) % 4],
        quad[(start + 2) % 4],
        quad[(start + 3) % 4],
    ]
}

/// Normalise a quad to visual clockwise order from its start corner
pub fn order_clockwise(quad: Quad) -> Quad {
    let mut quad = quad;
    if signed_area(&quad) < 0.0 {
        quad.reverse();
    }
    roll_to_start_corner(&quad)
}

/// Minimum-area rotated rectangle of a point set
///
/// Returns `None` for an empty set. Collinear input yields a rectangle with
/// a zero-length side.
pub fn min_area_rect(points: &[Point]) -> Option<RotatedRect> {
    if points.is_empty() {
        return None;
    }

    let multi: MultiPoint<f64> = points
        .iter()
        .map(|p| GeoPoint::new(f64::from(p[0]), f64::from(p[1])))
        .collect();
    let rect = multi.minimum_rotated_rect()?;

    let coords: Vec<Coord<f64>> = rect.exterior().coords().copied().collect();
    if coords.len() < 4 {
        return None;
    }

    let raw: Quad = [
        [coords[0].x as f32, coords[0].y as f32],
        [coords[1].x as f32, coords[1].y as f32],
        [coords[2].x as f32, coords[2].y as f32],
        [coords[3].x as f32, coords[3].y as f32],
    ];
    let corners = order_clockwise(raw);

    let center = [
        corners.iter().map(|p| p[0]).sum::<f32>() / 4.0,
        corners.iter().map(|p| p[1]).sum::<f32>() / 4.0,
    ];

    Some(RotatedRect {
        corners,
        center,
        width: distance(corners[0], corners[1]),
        height: distance(corners[1], corners[2]),
    })
}

/// Expand a quad outward with a round-joined closed-polygon offset
///
/// The offset distance is `area * ratio / perimeter` of the quad. Corner
/// coordinates are truncated to integers before offsetting, as ClipperLib
/// works on an integer grid. A zero distance returns the corners unchanged.
/// Returns `None` when the offset produces no polygon.
pub fn expand_polygon(quad: &Quad, ratio: f32) -> Option<Vec<Point>> {
    let perimeter = polygon_perimeter(quad);
    if perimeter <= f64::EPSILON {
        return Some(quad.to_vec());
    }

    let offset = polygon_area(quad) * f64::from(ratio) / perimeter;
    if offset.abs() < MIN_OFFSET_DISTANCE {
        return Some(quad.to_vec());
    }

    let coords: Vec<Coord<i64>> = quad
        .iter()
        .map(|p| Coord {
            x: p[0].trunc() as i64,
            y: p[1].trunc() as i64,
        })
        .collect();
    let polygon = Polygon::new(LineString::from(coords), vec![]);

    let expanded = polygon.offset(
        offset,
        JoinType::Round(ROUND_JOIN_ARC_TOLERANCE),
        EndType::ClosedPolygon,
    );
    let first = expanded.0.first()?;

    // geo closes the ring by repeating the first coordinate
    let ring: Vec<Coord<i64>> = first.exterior().coords().copied().collect();
    if ring.len() < 3 {
        return None;
    }
    let open = if ring.first() == ring.last() {
        &ring[..ring.len() - 1]
    } else {
        &ring[..]
    };

    Some(open.iter().map(|c| [c.x as f32, c.y as f32]).collect())
}
