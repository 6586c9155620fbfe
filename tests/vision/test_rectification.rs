// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Perspective crops of detected regions

use super::fixtures::*;
use fabstir_ocr::vision::ocr::{PerspectiveRectifier, TextRegion};
use image::{Rgb, RgbImage};

fn region(polygon: [[f32; 2]; 4]) -> TextRegion {
    let cx = polygon.iter().map(|p| p[0]).sum::<f32>() / 4.0;
    let cy = polygon.iter().map(|p| p[1]).sum::<f32>() / 4.0;
    TextRegion {
        polygon,
        score: 0.9,
        center: [cx, cy],
    }
}

#[test]
fn test_tall_region_is_rotated_counter_clockwise() {
    // 10 wide, 20 tall: warped to 11x21, rotated to 21x11
    let mut frame = blank_frame(64, 64);
    paint(&mut frame, 10, 10, 5, 21, RED);
    let tall = region([[10.0, 10.0], [20.0, 10.0], [20.0, 30.0], [10.0, 30.0]]);

    let crop = PerspectiveRectifier::default().rectify(&frame, &tall);
    assert_eq!(crop.dimensions(), (21, 11));

    // The red left half ends up at the bottom after a counter-clockwise turn
    assert!(is_close(crop.get_pixel(10, 9), RED));
    assert!(is_close(crop.get_pixel(10, 1), WHITE));
}

#[test]
fn test_wide_region_keeps_orientation() {
    let frame = single_word_frame();
    let word = region([[40.0, 20.0], [199.0, 20.0], [199.0, 49.0], [40.0, 49.0]]);

    let crop = PerspectiveRectifier::default().rectify(&frame, &word);
    assert_eq!(crop.dimensions(), (160, 30));
    assert!(is_close(crop.get_pixel(20, 15), RED));
    assert!(is_close(crop.get_pixel(140, 15), MAGENTA));
}

#[test]
fn test_start_corner_is_rolled_first() {
    // Same rectangle listed from its bottom-left corner
    let frame = single_word_frame();
    let word = region([[40.0, 49.0], [40.0, 20.0], [199.0, 20.0], [199.0, 49.0]]);

    let crop = PerspectiveRectifier::default().rectify(&frame, &word);
    assert_eq!(crop.dimensions(), (160, 30));
    assert!(is_close(crop.get_pixel(20, 15), RED));
}

#[test]
fn test_out_of_frame_pixels_are_black() {
    let frame = RgbImage::from_pixel(20, 20, Rgb([200, 200, 200]));
    let overhang = region([[10.0, 5.0], [40.0, 5.0], [40.0, 15.0], [10.0, 15.0]]);

    let crop = PerspectiveRectifier::default().rectify(&frame, &overhang);
    assert_eq!(crop.dimensions(), (31, 11));
    assert!(is_close(crop.get_pixel(2, 5), Rgb([200, 200, 200])));
    assert!(is_close(crop.get_pixel(28, 5), BLACK));
}

#[test]
fn test_crops_follow_region_order() {
    let frame = two_word_frame();
    let regions = stub_pipeline().detect(&frame).unwrap();
    assert_eq!(regions.len(), 2);

    let crops: Vec<RgbImage> = PerspectiveRectifier::default()
        .crops(&frame, &regions)
        .collect();
    assert_eq!(crops.len(), 2);

    // First discovered region is the red/magenta word, second the blue one
    let quarter = |crop: &RgbImage| *crop.get_pixel(crop.width() / 4, crop.height() / 2);
    assert!(is_close(&quarter(&crops[0]), RED));
    assert!(is_close(&quarter(&crops[1]), BLUE));
}
