// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! End-to-end pipeline tests over synthetic frames and stub backends
//!
//! Detection marks green-free pixels as text; recognition reads the crop's
//! colour, so every assertion below is deterministic.

use super::fixtures::*;
use fabstir_ocr::errors::{InferenceError, InferenceStage, OcrError};
use fabstir_ocr::vision::ocr::{
    OrientationClassifier, PaddleOcrModel, RegionExtractor, ResultOrder, TextCollector,
};
use image::DynamicImage;
use std::sync::Arc;

#[test]
fn test_single_word_frame() {
    init_tracing();

    let results = stub_pipeline().recognize(&single_word_frame()).unwrap();

    assert_eq!(results.len(), 1);
    let word = &results[0];
    assert_eq!(word.content, "HELLO");
    assert!((word.confidence - 0.9).abs() < 1e-5);
    assert!((word.region.score - 0.9).abs() < 1e-5);

    // Expanded region encloses the painted block (40..200, 20..50)
    let [tl, _, br, _] = word.region.polygon;
    assert!(tl[0] < 40.0 && tl[1] < 20.0, "{:?}", word.region.polygon);
    assert!(br[0] > 199.0 && br[1] > 49.0, "{:?}", word.region.polygon);
    assert!((word.region.center[0] - 119.5).abs() < 2.0);
    assert!((word.region.center[1] - 34.5).abs() < 2.0);
}

#[test]
fn test_multi_region_results_are_reversed() {
    init_tracing();

    // Contours are discovered top to bottom: HELLO first, then WORLD
    let results = stub_pipeline().recognize(&two_word_frame()).unwrap();
    let contents: Vec<&str> = results.iter().map(|r| r.content.as_str()).collect();
    assert_eq!(contents, vec!["WORLD", "HELLO"]);
}

#[test]
fn test_discovery_order_option() {
    let results = stub_pipeline()
        .with_result_order(ResultOrder::Discovery)
        .recognize(&two_word_frame())
        .unwrap();
    let contents: Vec<&str> = results.iter().map(|r| r.content.as_str()).collect();
    assert_eq!(contents, vec!["HELLO", "WORLD"]);
}

#[test]
fn test_empty_decode_drops_region() {
    let mut frame = single_word_frame();
    paint(&mut frame, 60, 100, 180, 30, BLACK);

    let recognition = Arc::new(ColorRecognition::new());
    let model = PaddleOcrModel::new(
        Arc::new(GreenChannelDetection),
        recognition.clone(),
        vocabulary(),
    );

    let results = model.recognize(&frame).unwrap();
    assert_eq!(recognition.calls(), 2);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].content, "HELLO");
}

#[test]
fn test_blank_frame_yields_nothing() {
    let recognition = Arc::new(ColorRecognition::new());
    let model = PaddleOcrModel::new(
        Arc::new(GreenChannelDetection),
        recognition.clone(),
        vocabulary(),
    );

    assert!(model.recognize(&blank_frame(320, 160)).unwrap().is_empty());
    assert_eq!(recognition.calls(), 0);
}

#[test]
fn test_orientation_stage_rotates_upside_down_crops() {
    let orientation = Arc::new(FixedOrientation::new(vec![0.02, 0.98]));
    let model = stub_pipeline().with_orientation_backend(orientation.clone());

    let results = model.recognize(&two_word_frame()).unwrap();
    let contents: Vec<&str> = results.iter().map(|r| r.content.as_str()).collect();

    // The red/magenta word reads backwards once turned; the blue one is symmetric
    assert_eq!(contents, vec!["WORLD", "OLLEH"]);
    assert_eq!(orientation.calls(), 2);
}

#[test]
fn test_orientation_below_threshold_keeps_crop() {
    let orientation = Arc::new(FixedOrientation::new(vec![0.02, 0.98]));
    let classifier = OrientationClassifier::new(orientation.clone()).with_threshold(0.99);
    let model = stub_pipeline().with_orientation(classifier);

    let results = model.recognize(&single_word_frame()).unwrap();
    assert_eq!(results[0].content, "HELLO");
    assert_eq!(orientation.calls(), 1);
}

#[test]
fn test_without_orientation_never_calls_classifier() {
    let orientation = Arc::new(FixedOrientation::new(vec![0.0, 1.0]));
    let model = stub_pipeline()
        .with_orientation_backend(orientation.clone())
        .without_orientation();

    let results = model.recognize(&single_word_frame()).unwrap();
    assert_eq!(results[0].content, "HELLO");
    assert_eq!(orientation.calls(), 0);
}

#[test]
fn test_detection_failure_propagates() {
    let model = PaddleOcrModel::new(
        Arc::new(FailingDetection),
        Arc::new(ColorRecognition::new()),
        vocabulary(),
    );

    let err = model.recognize(&single_word_frame()).unwrap_err();
    assert!(matches!(
        err,
        OcrError::Inference(InferenceError::Backend {
            stage: InferenceStage::Detection,
            ..
        })
    ));
}

#[test]
fn test_class_count_mismatch_aborts_frame() {
    let model = PaddleOcrModel::new(
        Arc::new(GreenChannelDetection),
        Arc::new(ColorRecognition::with_classes(20)),
        vocabulary(),
    );

    let err = model.recognize(&two_word_frame()).unwrap_err();
    assert!(matches!(
        err,
        OcrError::Inference(InferenceError::ClassCountMismatch { classes: 20, .. })
    ));
}

#[test]
fn test_malformed_orientation_output_propagates() {
    let model = stub_pipeline().with_orientation_backend(Arc::new(FixedOrientation::new(vec![1.0])));

    let err = model.recognize(&single_word_frame()).unwrap_err();
    assert!(matches!(
        err,
        OcrError::Inference(InferenceError::MalformedOutput {
            stage: InferenceStage::Orientation,
            ..
        })
    ));
}

#[test]
fn test_strict_box_threshold_filters_everything() {
    let model = stub_pipeline()
        .with_region_extractor(RegionExtractor::default().with_box_score_threshold(0.95));
    assert!(model.recognize(&two_word_frame()).unwrap().is_empty());
}

#[test]
fn test_large_frame_maps_back_to_original_coordinates() {
    // 1920x960 is downscaled to 960x480 for detection
    let mut frame = blank_frame(1920, 960);
    paint_word(&mut frame, 400, 300, 800, 120);

    let results = stub_pipeline().recognize(&frame).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].content, "HELLO");

    let center = results[0].region.center;
    assert!((center[0] - 800.0).abs() < 8.0, "{:?}", center);
    assert!((center[1] - 360.0).abs() < 8.0, "{:?}", center);
}

#[test]
fn test_process_aggregates_results() {
    let result = stub_pipeline()
        .process(&DynamicImage::ImageRgb8(two_word_frame()))
        .unwrap();

    assert_eq!(result.regions.len(), 2);
    assert_eq!(result.text, "WORLD\nHELLO");
    assert!((result.confidence - 0.9).abs() < 1e-5);
}

#[test]
fn test_pipeline_is_shareable_across_threads() {
    let model = Arc::new(stub_pipeline());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let model = Arc::clone(&model);
            std::thread::spawn(move || model.recognize(&single_word_frame()).unwrap())
        })
        .collect();

    for handle in handles {
        let results = handle.join().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "HELLO");
    }
}

#[test]
fn test_collector_accumulates_across_frames() {
    let model = stub_pipeline();
    let mut collector = TextCollector::default();

    let first = model.recognize(&single_word_frame()).unwrap();
    assert_eq!(collector.observe(&first), vec!["HELLO"]);

    let second = model.recognize(&two_word_frame()).unwrap();
    assert_eq!(collector.observe(&second), vec!["WORLD"]);

    assert_eq!(collector.texts(), &["HELLO", "WORLD"]);
    assert_eq!(collector.frames_observed(), 2);
    assert!(!collector.is_expired());
}
