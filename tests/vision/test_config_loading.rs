// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Pipeline configuration from TOML files and environment lookups

use fabstir_ocr::config::OcrConfig;
use fabstir_ocr::vision::ocr::{CollapseRule, PaddleOcrModel, ResultOrder};
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

#[test]
fn test_partial_toml_file_falls_back_to_defaults() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
result_order = "discovery"

[detection]
model_path = "/opt/ocr/det.onnx"
box_score_threshold = 0.7

[recognition]
collapse = "last_emitted"
"#
    )
    .unwrap();

    let config = OcrConfig::from_file(file.path()).unwrap();
    assert_eq!(config.detection.model_path, PathBuf::from("/opt/ocr/det.onnx"));
    assert_eq!(config.detection.box_score_threshold, 0.7);
    assert_eq!(config.detection.binarization_threshold, 0.3);
    assert_eq!(config.detection.limit_side_len, 960);
    assert_eq!(config.recognition.collapse, CollapseRule::LastEmitted);
    assert_eq!(config.result_order, ResultOrder::Discovery);
    assert!(!config.orientation.enabled);
    assert!(config.validate().is_ok());
}

#[test]
fn test_serialized_config_round_trips() {
    let mut config = OcrConfig::default();
    config.orientation.enabled = true;
    config.orientation.model_path = Some(PathBuf::from("/opt/ocr/cls.onnx"));
    config.runtime.intra_threads = 2;

    let text = toml::to_string(&config).unwrap();
    assert_eq!(OcrConfig::from_toml_str(&text).unwrap(), config);
}

#[test]
fn test_missing_config_file() {
    let err = OcrConfig::from_file("/nonexistent/ocr.toml").unwrap_err();
    assert!(err.to_string().contains("Failed to read OCR config"));
}

#[test]
fn test_malformed_toml_rejected() {
    assert!(OcrConfig::from_toml_str("[detection\nmin_size = ").is_err());
}

#[test]
fn test_lookup_enables_orientation() {
    let config = OcrConfig::from_lookup(|key| match key {
        "OCR_CLS_MODEL_PATH" => Some("/opt/ocr/cls.onnx".to_string()),
        "OCR_CLS_THRESHOLD" => Some("0.95".to_string()),
        "OCR_INTRA_THREADS" => Some("many".to_string()),
        _ => None,
    });

    assert!(config.orientation.enabled);
    assert_eq!(config.orientation.threshold, 0.95);
    assert_eq!(config.runtime.intra_threads, 4);
}

#[test]
fn test_invalid_config_rejected_before_loading_models() {
    let mut config = OcrConfig::default();
    config.detection.binarization_threshold = 1.5;

    let err = PaddleOcrModel::from_config(&config).unwrap_err();
    assert!(err.to_string().contains("Invalid configuration"));
}

#[test]
fn test_missing_model_reported_with_path() {
    let mut config = OcrConfig::default();
    config.detection.model_path = PathBuf::from("/nonexistent/det.onnx");

    let err = PaddleOcrModel::from_config(&config).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("not found"), "{}", message);
    assert!(message.contains("/nonexistent/det.onnx"), "{}", message);
}
