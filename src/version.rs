// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the Fabstir OCR core

/// Full version string with feature description
pub const VERSION: &str = "v0.1.0-scene-text-2025-10-17";

/// Semantic version number
pub const VERSION_NUMBER: &str = "0.1.0";

/// Major version number
pub const VERSION_MAJOR: u32 = 0;

/// Minor version number
pub const VERSION_MINOR: u32 = 1;

/// Patch version number
pub const VERSION_PATCH: u32 = 0;

/// Build date
pub const BUILD_DATE: &str = "2025-10-17";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "db-region-extraction",
    "round-joined-unclip",
    "perspective-rectification",
    "vertical-text-rotation",
    "orientation-classifier",
    "greedy-ctc-decoding",
    "onnx-runtime-cpu",
    "frame-text-collector",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("Fabstir OCR {} ({})", VERSION_NUMBER, BUILD_DATE)
}

/// Check if a feature is supported
pub fn has_feature(feature: &str) -> bool {
    FEATURES.contains(&feature)
}
