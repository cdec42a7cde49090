// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types shared by the docscan crates.

use serde::{Deserialize, Serialize};

/// Pipeline stages, in the order a single image passes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Reading and decoding the input image.
    Load,
    /// Adaptive-threshold binarization.
    Binarize,
    /// Edge extraction.
    Edges,
    /// Probabilistic line-segment detection.
    Lines,
    /// Median-angle aggregation.
    Aggregation,
    /// Rotation of the input by the estimated skew.
    Rotation,
    /// Resizing and collage assembly.
    Layout,
    /// Encoding and writing output images.
    Save,
    /// Reading or validating configuration.
    Config,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Load => "image loading",
            Stage::Binarize => "binarization",
            Stage::Edges => "edge detection",
            Stage::Lines => "line detection",
            Stage::Aggregation => "angle aggregation",
            Stage::Rotation => "rotation",
            Stage::Layout => "layout",
            Stage::Save => "save",
            Stage::Config => "configuration",
        };
        f.write_str(name)
    }
}

/// How the local threshold of adaptive binarization is computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMethod {
    /// Gaussian-weighted neighbourhood, `sigma = (block_size - 1) / 6`.
    #[default]
    Gaussian,
    /// Unweighted box mean over the `block_size` square.
    Mean,
}

/// Optional folding of segment angles before the median is taken.
///
/// Angles near the ±180° wrap are not folded by default: a line and its
/// reversed twin land at opposite ends of the sorted set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AngleNormalization {
    /// Use `atan2` angles as-is, range (-180, 180].
    #[default]
    None,
    /// Fold a line and its 180° counterpart together, range [-90, 90).
    HalfTurn,
    /// Additionally fold perpendicular lines together, range [-45, 45).
    QuarterTurn,
}

impl AngleNormalization {
    /// Apply the folding to a single angle in degrees.
    pub fn apply(self, degrees: f64) -> f64 {
        match self {
            AngleNormalization::None => degrees,
            AngleNormalization::HalfTurn => (degrees + 90.0).rem_euclid(180.0) - 90.0,
            AngleNormalization::QuarterTurn => (degrees + 45.0).rem_euclid(90.0) - 45.0,
        }
    }
}

/// Resampling used when rotating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationInterpolation {
    Nearest,
    #[default]
    Bilinear,
    Bicubic,
}
