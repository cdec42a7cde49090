// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanning pipeline: adaptive binarization, edge extraction, probabilistic
// line detection and skew estimation/correction.

pub mod deskew;
pub mod edges;
pub mod enhance;
pub mod hough;

pub use deskew::{DeskewOutput, SkewEstimate, SkewEstimator};
pub use enhance::{ScanEnhancer, ScanOutput, scan_image, scan_view};
pub use hough::{LineDetector, LineSegment, ProbabilisticHough};
