// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docscan-document: image processing for the docscan document scanner.
//
// Provides image plumbing (load, resize, grayscale, rotate, collage, save), the
// scan view (adaptive binarization) and skew estimation/correction
// (edges, probabilistic Hough segments, median angle, rotation).

pub mod image;
pub mod render;
pub mod scan;

// Re-export the primary structs so callers can use `docscan_document::SkewEstimator` etc.
pub use image::processor::ImageProcessor;
pub use render::{DirectorySink, NullSink, RenderSink};
pub use scan::deskew::SkewEstimator;
pub use scan::enhance::ScanEnhancer;
