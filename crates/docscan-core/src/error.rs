// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for docscan.

use thiserror::Error;

use crate::types::Stage;

/// Top-level error type for all docscan operations.
///
/// Every variant can name the pipeline [`Stage`] it came from, so callers can
/// decide whether re-running with different detector thresholds makes sense.
#[derive(Debug, Error)]
pub enum DocscanError {
    // -- Input --
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid {stage} parameter: {detail}")]
    InvalidParameter { stage: Stage, detail: String },

    // -- Detection --
    /// The edge map was empty or the line detector returned no segments.
    /// Distinct from a zero-degree estimate, which means "confirmed straight".
    #[error("no edges detected during {stage}: {detail}")]
    NoEdgesDetected { stage: Stage, detail: String },

    #[error("skew angle undefined: no line segments to aggregate")]
    DegenerateAggregation,

    // -- Codec / output --
    #[error("image {stage} failed: {detail}")]
    ImageError { stage: Stage, detail: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration parse error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DocscanError {
    /// Shorthand for an [`DocscanError::InvalidParameter`] at `stage`.
    pub fn invalid_parameter(stage: Stage, detail: impl Into<String>) -> Self {
        Self::InvalidParameter {
            stage,
            detail: detail.into(),
        }
    }

    /// The pipeline stage that produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            DocscanError::InvalidInput(_) => Stage::Load,
            DocscanError::InvalidParameter { stage, .. }
            | DocscanError::NoEdgesDetected { stage, .. }
            | DocscanError::ImageError { stage, .. } => *stage,
            DocscanError::DegenerateAggregation => Stage::Aggregation,
            DocscanError::Config(_) | DocscanError::Serialization(_) => Stage::Config,
            DocscanError::Io(_) => Stage::Save,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocscanError>;
