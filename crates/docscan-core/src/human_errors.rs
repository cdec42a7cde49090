// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error reports.
//
// Every technical error is mapped to plain English naming the stage that
// failed, with a suggestion. Severity tells the caller whether re-running with
// different detector settings can help.

use crate::error::DocscanError;
use crate::types::Stage;

/// Severity of an error from the caller's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Detection came up empty; adjusted thresholds may succeed.
    Tunable,
    /// The caller must fix something (path, config value) before retrying.
    ActionRequired,
    /// Retrying the same input cannot help.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Stage that failed.
    pub stage: Stage,
    /// Plain English summary.
    pub message: String,
    /// What to try next.
    pub suggestion: String,
    /// Whether re-running with different detector parameters may succeed.
    pub retriable: bool,
    pub severity: Severity,
}

impl std::fmt::Display for HumanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} stage) {}", self.message, self.stage, self.suggestion)
    }
}

/// Convert a `DocscanError` into a `HumanError`.
pub fn humanize_error(err: &DocscanError) -> HumanError {
    let stage = err.stage();
    match err {
        DocscanError::InvalidInput(detail) => HumanError {
            stage,
            message: "The input image could not be used.".into(),
            suggestion: format!(
                "Check that the path exists and points to a JPEG or PNG photo. ({detail})"
            ),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        DocscanError::InvalidParameter { detail, .. } => HumanError {
            stage,
            message: "A setting is out of range.".into(),
            suggestion: format!("Correct the value and run again. ({detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        DocscanError::NoEdgesDetected { stage: Stage::Edges, .. } => HumanError {
            stage,
            message: "No edges were found in the image.".into(),
            suggestion: "Lower the edge thresholds, or check that the photo is in focus and not blank.".into(),
            retriable: true,
            severity: Severity::Tunable,
        },

        DocscanError::NoEdgesDetected { .. } | DocscanError::DegenerateAggregation => {
            HumanError {
                stage,
                message: "No straight lines were found, so the skew could not be measured.".into(),
                suggestion: "Lower the vote threshold or minimum line length, or raise the maximum gap.".into(),
                retriable: true,
                severity: Severity::Tunable,
            }
        }

        DocscanError::ImageError { detail, .. } => HumanError {
            stage,
            message: "The image could not be processed.".into(),
            suggestion: format!("Try a different output format or location. ({detail})"),
            retriable: false,
            severity: Severity::Permanent,
        },

        DocscanError::Config(detail) => HumanError {
            stage,
            message: "The configuration file could not be read.".into(),
            suggestion: format!("Check the --config path. ({detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        DocscanError::Serialization(detail) => HumanError {
            stage,
            message: "The configuration file is not valid JSON.".into(),
            suggestion: format!("Fix the syntax near the reported position. ({detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        DocscanError::Io(detail) => HumanError {
            stage,
            message: "A file could not be written.".into(),
            suggestion: format!("Check that the output folder exists and is writable. ({detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },
    }
}
