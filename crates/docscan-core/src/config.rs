// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration. Defaults reproduce the reference scanner's constants;
// any field may be overridden from a JSON file.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{DocscanError, Result};
use crate::types::{AngleNormalization, RotationInterpolation, Stage, ThresholdMethod};

/// Apertures the Sobel gradient supports.
pub const SUPPORTED_APERTURES: [u32; 3] = [3, 5, 7];

/// Complete settings for one scanner run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocscanConfig {
    pub scan: ScanSettings,
    pub edges: EdgeSettings,
    pub lines: LineSettings,
    pub aggregation: AggregationSettings,
    pub rotation: RotationSettings,
}

/// Adaptive binarization and collage layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Odd side length of the neighbourhood used for the local threshold.
    pub block_size: u32,
    /// Subtracted from the local threshold; higher keeps more paper white.
    pub offset: f32,
    pub method: ThresholdMethod,
    /// Place the original and the scanned rendition side by side.
    pub collage: bool,
    /// Resize the output to `target_height` before saving.
    pub resize: bool,
    pub target_height: u32,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            block_size: 11,
            offset: 10.0,
            method: ThresholdMethod::Gaussian,
            collage: false,
            resize: false,
            target_height: 800,
        }
    }
}

/// Canny-style edge extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeSettings {
    pub low_threshold: f32,
    pub high_threshold: f32,
    /// Sobel kernel size; one of [`SUPPORTED_APERTURES`].
    pub aperture_size: u32,
}

impl Default for EdgeSettings {
    fn default() -> Self {
        // Equal thresholds collapse hysteresis into a single cut.
        Self {
            low_threshold: 100.0,
            high_threshold: 100.0,
            aperture_size: 3,
        }
    }
}

/// Probabilistic Hough line detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineSettings {
    /// Distance resolution of the accumulator in pixels.
    pub rho: f64,
    /// Angular resolution of the accumulator in degrees.
    pub theta_degrees: f64,
    /// Votes a line needs before it is traced into a segment.
    pub vote_threshold: u32,
    /// Segments shorter than this (pixels) are discarded.
    pub min_length: f64,
    /// Largest run of missing edge pixels bridged inside one segment.
    pub max_gap: f64,
    /// Seed for the random pixel visiting order.
    pub seed: u64,
}

impl Default for LineSettings {
    fn default() -> Self {
        Self {
            rho: 1.0,
            theta_degrees: 1.0,
            vote_threshold: 100,
            min_length: 100.0,
            max_gap: 5.0,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationSettings {
    pub normalization: AngleNormalization,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationSettings {
    pub interpolation: RotationInterpolation,
    /// RGBA fill for canvas regions not covered by the rotated source.
    pub background: [u8; 4],
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self {
            interpolation: RotationInterpolation::Bilinear,
            background: [255, 255, 255, 255],
        }
    }
}

impl DocscanConfig {
    /// Read a JSON configuration file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            DocscanError::Config(format!("failed to read {}: {}", path.display(), err))
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Check every section, returning the first violation.
    pub fn validate(&self) -> Result<()> {
        self.scan.validate()?;
        self.edges.validate()?;
        self.lines.validate()?;
        debug!("Configuration validated");
        Ok(())
    }
}

impl ScanSettings {
    pub fn validate(&self) -> Result<()> {
        if self.block_size < 3 || self.block_size % 2 == 0 {
            return Err(DocscanError::invalid_parameter(
                Stage::Binarize,
                format!("block size must be odd and at least 3, got {}", self.block_size),
            ));
        }
        if !self.offset.is_finite() {
            return Err(DocscanError::invalid_parameter(
                Stage::Binarize,
                "offset must be finite",
            ));
        }
        if self.resize && self.target_height == 0 {
            return Err(DocscanError::invalid_parameter(
                Stage::Layout,
                "target height must be positive",
            ));
        }
        Ok(())
    }
}

impl EdgeSettings {
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_APERTURES.contains(&self.aperture_size) {
            return Err(DocscanError::invalid_parameter(
                Stage::Edges,
                format!(
                    "aperture size must be one of {:?}, got {}",
                    SUPPORTED_APERTURES, self.aperture_size
                ),
            ));
        }
        if !(self.low_threshold >= 0.0 && self.high_threshold.is_finite()) {
            return Err(DocscanError::invalid_parameter(
                Stage::Edges,
                "thresholds must be finite and non-negative",
            ));
        }
        if self.low_threshold > self.high_threshold {
            return Err(DocscanError::invalid_parameter(
                Stage::Edges,
                format!(
                    "low threshold {} exceeds high threshold {}",
                    self.low_threshold, self.high_threshold
                ),
            ));
        }
        Ok(())
    }
}

impl LineSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.rho > 0.0 && self.rho.is_finite()) {
            return Err(DocscanError::invalid_parameter(
                Stage::Lines,
                format!("rho must be positive, got {}", self.rho),
            ));
        }
        if !(self.theta_degrees > 0.0 && self.theta_degrees <= 180.0) {
            return Err(DocscanError::invalid_parameter(
                Stage::Lines,
                format!("theta must be in (0, 180] degrees, got {}", self.theta_degrees),
            ));
        }
        if !(self.min_length >= 0.0 && self.max_gap >= 0.0) {
            return Err(DocscanError::invalid_parameter(
                Stage::Lines,
                "minimum length and maximum gap must be non-negative",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        DocscanConfig::default().validate().expect("defaults must validate");
    }

    #[test]
    fn default_edges_collapse_hysteresis() {
        let edges = EdgeSettings::default();
        assert_eq!(edges.low_threshold, edges.high_threshold);
        assert_eq!(edges.aperture_size, 3);
    }

    #[test]
    fn even_block_size_rejected() {
        let mut config = DocscanConfig::default();
        config.scan.block_size = 10;
        let err = config.validate().unwrap_err();
        assert_eq!(err.stage(), Stage::Binarize);
    }

    #[test]
    fn unsupported_aperture_rejected() {
        let mut config = DocscanConfig::default();
        config.edges.aperture_size = 4;
        assert!(matches!(
            config.validate(),
            Err(DocscanError::InvalidParameter { stage: Stage::Edges, .. })
        ));
    }

    #[test]
    fn inverted_thresholds_rejected() {
        let edges = EdgeSettings {
            low_threshold: 150.0,
            high_threshold: 50.0,
            aperture_size: 3,
        };
        assert!(edges.validate().is_err());
    }

    #[test]
    fn zero_rho_rejected() {
        let lines = LineSettings {
            rho: 0.0,
            ..LineSettings::default()
        };
        assert!(lines.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "lines": {{ "vote_threshold": 40 }}, "aggregation": {{ "normalization": "half_turn" }} }}"#
        )
        .unwrap();

        let config = DocscanConfig::load(file.path()).unwrap();
        assert_eq!(config.lines.vote_threshold, 40);
        assert_eq!(config.lines.min_length, 100.0);
        assert_eq!(config.aggregation.normalization, AngleNormalization::HalfTurn);
        assert_eq!(config.scan, ScanSettings::default());
    }

    #[test]
    fn invalid_json_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = DocscanConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, DocscanError::Serialization(_)));
        assert_eq!(err.stage(), Stage::Config);
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = DocscanConfig::load("/nonexistent/docscan.json").unwrap_err();
        assert!(matches!(err, DocscanError::Config(_)));
    }
}
