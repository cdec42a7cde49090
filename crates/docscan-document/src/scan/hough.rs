// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Line segment detection: progressive probabilistic Hough transform.
//
// Edge pixels are visited in random order. Each one votes for every line
// through it; once some line collects more than the vote threshold, that line
// is traced through the edge map in both directions, bridging gaps up to
// `max_gap`. The traced pixels leave the pool whether or not the segment is
// long enough to keep, so later votes are not wasted on them.

use docscan_core::config::LineSettings;
use docscan_core::error::{DocscanError, Result};
use docscan_core::types::Stage;
use image::GrayImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, instrument};

/// Fixed-point fraction bits used while stepping along a line.
const SHIFT: u32 = 16;

/// Upper bound on `angles x distances` accumulator cells (256 MiB of votes).
pub const MAX_ACCUMULATOR_CELLS: usize = 1 << 26;

/// A detected segment with endpoints in image coordinates (y points down).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineSegment {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl LineSegment {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Orientation `atan2(y2 - y1, x2 - x1)` in degrees, range (-180, 180].
    pub fn angle_degrees(&self) -> f64 {
        f64::from(self.y2 - self.y1)
            .atan2(f64::from(self.x2 - self.x1))
            .to_degrees()
    }

    /// Euclidean length in pixels.
    pub fn length(&self) -> f64 {
        f64::from(self.x2 - self.x1).hypot(f64::from(self.y2 - self.y1))
    }
}

/// Anything that turns an edge map into line segments.
pub trait LineDetector {
    /// Detect segments in `edges` (non-zero pixels are edges). May be empty.
    fn detect(&self, edges: &GrayImage) -> Result<Vec<LineSegment>>;
}

/// Progressive probabilistic Hough transform.
#[derive(Debug, Clone)]
pub struct ProbabilisticHough {
    /// Accumulator distance resolution in pixels.
    pub rho: f64,
    /// Accumulator angle resolution in degrees.
    pub theta_degrees: f64,
    /// A line is traced once it holds more than this many votes.
    pub vote_threshold: u32,
    /// Segments whose horizontal and vertical extent are both below this are dropped.
    pub min_length: f64,
    /// Longest run of non-edge pixels bridged inside one segment.
    pub max_gap: f64,
    /// Seed of the pixel visiting order.
    pub seed: u64,
}

impl Default for ProbabilisticHough {
    fn default() -> Self {
        Self::from_settings(&LineSettings::default())
    }
}

impl ProbabilisticHough {
    pub fn from_settings(settings: &LineSettings) -> Self {
        Self {
            rho: settings.rho,
            theta_degrees: settings.theta_degrees,
            vote_threshold: settings.vote_threshold,
            min_length: settings.min_length,
            max_gap: settings.max_gap,
            seed: settings.seed,
        }
    }

    fn settings(&self) -> LineSettings {
        LineSettings {
            rho: self.rho,
            theta_degrees: self.theta_degrees,
            vote_threshold: self.vote_threshold,
            min_length: self.min_length,
            max_gap: self.max_gap,
            seed: self.seed,
        }
    }
}

impl LineDetector for ProbabilisticHough {
    #[instrument(skip_all, fields(width = edges.width(), height = edges.height()))]
    fn detect(&self, edges: &GrayImage) -> Result<Vec<LineSegment>> {
        self.settings().validate()?;
        let (width, height) = edges.dimensions();
        if width == 0 || height == 0 {
            return Err(DocscanError::InvalidInput(format!(
                "cannot detect lines in a {}x{} edge map",
                width, height
            )));
        }

        let mut state = HoughState::new(self, edges)?;
        let segments = state.run(self);

        debug!(
            segments = segments.len(),
            edge_pixels = state.edge_pixel_count,
            vote_threshold = self.vote_threshold,
            "Probabilistic Hough complete"
        );
        Ok(segments)
    }
}

/// Detect segments with an explicit parameter list and the default seed.
pub fn detect_lines(
    edges: &GrayImage,
    rho: f64,
    theta_degrees: f64,
    vote_threshold: u32,
    min_length: f64,
    max_gap: f64,
) -> Result<Vec<LineSegment>> {
    ProbabilisticHough {
        rho,
        theta_degrees,
        vote_threshold,
        min_length,
        max_gap,
        seed: LineSettings::default().seed,
    }
    .detect(edges)
}

// -- Accumulator state --------------------------------------------------------

struct HoughState {
    width: i64,
    height: i64,
    num_angles: usize,
    num_rho: usize,
    /// `cos(theta) / rho` and `sin(theta) / rho` for every accumulator angle.
    trig: Vec<(f64, f64)>,
    accumulator: Vec<u32>,
    /// Edge pixels still available for voting and tracing.
    mask: Vec<bool>,
    points: Vec<(i64, i64)>,
    edge_pixel_count: usize,
}

impl HoughState {
    fn new(params: &ProbabilisticHough, edges: &GrayImage) -> Result<Self> {
        let (width, height) = edges.dimensions();
        let num_angles = (180.0 / params.theta_degrees).round() as usize;
        let num_rho = ((f64::from(width + height) * 2.0 + 1.0) / params.rho).round() as usize;
        if num_angles == 0 || num_rho == 0 {
            return Err(DocscanError::invalid_parameter(
                Stage::Lines,
                format!(
                    "accumulator would be empty ({} angles x {} distances)",
                    num_angles, num_rho
                ),
            ));
        }
        let cells = num_angles
            .checked_mul(num_rho)
            .filter(|&cells| cells <= MAX_ACCUMULATOR_CELLS)
            .ok_or_else(|| {
                DocscanError::invalid_parameter(
                    Stage::Lines,
                    format!(
                        "rho {} / theta {} give a {} x {} accumulator, above the {} cell limit",
                        params.rho, params.theta_degrees, num_angles, num_rho, MAX_ACCUMULATOR_CELLS
                    ),
                )
            })?;

        let step = params.theta_degrees.to_radians();
        let irho = 1.0 / params.rho;
        let trig = (0..num_angles)
            .map(|n| {
                let theta = n as f64 * step;
                (theta.cos() * irho, theta.sin() * irho)
            })
            .collect();

        let mut mask = vec![false; (width * height) as usize];
        let mut points = Vec::new();
        for (x, y, pixel) in edges.enumerate_pixels() {
            if pixel.0[0] != 0 {
                mask[(y * width + x) as usize] = true;
                points.push((i64::from(x), i64::from(y)));
            }
        }

        Ok(Self {
            width: i64::from(width),
            height: i64::from(height),
            num_angles,
            num_rho,
            trig,
            accumulator: vec![0; cells],
            mask,
            edge_pixel_count: points.len(),
            points,
        })
    }

    fn run(&mut self, params: &ProbabilisticHough) -> Vec<LineSegment> {
        let mut rng = StdRng::seed_from_u64(params.seed);
        let max_gap = params.max_gap.floor() as i64;
        let mut segments = Vec::new();

        let mut remaining = self.points.len();
        while remaining > 0 {
            // Draw without replacement.
            let pick = rng.gen_range(0..remaining);
            let (x, y) = self.points[pick];
            self.points.swap(pick, remaining - 1);
            remaining -= 1;

            if !self.mask[self.index(x, y)] {
                continue;
            }

            let Some(best_angle) = self.vote(x, y, params.vote_threshold) else {
                continue;
            };

            let (cos, sin) = self.trig[best_angle];
            // Line direction is perpendicular to its normal (cos, sin).
            let walker = Walker::new(x, y, -sin, cos);

            let ends = [
                self.trace_end(&walker, 1, max_gap),
                self.trace_end(&walker, -1, max_gap),
            ];

            let keep = (ends[1].0 - ends[0].0).abs() as f64 >= params.min_length
                || (ends[1].1 - ends[0].1).abs() as f64 >= params.min_length;

            for (k, &end) in [1i64, -1].iter().zip(ends.iter()) {
                self.consume(&walker, *k, end, keep);
            }

            if keep {
                segments.push(LineSegment::new(
                    ends[0].0 as i32,
                    ends[0].1 as i32,
                    ends[1].0 as i32,
                    ends[1].1 as i32,
                ));
            }
        }

        segments
    }

    fn index(&self, x: i64, y: i64) -> usize {
        (y * self.width + x) as usize
    }

    fn rho_bin(&self, angle: usize, x: i64, y: i64) -> usize {
        let (cos, sin) = self.trig[angle];
        let r = (x as f64 * cos + y as f64 * sin).round() as i64;
        (r + (self.num_rho as i64 - 1) / 2).clamp(0, self.num_rho as i64 - 1) as usize
    }

    /// Cast the votes of (x, y). Returns the best angle if it beat the threshold.
    fn vote(&mut self, x: i64, y: i64, threshold: u32) -> Option<usize> {
        let mut best_votes = 0u32;
        let mut best_angle = 0usize;
        for angle in 0..self.num_angles {
            let bin = angle * self.num_rho + self.rho_bin(angle, x, y);
            self.accumulator[bin] += 1;
            let votes = self.accumulator[bin];
            if votes > best_votes {
                best_votes = votes;
                best_angle = angle;
            }
        }
        (best_votes > threshold).then_some(best_angle)
    }

    fn retract(&mut self, x: i64, y: i64) {
        for angle in 0..self.num_angles {
            let bin = angle * self.num_rho + self.rho_bin(angle, x, y);
            self.accumulator[bin] = self.accumulator[bin].saturating_sub(1);
        }
    }

    fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    /// Walk from the seed in `direction` (+1 / -1) until the gap budget runs
    /// out. Returns the last edge pixel seen.
    fn trace_end(&self, walker: &Walker, direction: i64, max_gap: i64) -> (i64, i64) {
        let mut end = walker.pixel_at(0);
        let mut gap = 0i64;
        for step in 0.. {
            let (px, py) = walker.pixel_at(direction * step);
            if !self.in_bounds(px, py) {
                break;
            }
            if self.mask[self.index(px, py)] {
                gap = 0;
                end = (px, py);
            } else {
                gap += 1;
                if gap > max_gap {
                    break;
                }
            }
        }
        end
    }

    /// Remove the pixels of a traced segment from the pool, retracting their
    /// votes when the segment is kept.
    fn consume(&mut self, walker: &Walker, direction: i64, end: (i64, i64), retract: bool) {
        for step in 0.. {
            let (px, py) = walker.pixel_at(direction * step);
            if !self.in_bounds(px, py) {
                break;
            }
            let idx = self.index(px, py);
            if self.mask[idx] {
                if retract {
                    self.retract(px, py);
                }
                self.mask[idx] = false;
            }
            if (px, py) == end {
                break;
            }
        }
    }
}

/// Fixed-point stepping along a line: one whole pixel per step on the major
/// axis, a fractional increment on the minor one.
struct Walker {
    x_major: bool,
    /// Start position, major axis in pixels, minor axis in fixed point.
    start: (i64, i64),
    /// Per-step increment in the same units.
    delta: (i64, i64),
}

impl Walker {
    fn new(x: i64, y: i64, dir_x: f64, dir_y: f64) -> Self {
        let half = 1i64 << (SHIFT - 1);
        let scale = f64::from(1u32 << SHIFT);
        if dir_x.abs() > dir_y.abs() {
            let dx = if dir_x > 0.0 { 1 } else { -1 };
            let dy = (dir_y * scale / dir_x.abs()).round() as i64;
            Self {
                x_major: true,
                start: (x, (y << SHIFT) + half),
                delta: (dx, dy),
            }
        } else {
            let dy = if dir_y > 0.0 { 1 } else { -1 };
            let dx = (dir_x * scale / dir_y.abs()).round() as i64;
            Self {
                x_major: false,
                start: ((x << SHIFT) + half, y),
                delta: (dx, dy),
            }
        }
    }

    fn pixel_at(&self, step: i64) -> (i64, i64) {
        let x = self.start.0 + step * self.delta.0;
        let y = self.start.1 + step * self.delta.1;
        if self.x_major {
            (x, y >> SHIFT)
        } else {
            (x >> SHIFT, y)
        }
    }
}
