// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Skew estimation and correction.
//
// Page skew shows up as many roughly parallel lines (text baselines, ruled
// borders) contaminated by a minority of unrelated edges. The estimate is the
// median of the per-segment angles: unweighted, and robust to just under half
// of the segments being outliers.

use docscan_core::config::{DocscanConfig, EdgeSettings, RotationSettings};
use docscan_core::error::{DocscanError, Result};
use docscan_core::types::{AngleNormalization, Stage};
use image::DynamicImage;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::image::processor::ImageProcessor;
use crate::render::RenderSink;
use crate::scan::edges::{count_edge_pixels, extract_edges_with};
use crate::scan::hough::{LineDetector, LineSegment, ProbabilisticHough};

/// The skew angle together with the evidence behind it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SkewEstimate {
    /// Median segment angle in degrees. Rotating counter-clockwise by this
    /// amount straightens the page.
    pub angle_degrees: f64,
    /// Segments that contributed one sample each.
    pub segment_count: usize,
    /// Set pixels in the edge map.
    pub edge_pixel_count: usize,
    /// Median absolute deviation of the segment angles.
    pub spread_degrees: f64,
}

/// Result of a full deskew run.
#[derive(Debug, Clone)]
pub struct DeskewOutput {
    pub estimate: SkewEstimate,
    pub rotated: DynamicImage,
}

// -- Aggregation --------------------------------------------------------------

/// Per-segment orientation in degrees, in input order.
pub fn segment_angles(segments: &[LineSegment]) -> Vec<f64> {
    segments.iter().map(LineSegment::angle_degrees).collect()
}

/// Median segment angle, without folding near the ±180° wrap.
///
/// Fails with [`DocscanError::DegenerateAggregation`] when `segments` is empty.
pub fn aggregate_skew_angle(segments: &[LineSegment]) -> Result<f64> {
    aggregate_skew_angle_with(segments, AngleNormalization::None)
}

/// Median segment angle after applying `normalization` to every sample.
pub fn aggregate_skew_angle_with(
    segments: &[LineSegment],
    normalization: AngleNormalization,
) -> Result<f64> {
    let angles: Vec<f64> = segments
        .iter()
        .map(|segment| normalization.apply(segment.angle_degrees()))
        .collect();
    median(&angles).ok_or(DocscanError::DegenerateAggregation)
}

/// Median of `values`: the middle element for odd lengths, the mean of the
/// two middle elements for even lengths. `None` when empty.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

fn median_absolute_deviation(
    segments: &[LineSegment],
    normalization: AngleNormalization,
    center: f64,
) -> f64 {
    let deviations: Vec<f64> = segments
        .iter()
        .map(|segment| (normalization.apply(segment.angle_degrees()) - center).abs())
        .collect();
    median(&deviations).unwrap_or(0.0)
}

// -- Rotation -----------------------------------------------------------------

/// Rotate counter-clockwise by `angle_degrees` on a canvas grown to fit.
pub fn rotate(
    image: &DynamicImage,
    angle_degrees: f64,
    settings: &RotationSettings,
) -> Result<DynamicImage> {
    if !angle_degrees.is_finite() {
        return Err(DocscanError::invalid_parameter(
            Stage::Rotation,
            format!("rotation angle must be finite, got {angle_degrees}"),
        ));
    }
    Ok(ImageProcessor::from_dynamic(image.clone())
        .rotate(angle_degrees as f32, settings.interpolation, settings.background)
        .into_dynamic())
}

// -- Estimator ----------------------------------------------------------------

/// Edge extraction → line detection → median aggregation → rotation.
///
/// The line detector is pluggable; [`ProbabilisticHough`] is the default.
#[derive(Debug, Clone)]
pub struct SkewEstimator<D = ProbabilisticHough> {
    edges: EdgeSettings,
    detector: D,
    normalization: AngleNormalization,
    rotation: RotationSettings,
}

impl Default for SkewEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl SkewEstimator {
    /// Estimator with the reference thresholds and the Hough detector.
    pub fn new() -> Self {
        Self::from_config(&DocscanConfig::default())
    }

    pub fn from_config(config: &DocscanConfig) -> Self {
        Self {
            edges: config.edges.clone(),
            detector: ProbabilisticHough::from_settings(&config.lines),
            normalization: config.aggregation.normalization,
            rotation: config.rotation.clone(),
        }
    }
}

impl<D: LineDetector> SkewEstimator<D> {
    /// Swap the line detector, keeping every other setting.
    pub fn with_detector<E: LineDetector>(self, detector: E) -> SkewEstimator<E> {
        SkewEstimator {
            edges: self.edges,
            detector,
            normalization: self.normalization,
            rotation: self.rotation,
        }
    }

    pub fn with_normalization(mut self, normalization: AngleNormalization) -> Self {
        self.normalization = normalization;
        self
    }

    /// Estimate the skew of `image` (converted to grayscale first).
    ///
    /// An empty edge map or an empty segment list is reported as
    /// [`DocscanError::NoEdgesDetected`], never as a zero angle.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn estimate(&self, image: &DynamicImage, sink: &mut dyn RenderSink) -> Result<SkewEstimate> {
        let gray = image.to_luma8();
        if gray.width() == 0 || gray.height() == 0 {
            return Err(DocscanError::InvalidInput(format!(
                "cannot estimate skew of a {}x{} image",
                gray.width(),
                gray.height()
            )));
        }

        let edges = extract_edges_with(&gray, &self.edges)?;
        let edge_pixel_count = count_edge_pixels(&edges);
        if edge_pixel_count == 0 {
            warn!(
                low = self.edges.low_threshold,
                high = self.edges.high_threshold,
                "Edge map is empty"
            );
            return Err(DocscanError::NoEdgesDetected {
                stage: Stage::Edges,
                detail: format!(
                    "no gradient exceeded the high threshold {}",
                    self.edges.high_threshold
                ),
            });
        }
        sink.render("edges", &DynamicImage::ImageLuma8(edges.clone()))?;

        let segments = self.detector.detect(&edges)?;
        if segments.is_empty() {
            warn!(edge_pixel_count, "Line detector returned no segments");
            return Err(DocscanError::NoEdgesDetected {
                stage: Stage::Lines,
                detail: format!("{} edge pixels produced no line segment", edge_pixel_count),
            });
        }

        let angle_degrees = aggregate_skew_angle_with(&segments, self.normalization)?;
        let spread_degrees = median_absolute_deviation(&segments, self.normalization, angle_degrees);

        let estimate = SkewEstimate {
            angle_degrees,
            segment_count: segments.len(),
            edge_pixel_count,
            spread_degrees,
        };
        info!(
            angle = estimate.angle_degrees,
            segments = estimate.segment_count,
            spread = estimate.spread_degrees,
            "Skew estimated"
        );
        Ok(estimate)
    }

    /// Estimate the skew of `image` and rotate it straight.
    ///
    /// Colour is preserved: only the estimate works on grayscale. Nothing is
    /// rendered or returned if any stage fails.
    #[instrument(skip_all)]
    pub fn deskew(&self, image: &DynamicImage, sink: &mut dyn RenderSink) -> Result<DeskewOutput> {
        let estimate = self.estimate(image, sink)?;
        let rotated = rotate(image, estimate.angle_degrees, &self.rotation)?;
        debug!(
            width = rotated.width(),
            height = rotated.height(),
            "Deskewed image ready"
        );
        sink.render("rotated", &rotated)?;
        Ok(DeskewOutput { estimate, rotated })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{NullSink, RecordingSink};
    use image::{GrayImage, Luma};
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Segment of unit-ish length pointing at `degrees`.
    fn segment_at(degrees: f64) -> LineSegment {
        let r = degrees.to_radians();
        LineSegment::new(0, 0, (1000.0 * r.cos()).round() as i32, (1000.0 * r.sin()).round() as i32)
    }

    /// White page with dark horizontal bars, rotated clockwise by `skew` so
    /// the bars read as `+skew` degrees.
    fn skewed_page(skew: f64) -> DynamicImage {
        let mut page = GrayImage::from_pixel(420, 320, Luma([255u8]));
        for i in 0..6 {
            let y = 40 + i * 45;
            draw_filled_rect_mut(&mut page, Rect::at(50, y).of_size(320, 10), Luma([20u8]));
        }
        rotate(
            &DynamicImage::ImageLuma8(page),
            -skew,
            &RotationSettings::default(),
        )
        .unwrap()
    }

    fn test_config() -> DocscanConfig {
        let mut config = DocscanConfig::default();
        // Anti-aliased staircase edges drift off the traced line for several
        // pixels at a time, so bridge wider gaps than the default.
        config.lines.vote_threshold = 50;
        config.lines.min_length = 120.0;
        config.lines.max_gap = 20.0;
        config
    }

    struct FixedDetector(Vec<LineSegment>);

    impl LineDetector for FixedDetector {
        fn detect(&self, _edges: &image::GrayImage) -> Result<Vec<LineSegment>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn outlier_segment_is_suppressed() {
        let segments = [
            LineSegment::new(0, 0, 100, 2),
            LineSegment::new(0, 10, 100, 13),
            LineSegment::new(0, 50, 5, 5),
        ];
        let angles = segment_angles(&segments);
        assert!((angles[0] - 1.1458).abs() < 1e-3);
        assert!((angles[1] - 1.7184).abs() < 1e-3);
        assert!((angles[2] + 83.6598).abs() < 1e-3);

        // Sorted: [-83.66, 1.15, 1.72]; the middle sample wins.
        let skew = aggregate_skew_angle(&segments).unwrap();
        assert!((skew - 1.1458).abs() < 1e-3, "skew {skew}");
    }

    #[test]
    fn empty_segments_fail_instead_of_zero() {
        assert!(matches!(
            aggregate_skew_angle(&[]),
            Err(DocscanError::DegenerateAggregation)
        ));
    }

    #[test]
    fn even_count_averages_middle_pair() {
        let segments = [
            LineSegment::new(0, 0, 10, 0),
            LineSegment::new(0, 0, 10, 10),
        ];
        assert!((aggregate_skew_angle(&segments).unwrap() - 22.5).abs() < 1e-9);
    }

    #[test]
    fn median_is_bounded_and_picks_middle() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let len = rng.gen_range(1..25);
            let values: Vec<f64> = (0..len).map(|_| rng.gen_range(-179.0..180.0)).collect();
            let m = median(&values).unwrap();

            let mut sorted = values.clone();
            sorted.sort_by(f64::total_cmp);
            assert!(m >= sorted[0] && m <= sorted[len - 1]);
            if len % 2 == 1 {
                assert!(values.contains(&m));
            } else {
                let expected = (sorted[len / 2 - 1] + sorted[len / 2]) / 2.0;
                assert!((m - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn clustered_majority_beats_outliers() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let mut segments: Vec<LineSegment> = (0..11)
                .map(|_| segment_at(2.0 + rng.gen_range(-0.3..0.3)))
                .collect();
            segments.extend((0..9).map(|_| segment_at(rng.gen_range(-179.0..180.0))));
            let skew = aggregate_skew_angle(&segments).unwrap();
            assert!((skew - 2.0).abs() < 0.5, "skew {skew}");
        }
    }

    #[test]
    fn wrap_boundary_is_not_folded_by_default() {
        // The same physical line traced in opposite directions.
        let segments = [segment_at(179.0), segment_at(-179.0), segment_at(178.0)];
        let raw = aggregate_skew_angle(&segments).unwrap();
        assert!(raw > 170.0, "raw {raw}");

        let folded = aggregate_skew_angle_with(&segments, AngleNormalization::HalfTurn).unwrap();
        assert!((folded + 1.0).abs() < 0.1, "folded {folded}");
    }

    #[test]
    fn non_finite_angle_fails_at_rotation() {
        let page = DynamicImage::ImageLuma8(GrayImage::new(8, 8));
        let err = rotate(&page, f64::NAN, &RotationSettings::default()).unwrap_err();
        assert_eq!(err.stage(), Stage::Rotation);
    }

    #[test]
    fn estimate_recovers_known_skew() {
        let page = skewed_page(3.0);
        let estimator = SkewEstimator::from_config(&test_config());
        let estimate = estimator.estimate(&page, &mut NullSink).unwrap();
        assert!(
            (estimate.angle_degrees - 3.0).abs() < 1.0,
            "estimate {estimate:?}"
        );
        assert!(estimate.segment_count >= 2);
    }

    #[test]
    fn deskewed_page_reads_straight() {
        let page = skewed_page(4.0);
        let estimator = SkewEstimator::from_config(&test_config());
        let mut sink = RecordingSink::default();
        let output = estimator.deskew(&page, &mut sink).unwrap();
        assert_eq!(sink.labels(), vec!["edges", "rotated"]);
        assert!(output.rotated.width() > page.width());

        let again = estimator.estimate(&output.rotated, &mut NullSink).unwrap();
        assert!(again.angle_degrees.abs() < 1.0, "residual {again:?}");
    }

    #[test]
    fn blank_page_reports_no_edges() {
        let blank = DynamicImage::ImageLuma8(GrayImage::from_pixel(100, 80, Luma([240u8])));
        let mut sink = RecordingSink::default();
        let err = SkewEstimator::new().deskew(&blank, &mut sink).unwrap_err();
        assert!(matches!(
            err,
            DocscanError::NoEdgesDetected { stage: Stage::Edges, .. }
        ));
        assert!(sink.frames.is_empty());
    }

    #[test]
    fn short_marks_report_no_segments() {
        // Small dots give edges but nothing long enough to be a line.
        let mut page = GrayImage::from_pixel(200, 200, Luma([255u8]));
        for i in 0..5 {
            draw_filled_rect_mut(&mut page, Rect::at(20 + i * 35, 90).of_size(8, 8), Luma([0u8]));
        }
        let err = SkewEstimator::new()
            .estimate(&DynamicImage::ImageLuma8(page), &mut NullSink)
            .unwrap_err();
        assert!(matches!(
            err,
            DocscanError::NoEdgesDetected { stage: Stage::Lines, .. }
        ));
    }

    #[test]
    fn custom_detector_feeds_aggregation() {
        let page = skewed_page(0.0);
        let estimator = SkewEstimator::new().with_detector(FixedDetector(vec![
            segment_at(-2.0),
            segment_at(-1.0),
            segment_at(60.0),
        ]));
        let estimate = estimator.estimate(&page, &mut NullSink).unwrap();
        assert!((estimate.angle_degrees + 1.0).abs() < 0.1);
        assert_eq!(estimate.segment_count, 3);
    }

    #[test]
    fn empty_detector_output_produces_no_image() {
        let page = skewed_page(2.0);
        let estimator = SkewEstimator::new().with_detector(FixedDetector(Vec::new()));
        let mut sink = RecordingSink::default();
        let err = estimator.deskew(&page, &mut sink).unwrap_err();
        assert_eq!(err.stage(), Stage::Lines);
        assert_eq!(sink.labels(), vec!["edges"]);
    }
}
