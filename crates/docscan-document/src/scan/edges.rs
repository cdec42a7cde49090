// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Edge extraction: Canny-style detector with a configurable Sobel aperture.
//
// Gradients use separable Sobel kernels of size 3, 5 or 7 with reflect-101
// borders. No pre-blur is applied: the aperture alone sets the amount of
// smoothing. Magnitude is the L1 norm |gx| + |gy|.

use docscan_core::config::{EdgeSettings, SUPPORTED_APERTURES};
use docscan_core::error::{DocscanError, Result};
use docscan_core::types::Stage;
use image::{GrayImage, Luma};
use tracing::{debug, instrument};

/// Value written for edge pixels in the edge map.
pub const EDGE: u8 = 255;

const TAN_22_5_DEG: f32 = 0.414_213_56;

/// Extract a binary edge map (0 / [`EDGE`]) from a grayscale image.
///
/// Pixels whose gradient exceeds `high_threshold` seed edges; connected pixels
/// above `low_threshold` extend them. Equal thresholds reduce this to a single
/// cut.
#[instrument(skip(gray), fields(width = gray.width(), height = gray.height()))]
pub fn extract_edges(
    gray: &GrayImage,
    low_threshold: f32,
    high_threshold: f32,
    aperture_size: u32,
) -> Result<GrayImage> {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return Err(DocscanError::InvalidInput(format!(
            "cannot extract edges from a {}x{} image",
            width, height
        )));
    }
    EdgeSettings {
        low_threshold,
        high_threshold,
        aperture_size,
    }
    .validate()?;

    let gradients = Gradients::sobel(gray, aperture_size)?;
    let candidates = gradients.suppress_non_maxima(low_threshold);
    let edges = hysteresis(&candidates, width, height, high_threshold);

    debug!(
        edge_pixels = count_edge_pixels(&edges),
        low_threshold, high_threshold, aperture_size, "Edge extraction complete"
    );
    Ok(edges)
}

/// [`extract_edges`] driven by an [`EdgeSettings`] block.
pub fn extract_edges_with(gray: &GrayImage, settings: &EdgeSettings) -> Result<GrayImage> {
    extract_edges(
        gray,
        settings.low_threshold,
        settings.high_threshold,
        settings.aperture_size,
    )
}

/// Number of set pixels in an edge map.
pub fn count_edge_pixels(edges: &GrayImage) -> usize {
    edges.pixels().filter(|p| p.0[0] != 0).count()
}

// -- Gradients ----------------------------------------------------------------

struct Gradients {
    width: usize,
    height: usize,
    gx: Vec<f32>,
    gy: Vec<f32>,
    mag: Vec<f32>,
}

impl Gradients {
    fn sobel(gray: &GrayImage, aperture_size: u32) -> Result<Self> {
        let (smooth, deriv) = sobel_kernels(aperture_size)?;
        let width = gray.width() as usize;
        let height = gray.height() as usize;
        let src: Vec<f32> = gray.as_raw().iter().map(|&v| f32::from(v)).collect();

        // gx: derivative along x, smoothing along y. gy: the transpose.
        let gx = convolve_separable(&src, width, height, &deriv, &smooth);
        let gy = convolve_separable(&src, width, height, &smooth, &deriv);
        let mag = gx
            .iter()
            .zip(&gy)
            .map(|(x, y)| x.abs() + y.abs())
            .collect();

        Ok(Self {
            width,
            height,
            gx,
            gy,
            mag,
        })
    }

    fn mag_at(&self, x: isize, y: isize) -> f32 {
        if x < 0 || y < 0 || x >= self.width as isize || y >= self.height as isize {
            return 0.0;
        }
        self.mag[y as usize * self.width + x as usize]
    }

    /// Thin ridges to one pixel. Returns the surviving magnitudes (0 elsewhere).
    ///
    /// Along the gradient direction a pixel must beat the neighbour before it
    /// strictly and the one after it non-strictly, so a plateau two pixels
    /// wide keeps exactly one of them.
    fn suppress_non_maxima(&self, low_threshold: f32) -> Vec<f32> {
        let mut out = vec![0.0f32; self.mag.len()];
        for y in 0..self.height {
            for x in 0..self.width {
                let idx = y * self.width + x;
                let mag = self.mag[idx];
                if mag <= low_threshold {
                    continue;
                }

                let gx = self.gx[idx];
                let gy = self.gy[idx];
                let (abs_gx, abs_gy) = (gx.abs(), gy.abs());
                let (xi, yi) = (x as isize, y as isize);

                let (before, after) = if abs_gy <= abs_gx * TAN_22_5_DEG {
                    (self.mag_at(xi - 1, yi), self.mag_at(xi + 1, yi))
                } else if abs_gx <= abs_gy * TAN_22_5_DEG {
                    (self.mag_at(xi, yi - 1), self.mag_at(xi, yi + 1))
                } else if (gx >= 0.0) == (gy >= 0.0) {
                    (self.mag_at(xi - 1, yi - 1), self.mag_at(xi + 1, yi + 1))
                } else {
                    (self.mag_at(xi + 1, yi - 1), self.mag_at(xi - 1, yi + 1))
                };

                if mag > before && mag >= after {
                    out[idx] = mag;
                }
            }
        }
        out
    }
}

/// Grow edges from pixels above `high` through 8-connected candidates.
fn hysteresis(candidates: &[f32], width: u32, height: u32, high: f32) -> GrayImage {
    let (w, h) = (width as usize, height as usize);
    let mut edges = GrayImage::new(width, height);
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for (idx, &mag) in candidates.iter().enumerate() {
        if mag > high {
            stack.push((idx % w, idx / w));
        }
    }

    while let Some((x, y)) = stack.pop() {
        if edges.get_pixel(x as u32, y as u32).0[0] == EDGE {
            continue;
        }
        edges.put_pixel(x as u32, y as u32, Luma([EDGE]));

        for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
            for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                if candidates[ny * w + nx] > 0.0
                    && edges.get_pixel(nx as u32, ny as u32).0[0] != EDGE
                {
                    stack.push((nx, ny));
                }
            }
        }
    }

    edges
}

// -- Kernels ------------------------------------------------------------------

/// Smoothing (binomial) and derivative kernels for an odd aperture.
///
/// The derivative is the binomial of length `aperture - 2` convolved with
/// `[-1, 0, 1]`, giving `[-1, 0, 1]`, `[-1, -2, 0, 2, 1]`, `[-1, -4, -5, 0, 5, 4, 1]`.
fn sobel_kernels(aperture_size: u32) -> Result<(Vec<f32>, Vec<f32>)> {
    if !SUPPORTED_APERTURES.contains(&aperture_size) {
        return Err(DocscanError::invalid_parameter(
            Stage::Edges,
            format!("unsupported aperture size {}", aperture_size),
        ));
    }
    let n = aperture_size as usize;
    let smooth = binomial(n);
    let inner = binomial(n - 2);
    let mut deriv = vec![0.0f32; n];
    for (i, &c) in inner.iter().enumerate() {
        deriv[i] -= c;
        deriv[i + 2] += c;
    }
    Ok((smooth, deriv))
}

fn binomial(n: usize) -> Vec<f32> {
    let mut row = vec![1.0f32];
    for _ in 1..n {
        let mut next = vec![1.0f32; row.len() + 1];
        for i in 1..row.len() {
            next[i] = row[i - 1] + row[i];
        }
        row = next;
    }
    row
}

/// Apply `h_kernel` along rows, then `v_kernel` along columns (correlation).
fn convolve_separable(
    src: &[f32],
    width: usize,
    height: usize,
    h_kernel: &[f32],
    v_kernel: &[f32],
) -> Vec<f32> {
    let h_radius = (h_kernel.len() / 2) as isize;
    let v_radius = (v_kernel.len() / 2) as isize;

    let mut rows = vec![0.0f32; src.len()];
    for y in 0..height {
        let row = &src[y * width..(y + 1) * width];
        for x in 0..width {
            rows[y * width + x] = h_kernel
                .iter()
                .enumerate()
                .map(|(k, &c)| c * row[reflect101(x as isize + k as isize - h_radius, width)])
                .sum();
        }
    }

    let mut out = vec![0.0f32; src.len()];
    for y in 0..height {
        for x in 0..width {
            out[y * width + x] = v_kernel
                .iter()
                .enumerate()
                .map(|(k, &c)| {
                    let sy = reflect101(y as isize + k as isize - v_radius, height);
                    c * rows[sy * width + x]
                })
                .sum();
        }
    }
    out
}

/// Mirror an out-of-range index without repeating the border sample.
fn reflect101(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let n = n as isize;
    let period = 2 * (n - 1);
    let mut i = i.rem_euclid(period);
    if i >= n {
        i = period - i;
    }
    i as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Left half dark, right half light: one vertical step edge at x = 10.
    fn vertical_step(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, _| {
            if x < width / 2 { Luma([20u8]) } else { Luma([230u8]) }
        })
    }

    #[test]
    fn kernels_match_sobel() {
        let (s3, d3) = sobel_kernels(3).unwrap();
        assert_eq!(s3, vec![1.0, 2.0, 1.0]);
        assert_eq!(d3, vec![-1.0, 0.0, 1.0]);
        let (s5, d5) = sobel_kernels(5).unwrap();
        assert_eq!(s5, vec![1.0, 4.0, 6.0, 4.0, 1.0]);
        assert_eq!(d5, vec![-1.0, -2.0, 0.0, 2.0, 1.0]);
        let (_, d7) = sobel_kernels(7).unwrap();
        assert_eq!(d7, vec![-1.0, -4.0, -5.0, 0.0, 5.0, 4.0, 1.0]);
    }

    #[test]
    fn reflect101_mirrors_without_border_repeat() {
        assert_eq!(reflect101(-1, 5), 1);
        assert_eq!(reflect101(-2, 5), 2);
        assert_eq!(reflect101(5, 5), 3);
        assert_eq!(reflect101(6, 5), 2);
        assert_eq!(reflect101(0, 1), 0);
    }

    #[test]
    fn step_edge_is_one_pixel_wide() {
        let edges = extract_edges(&vertical_step(20, 12), 100.0, 100.0, 3).unwrap();
        for y in 0..12 {
            let row: Vec<u32> = (0..20).filter(|&x| edges.get_pixel(x, y).0[0] == EDGE).collect();
            assert_eq!(row.len(), 1, "row {y}: {row:?}");
            assert!(row[0] == 9 || row[0] == 10, "row {y}: {row:?}");
        }
    }

    #[test]
    fn blank_image_has_no_edges() {
        let blank = GrayImage::from_pixel(30, 30, Luma([128u8]));
        let edges = extract_edges(&blank, 50.0, 50.0, 5).unwrap();
        assert_eq!(count_edge_pixels(&edges), 0);
    }

    #[test]
    fn high_threshold_above_gradient_suppresses_edge() {
        // Step of 210 gives an L1 magnitude of 4 * 210 = 840 with aperture 3.
        let edges = extract_edges(&vertical_step(20, 12), 100.0, 900.0, 3).unwrap();
        assert_eq!(count_edge_pixels(&edges), 0);
    }

    #[test]
    fn hysteresis_extends_from_strong_seeds() {
        // Upper rows carry a strong step, lower rows a weak one on the same column.
        let img = GrayImage::from_fn(20, 20, |x, y| {
            let high = if y < 10 { 230u8 } else { 60u8 };
            if x < 10 { Luma([20u8]) } else { Luma([high]) }
        });
        let single = extract_edges(&img, 500.0, 500.0, 3).unwrap();
        let linked = extract_edges(&img, 100.0, 500.0, 3).unwrap();
        assert!(count_edge_pixels(&linked) > count_edge_pixels(&single));
    }

    #[test]
    fn even_aperture_rejected() {
        let img = vertical_step(10, 10);
        assert!(matches!(
            extract_edges(&img, 10.0, 10.0, 4),
            Err(DocscanError::InvalidParameter { stage: Stage::Edges, .. })
        ));
    }

    #[test]
    fn empty_image_is_invalid_input() {
        let img = GrayImage::new(0, 5);
        assert!(matches!(
            extract_edges(&img, 10.0, 10.0, 3),
            Err(DocscanError::InvalidInput(_))
        ));
    }
}
