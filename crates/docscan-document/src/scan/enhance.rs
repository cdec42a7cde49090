// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan view: adaptive binarization of a photographed page, with optional
// side-by-side collage and resize of the result.

use std::path::Path;

use docscan_core::config::ScanSettings;
use docscan_core::error::{DocscanError, Result};
use docscan_core::types::{Stage, ThresholdMethod};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use imageproc::definitions::Image;
use imageproc::filter::gaussian_blur_f32;
use tracing::{debug, info, instrument};

use crate::image::processor::{concat_horizontal, load_image, resize_to_height};
use crate::render::RenderSink;

/// Turns a photographed page into a black-and-white "scanned" rendition.
///
/// Works like [`ImageProcessor`](crate::image::ImageProcessor): construct,
/// chain consuming operations, then take the image out.
pub struct ScanEnhancer {
    image: DynamicImage,
}

impl ScanEnhancer {
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Binarization ---------------------------------------------------------

    /// Apply adaptive thresholding to produce a black-and-white image.
    ///
    /// For each pixel the threshold is a local average over a
    /// `block_size x block_size` neighbourhood minus `offset`. Pixels brighter
    /// than their threshold become white, the rest black.
    ///
    /// A typical `block_size` is 11 and `offset` is 10.
    #[instrument(skip(self))]
    pub fn binarize(self, block_size: u32, offset: f32, method: ThresholdMethod) -> Result<Self> {
        info!(block_size, offset, "Applying adaptive binarization");
        let gray = self.image.to_luma8();
        let binary = adaptive_threshold(&gray, block_size, offset, method)?;
        Ok(Self {
            image: DynamicImage::ImageLuma8(binary),
        })
    }

    /// [`binarize`](Self::binarize) with the parameters from `settings`.
    pub fn binarize_with(self, settings: &ScanSettings) -> Result<Self> {
        self.binarize(settings.block_size, settings.offset, settings.method)
    }
}

/// Binarize `gray` against a local threshold.
///
/// Output is 255 where `pixel > local_average - offset`, else 0.
pub fn adaptive_threshold(
    gray: &GrayImage,
    block_size: u32,
    offset: f32,
    method: ThresholdMethod,
) -> Result<GrayImage> {
    if block_size < 3 || block_size % 2 == 0 {
        return Err(DocscanError::invalid_parameter(
            Stage::Binarize,
            format!("block size must be odd and at least 3, got {block_size}"),
        ));
    }
    if !offset.is_finite() {
        return Err(DocscanError::invalid_parameter(
            Stage::Binarize,
            "offset must be finite",
        ));
    }
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return Err(DocscanError::InvalidInput(
            "cannot binarize an empty image".into(),
        ));
    }

    let output = match method {
        ThresholdMethod::Gaussian => {
            let sigma = (block_size - 1) as f32 / 6.0;
            // Blur in f32: the local mean must not be rounded before the offset.
            let levels: Image<Luma<f32>> =
                ImageBuffer::from_fn(width, height, |x, y| Luma([f32::from(gray.get_pixel(x, y).0[0])]));
            let local = gaussian_blur_f32(&levels, sigma);
            GrayImage::from_fn(width, height, |x, y| {
                let threshold = local.get_pixel(x, y).0[0] - offset;
                binary_pixel(gray.get_pixel(x, y).0[0], threshold)
            })
        }
        ThresholdMethod::Mean => {
            let integral = compute_integral_image(gray);
            let radius = block_size / 2;
            GrayImage::from_fn(width, height, |x, y| {
                let local = region_mean(&integral, width, height, x, y, radius);
                binary_pixel(gray.get_pixel(x, y).0[0], local as f32 - offset)
            })
        }
    };

    debug!(width, height, "Binarization complete");
    Ok(output)
}

fn binary_pixel(value: u8, threshold: f32) -> Luma<u8> {
    if value as f32 > threshold {
        Luma([255])
    } else {
        Luma([0])
    }
}

// -- Scan view ----------------------------------------------------------------

/// Result of [`scan_view`].
#[derive(Debug, Clone)]
pub struct ScanOutput {
    /// The image as loaded.
    pub original: DynamicImage,
    /// The binarized page, same size as `original`.
    pub scanned: GrayImage,
    /// What gets saved: `scanned`, or the collage, possibly resized.
    pub rendition: DynamicImage,
}

/// Load `path` and produce its scanned rendition.
#[instrument(skip(settings, sink), fields(path = %path.as_ref().display()))]
pub fn scan_view(
    path: impl AsRef<Path>,
    settings: &ScanSettings,
    sink: &mut dyn RenderSink,
) -> Result<ScanOutput> {
    let original = load_image(path)?;
    scan_image(original, settings, sink)
}

/// [`scan_view`] for an image already in memory.
#[instrument(skip_all, fields(width = original.width(), height = original.height()))]
pub fn scan_image(
    original: DynamicImage,
    settings: &ScanSettings,
    sink: &mut dyn RenderSink,
) -> Result<ScanOutput> {
    settings.validate()?;

    let scanned = ScanEnhancer::from_dynamic(original.clone())
        .binarize_with(settings)?
        .into_dynamic()
        .into_luma8();

    let mut rendition = DynamicImage::ImageLuma8(scanned.clone());
    if settings.collage {
        rendition = concat_horizontal(&[original.clone(), rendition])?;
        debug!(width = rendition.width(), "Built side-by-side collage");
    }
    if settings.resize {
        rendition = resize_to_height(rendition, settings.target_height)?;
    }

    sink.render("original", &original)?;
    sink.render("scanned", &rendition)?;

    info!(
        out_width = rendition.width(),
        out_height = rendition.height(),
        collage = settings.collage,
        "Scan view complete"
    );
    Ok(ScanOutput {
        original,
        scanned,
        rendition,
    })
}

// -- Integral image helpers ---------------------------------------------------

/// Compute the integral (summed-area table) of a grayscale image.
///
/// `integral[y * (width+1) + x]` holds the sum of all pixels in `[0, x) x [0, y)`.
fn compute_integral_image(gray: &GrayImage) -> Vec<u64> {
    let (w, h) = gray.dimensions();
    let stride = (w + 1) as usize;
    let mut table = vec![0u64; stride * (h + 1) as usize];

    for y in 0..h {
        let mut row_sum: u64 = 0;
        for x in 0..w {
            row_sum += gray.get_pixel(x, y).0[0] as u64;
            let idx = (y + 1) as usize * stride + (x + 1) as usize;
            let above = y as usize * stride + (x + 1) as usize;
            table[idx] = row_sum + table[above];
        }
    }

    table
}

/// Mean pixel value within the square of `radius` around (cx, cy), clipped
/// to the image.
fn region_mean(
    integral: &[u64],
    img_width: u32,
    img_height: u32,
    cx: u32,
    cy: u32,
    radius: u32,
) -> f64 {
    let stride = (img_width + 1) as usize;

    let x1 = cx.saturating_sub(radius) as usize;
    let y1 = cy.saturating_sub(radius) as usize;
    let x2 = ((cx + radius + 1) as usize).min(img_width as usize);
    let y2 = ((cy + radius + 1) as usize).min(img_height as usize);

    let area = ((x2 - x1) * (y2 - y1)) as f64;
    let sum = integral[y2 * stride + x2] as f64
        - integral[y1 * stride + x2] as f64
        - integral[y2 * stride + x1] as f64
        + integral[y1 * stride + x1] as f64;

    sum / area
}
