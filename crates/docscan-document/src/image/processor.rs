// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor: load, resize to height, grayscale, canvas-growing rotation,
// horizontal collage, and encoding. Operates on in-memory images using the
// `image` and `imageproc` crates.

use std::path::Path;

use docscan_core::error::{DocscanError, Result};
use docscan_core::types::{RotationInterpolation, Stage};
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageFormat, Pixel, Rgba, RgbaImage};
use imageproc::definitions::{Clamp, Image};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use tracing::{debug, info, instrument};

/// Image processing pipeline operating on a single in-memory image.
///
/// All operations are non-destructive: each method consumes `self` and returns a
/// new `ImageProcessor` wrapping the transformed image, enabling method chaining.
///
/// ```ignore
/// let rotated = ImageProcessor::open_resized("page.jpg", 800)?
///     .grayscale()
///     .rotate(3.5, RotationInterpolation::Bilinear, [255, 255, 255, 255])
///     .to_png_bytes()?;
/// ```
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Load an image from a file path.
    ///
    /// Missing files, undecodable data and images with a zero-length side are
    /// all reported as [`DocscanError::InvalidInput`].
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let img = image::open(path).map_err(|err| {
            DocscanError::InvalidInput(format!("failed to open {}: {}", path.display(), err))
        })?;
        ensure_non_empty(&img, &path.display().to_string())?;
        info!(width = img.width(), height = img.height(), "Image loaded");
        Ok(Self { image: img })
    }

    /// Load an image and resize it to `height` pixels, preserving aspect ratio.
    pub fn open_resized(path: impl AsRef<Path>, height: u32) -> Result<Self> {
        Self::open(path)?.resize_to_height(height)
    }

    /// Create a processor from raw encoded bytes (JPEG, PNG, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(data).map_err(|err| {
            DocscanError::InvalidInput(format!("failed to decode image: {}", err))
        })?;
        ensure_non_empty(&img, "in-memory image")?;
        debug!(width = img.width(), height = img.height(), "Image decoded from bytes");
        Ok(Self { image: img })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    /// Current image width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Current image height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Borrow the underlying `DynamicImage`.
    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    /// Consume the processor and return the underlying `DynamicImage`.
    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Transformations (consume self, return new Self) -----------------------

    /// Resize to exactly `height` pixels tall, scaling the width by the same
    /// factor. Uses Lanczos3 filtering.
    #[instrument(skip(self), fields(height))]
    pub fn resize_to_height(self, height: u32) -> Result<Self> {
        if height == 0 {
            return Err(DocscanError::invalid_parameter(
                Stage::Layout,
                "resize height must be positive",
            ));
        }
        let (from_w, from_h) = (self.image.width(), self.image.height());
        if from_h == height {
            return Ok(self);
        }
        let width = scaled_width(from_w, from_h, height);
        info!(from_w, from_h, width, height, "Resizing image");
        let resized = self.image.resize_exact(width, height, FilterType::Lanczos3);
        Ok(Self { image: resized })
    }

    /// Convert the image to 8-bit grayscale (luma).
    #[instrument(skip(self))]
    pub fn grayscale(self) -> Self {
        debug!("Converting to grayscale");
        Self {
            image: DynamicImage::ImageLuma8(self.image.to_luma8()),
        }
    }

    /// Rotate the image counter-clockwise (as displayed) about its centre by
    /// `degrees`.
    ///
    /// Exact multiples of 90 degrees use lossless rotation. Other angles are
    /// resampled with `interpolation` and the canvas grows so that no source
    /// pixel is cropped; uncovered corners are filled with `background`.
    /// Grayscale inputs stay grayscale (the background's red channel is used).
    #[instrument(skip(self, background), fields(degrees))]
    pub fn rotate(
        self,
        degrees: f32,
        interpolation: RotationInterpolation,
        background: [u8; 4],
    ) -> Self {
        info!(degrees, "Rotating image");

        // Fast-path for exact multiples of 90.
        let normalised = degrees.rem_euclid(360.0);
        if normalised.abs() < 0.01 || (normalised - 360.0).abs() < 0.01 {
            return self;
        }
        if (normalised - 90.0).abs() < 0.01 {
            return Self {
                image: self.image.rotate270(),
            };
        }
        if (normalised - 180.0).abs() < 0.01 {
            return Self {
                image: self.image.rotate180(),
            };
        }
        if (normalised - 270.0).abs() < 0.01 {
            return Self {
                image: self.image.rotate90(),
            };
        }

        let interpolation = match interpolation {
            RotationInterpolation::Nearest => Interpolation::Nearest,
            RotationInterpolation::Bilinear => Interpolation::Bilinear,
            RotationInterpolation::Bicubic => Interpolation::Bicubic,
        };

        let rotated = match self.image {
            DynamicImage::ImageLuma8(gray) => DynamicImage::ImageLuma8(rotate_expanded(
                &gray,
                degrees,
                interpolation,
                image::Luma([background[0]]),
            )),
            other => {
                let rgba: RgbaImage = other.to_rgba8();
                DynamicImage::ImageRgba8(rotate_expanded(
                    &rgba,
                    degrees,
                    interpolation,
                    Rgba(background),
                ))
            }
        };

        debug!(
            new_w = rotated.width(),
            new_h = rotated.height(),
            "General rotation applied"
        );
        Self { image: rotated }
    }

    // -- Output ---------------------------------------------------------------

    /// Encode the current image as PNG bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        encode_to_format(&self.image, ImageFormat::Png)
    }

    /// Write the image to a file. The format is inferred from the file extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        save_image(path, &self.image)
    }
}

// -- Free-standing plumbing ---------------------------------------------------

/// Write `image` to `path`, inferring the format from the extension.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn save_image(path: impl AsRef<Path>, image: &DynamicImage) -> Result<()> {
    let path = path.as_ref();
    image.save(path).map_err(|err| DocscanError::ImageError {
        stage: Stage::Save,
        detail: format!("failed to save image to {}: {}", path.display(), err),
    })?;
    info!(width = image.width(), height = image.height(), "Image saved");
    Ok(())
}

/// Decode the image at `path`. See [`ImageProcessor::open`].
pub fn load_image(path: impl AsRef<Path>) -> Result<DynamicImage> {
    Ok(ImageProcessor::open(path)?.into_dynamic())
}

/// Decode the image at `path` and scale it to `height`, keeping aspect ratio.
pub fn load_and_resize(path: impl AsRef<Path>, height: u32) -> Result<DynamicImage> {
    Ok(ImageProcessor::open_resized(path, height)?.into_dynamic())
}

/// Scale an in-memory image to `height`, keeping aspect ratio.
pub fn resize_to_height(image: DynamicImage, height: u32) -> Result<DynamicImage> {
    Ok(ImageProcessor::from_dynamic(image)
        .resize_to_height(height)?
        .into_dynamic())
}

pub fn to_grayscale(image: &DynamicImage) -> GrayImage {
    image.to_luma8()
}

/// Place `images` side by side, left to right.
///
/// Every image is first resized to the smallest height among them. The result
/// is RGBA so that colour and grayscale inputs can share one canvas.
#[instrument(skip_all, fields(count = images.len()))]
pub fn concat_horizontal(images: &[DynamicImage]) -> Result<DynamicImage> {
    let height = images
        .iter()
        .map(DynamicImage::height)
        .min()
        .ok_or_else(|| DocscanError::InvalidInput("nothing to concatenate".into()))?;
    if height == 0 {
        return Err(DocscanError::InvalidInput(
            "cannot concatenate an image with zero height".into(),
        ));
    }

    let parts: Vec<RgbaImage> = images
        .iter()
        .map(|img| {
            if img.height() == height {
                img.to_rgba8()
            } else {
                let width = scaled_width(img.width(), img.height(), height);
                img.resize_exact(width, height, FilterType::Lanczos3).to_rgba8()
            }
        })
        .collect();

    let total_width: u32 = parts.iter().map(RgbaImage::width).sum();
    let mut canvas = RgbaImage::new(total_width, height);
    let mut x = 0i64;
    for part in &parts {
        image::imageops::replace(&mut canvas, part, x, 0);
        x += i64::from(part.width());
    }

    debug!(total_width, height, "Collage assembled");
    Ok(DynamicImage::ImageRgba8(canvas))
}

/// Rotate counter-clockwise by `degrees` into a canvas large enough to hold
/// every source pixel.
pub fn rotate_expanded<P>(
    image: &Image<P>,
    degrees: f32,
    interpolation: Interpolation,
    background: P,
) -> Image<P>
where
    P: Pixel + Send + Sync + 'static,
    <P as Pixel>::Subpixel: Send + Sync + Into<f32> + Clamp<f32>,
{
    let (width, height) = image.dimensions();
    let (out_w, out_h) = rotated_canvas_size(width, height, degrees);

    // Output pixel = T(out centre) * R(-theta) * T(-in centre) applied to the input.
    let projection = Projection::translate(out_w as f32 / 2.0, out_h as f32 / 2.0)
        * Projection::rotate(-degrees.to_radians())
        * Projection::translate(-(width as f32) / 2.0, -(height as f32) / 2.0);

    let mut output = Image::<P>::from_pixel(out_w, out_h, background);
    warp_into(image, &projection, interpolation, background, &mut output);
    output
}

/// Bounding-box size of a `width` x `height` canvas rotated by `degrees`.
pub fn rotated_canvas_size(width: u32, height: u32, degrees: f32) -> (u32, u32) {
    let radians = f64::from(degrees).to_radians();
    let (sin, cos) = (radians.sin().abs(), radians.cos().abs());
    let (w, h) = (f64::from(width), f64::from(height));
    // Absorb float noise so a 0.0-degree request never grows by a pixel.
    let new_w = (w * cos + h * sin - 1e-6).ceil().max(1.0) as u32;
    let new_h = (w * sin + h * cos - 1e-6).ceil().max(1.0) as u32;
    (new_w, new_h)
}

fn scaled_width(width: u32, height: u32, target_height: u32) -> u32 {
    let scaled = f64::from(width) * f64::from(target_height) / f64::from(height);
    (scaled.round() as u32).max(1)
}

fn ensure_non_empty(image: &DynamicImage, what: &str) -> Result<()> {
    if image.width() == 0 || image.height() == 0 {
        return Err(DocscanError::InvalidInput(format!(
            "{} has a zero-length dimension ({}x{})",
            what,
            image.width(),
            image.height()
        )));
    }
    Ok(())
}

/// Encode a `DynamicImage` into the specified format, returning the raw bytes.
fn encode_to_format(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    image
        .write_to(&mut cursor, format)
        .map_err(|err| DocscanError::ImageError {
            stage: Stage::Save,
            detail: format!("image encoding failed: {}", err),
        })?;
    Ok(buffer)
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    const WHITE: [u8; 4] = [255, 255, 255, 255];

    /// White canvas with a dark rectangle, off-centre so rotations are visible.
    fn block_image(width: u32, height: u32) -> GrayImage {
        let mut img = GrayImage::from_pixel(width, height, Luma([255u8]));
        for y in height / 4..height / 2 {
            for x in width / 5..(width * 3) / 5 {
                img.put_pixel(x, y, Luma([0u8]));
            }
        }
        img
    }

    #[test]
    fn open_missing_file_is_invalid_input() {
        let err = ImageProcessor::open("/nonexistent/page.jpg").err().unwrap();
        assert!(matches!(err, DocscanError::InvalidInput(_)));
        assert_eq!(err.stage(), Stage::Load);
    }

    #[test]
    fn from_bytes_garbage_is_invalid_input() {
        let err = ImageProcessor::from_bytes(b"definitely not an image").err().unwrap();
        assert!(matches!(err, DocscanError::InvalidInput(_)));
    }

    #[test]
    fn free_plumbing_functions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.png");
        save_image(&path, &DynamicImage::ImageLuma8(block_image(120, 60))).unwrap();

        let loaded = load_image(&path).unwrap();
        assert_eq!((loaded.width(), loaded.height()), (120, 60));
        let small = load_and_resize(&path, 30).unwrap();
        assert_eq!((small.width(), small.height()), (60, 30));
        assert_eq!(to_grayscale(&small).dimensions(), (60, 30));

        let err = resize_to_height(loaded, 0).unwrap_err();
        assert!(matches!(err, DocscanError::InvalidParameter { .. }));
    }

    #[test]
    fn save_then_open_resized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.png");
        ImageProcessor::from_dynamic(DynamicImage::ImageLuma8(block_image(200, 100)))
            .save(&path)
            .unwrap();

        let loaded = ImageProcessor::open_resized(&path, 50).unwrap();
        assert_eq!(loaded.height(), 50);
        assert_eq!(loaded.width(), 100);
    }

    #[test]
    fn resize_to_zero_height_rejected() {
        let proc = ImageProcessor::from_dynamic(DynamicImage::ImageLuma8(block_image(20, 10)));
        assert!(matches!(
            proc.resize_to_height(0),
            Err(DocscanError::InvalidParameter { stage: Stage::Layout, .. })
        ));
    }

    #[test]
    fn grayscale_produces_luma8() {
        let rgba = RgbaImage::from_pixel(4, 4, Rgba([10, 200, 30, 255]));
        let gray = ImageProcessor::from_dynamic(DynamicImage::ImageRgba8(rgba)).grayscale();
        assert!(matches!(gray.as_dynamic(), DynamicImage::ImageLuma8(_)));
    }

    #[test]
    fn canvas_size_unchanged_at_zero_degrees() {
        assert_eq!(rotated_canvas_size(300, 200, 0.0), (300, 200));
    }

    #[test]
    fn canvas_grows_for_oblique_angles() {
        let (w, h) = rotated_canvas_size(100, 100, 45.0);
        // 100 * sqrt(2) = 141.42...
        assert_eq!((w, h), (142, 142));
    }

    #[test]
    fn quarter_turn_is_counter_clockwise() {
        // A single black pixel in the top-right corner moves to the top-left.
        let mut img = GrayImage::from_pixel(4, 2, Luma([255u8]));
        img.put_pixel(3, 0, Luma([0u8]));
        let rotated = ImageProcessor::from_dynamic(DynamicImage::ImageLuma8(img))
            .rotate(90.0, RotationInterpolation::Bilinear, WHITE)
            .into_dynamic()
            .to_luma8();
        assert_eq!(rotated.dimensions(), (2, 4));
        assert_eq!(rotated.get_pixel(0, 0).0[0], 0);
    }

    #[test]
    fn oblique_rotation_keeps_grayscale_and_grows() {
        let rotated = ImageProcessor::from_dynamic(DynamicImage::ImageLuma8(block_image(120, 80)))
            .rotate(10.0, RotationInterpolation::Bilinear, WHITE);
        assert!(matches!(rotated.as_dynamic(), DynamicImage::ImageLuma8(_)));
        assert!(rotated.width() > 120);
        assert!(rotated.height() > 80);
    }

    #[test]
    fn rotate_there_and_back_reproduces_content() {
        let (w, h) = (120u32, 80u32);
        let original = block_image(w, h);
        let round_trip = ImageProcessor::from_dynamic(DynamicImage::ImageLuma8(original.clone()))
            .rotate(12.0, RotationInterpolation::Bilinear, WHITE)
            .rotate(-12.0, RotationInterpolation::Bilinear, WHITE)
            .into_dynamic()
            .to_luma8();

        // Content stays centred on the grown canvas.
        let off_x = (round_trip.width() - w) / 2;
        let off_y = (round_trip.height() - h) / 2;
        let mut total_diff = 0u64;
        for y in 0..h {
            for x in 0..w {
                let a = i32::from(original.get_pixel(x, y).0[0]);
                let b = i32::from(round_trip.get_pixel(x + off_x, y + off_y).0[0]);
                total_diff += (a - b).unsigned_abs() as u64;
            }
        }
        let mean_diff = total_diff as f64 / f64::from(w * h);
        assert!(mean_diff < 12.0, "mean abs difference {mean_diff}");
    }

    #[test]
    fn concat_uses_smallest_height() {
        let tall = DynamicImage::ImageLuma8(GrayImage::new(40, 100));
        let short = DynamicImage::ImageRgba8(RgbaImage::new(30, 50));
        let collage = concat_horizontal(&[tall, short]).unwrap();
        assert_eq!(collage.height(), 50);
        assert_eq!(collage.width(), 20 + 30);
    }

    #[test]
    fn concat_places_images_left_to_right() {
        let black = DynamicImage::ImageLuma8(GrayImage::from_pixel(3, 3, Luma([0u8])));
        let white = DynamicImage::ImageLuma8(GrayImage::from_pixel(2, 3, Luma([255u8])));
        let collage = concat_horizontal(&[black, white]).unwrap().to_luma8();
        assert_eq!(collage.get_pixel(2, 1).0[0], 0);
        assert_eq!(collage.get_pixel(3, 1).0[0], 255);
    }

    #[test]
    fn concat_empty_is_invalid_input() {
        assert!(matches!(
            concat_horizontal(&[]),
            Err(DocscanError::InvalidInput(_))
        ));
    }

    #[test]
    fn png_bytes_round_trip() {
        let proc = ImageProcessor::from_dynamic(DynamicImage::ImageLuma8(block_image(10, 10)));
        let bytes = proc.to_png_bytes().unwrap();
        let back = ImageProcessor::from_bytes(&bytes).unwrap();
        assert_eq!((back.width(), back.height()), (10, 10));
    }
}
