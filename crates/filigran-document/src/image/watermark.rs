// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image watermarker — tiles the label across a canvas twice the size of the
// picture, rotates it 45 degrees, crops the centre back to the picture size
// and composites it over the (orientation-corrected) original. Output is
// always JPEG.

use std::io::Cursor;

use ab_glyph::{FontVec, PxScale};
use filigran_core::config::DEFAULT_MAX_IMAGE_PIXELS;
use filigran_core::{RenderFailure, WatermarkSpec};
use image::codecs::jpeg::JpegEncoder;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageError, ImageReader, Limits, Rgba, RgbaImage};
use imageproc::drawing::{draw_line_segment_mut, draw_text_mut, text_size};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};
use tracing::{debug, info, instrument};

use crate::stamp;

/// Semi-transparent gold.
const INK: Rgba<u8> = Rgba([255, 215, 0, 160]);
const CLEAR: Rgba<u8> = Rgba([255, 255, 255, 0]);

/// Font size is the longest side divided by this, but never below `MIN_FONT_PX`.
const FONT_DIVISOR: f32 = 50.0;
const MIN_FONT_PX: f32 = 15.0;

/// Decoder allocation allowance per pixel: 16-bit RGBA.
const DECODE_BYTES_PER_PIXEL: u64 = 8;

/// Watermarks raster images (JPEG, PNG, anything `image` can decode).
pub struct ImageWatermarker {
    /// Without a font the label cannot be drawn; diagonal strokes are used instead.
    font: Option<FontVec>,
    jpeg_quality: u8,
    /// Pixel cap checked against the header before the image is decoded.
    max_pixels: u64,
}

impl ImageWatermarker {
    pub fn new(font: Option<FontVec>, jpeg_quality: u8) -> Self {
        Self {
            font,
            jpeg_quality: jpeg_quality.clamp(1, 100),
            max_pixels: DEFAULT_MAX_IMAGE_PIXELS,
        }
    }

    /// Refuse images with more than `max_pixels` pixels.
    ///
    /// The overlay canvas is twice the image in each direction and is rotated
    /// into a second canvas of the same size, so the cap bounds the memory a
    /// single render can claim.
    pub fn with_max_pixels(mut self, max_pixels: u64) -> Self {
        self.max_pixels = max_pixels.max(1);
        self
    }

    pub fn max_pixels(&self) -> u64 {
        self.max_pixels
    }

    /// Stroke-only watermarker at the default JPEG quality.
    pub fn without_font() -> Self {
        Self::new(None, 90)
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Watermark an encoded image, returning JPEG bytes of the same dimensions
    /// (after EXIF orientation has been applied).
    #[instrument(skip_all, fields(data_len = data.len()))]
    pub fn watermark(&self, data: &[u8], spec: &WatermarkSpec) -> Result<Vec<u8>, RenderFailure> {
        let mut base = decode_oriented(data, self.max_pixels)?.to_rgba8();
        let (width, height) = base.dimensions();

        let layer = match &self.font {
            Some(font) => {
                let label = stamp::label(spec, stamp::DATE_TIME_FORMAT);
                text_layer(width, height, &label, font)
            }
            None => stroke_layer(width, height),
        };
        image::imageops::overlay(&mut base, &layer, 0, 0);

        let encoded = encode_jpeg(&DynamicImage::ImageRgba8(base), self.jpeg_quality)?;
        info!(width, height, output_len = encoded.len(), "Image watermarked");
        Ok(encoded)
    }
}

/// Decode `data` and rotate/flip it upright according to its EXIF orientation.
///
/// Images over `max_pixels` are refused from their header dimensions, before
/// any pixel buffer is allocated.
fn decode_oriented(data: &[u8], max_pixels: u64) -> Result<DynamicImage, RenderFailure> {
    let decode_err = |err: ImageError| match err {
        ImageError::Limits(limit) => {
            RenderFailure::Unsupported(format!("image exceeds decoding limits: {}", limit))
        }
        other => RenderFailure::Decode(format!("failed to decode image: {}", other)),
    };

    let mut reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|err| RenderFailure::Decode(format!("unreadable image: {}", err)))?;
    let mut limits = Limits::default();
    limits.max_alloc = Some(max_pixels.saturating_mul(DECODE_BYTES_PER_PIXEL));
    reader.limits(limits);

    let mut decoder = reader.into_decoder().map_err(decode_err)?;
    let (width, height) = decoder.dimensions();
    let pixels = u64::from(width) * u64::from(height);
    if pixels > max_pixels {
        return Err(RenderFailure::Unsupported(format!(
            "image is {}x{} ({} pixels), limit is {}",
            width, height, pixels, max_pixels
        )));
    }
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut image = DynamicImage::from_decoder(decoder).map_err(decode_err)?;
    image.apply_orientation(orientation);

    debug!(
        width = image.width(),
        height = image.height(),
        ?orientation,
        "Image decoded"
    );
    Ok(image)
}

fn text_layer(width: u32, height: u32, label: &str, font: &FontVec) -> RgbaImage {
    let font_px = (width.max(height) as f32 / FONT_DIVISOR).max(MIN_FONT_PX);
    let scale = PxScale::from(font_px);
    let (text_w, text_h) = text_size(scale, font, label);

    // Glyph-less fonts report zero extents; keep the grid finite.
    let step_x = ((text_w as f32 * 1.5) as u32).max(font_px as u32);
    let step_y = (text_h * 4).max(font_px as u32);

    let mut canvas = RgbaImage::from_pixel(width * 2, height * 2, CLEAR);
    for x in (0..canvas.width()).step_by(step_x as usize) {
        for y in (0..canvas.height()).step_by(step_y as usize) {
            draw_text_mut(&mut canvas, INK, x as i32, y as i32, scale, font, label);
        }
    }
    debug!(font_px, text_w, text_h, "Text layer tiled");
    rotate_and_crop(&canvas, width, height)
}

/// Diagonal hatching, used when no font is available.
fn stroke_layer(width: u32, height: u32) -> RgbaImage {
    let spacing = (width.max(height) / 10).max(16) as i32;
    let (w, h) = (width as i32, height as i32);

    let mut layer = RgbaImage::from_pixel(width, height, CLEAR);
    let mut offset = -h;
    while offset < w {
        for thickness in 0..3 {
            let x = (offset + thickness) as f32;
            draw_line_segment_mut(&mut layer, (x, 0.0), (x + h as f32, h as f32), INK);
        }
        offset += spacing;
    }
    layer
}

/// Rotate `canvas` 45 degrees about its centre and cut out a `width` x
/// `height` window from the middle.
fn rotate_and_crop(canvas: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let rotated = rotate_about_center(
        canvas,
        (-45.0f32).to_radians(),
        Interpolation::Bicubic,
        CLEAR,
    );
    let left = rotated.width().saturating_sub(width) / 2;
    let top = rotated.height().saturating_sub(height) / 2;
    image::imageops::crop_imm(&rotated, left, top, width, height).to_image()
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, RenderFailure> {
    let mut buffer = Vec::new();
    let rgb = image.to_rgb8();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|err| RenderFailure::Encode(format!("JPEG encoding failed: {}", err)))?;
    Ok(buffer)
}
