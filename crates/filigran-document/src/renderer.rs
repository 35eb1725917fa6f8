// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Default renderer — routes each kind to its watermarker.

use filigran_core::{AppConfig, RenderFailure, RenderKind, Renderer, WatermarkSpec};
use tracing::warn;

use crate::font;
use crate::image::ImageWatermarker;
use crate::pdf::PdfWatermarker;
use crate::word::WordWatermarker;

/// The production [`Renderer`]: images, PDFs and Word documents.
pub struct DocumentRenderer {
    image: ImageWatermarker,
    pdf: PdfWatermarker,
    word: WordWatermarker,
}

impl DocumentRenderer {
    pub fn new(image: ImageWatermarker) -> Self {
        Self {
            image,
            pdf: PdfWatermarker::new(),
            word: WordWatermarker::new(),
        }
    }

    /// Build from configuration. A missing or unusable font degrades image
    /// watermarks to strokes rather than failing startup.
    pub fn from_config(config: &AppConfig) -> Self {
        let font = match font::resolve_font_path(config.font_path.as_deref()) {
            Some(path) => match font::load_font(&path) {
                Ok(font) => Some(font),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Watermark font unusable");
                    None
                }
            },
            None => {
                warn!("No watermark font found; images will carry stroke watermarks");
                None
            }
        };
        Self::new(
            ImageWatermarker::new(font, config.jpeg_quality)
                .with_max_pixels(config.max_image_pixels),
        )
    }

    pub fn image(&self) -> &ImageWatermarker {
        &self.image
    }
}

impl Renderer for DocumentRenderer {
    fn render(
        &self,
        kind: RenderKind,
        content: &[u8],
        spec: &WatermarkSpec,
    ) -> Result<Vec<u8>, RenderFailure> {
        match kind {
            RenderKind::Image => self.image.watermark(content, spec),
            RenderKind::Pdf => self.pdf.watermark(content, spec),
            RenderKind::Word => self.word.watermark(content, spec),
        }
    }
}
