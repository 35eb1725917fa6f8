// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// filigran-document — Watermark renderers for the Filigran pipeline.
//
// Provides tiled, rotated text watermarks for raster images, a stamped text
// layer on every PDF page, and a header run in every section of a Word
// (OOXML) document. `DocumentRenderer` bundles the three behind the core
// `Renderer` trait.

pub mod font;
pub mod image;
pub mod pdf;
pub mod renderer;
pub mod stamp;
pub mod word;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;

// Re-export the primary structs so callers can use `filigran_document::PdfWatermarker` etc.
pub use crate::image::watermark::ImageWatermarker;
pub use pdf::watermark::PdfWatermarker;
pub use renderer::DocumentRenderer;
pub use word::watermark::WordWatermarker;
