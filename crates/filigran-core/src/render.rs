// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Renderer capability — the seam between the pipeline and the code that
// actually burns a watermark into a document.

use crate::error::RenderFailure;
use crate::types::{RenderKind, WatermarkSpec};

/// Turns the raw bytes of a known kind into watermarked bytes.
///
/// Implementations are called from blocking worker threads and may be slow;
/// they must not assume anything about ordering between calls.
pub trait Renderer: Send + Sync {
    fn render(
        &self,
        kind: RenderKind,
        content: &[u8],
        spec: &WatermarkSpec,
    ) -> Result<Vec<u8>, RenderFailure>;
}

impl<R: Renderer + ?Sized> Renderer for std::sync::Arc<R> {
    fn render(
        &self,
        kind: RenderKind,
        content: &[u8],
        spec: &WatermarkSpec,
    ) -> Result<Vec<u8>, RenderFailure> {
        (**self).render(kind, content, spec)
    }
}
