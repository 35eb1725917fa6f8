// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — stamps a translucent text layer onto every page.

pub mod watermark;

pub use watermark::PdfWatermarker;
