// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module — tiled diagonal text watermark for JPEG/PNG input.

pub mod watermark;

pub use watermark::ImageWatermarker;
