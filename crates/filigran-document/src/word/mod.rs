// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Word module — header watermark for OOXML (.docx) packages.

pub mod package;
pub mod watermark;

pub use watermark::WordWatermarker;
