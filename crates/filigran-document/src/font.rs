// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Font lookup for image watermarks.

use std::path::{Path, PathBuf};

use ab_glyph::FontVec;
use filigran_core::FiligranError;
use tracing::{debug, info};

/// Environment variable naming a font file (set by container deployments).
pub const FONT_PATH_ENV: &str = "WATERMARK_FONT_PATH";

/// Fallback locations tried when nothing is configured.
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/wqy/wqy-microhei.ttc",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\simhei.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Pick the font file to use: the configured path, then
/// `WATERMARK_FONT_PATH`, then well-known system locations.
///
/// Returns `None` if none of them exists.
pub fn resolve_font_path(configured: Option<&Path>) -> Option<PathBuf> {
    let from_env = std::env::var_os(FONT_PATH_ENV).map(PathBuf::from);
    let candidates = configured
        .map(Path::to_path_buf)
        .into_iter()
        .chain(from_env)
        .chain(SYSTEM_FONT_CANDIDATES.iter().map(PathBuf::from));

    for candidate in candidates {
        if candidate.is_file() {
            debug!(path = %candidate.display(), "watermark font found");
            return Some(candidate);
        }
    }
    None
}

/// Load a TrueType/OpenType font (collections use their first face).
pub fn load_font(path: impl AsRef<Path>) -> Result<FontVec, FiligranError> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let font = FontVec::try_from_vec(data).map_err(|err| {
        FiligranError::Config(format!("unusable font {}: {}", path.display(), err))
    })?;
    info!(path = %path.display(), "watermark font loaded");
    Ok(font)
}
