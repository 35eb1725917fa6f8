// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{FiligranError, Result};

/// Watermark text used when the caller does not supply one.
pub const DEFAULT_WATERMARK_TEXT: &str = "INTERNAL USE ONLY - DO NOT DISTRIBUTE";

/// Largest image, in pixels, the image watermarker will take on. Rendering
/// holds roughly 40 bytes per source pixel at its peak.
pub const DEFAULT_MAX_IMAGE_PIXELS: u64 = 40_000_000;

/// Runtime settings for the watermarking pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Upper bound on items rendered concurrently.
    pub workers: usize,
    /// Images below this many bytes are left untouched.
    pub thumbnail_threshold: usize,
    /// Per-item rendering deadline; on expiry the original bytes are returned.
    pub item_timeout_secs: u64,
    /// Watermark label used when a request does not carry one.
    pub default_text: String,
    /// TrueType/OpenType font used for image watermarks.
    pub font_path: Option<PathBuf>,
    /// JPEG quality (1-100) for watermarked images.
    pub jpeg_quality: u8,
    /// Images with more pixels than this are returned unwatermarked.
    pub max_image_pixels: u64,
    /// Maximum number of entries extracted from one uploaded archive.
    pub max_archive_entries: usize,
    /// Maximum total uncompressed bytes extracted from one uploaded archive.
    pub max_archive_bytes: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            thumbnail_threshold: crate::classify::DEFAULT_THUMBNAIL_THRESHOLD,
            item_timeout_secs: 120,
            default_text: DEFAULT_WATERMARK_TEXT.to_string(),
            font_path: None,
            jpeg_quality: 90,
            max_image_pixels: DEFAULT_MAX_IMAGE_PIXELS,
            max_archive_entries: 10_000,
            max_archive_bytes: 1 << 30,
        }
    }
}

impl AppConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Overlay values from the process environment.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay values from `lookup` (the environment, in production).
    ///
    /// Recognised keys: `FILIGRAN_WORKERS`, `FILIGRAN_ITEM_TIMEOUT_SECS`,
    /// `FILIGRAN_DEFAULT_TEXT`, `WATERMARK_FONT_PATH`.
    pub fn apply_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(raw) = lookup("FILIGRAN_WORKERS") {
            self.workers = parse_number("FILIGRAN_WORKERS", &raw)?;
        }
        if let Some(raw) = lookup("FILIGRAN_ITEM_TIMEOUT_SECS") {
            self.item_timeout_secs = parse_number("FILIGRAN_ITEM_TIMEOUT_SECS", &raw)?;
        }
        if let Some(text) = lookup("FILIGRAN_DEFAULT_TEXT") {
            if !text.trim().is_empty() {
                self.default_text = text;
            }
        }
        if let Some(path) = lookup("WATERMARK_FONT_PATH") {
            if !path.is_empty() {
                self.font_path = Some(PathBuf::from(path));
            }
        }
        debug!(?self, "environment overrides applied");
        Ok(self)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(FiligranError::Config("workers must be at least 1".into()));
        }
        if self.item_timeout_secs == 0 {
            return Err(FiligranError::Config(
                "item_timeout_secs must be at least 1".into(),
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(FiligranError::Config(format!(
                "jpeg_quality must be within 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        if self.max_image_pixels == 0 {
            return Err(FiligranError::Config(
                "max_image_pixels must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn item_timeout(&self) -> Duration {
        Duration::from_secs(self.item_timeout_secs)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| FiligranError::Config(format!("{key} is not a valid number: {raw:?}")))
}
