// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Format classifier — routes an item to a renderer by name and size.

use crate::types::{ContentKind, extension, file_name};

/// Images smaller than this are treated as icons/thumbnails and left alone.
pub const DEFAULT_THUMBNAIL_THRESHOLD: usize = 5120;

/// Directory prefix macOS writes resource forks under when zipping.
const MACOS_METADATA_PREFIX: &str = "__MACOSX";

/// AppleDouble sidecar files start with this.
const APPLE_DOUBLE_PREFIX: &str = "._";

/// Classifies items by extension, with a size guard for images.
#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    thumbnail_threshold: usize,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(DEFAULT_THUMBNAIL_THRESHOLD)
    }
}

impl Classifier {
    pub fn new(thumbnail_threshold: usize) -> Self {
        Self {
            thumbnail_threshold,
        }
    }

    pub fn thumbnail_threshold(&self) -> usize {
        self.thumbnail_threshold
    }

    /// Decide what `name` is. Never fails; anything unknown is passthrough.
    pub fn classify(&self, name: &str, content_length: usize) -> ContentKind {
        if is_metadata_artifact(name) {
            return ContentKind::Passthrough;
        }

        match extension(name).as_deref() {
            Some("jpg" | "jpeg" | "png") => {
                if content_length < self.thumbnail_threshold {
                    ContentKind::Passthrough
                } else {
                    ContentKind::Image
                }
            }
            Some("pdf") => ContentKind::PdfDocument,
            Some("docx" | "doc") => ContentKind::WordDocument,
            Some("zip" | "7z" | "tar" | "gz" | "bz2" | "xz" | "tgz" | "tbz2" | "txz") => {
                ContentKind::Archive
            }
            _ => ContentKind::Passthrough,
        }
    }
}

/// Classify with the default thumbnail threshold.
pub fn classify(name: &str, content_length: usize) -> ContentKind {
    Classifier::default().classify(name, content_length)
}

/// OS artefacts that must travel through untouched.
fn is_metadata_artifact(name: &str) -> bool {
    name.starts_with(MACOS_METADATA_PREFIX)
        || file_name(name).starts_with(APPLE_DOUBLE_PREFIX)
        || extension(name).as_deref() == Some("db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thumbnail_boundary_is_inclusive_on_process_side() {
        assert_eq!(classify("a.jpg", 5119), ContentKind::Passthrough);
        assert_eq!(classify("a.jpg", 5120), ContentKind::Image);
        assert_eq!(classify("a.PNG", 5120), ContentKind::Image);
    }

    #[test]
    fn documents_ignore_size() {
        assert_eq!(classify("tiny.pdf", 10), ContentKind::PdfDocument);
        assert_eq!(classify("letter.DOCX", 0), ContentKind::WordDocument);
        assert_eq!(classify("legacy.doc", 0), ContentKind::WordDocument);
    }

    #[test]
    fn archive_extensions() {
        for name in ["a.zip", "a.7z", "a.tar", "a.tar.gz", "a.bz2", "a.xz", "a.tgz"] {
            assert_eq!(classify(name, 100), ContentKind::Archive, "{name}");
        }
    }

    #[test]
    fn metadata_artifacts_pass_through() {
        assert_eq!(
            classify("__MACOSX/photos/._a.jpg", 100_000),
            ContentKind::Passthrough
        );
        assert_eq!(classify("photos/._a.jpg", 100_000), ContentKind::Passthrough);
        assert_eq!(classify("Thumbs.db", 100_000), ContentKind::Passthrough);
        assert_eq!(classify("photos/Thumbs.DB", 100_000), ContentKind::Passthrough);
    }

    #[test]
    fn unknown_is_passthrough() {
        assert_eq!(classify("notes.txt", 100_000), ContentKind::Passthrough);
        assert_eq!(classify("Makefile", 100_000), ContentKind::Passthrough);
        assert_eq!(classify("", 0), ContentKind::Passthrough);
    }

    #[test]
    fn custom_threshold() {
        let classifier = Classifier::new(10);
        assert_eq!(classifier.classify("a.jpg", 9), ContentKind::Passthrough);
        assert_eq!(classifier.classify("a.jpg", 10), ContentKind::Image);
    }

    #[test]
    fn nested_paths_use_final_component() {
        assert_eq!(classify("scans/2024/page.jpeg", 6000), ContentKind::Image);
        assert_eq!(classify("scans.pdf/readme", 6000), ContentKind::Passthrough);
    }
}
