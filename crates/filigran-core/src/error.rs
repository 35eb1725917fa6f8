// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Filigran.

use std::time::Duration;

use thiserror::Error;

/// Request-level error type for all Filigran operations.
///
/// Only container-level failures live here. Per-item rendering problems are
/// [`RenderFailure`]s and never leave the item processor.
#[derive(Debug, Error)]
pub enum FiligranError {
    // -- Archive errors --
    #[error("archive could not be opened: {0}")]
    CorruptArchive(String),

    #[error("archive exceeds extraction limits: {0}")]
    ArchiveTooLarge(String),

    #[error("failed to write output archive: {0}")]
    PackFailure(String),

    // -- Request errors --
    #[error("request contained no uploads")]
    NoUploads,

    // -- Configuration --
    #[error("invalid configuration: {0}")]
    Config(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FiligranError {
    /// Whether the error means "the uploaded container could not be read".
    ///
    /// The orchestrator answers these with the untouched upload instead of an
    /// error response.
    pub fn is_unreadable_archive(&self) -> bool {
        matches!(self, Self::CorruptArchive(_) | Self::ArchiveTooLarge(_))
    }
}

/// Why a single item could not be watermarked.
///
/// Always recovered by the item processor, which hands the original bytes
/// back. Kept as a distinct type so that failures stay inspectable in logs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderFailure {
    #[error("failed to decode input: {0}")]
    Decode(String),

    #[error("failed to encode output: {0}")]
    Encode(String),

    #[error("unsupported content: {0}")]
    Unsupported(String),

    #[error("renderer did not finish within {0:?}")]
    TimedOut(Duration),

    #[error("renderer panicked: {0}")]
    Panicked(String),
}

impl RenderFailure {
    /// Short stable label for log fields.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::Encode(_) => "encode",
            Self::Unsupported(_) => "unsupported",
            Self::TimedOut(_) => "timeout",
            Self::Panicked(_) => "panic",
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FiligranError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreadable_archive_covers_corrupt_and_oversized() {
        assert!(FiligranError::CorruptArchive("bad header".into()).is_unreadable_archive());
        assert!(FiligranError::ArchiveTooLarge("too many entries".into()).is_unreadable_archive());
        assert!(!FiligranError::PackFailure("disk full".into()).is_unreadable_archive());
        assert!(!FiligranError::NoUploads.is_unreadable_archive());
    }

    #[test]
    fn render_failure_labels_are_stable() {
        assert_eq!(RenderFailure::Decode("x".into()).label(), "decode");
        assert_eq!(
            RenderFailure::TimedOut(Duration::from_secs(1)).label(),
            "timeout"
        );
    }

    #[test]
    fn display_includes_detail() {
        let err = FiligranError::CorruptArchive("not a 7z file".into());
        assert_eq!(err.to_string(), "archive could not be opened: not a 7z file");
    }
}
