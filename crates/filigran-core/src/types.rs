// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Filigran watermarking pipeline.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RenderFailure;

/// Prefix added to suggested filenames at the response boundary.
pub const OUTPUT_PREFIX: &str = "marked_";

/// Suggested filename for a multi-upload response.
pub const BATCH_FILENAME: &str = "batch_results.zip";

/// Unique identifier for one watermarking request (used in tracing spans).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One named payload moving through the pipeline.
///
/// `name` is a relative path and may contain directory separators. Stages
/// never mutate a `WorkItem`; they build a new one or hand the original back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub name: String,
    pub content: Bytes,
}

impl WorkItem {
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Same name, new bytes.
    pub fn with_content(&self, content: impl Into<Bytes>) -> Self {
        Self {
            name: self.name.clone(),
            content: content.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Final path component of `name`, splitting on both `/` and `\`.
    pub fn file_name(&self) -> &str {
        file_name(&self.name)
    }
}

/// What the classifier decided an item is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentKind {
    Image,
    PdfDocument,
    WordDocument,
    Archive,
    /// Leave the bytes alone.
    Passthrough,
}

impl ContentKind {
    /// The renderer responsible for this kind, if any.
    pub fn render_kind(&self) -> Option<RenderKind> {
        match self {
            Self::Image => Some(RenderKind::Image),
            Self::PdfDocument => Some(RenderKind::Pdf),
            Self::WordDocument => Some(RenderKind::Word),
            Self::Archive | Self::Passthrough => None,
        }
    }
}

/// The subset of content kinds a renderer can watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderKind {
    Image,
    Pdf,
    Word,
}

impl std::fmt::Display for RenderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Image => "image",
            Self::Pdf => "pdf",
            Self::Word => "word",
        };
        f.write_str(label)
    }
}

/// Container formats the archive codec can open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArchiveFormat {
    Zip,
    SevenZip,
    Tar,
    TarGz,
    TarBz2,
    TarXz,
}

impl ArchiveFormat {
    /// Suffixes in match order. Compound suffixes come before the bare
    /// compression suffix they end with.
    const SUFFIXES: &'static [(&'static str, ArchiveFormat)] = &[
        (".tar.gz", ArchiveFormat::TarGz),
        (".tar.bz2", ArchiveFormat::TarBz2),
        (".tar.xz", ArchiveFormat::TarXz),
        (".tgz", ArchiveFormat::TarGz),
        (".tbz2", ArchiveFormat::TarBz2),
        (".txz", ArchiveFormat::TarXz),
        (".gz", ArchiveFormat::TarGz),
        (".bz2", ArchiveFormat::TarBz2),
        (".xz", ArchiveFormat::TarXz),
        (".tar", ArchiveFormat::Tar),
        (".zip", ArchiveFormat::Zip),
        (".7z", ArchiveFormat::SevenZip),
    ];

    /// Resolve the format from a filename (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        Self::SUFFIXES
            .iter()
            .find(|(suffix, _)| lower.ends_with(suffix))
            .map(|(_, format)| *format)
    }

    /// `name` with its archive suffix removed, or `None` if it has none.
    pub fn strip_suffix(name: &str) -> Option<&str> {
        let lower = name.to_ascii_lowercase();
        Self::SUFFIXES
            .iter()
            .find(|(suffix, _)| lower.ends_with(suffix))
            .map(|(suffix, _)| &name[..name.len() - suffix.len()])
    }
}

/// The caller-supplied watermark label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatermarkSpec {
    pub text: String,
}

impl WatermarkSpec {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// How the item processor disposed of one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The renderer produced new bytes.
    Rendered,
    /// The item was never offered to a renderer (passthrough or archive).
    Skipped,
    /// The renderer failed; the original bytes were returned.
    Recovered(RenderFailure),
}

/// An item after processing, with the decision that produced it.
#[derive(Debug, Clone)]
pub struct Processed {
    pub item: WorkItem,
    pub kind: ContentKind,
    pub outcome: Outcome,
}

impl Processed {
    pub fn into_item(self) -> WorkItem {
        self.item
    }
}

/// Payload handed back across the response boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkResponse {
    pub body: Bytes,
    pub media_type: &'static str,
    pub filename: String,
}

/// Media type of a single-file response, derived from the output name.
pub fn media_type_for(name: &str) -> &'static str {
    match extension(name).as_deref() {
        Some("pdf") => "application/pdf",
        Some("docx") | Some("doc") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        _ => "image/jpeg",
    }
}

/// Final path component of `name`, splitting on both `/` and `\`.
pub fn file_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Lower-cased extension of the final path component, without the dot.
pub fn extension(name: &str) -> Option<String> {
    let base = file_name(name);
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty() && !base[1..].contains('.') {
        // ".bashrc" has no extension
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
