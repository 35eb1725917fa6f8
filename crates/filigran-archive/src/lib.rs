// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// filigran-archive — Archive codec for the Filigran pipeline.
//
// Expands an uploaded ZIP, TAR (plain, gzip, bzip2, xz) or 7z archive into an
// ordered list of work items, and packs processed items back into a single
// ZIP for the response.

pub mod extract;
pub mod limits;
pub mod pack;

use filigran_core::{ArchiveFormat, AppConfig, Result, WorkItem};
use tracing::{info, instrument};

pub use limits::ArchiveLimits;

/// Extraction and packing with a fixed set of resource limits.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveCodec {
    limits: ArchiveLimits,
}

impl ArchiveCodec {
    pub fn new(limits: ArchiveLimits) -> Self {
        Self { limits }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(ArchiveLimits::from_config(config))
    }

    pub fn limits(&self) -> ArchiveLimits {
        self.limits
    }

    /// Every regular file in the archive, in listing order, named by its
    /// path relative to the archive root.
    ///
    /// Fails with `CorruptArchive` if the bytes cannot be read as `format`,
    /// or `ArchiveTooLarge` if a limit is exceeded.
    #[instrument(skip_all, fields(format = ?format, data_len = data.len()))]
    pub fn extract(&self, data: &[u8], format: ArchiveFormat) -> Result<Vec<WorkItem>> {
        let items = extract::extract(data, format, self.limits)?;
        info!(members = items.len(), "Archive extracted");
        Ok(items)
    }

    /// A ZIP holding `items` in order. Duplicate names get a ` (n)` suffix.
    #[instrument(skip_all, fields(members = items.len()))]
    pub fn pack(&self, items: &[WorkItem]) -> Result<Vec<u8>> {
        let packed = pack::pack(items)?;
        info!(output_len = packed.len(), "Archive packed");
        Ok(packed)
    }
}
