// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Extraction limits — a cap on member count and on total uncompressed bytes,
// enforced on the bytes actually read rather than on declared sizes.

use std::io::Read;

use filigran_core::{AppConfig, FiligranError, Result};

/// Upper bounds applied to a single extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveLimits {
    pub max_entries: usize,
    pub max_total_bytes: u64,
}

impl Default for ArchiveLimits {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            max_total_bytes: 1 << 30,
        }
    }
}

impl ArchiveLimits {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_entries: config.max_archive_entries,
            max_total_bytes: config.max_archive_bytes,
        }
    }
}

/// Running totals for one extraction.
#[derive(Debug)]
pub(crate) struct Budget {
    limits: ArchiveLimits,
    entries: usize,
    bytes: u64,
}

impl Budget {
    pub(crate) fn new(limits: ArchiveLimits) -> Self {
        Self {
            limits,
            entries: 0,
            bytes: 0,
        }
    }

    /// Count one more member.
    pub(crate) fn admit(&mut self) -> Result<()> {
        self.entries += 1;
        if self.entries > self.limits.max_entries {
            return Err(FiligranError::ArchiveTooLarge(format!(
                "more than {} members",
                self.limits.max_entries
            )));
        }
        Ok(())
    }

    /// Bytes still allowed before the total limit trips.
    pub(crate) fn remaining(&self) -> u64 {
        self.limits.max_total_bytes.saturating_sub(self.bytes)
    }

    pub(crate) fn charge(&mut self, len: u64) -> Result<()> {
        self.bytes = self.bytes.saturating_add(len);
        if self.bytes > self.limits.max_total_bytes {
            return Err(FiligranError::ArchiveTooLarge(format!(
                "more than {} uncompressed bytes",
                self.limits.max_total_bytes
            )));
        }
        Ok(())
    }

    /// Read one member, reading at most one byte past the remaining budget.
    pub(crate) fn read(&mut self, reader: impl Read, size_hint: u64) -> Result<Vec<u8>> {
        let remaining = self.remaining();
        let capacity = size_hint.min(remaining).min(64 << 20) as usize;
        let mut data = Vec::with_capacity(capacity);
        reader
            .take(remaining.saturating_add(1))
            .read_to_end(&mut data)
            .map_err(|err| FiligranError::CorruptArchive(format!("unreadable member: {}", err)))?;
        self.charge(data.len() as u64)?;
        Ok(data)
    }
}
