// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Response packing — every result goes back to the caller as one ZIP.

use std::collections::HashSet;
use std::io::{Cursor, Write};

use filigran_core::{FiligranError, Result, WorkItem};
use tracing::debug;
use zip::CompressionMethod;
use zip::write::{FileOptions, ZipWriter};

/// Placeholder for items whose name sanitises to nothing.
const UNNAMED: &str = "unnamed";

pub fn pack(items: &[WorkItem]) -> Result<Vec<u8>> {
    let failure = |err: zip::result::ZipError| FiligranError::PackFailure(err.to_string());

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    let mut names = MemberNames::default();
    for item in items {
        let name = names.claim(&item.name);
        let large = item.len() as u64 >= u64::from(u32::MAX);
        zip.start_file(name.as_str(), options.large_file(large))
            .map_err(failure)?;
        zip.write_all(&item.content)
            .map_err(|err| FiligranError::PackFailure(format!("failed to write {}: {}", name, err)))?;
    }

    let cursor = zip.finish().map_err(failure)?;
    Ok(cursor.into_inner())
}

/// Assigns each item a safe, unique member name.
#[derive(Debug, Default)]
struct MemberNames {
    taken: HashSet<String>,
}

impl MemberNames {
    fn claim(&mut self, raw: &str) -> String {
        let base = sanitize(raw);
        if self.taken.insert(base.clone()) {
            return base;
        }

        let (stem, ext) = split_extension(&base);
        let mut n = 1;
        loop {
            let candidate = format!("{} ({}){}", stem, n, ext);
            if self.taken.insert(candidate.clone()) {
                debug!(original = %base, renamed = %candidate, "Duplicate member renamed");
                return candidate;
            }
            n += 1;
        }
    }
}

/// Relative path with `.`/`..`/empty components dropped, so no member can
/// point outside the extraction root.
fn sanitize(raw: &str) -> String {
    let joined = raw
        .split(['/', '\\'])
        .filter(|part| !part.is_empty() && *part != "." && *part != "..")
        .collect::<Vec<_>>()
        .join("/");
    if joined.is_empty() {
        UNNAMED.to_string()
    } else {
        joined
    }
}

/// `("dir/report", ".pdf")` for `dir/report.pdf`. Dotfiles have no extension.
fn split_extension(name: &str) -> (&str, &str) {
    let base_start = name.rfind('/').map_or(0, |i| i + 1);
    match name[base_start..].rfind('.') {
        Some(dot) if dot > 0 => name.split_at(base_start + dot),
        _ => (name, ""),
    }
}
