// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// File-system edges of the command line: reading uploads and writing the
// response.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use filigran_core::integrity::fingerprint;
use filigran_core::{WatermarkResponse, WorkItem};
use serde::Serialize;
use tracing::{debug, info};

/// What gets printed after a successful run.
#[derive(Debug, Serialize, PartialEq)]
pub struct Summary {
    pub filename: String,
    pub media_type: String,
    pub bytes: usize,
    pub path: PathBuf,
}

/// One upload per path, named by its file name.
pub fn read_uploads(paths: &[PathBuf]) -> Result<Vec<WorkItem>> {
    paths
        .iter()
        .map(|path| {
            let data = std::fs::read(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .with_context(|| format!("{} has no file name", path.display()))?;
            debug!(%name, len = data.len(), fingerprint = %fingerprint(&data), "Upload read");
            Ok(WorkItem::new(name, data))
        })
        .collect()
}

/// Write the response body to `out_dir/<filename>`.
pub fn write_response(out_dir: &Path, response: &WatermarkResponse) -> Result<Summary> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    let path = out_dir.join(&response.filename);
    std::fs::write(&path, &response.body)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), bytes = response.body.len(), "Result written");

    Ok(Summary {
        filename: response.filename.clone(),
        media_type: response.media_type.to_string(),
        bytes: response.body.len(),
        path,
    })
}
