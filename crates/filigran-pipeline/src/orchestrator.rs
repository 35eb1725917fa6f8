// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batch orchestrator — picks the request shape (single archive, single file
// or multi-file batch) and turns the processed items into one response.

use std::sync::Arc;

use filigran_archive::ArchiveCodec;
use filigran_core::integrity::fingerprint;
use filigran_core::{
    AppConfig, ArchiveFormat, BATCH_FILENAME, ContentKind, FiligranError, OUTPUT_PREFIX,
    Renderer, RequestId, Result, WatermarkResponse, WatermarkSpec, WorkItem, media_type_for,
};
use tokio::task::JoinError;
use tracing::{Instrument, Span, field, info, info_span, warn};

use crate::executor::WorkerPool;
use crate::processor::ItemProcessor;

/// Media type of every archive-shaped response.
const ZIP_MEDIA_TYPE: &str = "application/zip";

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Entry point for watermark requests. Holds a worker pool and archive codec
/// sized once at construction; holds no per-request state.
#[derive(Clone)]
pub struct BatchOrchestrator {
    pool: WorkerPool,
    codec: ArchiveCodec,
    default_text: String,
}

impl BatchOrchestrator {
    pub fn new(pool: WorkerPool, codec: ArchiveCodec, default_text: impl Into<String>) -> Self {
        Self {
            pool,
            codec,
            default_text: default_text.into(),
        }
    }

    pub fn from_config(renderer: Arc<dyn Renderer>, config: &AppConfig) -> Self {
        let processor = ItemProcessor::from_config(renderer, config);
        Self::new(
            WorkerPool::new(processor, config.workers),
            ArchiveCodec::from_config(config),
            config.default_text.clone(),
        )
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Watermark the uploads and build the response.
    ///
    /// The shape of the request decides the path taken:
    ///
    /// - no uploads: [`FiligranError::NoUploads`];
    /// - one archive: its members are extracted, processed in listing order
    ///   and packed into `marked_<stem>.zip`. An archive that cannot be read,
    ///   or exceeds the extraction limits, is returned as-is under
    ///   `marked_<name>`;
    /// - one other file: processed directly and returned as `marked_<name>`
    ///   with a media type derived from the name;
    /// - several files: processed without expansion and packed into
    ///   `batch_results.zip`.
    ///
    /// `text` falls back to the configured default when absent or blank.
    /// Only container-level failures are errors: no uploads, or a result ZIP
    /// that could not be written.
    pub async fn handle_request(
        &self,
        uploads: Vec<WorkItem>,
        text: Option<&str>,
    ) -> Result<WatermarkResponse> {
        let request_id = RequestId::new();
        let span = info_span!(
            "request",
            %request_id,
            uploads = uploads.len(),
            path = field::Empty
        );
        self.dispatch(uploads, text).instrument(span).await
    }

    async fn dispatch(&self, mut uploads: Vec<WorkItem>, text: Option<&str>) -> Result<WatermarkResponse> {
        let spec = self.spec_for(text);

        if uploads.len() > 1 {
            Span::current().record("path", "batch");
            return self.handle_batch(uploads, &spec).await;
        }
        let Some(upload) = uploads.pop() else {
            return Err(FiligranError::NoUploads);
        };

        let kind = self
            .pool
            .processor()
            .classifier()
            .classify(&upload.name, upload.len());
        if kind == ContentKind::Archive {
            Span::current().record("path", "archive");
            self.handle_archive(upload, &spec).await
        } else {
            Span::current().record("path", "single");
            self.handle_single(upload, &spec).await
        }
    }

    fn spec_for(&self, text: Option<&str>) -> WatermarkSpec {
        let text = text
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(self.default_text.as_str());
        WatermarkSpec::new(text)
    }

    async fn handle_single(&self, upload: WorkItem, spec: &WatermarkSpec) -> Result<WatermarkResponse> {
        let processed = self.pool.processor().process(upload, spec).await;
        let filename = format!("{}{}", OUTPUT_PREFIX, processed.item.file_name());
        info!(%filename, kind = ?processed.kind, "Single file processed");
        Ok(WatermarkResponse {
            body: processed.item.content,
            media_type: media_type_for(&filename),
            filename,
        })
    }

    async fn handle_archive(&self, upload: WorkItem, spec: &WatermarkSpec) -> Result<WatermarkResponse> {
        let file_name = upload.file_name().to_string();
        let members = match self.extract(&upload).await {
            Ok(members) => members,
            Err(err) if err.is_unreadable_archive() => {
                // Compatibility: an unreadable archive is handed back as-is.
                warn!(
                    name = %file_name,
                    error = %err,
                    fingerprint = %fingerprint(&upload.content),
                    "Archive unreadable, returning original bytes"
                );
                return Ok(WatermarkResponse {
                    body: upload.content,
                    media_type: ZIP_MEDIA_TYPE,
                    filename: format!("{}{}", OUTPUT_PREFIX, file_name),
                });
            }
            Err(err) => return Err(err),
        };

        let processed = self.pool.run_all(members, spec).await;
        let body = self.pack(processed).await?;

        let stem = ArchiveFormat::strip_suffix(&file_name).unwrap_or(file_name.as_str());
        Ok(WatermarkResponse {
            body: body.into(),
            media_type: ZIP_MEDIA_TYPE,
            filename: format!("{}{}.zip", OUTPUT_PREFIX, stem),
        })
    }

    async fn handle_batch(&self, uploads: Vec<WorkItem>, spec: &WatermarkSpec) -> Result<WatermarkResponse> {
        let processed = self.pool.run_all(uploads, spec).await;
        let body = self.pack(processed).await?;
        Ok(WatermarkResponse {
            body: body.into(),
            media_type: ZIP_MEDIA_TYPE,
            filename: BATCH_FILENAME.to_string(),
        })
    }

    // -- Codec work runs on the blocking pool ------------------------------

    async fn extract(&self, upload: &WorkItem) -> Result<Vec<WorkItem>> {
        let Some(format) = ArchiveFormat::from_name(&upload.name) else {
            return Err(FiligranError::CorruptArchive(format!(
                "no archive format for {}",
                upload.name
            )));
        };
        let codec = self.codec;
        let data = upload.content.clone();
        tokio::task::spawn_blocking(move || codec.extract(&data, format))
            .await
            .map_err(|err| FiligranError::CorruptArchive(join_message("extraction", err)))?
    }

    async fn pack(&self, items: Vec<WorkItem>) -> Result<Vec<u8>> {
        let codec = self.codec;
        tokio::task::spawn_blocking(move || codec.pack(&items))
            .await
            .map_err(|err| FiligranError::PackFailure(join_message("packing", err)))?
    }
}

/// Describe a blocking codec task that did not finish.
fn join_message(stage: &str, err: JoinError) -> String {
    if err.is_panic() {
        format!("{} panicked", stage)
    } else {
        format!("{} cancelled", stage)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::tests::{MarkingRenderer, big};
    use filigran_archive::ArchiveLimits;
    use filigran_core::config::DEFAULT_WATERMARK_TEXT;

    fn orchestrator() -> BatchOrchestrator {
        BatchOrchestrator::from_config(Arc::new(MarkingRenderer), &AppConfig::default())
    }

    fn zip_of(items: &[WorkItem]) -> Vec<u8> {
        ArchiveCodec::default().pack(items).unwrap()
    }

    fn unzip(body: &[u8]) -> Vec<WorkItem> {
        ArchiveCodec::default().extract(body, ArchiveFormat::Zip).unwrap()
    }

    #[tokio::test]
    async fn no_uploads_is_an_error() {
        let result = orchestrator().handle_request(Vec::new(), None).await;
        assert!(matches!(result, Err(FiligranError::NoUploads)));
    }

    #[tokio::test]
    async fn single_file_keeps_its_own_media_type() {
        let response = orchestrator()
            .handle_request(vec![WorkItem::new("in/report.pdf", &b"%PDF"[..])], Some("SECRET"))
            .await
            .unwrap();
        assert_eq!(response.filename, "marked_report.pdf");
        assert_eq!(response.media_type, "application/pdf");
        assert_eq!(&response.body[..], b"%PDF|pdf:SECRET");
    }

    #[tokio::test]
    async fn blank_text_uses_configured_default() {
        let response = orchestrator()
            .handle_request(vec![WorkItem::new("a.docx", &b"PK"[..])], Some("   "))
            .await
            .unwrap();
        let expected = format!("PK|word:{}", DEFAULT_WATERMARK_TEXT);
        assert_eq!(&response.body[..], expected.as_bytes());
    }

    #[tokio::test]
    async fn archive_members_are_processed_in_order() {
        let members = vec![
            WorkItem::new("z/photo.jpg", big(3)),
            WorkItem::new("__MACOSX/._photo.jpg", big(4)),
            WorkItem::new("a/notes.txt", &b"notes"[..]),
        ];
        let upload = WorkItem::new("holiday.zip", zip_of(&members));
        let response = orchestrator()
            .handle_request(vec![upload], Some("T"))
            .await
            .unwrap();

        assert_eq!(response.filename, "marked_holiday.zip");
        assert_eq!(response.media_type, "application/zip");
        let out = unzip(&response.body);
        assert_eq!(out.len(), 3);
        assert!(out[0].content.ends_with(b"|image:T"));
        assert_eq!(out[1], members[1]);
        assert_eq!(out[2], members[2]);
    }

    #[tokio::test]
    async fn undecodable_tar_gz_keeps_its_full_name() {
        // A ZIP body behind a .tar.gz name is not a gzip stream.
        let upload = WorkItem::new("scans.tar.gz", zip_of(&[]));
        let response = orchestrator().handle_request(vec![upload.clone()], None).await.unwrap();
        assert_eq!(response.filename, "marked_scans.tar.gz");
        assert_eq!(response.body, upload.content);
    }

    #[tokio::test]
    async fn corrupt_archive_returns_original_bytes() {
        let upload = WorkItem::new("broken.zip", &b"PK\x03\x04 truncated"[..]);
        let response = orchestrator().handle_request(vec![upload.clone()], None).await.unwrap();
        assert_eq!(response.filename, "marked_broken.zip");
        assert_eq!(response.media_type, "application/zip");
        assert_eq!(response.body, upload.content);
    }

    #[tokio::test]
    async fn oversized_archive_takes_the_fallback() {
        let pool = orchestrator().pool().clone();
        let tight = BatchOrchestrator::new(
            pool,
            ArchiveCodec::new(ArchiveLimits {
                max_entries: 1,
                max_total_bytes: 1 << 20,
            }),
            "X",
        );
        let upload = WorkItem::new(
            "two.zip",
            zip_of(&[
                WorkItem::new("a.txt", &b"a"[..]),
                WorkItem::new("b.txt", &b"b"[..]),
            ]),
        );
        let response = tight.handle_request(vec![upload.clone()], None).await.unwrap();
        assert_eq!(response.body, upload.content);
    }

    #[tokio::test]
    async fn batch_is_not_expanded_and_keeps_order() {
        let inner = zip_of(&[WorkItem::new("x.pdf", &b"%PDF"[..])]);
        let uploads = vec![
            WorkItem::new("b.pdf", &b"%PDF b"[..]),
            WorkItem::new("inner.zip", inner.clone()),
            WorkItem::new("a.pdf", &b"%PDF a"[..]),
        ];
        let response = orchestrator().handle_request(uploads, Some("T")).await.unwrap();
        assert_eq!(response.filename, "batch_results.zip");

        let out = unzip(&response.body);
        let names: Vec<_> = out.iter().map(|item| item.name.as_str()).collect();
        assert_eq!(names, ["b.pdf", "inner.zip", "a.pdf"]);
        assert_eq!(&out[0].content[..], b"%PDF b|pdf:T");
        assert_eq!(&out[1].content[..], &inner[..]);
    }
}
