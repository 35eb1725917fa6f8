// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Item processor — classify one item, render it if it is a supported
// document, and hand back the original bytes on any renderer failure.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use filigran_core::integrity::fingerprint;
use filigran_core::{
    AppConfig, Classifier, Outcome, Processed, RenderFailure, RenderKind, Renderer,
    WatermarkSpec, WorkItem,
};
use tokio::task::JoinError;
use tracing::{debug, instrument, warn};

/// Default per-item rendering deadline.
pub const DEFAULT_ITEM_TIMEOUT: Duration = Duration::from_secs(120);

/// Watermarks single items. Cheap to clone; clones share the renderer.
#[derive(Clone)]
pub struct ItemProcessor {
    classifier: Classifier,
    renderer: Arc<dyn Renderer>,
    item_timeout: Duration,
}

impl ItemProcessor {
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        Self {
            classifier: Classifier::default(),
            renderer,
            item_timeout: DEFAULT_ITEM_TIMEOUT,
        }
    }

    pub fn from_config(renderer: Arc<dyn Renderer>, config: &AppConfig) -> Self {
        Self::new(renderer)
            .with_classifier(Classifier::new(config.thumbnail_threshold))
            .with_item_timeout(config.item_timeout())
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_item_timeout(mut self, item_timeout: Duration) -> Self {
        self.item_timeout = item_timeout;
        self
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Process one item. Never fails: unsupported kinds are skipped, and a
    /// failed, panicking or overdue render yields the original item.
    #[instrument(skip_all, fields(name = %item.name, len = item.len()))]
    pub async fn process(&self, item: WorkItem, spec: &WatermarkSpec) -> Processed {
        let kind = self.classifier.classify(&item.name, item.len());
        let Some(render_kind) = kind.render_kind() else {
            debug!(?kind, "Passed through unchanged");
            return Processed {
                item,
                kind,
                outcome: Outcome::Skipped,
            };
        };

        match self.render(render_kind, &item, spec).await {
            Ok(rendered) => {
                debug!(kind = %render_kind, output_len = rendered.len(), "Rendered");
                Processed {
                    item: item.with_content(rendered),
                    kind,
                    outcome: Outcome::Rendered,
                }
            }
            Err(failure) => {
                warn!(
                    kind = %render_kind,
                    reason = failure.label(),
                    error = %failure,
                    fingerprint = %fingerprint(&item.content),
                    "Rendering failed, returning original bytes"
                );
                Processed {
                    item,
                    kind,
                    outcome: Outcome::Recovered(failure),
                }
            }
        }
    }

    /// Run the renderer on the blocking pool under the item deadline. A
    /// renderer still running at the deadline is left to finish on its own;
    /// its result is dropped.
    async fn render(
        &self,
        kind: RenderKind,
        item: &WorkItem,
        spec: &WatermarkSpec,
    ) -> Result<Vec<u8>, RenderFailure> {
        let renderer = Arc::clone(&self.renderer);
        let content = item.content.clone();
        let spec = spec.clone();
        let task =
            tokio::task::spawn_blocking(move || renderer.render(kind, &content, &spec));

        match tokio::time::timeout(self.item_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(RenderFailure::Panicked(join_failure(join_err))),
            Err(_elapsed) => Err(RenderFailure::TimedOut(self.item_timeout)),
        }
    }
}

fn join_failure(err: JoinError) -> String {
    if err.is_panic() {
        panic_message(err.into_panic())
    } else {
        "render task cancelled".to_string()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
