// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Worker pool — a bounded set of tokio tasks draining a shared queue of
// (index, item) pairs. Each result lands in the slot for its index, so the
// output order is the input order regardless of completion order.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use filigran_core::{Outcome, Processed, RenderFailure, WatermarkSpec, WorkItem};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument};

use crate::processor::ItemProcessor;

/// Default number of concurrent workers.
pub const DEFAULT_WORKERS: usize = 8;

type Queue = Arc<Mutex<VecDeque<(usize, WorkItem)>>>;
type Slots = Arc<Mutex<Vec<Option<Processed>>>>;

// ---------------------------------------------------------------------------
// Batch summary
// ---------------------------------------------------------------------------

/// Per-batch outcome counts.
///
/// Logged at info level after every batch; `total` always equals the batch
/// size because every input produces exactly one result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub rendered: usize,
    pub skipped: usize,
    pub recovered: usize,
}

impl BatchSummary {
    pub fn of(results: &[Processed]) -> Self {
        results
            .iter()
            .fold(Self::default(), |mut summary, processed| {
                match processed.outcome {
                    Outcome::Rendered => summary.rendered += 1,
                    Outcome::Skipped => summary.skipped += 1,
                    Outcome::Recovered(_) => summary.recovered += 1,
                }
                summary
            })
    }

    pub fn total(&self) -> usize {
        self.rendered + self.skipped + self.recovered
    }
}

// ---------------------------------------------------------------------------
// Worker pool
// ---------------------------------------------------------------------------

/// Fixed-size pool of item workers, reused across requests.
///
/// The pool owns no tasks between calls. Each `run_all` spawns
/// `min(workers, items)` tasks that pull `(index, item)` pairs from a shared
/// queue and write each [`Processed`] into the slot at `index`, then joins
/// them all before returning. The worker count bounds concurrency only; the
/// output is the same for any value.
#[derive(Clone)]
pub struct WorkerPool {
    processor: ItemProcessor,
    workers: usize,
}

impl WorkerPool {
    /// `workers` is clamped to at least one.
    pub fn new(processor: ItemProcessor, workers: usize) -> Self {
        Self {
            processor,
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn processor(&self) -> &ItemProcessor {
        &self.processor
    }

    /// Process every item; the result at position `i` comes from `items[i]`.
    ///
    /// Never fails. Items whose rendering failed come back with their
    /// original bytes.
    pub async fn run_all(&self, items: Vec<WorkItem>, spec: &WatermarkSpec) -> Vec<WorkItem> {
        self.run_all_detailed(items, spec)
            .await
            .into_iter()
            .map(Processed::into_item)
            .collect()
    }

    /// Like [`run_all`](Self::run_all), keeping each item's classification
    /// and outcome.
    #[instrument(skip_all, fields(items = items.len(), workers = self.workers))]
    pub async fn run_all_detailed(&self, items: Vec<WorkItem>, spec: &WatermarkSpec) -> Vec<Processed> {
        let total = items.len();
        if total == 0 {
            return Vec::new();
        }

        // Kept so a lost slot can still be answered with the original bytes.
        let originals = items.clone();

        let queue: Queue = Arc::new(Mutex::new(items.into_iter().enumerate().collect()));
        let slots: Slots = Arc::new(Mutex::new((0..total).map(|_| None).collect()));
        let spec = Arc::new(spec.clone());

        let mut tasks = JoinSet::new();
        for worker in 0..self.workers.min(total) {
            let queue = Arc::clone(&queue);
            let slots = Arc::clone(&slots);
            let processor = self.processor.clone();
            let spec = Arc::clone(&spec);
            tasks.spawn(async move {
                let mut handled = 0usize;
                loop {
                    let next = queue.lock().expect("work queue lock poisoned").pop_front();
                    let Some((index, item)) = next else {
                        break;
                    };
                    let processed = processor.process(item, &spec).await;
                    slots.lock().expect("result slots lock poisoned")[index] = Some(processed);
                    handled += 1;
                }
                debug!(worker, handled, "Worker drained queue");
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                error!(error = %err, "Worker task aborted");
            }
        }

        let filled = std::mem::take(&mut *slots.lock().expect("result slots lock poisoned"));
        let results: Vec<Processed> = filled
            .into_iter()
            .zip(originals)
            .enumerate()
            .map(|(index, (slot, original))| {
                slot.unwrap_or_else(|| {
                    error!(index, name = %original.name, "Result slot left empty");
                    let kind = self
                        .processor
                        .classifier()
                        .classify(&original.name, original.len());
                    Processed {
                        item: original,
                        kind,
                        outcome: Outcome::Recovered(RenderFailure::Panicked(
                            "worker lost the item".into(),
                        )),
                    }
                })
            })
            .collect();

        let summary = BatchSummary::of(&results);
        info!(
            total = summary.total(),
            rendered = summary.rendered,
            skipped = summary.skipped,
            recovered = summary.recovered,
            "Batch processed"
        );
        results
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::tests::{MarkingRenderer, big};
    use filigran_core::{Renderer, RenderKind};
    use std::time::Duration;

    fn pool(workers: usize) -> WorkerPool {
        WorkerPool::new(ItemProcessor::new(Arc::new(MarkingRenderer)), workers)
    }

    /// Sleeps longer for earlier items so completion order is reversed.
    struct ReverseDelayRenderer;

    impl Renderer for ReverseDelayRenderer {
        fn render(&self, _: RenderKind, content: &[u8], _: &WatermarkSpec) -> Result<Vec<u8>, RenderFailure> {
            let delay = 60u64.saturating_sub(u64::from(content[0]) * 10);
            std::thread::sleep(Duration::from_millis(delay));
            let mut out = content.to_vec();
            out.push(b'!');
            Ok(out)
        }
    }

    #[tokio::test]
    async fn empty_batch_is_empty() {
        let out = pool(4).run_all(Vec::new(), &WatermarkSpec::new("X")).await;
        assert!(out.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn order_survives_out_of_order_completion() {
        let items: Vec<WorkItem> = (0..6u8)
            .map(|i| WorkItem::new(format!("doc{}.pdf", i), vec![i, 0, 0]))
            .collect();

        for workers in [1, 3, 8] {
            let pool = WorkerPool::new(ItemProcessor::new(Arc::new(ReverseDelayRenderer)), workers);
            let out = pool.run_all(items.clone(), &WatermarkSpec::new("X")).await;

            let names: Vec<_> = out.iter().map(|item| item.name.clone()).collect();
            let expected: Vec<_> = items.iter().map(|item| item.name.clone()).collect();
            assert_eq!(names, expected, "workers = {}", workers);
            for (i, item) in out.iter().enumerate() {
                assert_eq!(&item.content[..], &[i as u8, 0, 0, b'!']);
            }
        }
    }

    #[tokio::test]
    async fn one_bad_item_does_not_affect_the_rest() {
        let items = vec![
            WorkItem::new("good1.pdf", &b"%PDF one"[..]),
            WorkItem::new("bad.pdf", &b"BAD pdf"[..]),
            WorkItem::new("good2.docx", &b"PK docx"[..]),
        ];
        let results = pool(2)
            .run_all_detailed(items.clone(), &WatermarkSpec::new("X"))
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].outcome, Outcome::Rendered);
        assert!(matches!(results[1].outcome, Outcome::Recovered(_)));
        assert_eq!(results[1].item, items[1]);
        assert_eq!(results[2].outcome, Outcome::Rendered);
        assert_eq!(
            BatchSummary::of(&results),
            BatchSummary {
                rendered: 2,
                skipped: 0,
                recovered: 1
            }
        );
    }

    #[tokio::test]
    async fn worker_count_is_clamped() {
        assert_eq!(pool(0).workers(), 1);

        let items = vec![
            WorkItem::new("a.jpg", big(1)),
            WorkItem::new("b.txt", &b"text"[..]),
        ];
        let out = pool(0).run_all(items, &WatermarkSpec::new("X")).await;
        assert_eq!(out.len(), 2);
        assert!(out[0].content.ends_with(b"|image:X"));
        assert_eq!(&out[1].content[..], b"text");
    }
}
