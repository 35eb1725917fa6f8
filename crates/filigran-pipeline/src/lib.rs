// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// filigran-pipeline — Request handling for batch watermarking.
//
// The item processor watermarks one item and never fails; the worker pool
// fans a batch out over a bounded number of tasks and hands results back in
// input order; the orchestrator decides, per request, whether to expand an
// archive, process a single file or pack a batch.

pub mod executor;
pub mod orchestrator;
pub mod processor;

pub use executor::{BatchSummary, WorkerPool};
pub use orchestrator::BatchOrchestrator;
pub use processor::ItemProcessor;
