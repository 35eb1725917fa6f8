// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Filigran — Core types, errors and classification shared across all crates.

pub mod classify;
pub mod config;
pub mod error;
pub mod integrity;
pub mod render;
pub mod types;

pub use classify::{Classifier, classify};
pub use config::AppConfig;
pub use error::{FiligranError, RenderFailure, Result};
pub use render::Renderer;
pub use types::*;
