// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Filigran — batch document watermarking
//
// Entry point. Initialises logging, loads configuration, builds the
// orchestrator and runs one request over the files named on the command line.

mod services;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use filigran_core::AppConfig;
use filigran_document::DocumentRenderer;
use filigran_pipeline::BatchOrchestrator;

#[derive(Parser, Debug)]
#[command(name = "filigran")]
#[command(about = "Watermark images, PDFs, Word documents and archives of them")]
struct Args {
    /// Watermark text (defaults to the configured text)
    #[arg(long, value_name = "TEXT")]
    text: Option<String>,

    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the number of concurrent workers
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// Directory the result is written to
    #[arg(long, value_name = "DIR", default_value = ".")]
    out: PathBuf,

    /// Files to watermark; one archive is expanded, several files are batched
    #[arg(required = true, value_name = "FILES")]
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    tracing::info!("Filigran starting");

    let config = load_config(&args)?;
    let renderer = DocumentRenderer::from_config(&config);
    let orchestrator = BatchOrchestrator::from_config(Arc::new(renderer), &config);

    let uploads = services::read_uploads(&args.files)?;
    let response = orchestrator
        .handle_request(uploads, args.text.as_deref())
        .await
        .context("watermarking failed")?;

    let summary = services::write_response(&args.out, &response)?;
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

/// Defaults, then the config file, then the environment, then flags.
fn load_config(args: &Args) -> Result<AppConfig> {
    let base = match &args.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => AppConfig::default(),
    };
    let mut config = base.apply_env()?;
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    config.validate()?;
    Ok(config)
}
