// midi-corpus - composer-indexed feature corpus from MIDI performances
// Main library entry point

pub mod config;
pub mod corpus;
pub mod extraction;
pub mod pipeline;

use std::path::PathBuf;

use anyhow::Context;

use config::Config;
use corpus::{ComposerTotals, MergeAmbiguity, ScanResult};
use pipeline::{ThreadPool, WorkerPool};

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub scan: ScanResult,
    pub totals: Vec<ComposerTotals>,
    pub ambiguities: Vec<MergeAmbiguity>,
    pub output_path: PathBuf,
}

/// Scan, extract on a thread pool sized from `config`, and save the corpus.
pub fn run(config: &Config) -> anyhow::Result<RunReport> {
    let pool = ThreadPool::new(config.worker_count());
    run_with_pool(config, &pool)
}

/// Same as [`run`] with a caller-supplied worker pool.
pub fn run_with_pool<P: WorkerPool>(config: &Config, pool: &P) -> anyhow::Result<RunReport> {
    pipeline::checked_worker_count(pool).context("Corpus build failed")?;
    let scan = corpus::scan_corpus(&config.base_directory, &config.composers);

    let build = pipeline::build_corpus(scan.files.clone(), pool)
        .context("Corpus build failed")?;

    corpus::save_corpus(&build.index, &config.output_path)?;
    log::info!("Processing complete. Results saved to {}", config.output_path.display());

    Ok(RunReport {
        scan,
        totals: build.totals,
        ambiguities: build.ambiguities,
        output_path: config.output_path.clone(),
    })
}
