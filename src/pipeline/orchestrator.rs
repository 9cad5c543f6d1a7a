// Parallel batch orchestration: partition, dispatch, merge

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::corpus::{ComposerTotals, CorpusIndex, MergeAmbiguity};
use crate::extraction::extract_file;

use super::partition::{partition_round_robin, PartitionError};
use super::pool::{PoolError, WorkerPool};

/// Error type for a corpus build
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Partition error: {0}")]
    Partition(#[from] PartitionError),

    #[error("Worker pool error: {0}")]
    Pool(#[from] PoolError),
}

/// What one worker hands back for its chunk.
#[derive(Debug, Clone, Default)]
pub struct ChunkResult {
    pub index: CorpusIndex,
    /// Files processed per composer in this chunk
    pub processed: BTreeMap<String, usize>,
    /// (composer, work) pairs that appeared twice inside this chunk
    pub collisions: Vec<(String, String)>,
}

/// Merged output of a corpus build.
#[derive(Debug, Clone)]
pub struct CorpusBuild {
    pub index: CorpusIndex,
    pub ambiguities: Vec<MergeAmbiguity>,
    pub totals: Vec<ComposerTotals>,
}

/// Composer (parent folder name) and work name (file stem) for a corpus file.
pub fn work_key(path: &Path) -> (String, String) {
    let composer = path
        .parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let work = path
        .file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    (composer, work)
}

/// Worker entry point: extract every file of the chunk in order.
pub fn process_chunk(files: Vec<PathBuf>) -> ChunkResult {
    let mut result = ChunkResult::default();

    for path in &files {
        let (composer, work) = work_key(path);
        let outcome = extract_file(path);

        if result.index.insert(&composer, &work, outcome).is_some() {
            log::warn!(
                "Work '{}' of '{}' appears twice in one chunk; keeping {}",
                work, composer, path.display()
            );
            result.collisions.push((composer.clone(), work));
        }
        *result.processed.entry(composer).or_insert(0) += 1;
    }

    log::info!("Processed files in this chunk:");
    for (composer, count) in &result.processed {
        log::info!("  {}: {} files", composer, count);
    }

    result
}

/// Merge chunk results in chunk order. Later chunks win on collision; every
/// collision, inside a chunk or across chunks, is reported.
pub fn merge_chunks(results: Vec<ChunkResult>) -> (CorpusIndex, Vec<MergeAmbiguity>) {
    let mut merged = CorpusIndex::new();
    let mut ambiguities = Vec::new();

    for (chunk, result) in results.into_iter().enumerate() {
        ambiguities.extend(result.collisions.into_iter().map(|(composer, work)| MergeAmbiguity {
            composer,
            work,
            chunk,
        }));
        ambiguities.extend(merged.merge(result.index, chunk));
    }

    for ambiguity in &ambiguities {
        log::warn!("Merge ambiguity: {}", ambiguity);
    }

    (merged, ambiguities)
}

/// Number of workers `pool` will run, rejecting an empty pool.
pub fn checked_worker_count<P: WorkerPool>(pool: &P) -> Result<usize, CorpusError> {
    match pool.worker_count() {
        0 => Err(CorpusError::Configuration(
            "worker pool has no execution contexts".into(),
        )),
        workers => Ok(workers),
    }
}

/// Extract every file on `pool` and merge the partial indexes once all
/// chunks have returned.
///
/// Fails before touching any file when the pool has no workers. A failed
/// worker fails the whole build.
pub fn build_corpus<P: WorkerPool>(files: Vec<PathBuf>, pool: &P) -> Result<CorpusBuild, CorpusError> {
    let workers = checked_worker_count(pool)?;
    log::info!("Number of workers: {}", workers);

    let file_count = files.len();
    let chunks = partition_round_robin(files, workers)?;
    log::info!("Processing {} files in {} chunks...", file_count, chunks.len());

    let results = pool.dispatch(chunks, process_chunk)?;
    let (index, ambiguities) = merge_chunks(results);
    let totals = index.totals();

    Ok(CorpusBuild { index, ambiguities, totals })
}
