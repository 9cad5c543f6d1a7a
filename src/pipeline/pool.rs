//! Worker pools that run one job per chunk
//!
//! The orchestrator only sees the [`WorkerPool`] trait, so the execution
//! backend can be swapped:
//! - [`ThreadPool`] runs each chunk on its own scoped OS thread
//! - [`InlinePool`] runs chunks one after another on the caller's thread

use std::panic::{self, AssertUnwindSafe};

/// Error type for dispatching work to a pool
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Failed to spawn worker {index}: {source}")]
    Spawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker {0} failed before returning its chunk")]
    WorkerFailed(usize),
}

/// An execution backend with a fixed number of contexts.
pub trait WorkerPool {
    /// Number of execution contexts. Zero means the pool is unusable.
    fn worker_count(&self) -> usize;

    /// Run `job` once per chunk and return the results in chunk order.
    /// Fails as a whole if any chunk fails; partial results are discarded.
    fn dispatch<T, R, F>(&self, chunks: Vec<T>, job: F) -> Result<Vec<R>, PoolError>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync;
}

/// Scoped OS threads, one per dispatched chunk.
#[derive(Debug, Clone)]
pub struct ThreadPool {
    workers: usize,
}

impl ThreadPool {
    pub fn new(workers: usize) -> Self {
        Self { workers }
    }

    /// One worker per available CPU (at least one)
    pub fn with_available_parallelism() -> Self {
        Self::new(available_workers())
    }
}

/// Parallelism reported by the OS, falling back to 1.
pub fn available_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl WorkerPool for ThreadPool {
    fn worker_count(&self) -> usize {
        self.workers
    }

    fn dispatch<T, R, F>(&self, chunks: Vec<T>, job: F) -> Result<Vec<R>, PoolError>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync,
    {
        let job = &job;

        std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(chunks.len());

            for (index, chunk) in chunks.into_iter().enumerate() {
                let spawned = std::thread::Builder::new()
                    .name(format!("corpus-worker-{}", index))
                    .spawn_scoped(scope, move || job(chunk));

                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(source) => {
                        // Join what already started so the scope never sees an unjoined panic
                        for handle in handles {
                            let _ = handle.join();
                        }
                        return Err(PoolError::Spawn { index, source });
                    }
                }
            }

            let mut results = Vec::with_capacity(handles.len());
            let mut failed = None;
            for (index, handle) in handles.into_iter().enumerate() {
                match handle.join() {
                    Ok(result) => results.push(result),
                    Err(_) => {
                        log::error!("Worker {} panicked", index);
                        failed.get_or_insert(index);
                    }
                }
            }

            match failed {
                Some(index) => Err(PoolError::WorkerFailed(index)),
                None => Ok(results),
            }
        })
    }
}

/// Runs every chunk sequentially on the calling thread. Reports `workers`
/// contexts so partitioning matches a real pool of that size.
#[derive(Debug, Clone)]
pub struct InlinePool {
    workers: usize,
}

impl InlinePool {
    pub fn new(workers: usize) -> Self {
        Self { workers }
    }
}

impl WorkerPool for InlinePool {
    fn worker_count(&self) -> usize {
        self.workers
    }

    fn dispatch<T, R, F>(&self, chunks: Vec<T>, job: F) -> Result<Vec<R>, PoolError>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync,
    {
        chunks
            .into_iter()
            .enumerate()
            .map(|(index, chunk)| {
                panic::catch_unwind(AssertUnwindSafe(|| job(chunk)))
                    .map_err(|_| PoolError::WorkerFailed(index))
            })
            .collect()
    }
}
