//! Fixed-Size Worker Pool
//!
//! Wraps a dedicated rayon thread pool. Data-parallel work is split into
//! contiguous partitions, one per thread, and results come back in
//! partition order so parallel pipelines stay deterministic.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::ops::Range;
use thiserror::Error;

/// Errors raised while creating a pool
#[derive(Debug, Error)]
pub enum PoolError {
    /// Zero threads requested
    #[error("worker pool needs at least one thread")]
    ZeroThreads,

    /// rayon could not spawn the threads
    #[error("failed to build worker pool: {0}")]
    Build(#[from] rayon::ThreadPoolBuildError),
}

/// A pool with a fixed number of threads
pub struct WorkerPool {
    pool: ThreadPool,
    concurrency: usize,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl WorkerPool {
    /// Create a pool of exactly `concurrency` threads
    pub fn new(concurrency: usize) -> Result<Self, PoolError> {
        if concurrency == 0 {
            return Err(PoolError::ZeroThreads);
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(concurrency)
            .thread_name(|i| format!("streambench-pool-{i}"))
            .build()?;
        Ok(Self { pool, concurrency })
    }

    /// Create a pool sized to the machine's available parallelism
    pub fn with_available_parallelism() -> Result<Self, PoolError> {
        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::new(threads)
    }

    /// Number of threads in the pool
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run `op` once on every pool thread, returning results by thread index
    pub fn broadcast<R, F>(&self, op: F) -> Vec<R>
    where
        F: Fn(usize) -> R + Sync,
        R: Send,
    {
        self.pool.broadcast(|ctx| op(ctx.index()))
    }

    /// Apply `f` to contiguous partitions of `input`, one per thread.
    ///
    /// The returned vector is in partition order.
    pub fn map_partitions<T, R, F>(&self, input: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&[T]) -> R + Sync,
    {
        let bounds = partition_bounds(input.len(), self.concurrency);
        self.pool.install(|| {
            bounds
                .into_par_iter()
                .map(|range| f(&input[range]))
                .collect()
        })
    }
}

/// Split `0..len` into at most `parts` contiguous ranges of near-equal size.
///
/// The first `len % parts` ranges are one element longer. Empty input yields
/// a single empty range.
pub fn partition_bounds(len: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.clamp(1, len.max(1));
    let base = len / parts;
    let remainder = len % parts;

    let mut bounds = Vec::with_capacity(parts);
    let mut start = 0;
    for i in 0..parts {
        let size = base + usize::from(i < remainder);
        bounds.push(start..start + size);
        start += size;
    }
    bounds
}
