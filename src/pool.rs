//! Fixed-size worker pool mapping contiguous chunks to index-addressed result slots.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::Result;

/// Dedicated Rayon pool with one thread per worker.
pub(crate) struct WorkerPool {
    pool: ThreadPool,
    workers: usize,
}

impl WorkerPool {
    pub(crate) fn new(workers: usize) -> Result<Self> {
        let workers = workers.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|idx| format!("chatprep-worker-{idx}"))
            .build()?;
        Ok(Self { pool, workers })
    }

    pub(crate) fn workers(&self) -> usize {
        self.workers
    }

    /// Runs `job` over every chunk and returns the results in chunk order.
    ///
    /// Each job owns its chunk and writes only its own slot; the call returns once every slot is
    /// filled.
    pub(crate) fn map_chunks<T, R, F>(&self, chunks: Vec<T>, job: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(usize, T) -> R + Sync + Send,
    {
        self.pool.install(|| {
            chunks
                .into_par_iter()
                .enumerate()
                .map(|(index, chunk)| job(index, chunk))
                .collect()
        })
    }
}

/// Splits `items` into `workers` contiguous chunks of `len / workers` items each.
///
/// Items beyond `workers * chunk_size` are not covered; the count of those is returned alongside
/// the chunks.
pub(crate) fn floor_chunks<T>(items: &[T], workers: usize) -> (Vec<&[T]>, usize) {
    let workers = workers.max(1);
    let chunk_size = items.len() / workers;
    let chunks = (0..workers)
        .map(|worker| &items[worker * chunk_size..(worker + 1) * chunk_size])
        .collect();
    (chunks, items.len() - workers * chunk_size)
}
