/// Worker pool setup for the per-package and per-file passes.

use anyhow::{Context, Result};

/// Initialize the global rayon thread pool. Without an explicit count the
/// pool gets one worker per core.
pub fn init_thread_pool(threads: Option<usize>) -> Result<usize> {
    let cores = num_cpus::get();
    let workers = threads.unwrap_or(cores).max(1);

    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build_global()
        .context("Failed to initialize the worker pool")?;

    tracing::debug!(workers, cores, "initialized thread pool");
    Ok(workers)
}
