//! Shared thread pool for parallel resampling.
//!
//! Replicates and rarefied subset sizes fan out over one pool with an
//! increased stack size, so nested parallel loops (sizes × replicates) share
//! workers instead of oversubscribing the machine.

use rayon::ThreadPool;

use std::sync::OnceLock;

static THREAD_POOL: OnceLock<Option<ThreadPool>> = OnceLock::new();

/// Get or initialize the shared thread pool.
///
/// The pool is configured with:
/// - Stack size: 8 MB (vs rayon's default 2 MB)
/// - Thread count: Number of logical CPUs
///
/// Returns `None` if the pool could not be built; callers then run on
/// rayon's global pool.
pub fn get_thread_pool() -> Option<&'static ThreadPool> {
    THREAD_POOL
        .get_or_init(|| {
            match rayon::ThreadPoolBuilder::new()
                .stack_size(8 * 1024 * 1024) // 8 MB stack per thread
                .thread_name(|i| format!("clade-shift-{i}"))
                .build()
            {
                Ok(pool) => Some(pool),
                Err(err) => {
                    tracing::warn!(%err, "could not build resampling pool, using rayon global pool");
                    None
                }
            }
        })
        .as_ref()
}

/// Execute a parallel operation using the shared thread pool.
pub fn install<OP, R>(op: OP) -> R
where
    OP: FnOnce() -> R + Send,
    R: Send,
{
    match get_thread_pool() {
        Some(pool) => pool.install(op),
        None => op(),
    }
}
