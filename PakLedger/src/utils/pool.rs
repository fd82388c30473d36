//! Worker pool sizing for hashing

use tracing::warn;

/// Run `op` on a rayon pool with `workers` threads, or on the global pool
/// when `workers` is 0.
pub fn run_in_pool<T, F>(workers: usize, op: F) -> T
where
    T: Send,
    F: FnOnce() -> T + Send,
{
    if workers == 0 {
        return op();
    }
    match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
        Ok(pool) => pool.install(op),
        Err(e) => {
            warn!("Could not start {workers} hashing threads ({e}); using the global pool");
            op()
        }
    }
}
