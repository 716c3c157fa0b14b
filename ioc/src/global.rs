//! The process-wide worker pool used by scopes built without their own.

use crate::error::Result;
use crate::pool::{WorkerPool, WorkerPoolConfig};
use once_cell::sync::OnceCell;
use std::sync::Arc;

// Started on first use, sized to the available parallelism, never resized.
static SHARED_POOL: OnceCell<Arc<WorkerPool>> = OnceCell::new();

/// Returns the process-wide worker pool, starting it on first use.
///
/// Scopes whose builder was not given a pool submit `get_future` jobs here.
/// Call `shutdown` on it before process exit to drain pending jobs.
///
/// # Examples
///
/// ```
/// use fibre_inject::shared_pool;
///
/// let pool = shared_pool().unwrap();
/// assert!(pool.threads() >= 1);
/// ```
pub fn shared_pool() -> Result<Arc<WorkerPool>> {
  SHARED_POOL
    .get_or_try_init(|| WorkerPool::new(WorkerPoolConfig::default()).map(Arc::new))
    .cloned()
}
