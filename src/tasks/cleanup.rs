//! TTL Cleanup Task
//!
//! Background task that periodically asks the cache to drop expired entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{Cache, OpContext};

/// Spawns a background task that calls [`Cache::flush_expired`] every
/// `interval`.
///
/// Each sweep runs under its own deadline of one interval. Failures are
/// logged and the loop keeps going.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
/// let cleanup_handle = spawn_cleanup_task(cache.clone(), Duration::from_secs(1));
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(cache: Arc<dyn Cache>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(?interval, "Starting TTL cleanup task");

        loop {
            tokio::time::sleep(interval).await;

            let ctx = OpContext::with_timeout(interval.max(Duration::from_millis(100)));
            match cache.flush_expired(&ctx).await {
                Ok(0) => debug!("TTL cleanup: no expired entries found"),
                Ok(removed) => info!("TTL cleanup: removed {} expired entries", removed),
                Err(err) => warn!(error = %err, "TTL cleanup failed"),
            }
        }
    })
}
