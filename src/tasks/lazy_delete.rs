//! Lazy Delete Task
//!
//! Detached removal of keys found expired during a read.

use std::future::Future;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::Result;

/// Spawns `delete` as a detached task that removes `keys`.
///
/// The task is not tied to the reading caller's context: it keeps running
/// if the read is cancelled, and its failure is only logged.
pub fn spawn_lazy_delete<F>(keys: Vec<String>, delete: F) -> JoinHandle<()>
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        match delete.await {
            Ok(()) => debug!(?keys, "lazily deleted expired keys"),
            Err(err) => warn!(?keys, error = %err, "lazy delete of expired keys failed"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_runs_delete_future() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();

        let handle = spawn_lazy_delete(vec!["k".to_string()], async move {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });

        handle.await.unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_failure_is_swallowed() {
        let handle = spawn_lazy_delete(vec!["k".to_string()], async {
            Err(CacheError::Backend("connection refused".into()))
        });

        // Task completes normally instead of panicking
        assert!(handle.await.is_ok());
    }
}
