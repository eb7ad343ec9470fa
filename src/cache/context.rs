//! Operation Context
//!
//! Carries the caller's deadline and cancellation signal into every cache
//! operation.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{CacheError, Result};

// == Operation Context ==
/// Deadline and cancellation scope for a single cache call.
///
/// Cloning shares the cancellation token, so cancelling any clone cancels
/// all of them.
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    deadline: Option<Instant>,
    token: CancellationToken,
}

impl OpContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context whose deadline is `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A context with an absolute deadline.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            token: CancellationToken::new(),
        }
    }

    /// Replaces the cancellation token with one owned by the caller.
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancels this context and every clone of it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    // == Check ==
    /// Fails fast if the context is already cancelled or past its deadline.
    pub fn check(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(CacheError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(CacheError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    // == Run ==
    /// Drives `fut` to completion unless the context fires first.
    ///
    /// When the context fires, `fut` is dropped, which aborts any in-flight
    /// backend call it owns.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(CacheError::Cancelled),
            _ = deadline => Err(CacheError::DeadlineExceeded),
            result = fut => result,
        }
    }
}
