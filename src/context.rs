//! Caller-supplied cancellation and deadline for directory operations.

use std::{future::Future, time::Duration};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{DirectoryError, DirectoryResult};

/// Carries a cancellation token and an optional deadline into every remote
/// call. Cloning shares the same token.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Drive `fut` to completion unless the context is cancelled or its
    /// deadline passes first. The future is dropped in either case, which
    /// aborts an in-flight HTTP request.
    pub async fn run<T, F>(&self, fut: F) -> DirectoryResult<T>
    where
        F: Future<Output = DirectoryResult<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(DirectoryError::Cancelled);
        }
        if let Some(deadline) = self.deadline
            && deadline <= Instant::now()
        {
            return Err(DirectoryError::DeadlineExceeded);
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(DirectoryError::Cancelled),
            _ = wait_until(self.deadline) => Err(DirectoryError::DeadlineExceeded),
            result = fut => result,
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
