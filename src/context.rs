use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{HealthError, HealthResult};

/// Caller-owned cancellation scope and deadline shared by every external
/// call made while serving one request.
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

    /// Run `fut` unless the request is cancelled or its deadline passes first.
    /// The losing future is dropped, abandoning the in-flight call.
    pub async fn guard<T, F>(&self, what: &str, fut: F) -> HealthResult<T>
    where
        F: Future<Output = HealthResult<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(HealthError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(HealthError::Cancelled),
            _ = sleep_until(self.deadline) => {
                Err(HealthError::upstream(format!("{} timed out", what)))
            }
            res = fut => res,
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}
