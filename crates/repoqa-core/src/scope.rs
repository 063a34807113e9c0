//! Per-request deadline and cancellation.
//!
//! Every outbound call made on behalf of one request is wrapped in
//! [`RequestScope::run`], which yields `None` once the deadline passes or the
//! caller cancels. Callers decide what a `None` means for them.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct RequestScope {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl RequestScope {
    /// No deadline, never cancelled unless [`RequestScope::cancel`] is called.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { deadline: Some(Instant::now() + timeout), cancel: CancellationToken::new() }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// A child scope that also expires after `timeout`, keeping the parent's
    /// deadline when that is earlier.
    pub fn narrowed(&self, timeout: Duration) -> Self {
        self.clone().with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_expired(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Race `fut` against the deadline and the cancellation token.
    pub async fn run<F>(&self, fut: F) -> Option<F::Output>
    where
        F: Future,
    {
        if self.is_expired() {
            return None;
        }
        match self.deadline {
            Some(deadline) => tokio::select! {
                out = fut => Some(out),
                _ = tokio::time::sleep_until(deadline) => None,
                _ = self.cancel.cancelled() => None,
            },
            None => tokio::select! {
                out = fut => Some(out),
                _ = self.cancel.cancelled() => None,
            },
        }
    }
}
