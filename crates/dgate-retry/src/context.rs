//! Cancellable operation context
//!
//! An [`OperationContext`] travels with a call and lets the caller abort it,
//! either explicitly through its cancellation token or implicitly when its
//! deadline passes. Every await point that may block on I/O or backoff goes
//! through [`OperationContext::run`] or [`OperationContext::sleep`].

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why an operation stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Interrupted {
    /// The context was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// The context deadline passed
    #[error("operation deadline exceeded")]
    DeadlineExceeded,
}

/// Cancellation token plus optional deadline
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl OperationContext {
    /// Create context with no deadline
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create context driven by an existing token
    #[inline]
    #[must_use]
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// With deadline (keeps the earlier one if already set)
    #[inline]
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// With deadline `timeout` from now
    #[inline]
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a context cancelled together with this one
    ///
    /// Cancelling the child does not cancel the parent.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancel this context and its children
    #[inline]
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the context was cancelled
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Deadline, if any
    #[inline]
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Underlying token
    #[inline]
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Fail fast if the context is already done
    ///
    /// # Errors
    /// [`Interrupted`] if cancelled or past the deadline.
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.token.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }
        match self.deadline {
            Some(at) if at <= Instant::now() => Err(Interrupted::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Drive `fut` to completion unless the context ends first
    ///
    /// Cancellation wins ties; `fut` is dropped when interrupted.
    ///
    /// # Errors
    /// [`Interrupted`] if cancelled or past the deadline before `fut` completes.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, Interrupted>
    where
        F: Future,
    {
        self.check()?;

        let deadline = async {
            match self.deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(Interrupted::Cancelled),
            () = deadline => Err(Interrupted::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }

    /// Sleep for `delay` unless the context ends first
    ///
    /// # Errors
    /// [`Interrupted`] if cancelled or past the deadline during the sleep.
    pub async fn sleep(&self, delay: Duration) -> Result<(), Interrupted> {
        self.run(tokio::time::sleep(delay)).await
    }
}
