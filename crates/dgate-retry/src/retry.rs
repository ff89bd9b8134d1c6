//! Bounded retry combinator

use crate::context::{Interrupted, OperationContext};
use crate::policy::RetryPolicy;
use std::future::Future;

/// Successful result with the number of attempts it took
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retried<T> {
    /// Operation output
    pub value: T,
    /// Attempts made, including the successful one
    pub attempts: u32,
}

/// Retry failure
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// Every attempt in the budget failed with a retryable error
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        /// Attempts made
        attempts: u32,
        /// Error from the final attempt
        #[source]
        last: E,
    },

    /// Non-retryable error, returned on first occurrence
    #[error(transparent)]
    Permanent(E),

    /// Context ended during an attempt or a backoff wait
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

impl<E> RetryError<E> {
    /// Underlying operation error, if any
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Exhausted { last, .. } => Some(last),
            Self::Permanent(err) => Some(err),
            Self::Interrupted(_) => None,
        }
    }
}

/// Run `op` until it succeeds, fails permanently, or the budget runs out
///
/// `op` receives the 1-based attempt number. Failures for which
/// `is_retryable` returns `true` are retried after the policy's backoff
/// delay; any other failure is returned immediately. Interruptions from
/// `ctx` are never charged against the budget.
///
/// # Errors
/// - [`RetryError::Permanent`] on the first non-retryable failure
/// - [`RetryError::Exhausted`] with the last error once `max_attempts` fail
/// - [`RetryError::Interrupted`] if `ctx` is cancelled or times out
pub async fn retry<T, E, Op, Fut, P>(
    policy: &RetryPolicy,
    ctx: &OperationContext,
    is_retryable: P,
    mut op: Op,
) -> Result<Retried<T>, RetryError<E>>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts().max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match ctx.run(op(attempt)).await? {
            Ok(value) => {
                return Ok(Retried {
                    value,
                    attempts: attempt,
                })
            }
            Err(err) if !is_retryable(&err) => return Err(RetryError::Permanent(err)),
            Err(err) if attempt >= max_attempts => {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: err,
                })
            }
            Err(_) => {
                let delay = policy.next_delay(attempt);
                tracing::debug!(attempt, max_attempts, ?delay, "retryable failure, backing off");
                ctx.sleep(delay).await?;
            }
        }
    }
}
