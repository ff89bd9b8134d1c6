//! Bounded retry for optimistic-concurrency loops
//!
//! Provides:
//! - [`RetryPolicy`]: attempt budget plus exponential backoff with jitter
//! - [`OperationContext`]: cancellation token and optional deadline
//! - [`retry`]: combinator that re-runs an operation while a predicate says
//!   its failure is retryable
//!
//! # Example
//!
//! ```rust,ignore
//! use dgate_retry::{retry, OperationContext, RetryPolicy};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let ctx = OperationContext::new();
//! let policy = RetryPolicy::default();
//!
//! let done = retry(&policy, &ctx, |e: &MyError| e.is_conflict(), |_attempt| async {
//!     write_with_version_check().await
//! })
//! .await?;
//!
//! println!("succeeded after {} attempts", done.attempts);
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod policy;
pub mod retry;

pub use context::{Interrupted, OperationContext};
pub use policy::{PolicyError, RetryPolicy};
pub use retry::{retry, Retried, RetryError};
