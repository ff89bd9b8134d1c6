//! Deletion confirmation writer
//!
//! Stamps the confirmation annotation onto a resource with a
//! fetch → mutate → compare → write cycle:
//! - every write carries the version token from the fetch in the same attempt
//! - version conflicts restart the cycle from a fresh fetch, under backoff
//! - a cycle that would not change the two owned annotations skips the write
//! - a resource that no longer exists needs no confirmation

use crate::annotations::{CONFIRMATION_DELETION, GARDENER_TIMESTAMP};
use crate::clock::{render_timestamp, system_clock, Clock};
use crate::config::GateConfig;
use crate::error::{ConfigError, ConfirmError, StoreError};
use crate::resource::{Annotated, ManagedResource, ObjectKey};
use crate::store::ObjectStore;
use dgate_retry::{retry, Interrupted, OperationContext, RetryError, RetryPolicy};
use std::sync::Arc;

/// Result of a successful confirmation call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// The resource does not exist; nothing to confirm
    NotFound,
    /// Stored annotations already matched; no write issued
    Unchanged {
        /// Attempts made, including the final no-op one
        attempts: u32,
    },
    /// Annotations written
    Confirmed {
        /// Attempts made, including the successful write
        attempts: u32,
    },
}

impl ConfirmOutcome {
    /// Whether a write reached the store
    #[inline]
    #[must_use]
    pub fn wrote(&self) -> bool {
        matches!(self, Self::Confirmed { .. })
    }
}

/// The two annotation values this writer owns
#[derive(Debug, PartialEq, Eq)]
struct OwnedAnnotations {
    confirmation: Option<String>,
    timestamp: Option<String>,
}

impl OwnedAnnotations {
    fn of(obj: &ManagedResource) -> Self {
        Self {
            confirmation: obj.annotation(CONFIRMATION_DELETION).map(str::to_string),
            timestamp: obj.annotation(GARDENER_TIMESTAMP).map(str::to_string),
        }
    }
}

/// What one fetch/write cycle did
enum Attempt {
    NotFound,
    Unchanged(ManagedResource),
    Written(ManagedResource),
}

/// Writes deletion confirmations
///
/// Holds the time source and retry policy; stateless across calls, so one
/// instance may serve any number of concurrent callers.
#[derive(Debug, Clone)]
pub struct DeletionConfirmer {
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
}

impl DeletionConfirmer {
    /// Create confirmer with the wall clock and default retry policy
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            clock: system_clock(),
            policy: RetryPolicy::default(),
        }
    }

    /// Create confirmer from configuration
    ///
    /// # Errors
    /// [`ConfigError::Retry`] if the retry settings are invalid.
    pub fn from_config(config: &GateConfig) -> Result<Self, ConfigError> {
        Ok(Self::new().with_policy(config.retry.to_policy()?))
    }

    /// With time source
    #[inline]
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// With retry policy
    #[inline]
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Retry policy
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Set the confirmation annotation to `true` and refresh the timestamp
    ///
    /// Only `resource.key` is used as input. On success `resource` holds the
    /// latest stored state; when the object no longer exists it is left as is.
    ///
    /// # Workflow
    /// 1. Fetch current state (not found ends the call successfully)
    /// 2. Set confirmation and timestamp on the fetched copy
    /// 3. Skip the write if neither annotation changed
    /// 4. Update with the fetched version token; on conflict, back off and
    ///    restart from 1
    ///
    /// # Errors
    /// - [`ConfirmError::Conflict`] when every attempt in the budget conflicts
    /// - [`ConfirmError::Store`] on the first non-conflict store failure
    /// - [`ConfirmError::Cancelled`] / [`ConfirmError::DeadlineExceeded`] when
    ///   `ctx` ends during a fetch, write, or backoff wait
    #[tracing::instrument(level = "debug", skip_all, fields(key = %resource.key))]
    pub async fn confirm_deletion<S>(
        &self,
        ctx: &OperationContext,
        store: &S,
        resource: &mut ManagedResource,
    ) -> Result<ConfirmOutcome, ConfirmError>
    where
        S: ObjectStore + ?Sized,
    {
        let key = resource.key.clone();
        let target = &key;

        let result = retry(&self.policy, ctx, StoreError::is_conflict, move |attempt| {
            self.attempt(store, target, attempt)
        })
        .await;

        match result {
            Ok(done) => Ok(match done.value {
                Attempt::NotFound => {
                    tracing::debug!("object is gone, deletion confirmation is moot");
                    ConfirmOutcome::NotFound
                }
                Attempt::Unchanged(current) => {
                    *resource = current;
                    ConfirmOutcome::Unchanged {
                        attempts: done.attempts,
                    }
                }
                Attempt::Written(stored) => {
                    tracing::info!(attempts = done.attempts, "deletion confirmed");
                    *resource = stored;
                    ConfirmOutcome::Confirmed {
                        attempts: done.attempts,
                    }
                }
            }),
            Err(RetryError::Exhausted { attempts, last }) => {
                tracing::warn!(attempts, "giving up on deletion confirmation after conflicts");
                Err(ConfirmError::Conflict {
                    key,
                    attempts,
                    source: last,
                })
            }
            Err(RetryError::Permanent(source)) => Err(ConfirmError::Store { key, source }),
            Err(RetryError::Interrupted(Interrupted::Cancelled)) => {
                Err(ConfirmError::Cancelled { key })
            }
            Err(RetryError::Interrupted(Interrupted::DeadlineExceeded)) => {
                Err(ConfirmError::DeadlineExceeded { key })
            }
        }
    }

    async fn attempt<S>(
        &self,
        store: &S,
        key: &ObjectKey,
        attempt: u32,
    ) -> Result<Attempt, StoreError>
    where
        S: ObjectStore + ?Sized,
    {
        let mut working = match store.get(key).await {
            Ok(current) => current,
            Err(err) if err.is_not_found() => return Ok(Attempt::NotFound),
            Err(err) => return Err(err),
        };

        let baseline = OwnedAnnotations::of(&working);
        working.set_annotation(CONFIRMATION_DELETION, "true");
        working.set_annotation(GARDENER_TIMESTAMP, render_timestamp(self.clock.now()));

        if OwnedAnnotations::of(&working) == baseline {
            tracing::debug!(attempt, "confirmation already current, skipping write");
            return Ok(Attempt::Unchanged(working));
        }

        tracing::debug!(
            attempt,
            version = ?working.resource_version,
            "writing deletion confirmation"
        );
        match store.update(&working).await {
            Ok(stored) => Ok(Attempt::Written(stored)),
            Err(err) => {
                if err.is_conflict() {
                    tracing::warn!(attempt, "deletion confirmation lost a version race");
                }
                Err(err)
            }
        }
    }
}

impl Default for DeletionConfirmer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::MockObjectStore;
    use chrono::TimeZone;
    use mockall::predicate::eq;
    use mockall::Sequence;
    use std::time::Duration;

    fn key() -> ObjectKey {
        ObjectKey::namespaced("Shoot", "garden-dev", "crazy-botany")
    }

    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::new(
            chrono::Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap(),
        ))
    }

    fn confirmer() -> DeletionConfirmer {
        DeletionConfirmer::new()
            .with_clock(clock())
            .with_policy(
                RetryPolicy::new(3)
                    .with_initial_delay(Duration::from_millis(1))
                    .with_jitter(0.0),
            )
    }

    fn stored(version: &str) -> ManagedResource {
        ManagedResource::new(key()).with_resource_version(version)
    }

    #[tokio::test(start_paused = true)]
    async fn writes_once_on_unconfirmed_resource() {
        let mut store = MockObjectStore::new();
        store
            .expect_get()
            .with(eq(key()))
            .times(1)
            .returning(|_| Ok(stored("1")));
        store
            .expect_update()
            .withf(|obj| {
                obj.resource_version == Some("1".into())
                    && obj.annotation(CONFIRMATION_DELETION) == Some("true")
                    && obj.annotation(GARDENER_TIMESTAMP) == Some("2021-01-01 00:00:00 +0000 UTC")
            })
            .times(1)
            .returning(|obj| Ok(obj.clone().with_resource_version("2")));

        let mut resource = ManagedResource::new(key());
        let outcome = confirmer()
            .confirm_deletion(&OperationContext::new(), &store, &mut resource)
            .await
            .unwrap();

        assert_eq!(outcome, ConfirmOutcome::Confirmed { attempts: 1 });
        assert_eq!(resource.resource_version, Some("2".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn skips_write_when_annotations_current() {
        let mut store = MockObjectStore::new();
        store.expect_get().times(1).returning(|_| {
            Ok(stored("5")
                .with_annotation(CONFIRMATION_DELETION, "true")
                .with_annotation(GARDENER_TIMESTAMP, "2021-01-01 00:00:00 +0000 UTC"))
        });
        store.expect_update().never();

        let mut resource = ManagedResource::new(key());
        let outcome = confirmer()
            .confirm_deletion(&OperationContext::new(), &store, &mut resource)
            .await
            .unwrap();

        assert_eq!(outcome, ConfirmOutcome::Unchanged { attempts: 1 });
        assert!(!outcome.wrote());
        assert_eq!(resource.resource_version, Some("5".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn rewrites_non_canonical_true() {
        let mut store = MockObjectStore::new();
        store.expect_get().times(1).returning(|_| {
            Ok(stored("5")
                .with_annotation(CONFIRMATION_DELETION, "True")
                .with_annotation(GARDENER_TIMESTAMP, "2021-01-01 00:00:00 +0000 UTC"))
        });
        store
            .expect_update()
            .withf(|obj| obj.annotation(CONFIRMATION_DELETION) == Some("true"))
            .times(1)
            .returning(|obj| Ok(obj.clone()));

        let outcome = confirmer()
            .confirm_deletion(
                &OperationContext::new(),
                &store,
                &mut ManagedResource::new(key()),
            )
            .await
            .unwrap();
        assert!(outcome.wrote());
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_is_success_without_write() {
        let mut store = MockObjectStore::new();
        store
            .expect_get()
            .times(1)
            .returning(|key| Err(StoreError::NotFound { key: key.clone() }));
        store.expect_update().never();

        let mut resource = ManagedResource::new(key()).with_annotation("keep", "me");
        let outcome = confirmer()
            .confirm_deletion(&OperationContext::new(), &store, &mut resource)
            .await
            .unwrap();

        assert_eq!(outcome, ConfirmOutcome::NotFound);
        assert_eq!(resource.annotation("keep"), Some("me"));
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_error_is_not_retried() {
        let mut store = MockObjectStore::new();
        store
            .expect_get()
            .times(1)
            .returning(|_| Err(StoreError::backend("connection refused")));
        store.expect_update().never();

        let err = confirmer()
            .confirm_deletion(
                &OperationContext::new(),
                &store,
                &mut ManagedResource::new(key()),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ConfirmError::Store { .. }));
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test(start_paused = true)]
    async fn conflict_refetches_and_retries() {
        let mut seq = Sequence::new();
        let mut store = MockObjectStore::new();
        store
            .expect_get()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(stored("1")));
        store
            .expect_update()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|obj| Err(StoreError::Conflict { key: obj.key.clone() }));
        store
            .expect_get()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(stored("2").with_label("touched-by", "someone-else")));
        store
            .expect_update()
            .withf(|obj| {
                obj.resource_version == Some("2".into())
                    && obj.labels.get("touched-by").map(String::as_str) == Some("someone-else")
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|obj| Ok(obj.clone().with_resource_version("3")));

        let mut resource = ManagedResource::new(key());
        let outcome = confirmer()
            .confirm_deletion(&OperationContext::new(), &store, &mut resource)
            .await
            .unwrap();

        assert_eq!(outcome, ConfirmOutcome::Confirmed { attempts: 2 });
        assert_eq!(resource.resource_version, Some("3".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn conflict_budget_exhaustion() {
        let mut store = MockObjectStore::new();
        store.expect_get().times(3).returning(|_| Ok(stored("1")));
        store
            .expect_update()
            .times(3)
            .returning(|obj| Err(StoreError::Conflict { key: obj.key.clone() }));

        let err = confirmer()
            .confirm_deletion(
                &OperationContext::new(),
                &store,
                &mut ManagedResource::new(key()),
            )
            .await
            .unwrap_err();

        match err {
            ConfirmError::Conflict { attempts, source, .. } => {
                assert_eq!(attempts, 3);
                assert!(source.is_conflict());
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn write_error_is_not_retried() {
        let mut store = MockObjectStore::new();
        store.expect_get().times(1).returning(|_| Ok(stored("1")));
        store
            .expect_update()
            .times(1)
            .returning(|_| Err(StoreError::backend("forbidden")));

        let err = confirmer()
            .confirm_deletion(
                &OperationContext::new(),
                &store,
                &mut ManagedResource::new(key()),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ConfirmError::Store { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_context_issues_no_requests() {
        let mut store = MockObjectStore::new();
        store.expect_get().never();
        store.expect_update().never();

        let ctx = OperationContext::new();
        ctx.cancel();
        let err = confirmer()
            .confirm_deletion(&ctx, &store, &mut ManagedResource::new(key()))
            .await
            .unwrap_err();

        assert!(matches!(err, ConfirmError::Cancelled { .. }));
        assert!(err.is_cancellation());
    }

    #[test]
    fn from_config_rejects_invalid_retry() {
        let mut config = GateConfig::default();
        config.retry.max_attempts = 0;
        assert!(matches!(
            DeletionConfirmer::from_config(&config),
            Err(ConfigError::Retry(_))
        ));

        let confirmer = DeletionConfirmer::from_config(&GateConfig::default()).unwrap();
        assert_eq!(confirmer.policy().max_attempts(), 4);
    }
}
