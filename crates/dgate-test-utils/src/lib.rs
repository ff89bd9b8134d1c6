//! Testing utilities for the deletion gate workspace
//!
//! Shared fixtures, frozen clocks, and a store wrapper that injects faults.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use dgate_core::{
    FixedClock, InMemoryStore, ManagedResource, ObjectKey, ObjectStore, RetryPolicy, StoreError,
    CONFIRMATION_DELETION,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Instant every frozen clock starts at: 2021-01-01T00:00:00Z
pub fn frozen_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap()
}

/// Rendering of [`frozen_instant`] in the timestamp annotation
pub const FROZEN_TIMESTAMP: &str = "2021-01-01 00:00:00 +0000 UTC";

pub fn frozen_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(frozen_instant()))
}

/// Retry policy with 1ms steps and no jitter
pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts)
        .with_initial_delay(Duration::from_millis(1))
        .with_factor(2.0)
        .with_jitter(0.0)
}

pub fn shoot_key() -> ObjectKey {
    ObjectKey::namespaced("Shoot", "garden-dev", "crazy-botany")
}

pub fn shoot() -> ManagedResource {
    ManagedResource::new(shoot_key())
        .with_label("shoot.gardener.cloud/status", "healthy")
        .with_spec(serde_json::json!({
            "region": "eu-west-1",
            "kubernetes": { "version": "1.29.3" }
        }))
}

pub fn confirmed_shoot() -> ManagedResource {
    shoot().with_annotation(CONFIRMATION_DELETION, "true")
}

/// Store pre-populated with `objects`
pub fn seeded_store(objects: impl IntoIterator<Item = ManagedResource>) -> Arc<InMemoryStore> {
    let store = InMemoryStore::new();
    for obj in objects {
        if let Err(err) = store.create(obj) {
            panic!("seeding store: {err}");
        }
    }
    Arc::new(store)
}

type Mutation = Box<dyn FnOnce(&mut ManagedResource) + Send>;

/// Fault injected in place of, or before, a store call
pub enum Fault {
    /// Fail with a conflict without touching the inner store
    Conflict,
    /// Let another actor modify the object first, then forward the call
    ConcurrentModification(Mutation),
    /// Let another actor delete the object first, then forward the call
    Delete,
    /// Fail with a backend error
    Backend(String),
    /// Never complete
    Stall,
}

impl Fault {
    pub fn modify<F>(mutate: F) -> Self
    where
        F: FnOnce(&mut ManagedResource) + Send + 'static,
    {
        Self::ConcurrentModification(Box::new(mutate))
    }
}

impl std::fmt::Debug for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Conflict => f.write_str("Conflict"),
            Self::ConcurrentModification(_) => f.write_str("ConcurrentModification"),
            Self::Delete => f.write_str("Delete"),
            Self::Backend(message) => write!(f, "Backend({message:?})"),
            Self::Stall => f.write_str("Stall"),
        }
    }
}

/// [`ObjectStore`] over an [`InMemoryStore`] with scripted faults
///
/// Each call pops the next fault queued for its method, if any.
#[derive(Debug)]
pub struct FaultyStore {
    inner: Arc<InMemoryStore>,
    get_faults: Mutex<VecDeque<Fault>>,
    update_faults: Mutex<VecDeque<Fault>>,
    gets: AtomicUsize,
    updates: AtomicUsize,
}

impl FaultyStore {
    pub fn new(inner: Arc<InMemoryStore>) -> Self {
        Self {
            inner,
            get_faults: Mutex::new(VecDeque::new()),
            update_faults: Mutex::new(VecDeque::new()),
            gets: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &Arc<InMemoryStore> {
        &self.inner
    }

    pub fn fail_next_get(&self, fault: Fault) -> &Self {
        self.get_faults.lock().push_back(fault);
        self
    }

    pub fn fail_next_update(&self, fault: Fault) -> &Self {
        self.update_faults.lock().push_back(fault);
        self
    }

    /// `get` calls seen, including faulted ones
    pub fn get_calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// `update` calls seen, including faulted ones
    pub fn update_calls(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    async fn apply(&self, fault: Fault, key: &ObjectKey) -> Result<(), StoreError> {
        match fault {
            Fault::Conflict => Err(StoreError::Conflict { key: key.clone() }),
            Fault::ConcurrentModification(mutate) => {
                self.inner.modify(key, mutate)?;
                Ok(())
            }
            Fault::Delete => {
                self.inner.delete(key)?;
                Ok(())
            }
            Fault::Backend(message) => Err(StoreError::backend(message)),
            Fault::Stall => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl ObjectStore for FaultyStore {
    async fn get(&self, key: &ObjectKey) -> Result<ManagedResource, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let fault = self.get_faults.lock().pop_front();
        if let Some(fault) = fault {
            self.apply(fault, key).await?;
        }
        self.inner.get(key).await
    }

    async fn update(&self, obj: &ManagedResource) -> Result<ManagedResource, StoreError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        let fault = self.update_faults.lock().pop_front();
        if let Some(fault) = fault {
            self.apply(fault, &obj.key).await?;
        }
        self.inner.update(obj).await
    }
}
