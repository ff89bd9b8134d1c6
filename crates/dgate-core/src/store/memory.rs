//! In-memory object store with real optimistic concurrency
//!
//! Versions are a process-local counter rendered as strings. Each write
//! holds the shard lock for its key while it compares and replaces, so
//! concurrent writers observe the same conflict semantics as a real API
//! server.

use super::ObjectStore;
use crate::error::StoreError;
use crate::resource::{ManagedResource, ObjectKey, ResourceVersion};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Request counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// `get` calls
    pub gets: usize,
    /// `update` calls, including rejected ones
    pub updates: usize,
    /// `update` calls rejected with a conflict
    pub conflicts: usize,
}

/// Thread-safe in-memory [`ObjectStore`]
#[derive(Debug, Default)]
pub struct InMemoryStore {
    objects: DashMap<ObjectKey, ManagedResource>,
    version: AtomicU64,
    latency: Option<Duration>,
    gets: AtomicUsize,
    updates: AtomicUsize,
    conflicts: AtomicUsize,
}

impl InMemoryStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With simulated per-request latency
    ///
    /// Gives concurrent actors a window to interleave between a read and the
    /// following write.
    #[inline]
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn next_version(&self) -> ResourceVersion {
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        ResourceVersion(version.to_string())
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    /// Insert a new object, assigning its first version
    ///
    /// # Errors
    /// [`StoreError::AlreadyExists`] if the key is taken.
    pub fn create(&self, obj: ManagedResource) -> Result<ManagedResource, StoreError> {
        match self.objects.entry(obj.key.clone()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists { key: obj.key }),
            Entry::Vacant(slot) => {
                let mut stored = obj;
                stored.resource_version = Some(self.next_version());
                slot.insert(stored.clone());
                Ok(stored)
            }
        }
    }

    /// Remove an object
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if the key is absent.
    pub fn delete(&self, key: &ObjectKey) -> Result<ManagedResource, StoreError> {
        self.objects
            .remove(key)
            .map(|(_, obj)| obj)
            .ok_or_else(|| StoreError::NotFound { key: key.clone() })
    }

    /// Read-modify-write under the key's lock, as another actor would
    ///
    /// Always bumps the version, so any writer holding an older token will
    /// conflict.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if the key is absent.
    pub fn modify<F>(&self, key: &ObjectKey, mutate: F) -> Result<ManagedResource, StoreError>
    where
        F: FnOnce(&mut ManagedResource),
    {
        let mut entry = self
            .objects
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound { key: key.clone() })?;

        mutate(entry.value_mut());
        entry.key = key.clone();
        entry.resource_version = Some(self.next_version());
        Ok(entry.value().clone())
    }

    /// Current state without touching the counters
    #[must_use]
    pub fn peek(&self, key: &ObjectKey) -> Option<ManagedResource> {
        self.objects.get(key).map(|entry| entry.value().clone())
    }

    /// Number of stored objects
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Request counters
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            gets: self.gets.load(Ordering::SeqCst),
            updates: self.updates.load(Ordering::SeqCst),
            conflicts: self.conflicts.load(Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn get(&self, key: &ObjectKey) -> Result<ManagedResource, StoreError> {
        self.simulate_latency().await;
        self.gets.fetch_add(1, Ordering::SeqCst);

        self.peek(key)
            .ok_or_else(|| StoreError::NotFound { key: key.clone() })
    }

    async fn update(&self, obj: &ManagedResource) -> Result<ManagedResource, StoreError> {
        self.simulate_latency().await;
        self.updates.fetch_add(1, Ordering::SeqCst);

        let mut entry = self
            .objects
            .get_mut(&obj.key)
            .ok_or_else(|| StoreError::NotFound {
                key: obj.key.clone(),
            })?;

        if entry.resource_version != obj.resource_version {
            self.conflicts.fetch_add(1, Ordering::SeqCst);
            tracing::trace!(key = %obj.key, "rejecting stale write");
            return Err(StoreError::Conflict {
                key: obj.key.clone(),
            });
        }

        let mut stored = obj.clone();
        stored.resource_version = Some(self.next_version());
        *entry = stored.clone();
        Ok(stored)
    }
}
