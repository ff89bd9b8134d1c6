//! Object store abstraction
//!
//! The confirmation writer needs two calls from the store backing the
//! cluster: fetch by identity and update guarded by the version token.

mod memory;

pub use memory::{InMemoryStore, StoreStats};

use crate::error::StoreError;
use crate::resource::{ManagedResource, ObjectKey};
use async_trait::async_trait;
use std::sync::Arc;

/// Versioned object store
///
/// # Contract
/// - `get` returns [`StoreError::NotFound`] when nothing has `key`.
/// - `update` succeeds only if `obj.resource_version` equals the stored
///   version; otherwise it returns [`StoreError::Conflict`]. On success it
///   returns the stored object with its new version.
/// - Every other variant is treated as a non-retryable failure.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch current state
    async fn get(&self, key: &ObjectKey) -> Result<ManagedResource, StoreError>;

    /// Write `obj` if its version token is current
    async fn update(&self, obj: &ManagedResource) -> Result<ManagedResource, StoreError>;
}

#[async_trait]
impl<S> ObjectStore for Arc<S>
where
    S: ObjectStore + ?Sized,
{
    async fn get(&self, key: &ObjectKey) -> Result<ManagedResource, StoreError> {
        (**self).get(key).await
    }

    async fn update(&self, obj: &ManagedResource) -> Result<ManagedResource, StoreError> {
        (**self).update(obj).await
    }
}
