//! Error types for the deletion gate
//!
//! Provides error handling for:
//! - Refused deletions (missing or negative confirmation)
//! - Object store failures (not found, version conflict, backend)
//! - Confirmation writes that could not complete
//! - Invalid configuration

use crate::annotations::CONFIRMATION_DELETION;
use crate::resource::ObjectKey;
use dgate_retry::PolicyError;
use std::fmt;
use std::path::PathBuf;

/// Why the confirmation annotation does not authorize deletion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingConfirmation {
    /// No annotation map, or the key is absent
    Missing,
    /// Value is not a boolean literal
    Unparseable(String),
    /// Value parses to `false`
    False(String),
}

impl fmt::Display for MissingConfirmation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("annotation is not set"),
            Self::Unparseable(value) => write!(f, "{value:?} is not a boolean"),
            Self::False(value) => write!(f, "{value:?} is false"),
        }
    }
}

/// Deletion refused: the resource is not confirmed for deletion
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{key}: must have a {annotation:?} annotation to delete ({reason})")]
pub struct ConfirmationRequired {
    /// Resource whose deletion was refused
    pub key: ObjectKey,
    /// Annotation that must be set to `true`
    pub annotation: &'static str,
    /// What is wrong with the current value
    pub reason: MissingConfirmation,
}

impl ConfirmationRequired {
    /// Refusal for `key`
    #[inline]
    #[must_use]
    pub fn new(key: ObjectKey, reason: MissingConfirmation) -> Self {
        Self {
            key,
            annotation: CONFIRMATION_DELETION,
            reason,
        }
    }
}

/// Object store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No object with this identity
    #[error("{key} not found")]
    NotFound {
        /// Requested identity
        key: ObjectKey,
    },

    /// Version token on the write no longer matches the stored object
    #[error("operation cannot be fulfilled on {key}: the object has been modified; please apply your changes to the latest version and try again")]
    Conflict {
        /// Written identity
        key: ObjectKey,
    },

    /// Create of an identity that is already taken
    #[error("{key} already exists")]
    AlreadyExists {
        /// Created identity
        key: ObjectKey,
    },

    /// Any other failure (transport, authorization, server error)
    #[error("object store request failed: {message}")]
    Backend {
        /// Description
        message: String,
        /// Underlying cause
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StoreError {
    /// Backend failure with a message only
    #[inline]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            source: None,
        }
    }

    /// Backend failure wrapping a cause
    #[inline]
    pub fn backend_with(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Backend {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Check if the object was missing
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if the write lost an optimistic-concurrency race
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Confirmation write failures
#[derive(Debug, thiserror::Error)]
pub enum ConfirmError {
    /// Every write in the retry budget lost a version race
    #[error("confirming deletion of {key} gave up after {attempts} conflicting writes: {source}")]
    Conflict {
        /// Target resource
        key: ObjectKey,
        /// Attempts made
        attempts: u32,
        /// Last conflict reported by the store
        source: StoreError,
    },

    /// Fetch or write failed with a non-conflict error
    #[error("confirming deletion of {key} failed: {source}")]
    Store {
        /// Target resource
        key: ObjectKey,
        /// Store error
        source: StoreError,
    },

    /// Caller cancelled the operation
    #[error("confirming deletion of {key} was cancelled")]
    Cancelled {
        /// Target resource
        key: ObjectKey,
    },

    /// Caller's deadline passed
    #[error("confirming deletion of {key} exceeded its deadline")]
    DeadlineExceeded {
        /// Target resource
        key: ObjectKey,
    },
}

impl ConfirmError {
    /// Target resource
    #[inline]
    #[must_use]
    pub fn key(&self) -> &ObjectKey {
        match self {
            Self::Conflict { key, .. }
            | Self::Store { key, .. }
            | Self::Cancelled { key }
            | Self::DeadlineExceeded { key } => key,
        }
    }

    /// Check if the retry budget ran out on conflicts
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Check if the caller's context ended the operation
    #[inline]
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled { .. } | Self::DeadlineExceeded { .. })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// I/O error
        source: std::io::Error,
    },

    /// Config is not valid TOML for this schema
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Retry settings are inconsistent
    #[error("invalid retry settings: {0}")]
    Retry(#[from] PolicyError),

    /// Log filter directive is malformed
    #[error("invalid log filter {directive:?}: {source}")]
    LogFilter {
        /// Rejected directive
        directive: String,
        /// Parser error
        source: tracing_subscriber::filter::ParseError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ObjectKey {
        ObjectKey::namespaced("Shoot", "garden-dev", "crazy-botany")
    }

    #[test]
    fn confirmation_required_names_annotation() {
        let err = ConfirmationRequired::new(key(), MissingConfirmation::Missing);
        assert_eq!(
            err.to_string(),
            "Shoot garden-dev/crazy-botany: must have a \"confirmation.gardener.cloud/deletion\" annotation to delete (annotation is not set)"
        );
    }

    #[test]
    fn store_error_classification() {
        assert!(StoreError::NotFound { key: key() }.is_not_found());
        assert!(StoreError::Conflict { key: key() }.is_conflict());
        assert!(!StoreError::backend("boom").is_conflict());
        assert!(!StoreError::backend("boom").is_not_found());
    }

    #[test]
    fn backend_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = StoreError::backend_with("get failed", io);
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("reset"));
    }

    #[test]
    fn confirm_error_classification() {
        let err = ConfirmError::Conflict {
            key: key(),
            attempts: 4,
            source: StoreError::Conflict { key: key() },
        };
        assert!(err.is_conflict());
        assert!(!err.is_cancellation());
        assert_eq!(err.key(), &key());

        assert!(ConfirmError::Cancelled { key: key() }.is_cancellation());
        assert!(ConfirmError::DeadlineExceeded { key: key() }.is_cancellation());
    }
}
