//! Deletion Gate Core
//!
//! Guards destructive operations on cluster-managed resources:
//! - Decides whether deletion is authorized by the confirmation annotation
//! - Stamps the confirmation onto a resource with optimistic concurrency
//! - Retries version conflicts under a bounded, cancellable backoff
//!
//! # Example
//!
//! ```rust,ignore
//! use dgate_core::{check_deletion_confirmed, DeletionConfirmer, InMemoryStore, OperationContext};
//!
//! # async fn example(store: &InMemoryStore, mut shoot: dgate_core::ManagedResource)
//! #     -> Result<(), Box<dyn std::error::Error>> {
//! if check_deletion_confirmed(&shoot).is_err() {
//!     let confirmer = DeletionConfirmer::new();
//!     confirmer
//!         .confirm_deletion(&OperationContext::new(), store, &mut shoot)
//!         .await?;
//! }
//! check_deletion_confirmed(&shoot)?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod annotations;
pub mod checker;
pub mod clock;
pub mod config;
pub mod error;
pub mod resource;
pub mod store;
pub mod telemetry;
pub mod writer;

pub use annotations::{
    is_deletion_protected, parse_bool_literal, ParseBoolLiteralError, CONFIRMATION_DELETION,
    DELETION_PROTECTED, GARDENER_TIMESTAMP,
};
pub use checker::{check_deletion_confirmed, is_deletion_confirmed};
pub use clock::{render_timestamp, system_clock, Clock, FixedClock, SystemClock};
pub use config::{GateConfig, LogFormat, LoggingConfig, RetryConfig};
pub use error::{ConfigError, ConfirmError, ConfirmationRequired, MissingConfirmation, StoreError};
pub use resource::{Annotated, ManagedResource, ObjectKey, ResourceVersion};
pub use store::{InMemoryStore, ObjectStore, StoreStats};
pub use writer::{ConfirmOutcome, DeletionConfirmer};

pub use dgate_retry::{Interrupted, OperationContext, RetryPolicy};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for gating deletions
    pub use crate::{
        check_deletion_confirmed, Annotated, ConfirmError, ConfirmOutcome, DeletionConfirmer,
        ManagedResource, ObjectKey, ObjectStore, OperationContext, StoreError,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
