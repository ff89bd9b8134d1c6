//! Deletion confirmation check

use crate::annotations::{parse_bool_literal, CONFIRMATION_DELETION};
use crate::error::{ConfirmationRequired, MissingConfirmation};
use crate::resource::Annotated;

/// Check whether deletion of `obj` has been confirmed
///
/// Deletion is authorized iff the [`CONFIRMATION_DELETION`] annotation is
/// present and parses to `true` under [`parse_bool_literal`].
///
/// # Errors
/// [`ConfirmationRequired`] if the annotation map is absent, the key is
/// missing, or its value is not a boolean literal or is `false`.
pub fn check_deletion_confirmed<O>(obj: &O) -> Result<(), ConfirmationRequired>
where
    O: Annotated + ?Sized,
{
    let reason = match obj.annotation(CONFIRMATION_DELETION) {
        None => MissingConfirmation::Missing,
        Some(value) => match parse_bool_literal(value) {
            Ok(true) => return Ok(()),
            Ok(false) => MissingConfirmation::False(value.to_string()),
            Err(_) => MissingConfirmation::Unparseable(value.to_string()),
        },
    };

    Err(ConfirmationRequired::new(obj.object_key(), reason))
}

/// Whether deletion of `obj` has been confirmed
#[inline]
#[must_use]
pub fn is_deletion_confirmed<O>(obj: &O) -> bool
where
    O: Annotated + ?Sized,
{
    check_deletion_confirmed(obj).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{ManagedResource, ObjectKey};
    use std::collections::BTreeMap;

    fn shoot() -> ManagedResource {
        ManagedResource::new(ObjectKey::namespaced("Shoot", "garden-dev", "crazy-botany"))
    }

    #[test]
    fn nil_annotations_require_confirmation() {
        let err = check_deletion_confirmed(&shoot()).unwrap_err();
        assert_eq!(err.reason, MissingConfirmation::Missing);
        assert_eq!(err.annotation, CONFIRMATION_DELETION);
        assert_eq!(err.key, shoot().key);
    }

    #[test]
    fn empty_annotations_require_confirmation() {
        let mut obj = shoot();
        obj.annotations = Some(BTreeMap::new());
        let err = check_deletion_confirmed(&obj).unwrap_err();
        assert_eq!(err.reason, MissingConfirmation::Missing);
        assert!(err.to_string().contains("confirmation.gardener.cloud/deletion"));
    }

    #[test]
    fn false_value_requires_confirmation() {
        let obj = shoot().with_annotation(CONFIRMATION_DELETION, "false");
        let err = check_deletion_confirmed(&obj).unwrap_err();
        assert_eq!(err.reason, MissingConfirmation::False("false".to_string()));
    }

    #[test]
    fn garbage_value_requires_confirmation() {
        let obj = shoot().with_annotation(CONFIRMATION_DELETION, "yes please");
        let err = check_deletion_confirmed(&obj).unwrap_err();
        assert_eq!(
            err.reason,
            MissingConfirmation::Unparseable("yes please".to_string())
        );
    }

    #[test]
    fn true_value_confirms() {
        let obj = shoot().with_annotation(CONFIRMATION_DELETION, "true");
        assert!(check_deletion_confirmed(&obj).is_ok());
        assert!(is_deletion_confirmed(&obj));
    }

    #[test]
    fn other_annotations_are_ignored() {
        let obj = shoot()
            .with_annotation("gardener.cloud/timestamp", "2021-01-01 00:00:00 +0000 UTC")
            .with_annotation("confirmation.gardener.cloud/deletion-other", "true");
        assert!(!is_deletion_confirmed(&obj));
    }

    #[test]
    fn works_through_trait_objects() {
        let obj = shoot().with_annotation(CONFIRMATION_DELETION, "True");
        let dynamic: &dyn Annotated = &obj;
        assert!(check_deletion_confirmed(dynamic).is_ok());
    }
}
