//! Annotation and label vocabulary
//!
//! Keys shared with the rest of the cluster plus the boolean-literal rule
//! used to interpret their values.

use std::collections::BTreeMap;

/// Annotation whose value must be `true` before a resource may be deleted
pub const CONFIRMATION_DELETION: &str = "confirmation.gardener.cloud/deletion";

/// Annotation recording when the resource was last stamped
pub const GARDENER_TIMESTAMP: &str = "gardener.cloud/timestamp";

/// Label on a resource type whose instances require deletion confirmation
///
/// Not enforced here; admission layers use it to decide whether to call
/// [`check_deletion_confirmed`](crate::check_deletion_confirmed) at all.
pub const DELETION_PROTECTED: &str = "gardener.cloud/deletion-protected";

/// Value that is not a recognised boolean literal
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid boolean literal {value:?}")]
pub struct ParseBoolLiteralError {
    /// Rejected input
    pub value: String,
}

/// Parse an annotation or label value as a boolean
///
/// Accepted literals, matched exactly:
///
/// | value   | literals                                  |
/// |---------|-------------------------------------------|
/// | `true`  | `1` `t` `T` `true` `True` `TRUE`          |
/// | `false` | `0` `f` `F` `false` `False` `FALSE`       |
///
/// Anything else is rejected, including mixed case (`tRUE`), surrounding
/// whitespace, `yes`/`no`, and the empty string.
///
/// # Errors
/// [`ParseBoolLiteralError`] if `value` is not one of the literals above.
pub fn parse_bool_literal(value: &str) -> Result<bool, ParseBoolLiteralError> {
    match value {
        "1" | "t" | "T" | "true" | "True" | "TRUE" => Ok(true),
        "0" | "f" | "F" | "false" | "False" | "FALSE" => Ok(false),
        _ => Err(ParseBoolLiteralError {
            value: value.to_string(),
        }),
    }
}

/// Whether a resource type's labels mark it deletion-protected
#[must_use]
pub fn is_deletion_protected(labels: &BTreeMap<String, String>) -> bool {
    labels
        .get(DELETION_PROTECTED)
        .is_some_and(|value| parse_bool_literal(value) == Ok(true))
}
