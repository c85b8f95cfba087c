//! Forbidden-field gate
//!
//! The sanitized types in [`crate::models`] cannot carry identifying
//! fields by construction, with one exception: map keys (category names)
//! are user-controlled strings. This module is the last line of defense
//! before anything leaves the process. It re-checks the fully serialized
//! output against a fixed deny list at every nesting depth and fails
//! closed on the first hit.
//!
//! The list is matched byte-for-byte. It must stay in lockstep with every
//! other vault client, so additions are append-only and renames are not
//! allowed.

use serde_json::Value;
use thiserror::Error;

use crate::models::SanitizedAiContext;

/// Keys that must never appear anywhere in exported data.
pub const FORBIDDEN_FIELDS: &[&str] = &[
    "id",
    "description",
    "note",
    "notes",
    "importHash",
    "recurringTransactionId",
    "linkedGoalId",
    "linkedDebtId",
    "createdAt",
    "name",
    "email",
    "accountName",
    "merchantName",
];

/// A forbidden field reached the export boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("sanitization breach: forbidden field {field:?} detected")]
pub struct SanitizationBreach {
    pub field: String,
}

/// Recursively scan a JSON value for forbidden object keys.
///
/// Objects are checked key-by-key before descending into their values;
/// arrays descend element-by-element; scalars always pass.
pub fn validate_value(value: &Value) -> Result<(), SanitizationBreach> {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                if FORBIDDEN_FIELDS.contains(&key.as_str()) {
                    return Err(SanitizationBreach { field: key.clone() });
                }
                validate_value(nested)?;
            }
            Ok(())
        }
        Value::Array(items) => {
            for item in items {
                validate_value(item)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Gate a sanitized context before it leaves the process.
///
/// Serializes the typed context and runs [`validate_value`] over the
/// result, catching anything that slipped in through dynamic map keys.
pub fn validate_context(context: &SanitizedAiContext) -> Result<(), SanitizationBreach> {
    // Only non-string map keys can fail here, and the sanitized types
    // have none.
    let value = serde_json::to_value(context).expect("sanitized context serializes to JSON");
    validate_value(&value)
}
