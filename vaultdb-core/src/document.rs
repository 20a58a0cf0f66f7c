// src/document.rs
//! The document type: a JSON object carrying a mandatory, unique `_id`
//! string key, validated at construction so the rest of the engine can
//! assume the invariant instead of re-checking it on every access.

use serde_json::{Map, Value};

use crate::error::{Result, VaultError};
use crate::field_path::FieldPath;
use crate::object_utils::{contains_non_finite_number, contains_operator_key};

/// A validated document: always a JSON object carrying an `_id` entry that
/// holds a non-empty string, with no key anywhere in the tree starting
/// with `$`.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    value: Value,
}

impl Document {
    /// Validate and wrap a JSON object as a document.
    ///
    /// Does **not** assign `_id` if missing — callers that allow
    /// auto-assignment (`DocumentOperations::insert`) must do so before
    /// calling this.
    pub fn from_value(value: Value) -> Result<Document> {
        if !value.is_object() {
            return Err(VaultError::InvalidDocument(format!(
                "document must be a JSON object, got {value}"
            )));
        }
        Self::validate(&value)?;
        Ok(Document { value })
    }

    fn validate(value: &Value) -> Result<()> {
        match value.get("_id") {
            Some(Value::String(s)) if !s.is_empty() => {}
            Some(_) => {
                return Err(VaultError::InvalidDocument(
                    "_id must be a non-empty string".to_string(),
                ))
            }
            None => return Err(VaultError::InvalidDocument("document is missing _id".to_string())),
        }
        if contains_operator_key(value) {
            return Err(VaultError::InvalidDocument(
                "document contains an operator-shaped ($...) key".to_string(),
            ));
        }
        if contains_non_finite_number(value) {
            return Err(VaultError::InvalidDocument(
                "document contains a non-finite number (NaN/Infinity)".to_string(),
            ));
        }
        Ok(())
    }

    pub fn id(&self) -> &str {
        // Safe: validated at construction.
        self.value.get("_id").and_then(Value::as_str).unwrap_or_default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        FieldPath::parse(field).get(&self.value)
    }

    pub fn matches_existential(&self, field: &str, predicate: &dyn Fn(Option<&Value>) -> bool) -> bool {
        FieldPath::parse(field).matches_existential(&self.value, predicate)
    }

    pub fn as_value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        self.value.as_object().expect("validated as object at construction")
    }
}
