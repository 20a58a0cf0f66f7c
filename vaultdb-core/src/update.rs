// src/update.rs
//! Update engine: applies a MongoDB-style update-operator document to a
//! `Document`, producing a new `Document` without mutating the input.
//!
//! Updates are computed on a clone and only handed back to the caller on
//! full success, so a partially applied update is never observable:
//! either every operator in the update document applies cleanly, or the
//! original document is left untouched and an error is returned.

use serde_json::Value;

use crate::document::Document;
use crate::error::{Result, VaultError};
use crate::field_path::FieldPath;
use crate::object_utils::deep_eq;
use crate::query::operators::element_matches_condition;

/// Operators applied in the order they appear in the update document;
/// entries within one operator's object are applied in their own
/// insertion order. Both orderings come for free from `serde_json::Map`
/// preserving insertion order (the `preserve_order` feature), matching
/// the order a caller wrote the update in.
pub fn apply(document: &Document, update: &Value) -> Result<Document> {
    let obj = update
        .as_object()
        .ok_or_else(|| VaultError::InvalidUpdate("update must be a JSON object".to_string()))?;

    if obj.is_empty() {
        return Err(VaultError::InvalidUpdate("update document is empty".to_string()));
    }

    let all_operators = obj.keys().all(|k| k.starts_with('$'));
    let any_operators = obj.keys().any(|k| k.starts_with('$'));
    if any_operators && !all_operators {
        return Err(VaultError::InvalidUpdate(
            "update document mixes operator keys with plain field keys".to_string(),
        ));
    }
    if !any_operators {
        return Err(VaultError::InvalidUpdate(
            "update document must use update operators ($set, $inc, ...), not plain field replacement"
                .to_string(),
        ));
    }

    let mut working = document.as_value().clone();

    for (op_name, op_args) in obj {
        let args = op_args
            .as_object()
            .ok_or_else(|| VaultError::InvalidUpdate(format!("{op_name} requires an object argument")))?;

        for (field, arg_value) in args {
            if field == "_id" {
                return Err(VaultError::ImmutableField);
            }
            apply_one(&mut working, op_name, field, arg_value)?;
        }
    }

    Document::from_value(working)
}

fn apply_one(root: &mut Value, op_name: &str, field: &str, arg: &Value) -> Result<()> {
    let path = FieldPath::parse(field);
    match op_name {
        "$set" => path
            .set(root, arg.clone())
            .map_err(VaultError::InvalidUpdate),
        "$unset" => path.unset(root).map_err(VaultError::InvalidUpdate),
        "$inc" => apply_numeric(root, &path, arg, |cur, delta| cur + delta),
        "$mul" => apply_numeric(root, &path, arg, |cur, factor| cur * factor),
        "$min" => apply_numeric_clamp(root, &path, arg, |cur, bound| bound < cur),
        "$max" => apply_numeric_clamp(root, &path, arg, |cur, bound| bound > cur),
        "$push" => apply_push(root, &path, arg),
        "$pull" => apply_pull(root, &path, arg),
        "$addToSet" => apply_add_to_set(root, &path, arg),
        other => Err(VaultError::InvalidUpdate(format!("unknown update operator: {other}"))),
    }
}

fn as_finite_f64(v: &Value, op: &str) -> Result<f64> {
    v.as_f64()
        .filter(|f| f.is_finite())
        .ok_or_else(|| VaultError::InvalidUpdate(format!("{op} requires a finite numeric argument")))
}

fn apply_numeric(root: &mut Value, path: &FieldPath, arg: &Value, f: impl Fn(f64, f64) -> f64) -> Result<()> {
    let delta = as_finite_f64(arg, "numeric update operator")?;
    let current = path.get(root).cloned().unwrap_or(Value::from(0_i64));
    let base = match &current {
        Value::Number(_) => current
            .as_f64()
            .ok_or_else(|| VaultError::InvalidUpdate("existing field is not numeric".to_string()))?,
        Value::Null => 0.0,
        _ => return Err(VaultError::InvalidUpdate("existing field is not numeric".to_string())),
    };
    let result = f(base, delta);
    let value = serde_json::Number::from_f64(result)
        .map(Value::Number)
        .ok_or_else(|| VaultError::InvalidUpdate("update produced a non-finite result".to_string()))?;
    path.set(root, value).map_err(VaultError::InvalidUpdate)
}

fn apply_numeric_clamp(
    root: &mut Value,
    path: &FieldPath,
    arg: &Value,
    replace_if: impl Fn(f64, f64) -> bool,
) -> Result<()> {
    let bound = as_finite_f64(arg, "$min/$max")?;
    match path.get(root) {
        None | Some(Value::Null) => {
            let value = serde_json::Number::from_f64(bound).map(Value::Number).expect("finite");
            path.set(root, value).map_err(VaultError::InvalidUpdate)
        }
        Some(Value::Number(n)) => {
            let current = n.as_f64().ok_or_else(|| VaultError::InvalidUpdate("existing field is not numeric".to_string()))?;
            if replace_if(current, bound) {
                let value = serde_json::Number::from_f64(bound).map(Value::Number).expect("finite");
                path.set(root, value).map_err(VaultError::InvalidUpdate)
            } else {
                Ok(())
            }
        }
        Some(_) => Err(VaultError::InvalidUpdate("existing field is not numeric".to_string())),
    }
}

/// `$push` accepts either a bare value (append one element) or
/// `{"$each": [...]}` (append each element in order).
fn apply_push(root: &mut Value, path: &FieldPath, arg: &Value) -> Result<()> {
    let elements = each_elements(arg);
    let current = path.get(root).cloned();
    let mut arr = match current {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(a)) => a,
        Some(_) => return Err(VaultError::InvalidUpdate("$push target is not an array".to_string())),
    };
    arr.extend(elements);
    path.set(root, Value::Array(arr)).map_err(VaultError::InvalidUpdate)
}

/// `$pull` removes every element equal to `arg` by deep equality, or (when
/// `arg` is an operator-shaped or sub-document filter object) every element
/// matching that condition.
fn apply_pull(root: &mut Value, path: &FieldPath, arg: &Value) -> Result<()> {
    match path.get(root).cloned() {
        None | Some(Value::Null) => Ok(()),
        Some(Value::Array(arr)) => {
            let mut filtered = Vec::with_capacity(arr.len());
            for elem in arr {
                let matches = element_matches_condition(&elem, arg)
                    .map_err(|e| VaultError::InvalidUpdate(format!("$pull condition: {e}")))?;
                if !matches {
                    filtered.push(elem);
                }
            }
            path.set(root, Value::Array(filtered)).map_err(VaultError::InvalidUpdate)
        }
        Some(_) => Err(VaultError::InvalidUpdate("$pull target is not an array".to_string())),
    }
}

/// `$addToSet` appends only elements not already deep-equal to an
/// existing one, preserving `$each`'s declaration order for the new
/// elements that do get added.
fn apply_add_to_set(root: &mut Value, path: &FieldPath, arg: &Value) -> Result<()> {
    let elements = each_elements(arg);
    let mut arr = match path.get(root).cloned() {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(a)) => a,
        Some(_) => return Err(VaultError::InvalidUpdate("$addToSet target is not an array".to_string())),
    };
    for elem in elements {
        if !arr.iter().any(|existing| deep_eq(existing, &elem)) {
            arr.push(elem);
        }
    }
    path.set(root, Value::Array(arr)).map_err(VaultError::InvalidUpdate)
}

fn each_elements(arg: &Value) -> Vec<Value> {
    match arg {
        Value::Object(map) if map.len() == 1 && map.contains_key("$each") => match &map["$each"] {
            Value::Array(items) => items.clone(),
            other => vec![other.clone()],
        },
        other => vec![other.clone()],
    }
}
