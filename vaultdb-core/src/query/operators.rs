// src/query/operators.rs
//! Field-operator implementations, dispatched through a small registry.
//!
//! Each operator implements `FieldOperator`: a stateless `validate` step
//! that checks the filter argument's shape (so malformed arguments fail
//! with `InvalidQuery` before any document is touched) and a total `eval`
//! step used as the leaf predicate for `FieldPath`'s existential array
//! fold. Splitting validation from evaluation keeps the fold itself
//! infallible, which is what lets `FieldPath::matches_existential` stay a
//! plain `bool`-returning closure instead of threading `Result` through
//! recursion.

use lazy_static::lazy_static;
use serde_json::Value;
use std::collections::HashMap;

use crate::document::Document;
use crate::error::{Result, VaultError};
use crate::object_utils::{compare_values, deep_eq};
use crate::query::MAX_FILTER_DEPTH;

/// A single MongoDB-style field operator (`$eq`, `$gt`, `$in`, ...).
pub trait FieldOperator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Check the filter argument's shape. Called once per occurrence,
    /// independent of any document.
    fn validate(&self, filter_value: &Value) -> Result<()>;

    /// Evaluate the operator against one resolved document value. `None`
    /// means the path was missing.
    fn eval(&self, doc_value: Option<&Value>, filter_value: &Value) -> bool;
}

struct EqOperator;
impl FieldOperator for EqOperator {
    fn name(&self) -> &'static str {
        "$eq"
    }
    fn validate(&self, _filter_value: &Value) -> Result<()> {
        Ok(())
    }
    fn eval(&self, doc_value: Option<&Value>, filter_value: &Value) -> bool {
        match doc_value {
            None => false,
            Some(v) => deep_eq(v, filter_value) || array_element_match(v, filter_value),
        }
    }
}

struct NeOperator;
impl FieldOperator for NeOperator {
    fn name(&self) -> &'static str {
        "$ne"
    }
    fn validate(&self, _filter_value: &Value) -> Result<()> {
        Ok(())
    }
    fn eval(&self, doc_value: Option<&Value>, filter_value: &Value) -> bool {
        !EqOperator.eval(doc_value, filter_value)
    }
}

struct GtOperator;
impl FieldOperator for GtOperator {
    fn name(&self) -> &'static str {
        "$gt"
    }
    fn validate(&self, _filter_value: &Value) -> Result<()> {
        Ok(())
    }
    fn eval(&self, doc_value: Option<&Value>, filter_value: &Value) -> bool {
        compare_with(doc_value, filter_value, |o| o == std::cmp::Ordering::Greater)
    }
}

struct GteOperator;
impl FieldOperator for GteOperator {
    fn name(&self) -> &'static str {
        "$gte"
    }
    fn validate(&self, _filter_value: &Value) -> Result<()> {
        Ok(())
    }
    fn eval(&self, doc_value: Option<&Value>, filter_value: &Value) -> bool {
        compare_with(doc_value, filter_value, |o| o != std::cmp::Ordering::Less)
    }
}

struct LtOperator;
impl FieldOperator for LtOperator {
    fn name(&self) -> &'static str {
        "$lt"
    }
    fn validate(&self, _filter_value: &Value) -> Result<()> {
        Ok(())
    }
    fn eval(&self, doc_value: Option<&Value>, filter_value: &Value) -> bool {
        compare_with(doc_value, filter_value, |o| o == std::cmp::Ordering::Less)
    }
}

struct LteOperator;
impl FieldOperator for LteOperator {
    fn name(&self) -> &'static str {
        "$lte"
    }
    fn validate(&self, _filter_value: &Value) -> Result<()> {
        Ok(())
    }
    fn eval(&self, doc_value: Option<&Value>, filter_value: &Value) -> bool {
        compare_with(doc_value, filter_value, |o| o != std::cmp::Ordering::Greater)
    }
}

struct InOperator;
impl FieldOperator for InOperator {
    fn name(&self) -> &'static str {
        "$in"
    }
    fn validate(&self, filter_value: &Value) -> Result<()> {
        require_array("$in", filter_value)
    }
    fn eval(&self, doc_value: Option<&Value>, filter_value: &Value) -> bool {
        let candidates = filter_value.as_array().expect("validated as array");
        match doc_value {
            None => false,
            Some(v) => candidates.iter().any(|c| deep_eq(v, c)),
        }
    }
}

struct NinOperator;
impl FieldOperator for NinOperator {
    fn name(&self) -> &'static str {
        "$nin"
    }
    fn validate(&self, filter_value: &Value) -> Result<()> {
        require_array("$nin", filter_value)
    }
    fn eval(&self, doc_value: Option<&Value>, filter_value: &Value) -> bool {
        !InOperator.eval(doc_value, filter_value)
    }
}

struct ExistsOperator;
impl FieldOperator for ExistsOperator {
    fn name(&self) -> &'static str {
        "$exists"
    }
    fn validate(&self, filter_value: &Value) -> Result<()> {
        if filter_value.is_boolean() {
            Ok(())
        } else {
            Err(VaultError::InvalidQuery(
                "$exists requires a boolean argument".to_string(),
            ))
        }
    }
    fn eval(&self, doc_value: Option<&Value>, filter_value: &Value) -> bool {
        // `null` counts as present: this is only ever called with doc_value
        // resolved through FieldPath, which yields Some(Value::Null) for an
        // explicit null and None only when the key is genuinely absent.
        let want = filter_value.as_bool().expect("validated as boolean");
        doc_value.is_some() == want
    }
}

fn require_array(op: &str, filter_value: &Value) -> Result<()> {
    if filter_value.is_array() {
        Ok(())
    } else {
        Err(VaultError::InvalidQuery(format!("{op} requires an array argument")))
    }
}

fn compare_with(doc_value: Option<&Value>, filter_value: &Value, ok: impl Fn(std::cmp::Ordering) -> bool) -> bool {
    match doc_value {
        None => false,
        Some(v) => {
            if let Some(ord) = compare_values(v, filter_value) {
                if ok(ord) {
                    return true;
                }
            }
            if let Value::Array(arr) = v {
                arr.iter().any(|elem| compare_values(elem, filter_value).map(&ok).unwrap_or(false))
            } else {
                false
            }
        }
    }
}

fn array_element_match(doc_value: &Value, filter_value: &Value) -> bool {
    matches!(doc_value, Value::Array(arr) if arr.iter().any(|e| deep_eq(e, filter_value)))
}

lazy_static! {
    static ref OPERATOR_REGISTRY: HashMap<&'static str, Box<dyn FieldOperator>> = {
        let mut m: HashMap<&'static str, Box<dyn FieldOperator>> = HashMap::new();
        m.insert("$eq", Box::new(EqOperator));
        m.insert("$ne", Box::new(NeOperator));
        m.insert("$gt", Box::new(GtOperator));
        m.insert("$gte", Box::new(GteOperator));
        m.insert("$lt", Box::new(LtOperator));
        m.insert("$lte", Box::new(LteOperator));
        m.insert("$in", Box::new(InOperator));
        m.insert("$nin", Box::new(NinOperator));
        m.insert("$exists", Box::new(ExistsOperator));
        m
    };
}

/// Evaluate a single field predicate (`{path: literal}` or
/// `{path: {$op: value, ...}}`) against a document, honouring the
/// existential array-traversal rule: if a path segment lands on an array
/// and the next segment is not numeric, the predicate holds if it holds
/// for any element.
fn matches_field_predicate(document: &Document, path: &str, condition: &Value) -> Result<bool> {
    match condition {
        Value::Object(map) if !map.is_empty() && map.keys().all(|k| k.starts_with('$')) => {
            for (op_name, op_value) in map {
                let operator = OPERATOR_REGISTRY
                    .get(op_name.as_str())
                    .ok_or_else(|| VaultError::InvalidQuery(format!("unknown operator: {op_name}")))?;
                operator.validate(op_value)?;
                let holds = document.matches_existential(path, &|v| operator.eval(v, op_value));
                if !holds {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Value::Object(map) if map.keys().any(|k| k.starts_with('$')) => Err(VaultError::InvalidQuery(format!(
            "field '{path}' mixes operator keys with plain keys in its condition object"
        ))),
        literal => Ok(document.matches_existential(path, &|v| EqOperator.eval(v, literal))),
    }
}

/// Evaluate a `$pull`-style condition against one array element: either a
/// plain literal (removed by deep equality), an operator-shaped object
/// (`{$gt: 5}`, applied directly to the element), or a sub-filter object
/// (`{field: cond, ...}`, matched against the element's own fields — used
/// when pulling objects out of an array by their contents).
pub fn element_matches_condition(element: &Value, condition: &Value) -> Result<bool> {
    match condition {
        Value::Object(map) if !map.is_empty() && map.keys().all(|k| k.starts_with('$')) => {
            for (op_name, op_value) in map {
                let operator = OPERATOR_REGISTRY
                    .get(op_name.as_str())
                    .ok_or_else(|| VaultError::InvalidQuery(format!("unknown operator: {op_name}")))?;
                operator.validate(op_value)?;
                if !operator.eval(Some(element), op_value) {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Value::Object(map) if map.keys().any(|k| k.starts_with('$')) => Err(VaultError::InvalidQuery(
            "$pull condition mixes operator keys with plain field keys".to_string(),
        )),
        Value::Object(map) => {
            for (field, field_condition) in map {
                let holds = match field_condition {
                    Value::Object(m) if !m.is_empty() && m.keys().all(|k| k.starts_with('$')) => {
                        let mut all = true;
                        for (op_name, op_value) in m {
                            let operator = OPERATOR_REGISTRY
                                .get(op_name.as_str())
                                .ok_or_else(|| VaultError::InvalidQuery(format!("unknown operator: {op_name}")))?;
                            operator.validate(op_value)?;
                            let field_holds = crate::field_path::FieldPath::parse(field)
                                .matches_existential(element, &|v| operator.eval(v, op_value));
                            if !field_holds {
                                all = false;
                                break;
                            }
                        }
                        all
                    }
                    literal => crate::field_path::FieldPath::parse(field)
                        .matches_existential(element, &|v| EqOperator.eval(v, literal)),
                };
                if !holds {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        literal => Ok(deep_eq(element, literal)),
    }
}

/// Evaluate a full filter expression against a document. `depth` tracks
/// `$and`/`$or` nesting so over-deep filters fail with `InvalidQuery`
/// instead of exhausting the stack.
pub fn matches_filter(document: &Document, filter: &Value, depth: usize) -> Result<bool> {
    if depth > MAX_FILTER_DEPTH {
        return Err(VaultError::InvalidQuery(format!(
            "filter nesting exceeds the maximum depth of {MAX_FILTER_DEPTH}"
        )));
    }

    let obj = filter
        .as_object()
        .ok_or_else(|| VaultError::InvalidQuery("filter must be a JSON object".to_string()))?;

    if obj.is_empty() {
        return Ok(true);
    }

    for (key, value) in obj {
        let holds = if key.starts_with('$') {
            match key.as_str() {
                "$and" => {
                    let subfilters = require_subfilter_array("$and", value)?;
                    let mut all = true;
                    for sub in subfilters {
                        if !matches_filter(document, sub, depth + 1)? {
                            all = false;
                            break;
                        }
                    }
                    all
                }
                "$or" => {
                    let subfilters = require_subfilter_array("$or", value)?;
                    let mut any = false;
                    for sub in subfilters {
                        if matches_filter(document, sub, depth + 1)? {
                            any = true;
                            break;
                        }
                    }
                    any
                }
                other => return Err(VaultError::InvalidQuery(format!("unknown logical operator: {other}"))),
            }
        } else {
            matches_field_predicate(document, key, value)?
        };

        if !holds {
            return Ok(false);
        }
    }

    Ok(true)
}

fn require_subfilter_array<'a>(op: &str, value: &'a Value) -> Result<&'a Vec<Value>> {
    match value.as_array() {
        Some(arr) if !arr.is_empty() => Ok(arr),
        Some(_) => Err(VaultError::InvalidQuery(format!("{op} requires a non-empty array of subfilters"))),
        None => Err(VaultError::InvalidQuery(format!("{op} requires an array of subfilters"))),
    }
}
