// src/query.rs
//! Query engine: evaluates MongoDB-style filter expressions against
//! documents.
//!
//! Field operators are dispatched through a registry of `OperatorMatcher`
//! trait objects (see `query::operators`), mirroring the strategy-pattern
//! split used elsewhere in this engine: each operator is independently
//! testable and the dispatcher itself stays small.

pub mod operators;

use serde_json::Value;

use crate::document::Document;
use crate::error::Result;
pub use operators::matches_filter;

/// Maximum nesting depth for `$and`/`$or` before a filter is rejected with
/// `InvalidQuery`. Bounds recursion so a maliciously or accidentally deep
/// filter can't exhaust the stack.
pub const MAX_FILTER_DEPTH: usize = 64;

/// A compiled query. Compilation today is just validation-free storage of
/// the filter JSON — the registry-based evaluator re-walks it on every
/// call — but callers that evaluate the same filter repeatedly can still
/// build one `Query` once and reuse it instead of re-cloning the `Value`.
#[derive(Debug, Clone)]
pub struct Query {
    filter: Value,
}

impl Query {
    /// An empty query, matching every document.
    pub fn new() -> Self {
        Query {
            filter: Value::Object(serde_json::Map::new()),
        }
    }

    pub fn from_filter(filter: Value) -> Self {
        Query { filter }
    }

    pub fn matches(&self, document: &Document) -> Result<bool> {
        matches_filter(document, &self.filter, 0)
    }

    pub fn filter(&self) -> &Value {
        &self.filter
    }

    /// The `{_id: "<string>"}` fast-path filter, if this query is exactly
    /// that shape. `Collection` uses this to bypass the query engine
    /// entirely and go straight to a map lookup.
    pub fn as_id_lookup(&self) -> Option<&str> {
        let obj = self.filter.as_object()?;
        if obj.len() != 1 {
            return None;
        }
        match obj.get("_id") {
            Some(Value::String(id)) => Some(id.as_str()),
            _ => None,
        }
    }
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}

/// Find the first document in `documents` matching `filter`.
pub fn find_first<'a, I>(documents: I, filter: &Value) -> Result<Option<&'a Document>>
where
    I: IntoIterator<Item = &'a Document>,
{
    for doc in documents {
        if matches_filter(doc, filter, 0)? {
            return Ok(Some(doc));
        }
    }
    Ok(None)
}

/// Find all documents in `documents` matching `filter`, preserving order.
pub fn find_all<'a, I>(documents: I, filter: &Value) -> Result<Vec<&'a Document>>
where
    I: IntoIterator<Item = &'a Document>,
{
    let mut out = Vec::new();
    for doc in documents {
        if matches_filter(doc, filter, 0)? {
            out.push(doc);
        }
    }
    Ok(out)
}

/// Count documents in `documents` matching `filter`.
pub fn count<'a, I>(documents: I, filter: &Value) -> Result<usize>
where
    I: IntoIterator<Item = &'a Document>,
{
    let mut n = 0;
    for doc in documents {
        if matches_filter(doc, filter, 0)? {
            n += 1;
        }
    }
    Ok(n)
}
