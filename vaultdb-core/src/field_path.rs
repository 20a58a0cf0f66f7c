// src/field_path.rs
//! Dotted-path parsing and traversal over `serde_json::Value`.
//!
//! A path segment that looks numeric (`"0"`, `"12"`) is not resolved to an
//! array index or an object key until traversal reaches it: if the parent
//! turns out to be an object, the segment is used as a string key; if the
//! parent is an array, it's used as an index. The parser itself stays
//! ignorant of which it will be.

use serde_json::Value;

/// One segment of a parsed dotted path, still ambiguous between "object
/// key" and "array index" until resolved against an actual value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    pub fn parse(path: &str) -> FieldPath {
        FieldPath {
            segments: path.split('.').map(str::to_string).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty() || self.segments.iter().all(|s| s.is_empty())
    }

    /// Resolve this path against `root`, returning `None` if any
    /// intermediate segment is absent. Existential array traversal: when a
    /// segment lands on an array and the next segment is not itself a
    /// numeric index, the predicate passed to `exists_match` decides
    /// whether *any* element satisfies the rest of the path. Plain `get`
    /// returns the first matching element's value rather than folding, which
    /// is sufficient for read access; query evaluation uses
    /// `matches_existential` below for the fold-with-OR semantics the spec
    /// requires.
    pub fn get<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        let mut current = root;
        for segment in &self.segments {
            current = step(current, segment)?;
        }
        Some(current)
    }

    /// Evaluate `predicate` against the value(s) reached by this path,
    /// honouring MongoDB-style existential matching across arrays: if a
    /// segment traverses an array and the next segment is not numeric, the
    /// match holds if it holds for *any* element.
    pub fn matches_existential(
        &self,
        root: &Value,
        predicate: &dyn Fn(Option<&Value>) -> bool,
    ) -> bool {
        matches_rec(root, self.segments.as_slice(), predicate)
    }

    /// Assign `value` at this path inside `root`, creating intermediate
    /// **objects** (never arrays) as needed. Returns an error message if an
    /// intermediate segment addresses an out-of-range array index (no
    /// padding is performed) or traverses through a scalar.
    pub fn set(&self, root: &mut Value, value: Value) -> Result<(), String> {
        set_rec(root, self.segments.as_slice(), value)
    }

    /// Remove whatever this path addresses. No-op (returns `Ok(())`) if any
    /// intermediate segment is already absent.
    pub fn unset(&self, root: &mut Value) -> Result<(), String> {
        if self.segments.is_empty() {
            return Ok(());
        }
        unset_rec(root, self.segments.as_slice())
    }
}

fn step<'a>(current: &'a Value, segment: &str) -> Option<&'a Value> {
    match current {
        Value::Object(map) => map.get(segment),
        Value::Array(arr) => segment.parse::<usize>().ok().and_then(|i| arr.get(i)),
        _ => None,
    }
}

fn matches_rec(current: &Value, segments: &[String], predicate: &dyn Fn(Option<&Value>) -> bool) -> bool {
    match segments {
        [] => predicate(Some(current)),
        [head, rest @ ..] => match current {
            Value::Object(map) => match map.get(head) {
                Some(v) => matches_rec(v, rest, predicate),
                None => predicate(None),
            },
            Value::Array(arr) => {
                if let Ok(idx) = head.parse::<usize>() {
                    match arr.get(idx) {
                        Some(v) => matches_rec(v, rest, predicate),
                        None => predicate(None),
                    }
                } else {
                    // Existential fold: satisfied if any element satisfies
                    // the remainder of the path (MongoDB array semantics).
                    arr.iter().any(|elem| matches_rec(elem, segments, predicate))
                }
            }
            _ => predicate(None),
        },
    }
}

fn set_rec(current: &mut Value, segments: &[String], value: Value) -> Result<(), String> {
    let (head, rest) = match segments.split_first() {
        Some(pair) => pair,
        None => return Err("empty path".to_string()),
    };

    if rest.is_empty() {
        return match current {
            Value::Object(map) => {
                map.insert(head.clone(), value);
                Ok(())
            }
            Value::Array(arr) => {
                let idx = head
                    .parse::<usize>()
                    .map_err(|_| format!("non-numeric index '{head}' into array"))?;
                if idx >= arr.len() {
                    return Err(format!(
                        "array index {idx} out of range (len {}); padding is not performed",
                        arr.len()
                    ));
                }
                arr[idx] = value;
                Ok(())
            }
            Value::Null => {
                let mut map = serde_json::Map::new();
                map.insert(head.clone(), value);
                *current = Value::Object(map);
                Ok(())
            }
            other => Err(format!("cannot set field '{head}' on non-object value {other}")),
        };
    }

    match current {
        Value::Object(map) => {
            let child = map
                .entry(head.clone())
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
            set_rec(child, rest, value)
        }
        Value::Array(arr) => {
            let idx = head
                .parse::<usize>()
                .map_err(|_| format!("non-numeric index '{head}' into array"))?;
            let child = arr
                .get_mut(idx)
                .ok_or_else(|| format!("array index {idx} out of range (len {})", arr.len()))?;
            set_rec(child, rest, value)
        }
        Value::Null => {
            let mut map = serde_json::Map::new();
            map.insert(head.clone(), Value::Object(serde_json::Map::new()));
            *current = Value::Object(map);
            set_rec(current, segments, value)
        }
        other => Err(format!("cannot traverse into non-object value {other}")),
    }
}

fn unset_rec(current: &mut Value, segments: &[String]) -> Result<(), String> {
    let (head, rest) = segments.split_first().expect("checked non-empty by caller");

    if rest.is_empty() {
        match current {
            Value::Object(map) => {
                map.remove(head);
            }
            Value::Array(arr) => {
                if let Ok(idx) = head.parse::<usize>() {
                    if idx < arr.len() {
                        arr.remove(idx);
                    }
                }
            }
            _ => {}
        }
        return Ok(());
    }

    match current {
        Value::Object(map) => match map.get_mut(head) {
            Some(child) => unset_rec(child, rest),
            None => Ok(()),
        },
        Value::Array(arr) => match head.parse::<usize>().ok().and_then(|i| arr.get_mut(i)) {
            Some(child) => unset_rec(child, rest),
            None => Ok(()),
        },
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_simple_and_dotted() {
        let doc = json!({"a": {"b": {"c": 1}}});
        assert_eq!(FieldPath::parse("a.b.c").get(&doc), Some(&json!(1)));
        assert_eq!(FieldPath::parse("a.x").get(&doc), None);
    }

    #[test]
    fn get_array_index_segment() {
        let doc = json!({"items": [{"n": 1}, {"n": 2}]});
        assert_eq!(FieldPath::parse("items.1.n").get(&doc), Some(&json!(2)));
        assert_eq!(FieldPath::parse("items.5.n").get(&doc), None);
    }

    #[test]
    fn existential_array_match() {
        let doc = json!({"tags": [{"name": "red"}, {"name": "blue"}]});
        let hit = FieldPath::parse("tags.name").matches_existential(&doc, &|v| v == Some(&json!("blue")));
        assert!(hit);
        let miss = FieldPath::parse("tags.name").matches_existential(&doc, &|v| v == Some(&json!("green")));
        assert!(!miss);
    }

    #[test]
    fn set_creates_intermediate_objects_not_arrays() {
        let mut doc = json!({});
        FieldPath::parse("a.b.c").set(&mut doc, json!(42)).unwrap();
        assert_eq!(doc, json!({"a": {"b": {"c": 42}}}));
    }

    #[test]
    fn set_array_index_does_not_pad() {
        let mut doc = json!({"items": [1, 2]});
        let err = FieldPath::parse("items.5").set(&mut doc, json!(3)).unwrap_err();
        assert!(err.contains("out of range"));
    }

    #[test]
    fn unset_missing_path_is_noop() {
        let mut doc = json!({"a": 1});
        FieldPath::parse("x.y").unset(&mut doc).unwrap();
        assert_eq!(doc, json!({"a": 1}));
    }

    #[test]
    fn unset_removes_field() {
        let mut doc = json!({"a": {"b": 1, "c": 2}});
        FieldPath::parse("a.b").unset(&mut doc).unwrap();
        assert_eq!(doc, json!({"a": {"c": 2}}));
    }
}
