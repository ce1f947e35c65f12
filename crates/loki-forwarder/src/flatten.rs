// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Projection of nested JSON records onto a single level.
//!
//! Object nesting extends the path with `.key`, array nesting rewrites the
//! last path segment as `segment[index]`:
//!
//! ```
//! use loki_forwarder::flatten::flatten;
//! use serde_json::json;
//!
//! let flat = flatten(&json!({"a": {"b": 1, "c": [true, "x"]}})).unwrap();
//! assert_eq!(flat["a.b"], json!(1));
//! assert_eq!(flat["a.c[0]"], json!(true));
//! assert_eq!(flat["a.c[1]"], json!("x"));
//! ```

use serde_json::{Map, Value};

use crate::errors::FlattenError;

/// Path to scalar mapping derived from one record.
pub type FlatRecord = Map<String, Value>;

/// Flattens `record`, which must be a JSON object.
///
/// Traversal runs off a heap allocated work list, so arbitrarily deep input
/// does not grow the call stack. Two structural paths that collapse onto the
/// same key (e.g. a literal `"a.b"` key next to `{"a": {"b": ..}}`) resolve
/// to whichever leaf is visited last.
pub fn flatten(record: &Value) -> Result<FlatRecord, FlattenError> {
    let Value::Object(root) = record else {
        return Err(FlattenError::NotAnObject(kind(record)));
    };

    let mut flat = FlatRecord::new();
    let mut pending: Vec<(Vec<String>, &Value)> = root
        .iter()
        .map(|(key, value)| (vec![key.clone()], value))
        .collect();

    while let Some((path, value)) = pending.pop() {
        match value {
            Value::Object(children) => {
                for (key, child) in children {
                    let mut child_path = Vec::with_capacity(path.len() + 1);
                    child_path.extend_from_slice(&path);
                    child_path.push(key.clone());
                    pending.push((child_path, child));
                }
            }
            Value::Array(items) => {
                // Only the root has an empty path and the root is an object.
                let Some((last, parent)) = path.split_last() else {
                    continue;
                };
                for (index, item) in items.iter().enumerate() {
                    let mut item_path = Vec::with_capacity(path.len());
                    item_path.extend_from_slice(parent);
                    item_path.push(format!("{last}[{index}]"));
                    pending.push((item_path, item));
                }
            }
            scalar => {
                flat.insert(path.join("."), scalar.clone());
            }
        }
    }

    Ok(flat)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
