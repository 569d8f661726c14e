//! Submission deduplication — normalized fingerprints for context and params.
//!
//! Two submissions are "equivalent" when their action id, handler identity,
//! and the normalized forms of their context and params all match. The check
//! is advisory: a race between `find_duplicate` and a concurrent `submit` is
//! acceptable (duplicate work is a cost concern, not a correctness one).

use serde_json::Value;

/// Normalize a JSON value into a stable string fingerprint.
///
/// Object keys are sorted recursively so that key insertion order does not
/// affect the key; arrays keep their order (it is meaningful for params like
/// item lists).
pub fn fingerprint(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
