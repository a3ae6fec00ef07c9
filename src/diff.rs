//! Structural comparison of JSON-valued attributes.
//!
//! Users write declarations by hand while the device hands back its own
//! serialization, so textual comparison reports changes that are not real.

use serde_json::{Map, Value};

/// Decide whether a change from `old` to `new` should be hidden from the plan.
///
/// Returns `false` when either side is not valid JSON. Returns `true` when
/// both documents are structurally equal (key order ignored, numbers compared
/// by value). Otherwise, when both are objects, top-level keys of `old` that
/// `new` does not have are dropped and the comparison is repeated.
pub fn suppress_json_diff(old: &str, new: &str) -> bool {
    let (Ok(old), Ok(new)) = (
        serde_json::from_str::<Value>(old),
        serde_json::from_str::<Value>(new),
    ) else {
        return false;
    };

    if json_equal(&old, &new) {
        return true;
    }

    match (old, &new) {
        (Value::Object(old), Value::Object(new_map)) => {
            let masked: Map<String, Value> = old
                .into_iter()
                .filter(|(key, _)| new_map.contains_key(key))
                .collect();
            json_equal(&Value::Object(masked), &new)
        }
        _ => false,
    }
}

/// Structural equality where `1` and `1.0` compare equal.
pub fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if x == y {
                return true;
            }
            match (x.as_f64(), y.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            }
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| json_equal(x, y))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(key, value)| y.get(key).is_some_and(|other| json_equal(value, other)))
        }
        _ => a == b,
    }
}
