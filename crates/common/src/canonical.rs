//! Canonical JSON encoding — the only hashing input for the journal's hash
//! chain and for signed payloads (DCTs, delegation contracts, attestation
//! hops) elsewhere in the workspace. Spec.md §4.1: "keys sorted
//! lexicographically, UTF-8, no insignificant whitespace, numbers in
//! shortest round-trip form."

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Errors producing a canonical encoding.
#[derive(Debug, thiserror::Error)]
pub enum CanonicalError {
    #[error("value is not representable as canonical JSON: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Serialize `value` to canonical JSON bytes: object keys sorted
/// lexicographically at every level, no insignificant whitespace.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CanonicalError> {
    let value = serde_json::to_value(value)?;
    let sorted = sort_value(value);
    Ok(serde_json::to_vec(&sorted)?)
}

/// Like [`to_canonical_bytes`] but returns a `String`.
pub fn to_canonical_string<T: Serialize>(value: &T) -> Result<String, CanonicalError> {
    Ok(String::from_utf8(to_canonical_bytes(value)?).expect("canonical JSON is valid UTF-8"))
}

fn sort_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, sort_value(v))).collect();
            let mut out = serde_json::Map::new();
            for (k, v) in sorted {
                out.insert(k, v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_value).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_object_keys_at_every_level() {
        let value = json!({"b": 1, "a": {"d": 2, "c": 3}});
        let encoded = to_canonical_string(&value).unwrap();
        assert_eq!(encoded, r#"{"a":{"c":3,"d":2},"b":1}"#);
    }

    #[test]
    fn arrays_preserve_order_but_sort_nested_objects() {
        let value = json!([{"b": 1, "a": 2}, {"z": 1}]);
        let encoded = to_canonical_string(&value).unwrap();
        assert_eq!(encoded, r#"[{"a":2,"b":1},{"z":1}]"#);
    }

    #[test]
    fn same_logical_value_different_field_order_hashes_equal() {
        let a = json!({"x": 1, "y": 2});
        let b = json!({"y": 2, "x": 1});
        assert_eq!(
            to_canonical_bytes(&a).unwrap(),
            to_canonical_bytes(&b).unwrap()
        );
    }
}
