//! Stable JSON canonicalization and digests
//!
//! Hashes must not depend on field insertion order, so values are rendered
//! with object keys sorted recursively while array order is preserved.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Render `value` as compact JSON with recursively sorted object keys
pub fn canonical_json(value: &Value) -> String {
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
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
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

/// SHA-256 of `data` as lowercase hex (64 characters)
pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    let digest = Sha256::digest(data.as_ref());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Canonicalize a JSON value and hash it
pub fn hash_value(value: &Value) -> String {
    sha256_hex(canonical_json(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keys_sorted_recursively() {
        let value = json!({"b": 1, "a": {"z": true, "m": null}, "c": [3, 1, 2]});
        assert_eq!(
            canonical_json(&value),
            r#"{"a":{"m":null,"z":true},"b":1,"c":[3,1,2]}"#
        );
    }

    #[test]
    fn test_insertion_order_does_not_matter() {
        let mut first = serde_json::Map::new();
        first.insert("scene".into(), json!("s1"));
        first.insert("position".into(), json!(3));

        let mut second = serde_json::Map::new();
        second.insert("position".into(), json!(3));
        second.insert("scene".into(), json!("s1"));

        assert_eq!(
            hash_value(&Value::Object(first)),
            hash_value(&Value::Object(second))
        );
    }

    #[test]
    fn test_array_order_matters() {
        assert_ne!(hash_value(&json!([1, 2])), hash_value(&json!([2, 1])));
    }

    #[test]
    fn test_strings_are_escaped() {
        let value = json!({"quote\"key": "line\nbreak"});
        assert_eq!(canonical_json(&value), r#"{"quote\"key":"line\nbreak"}"#);
    }

    #[test]
    fn test_sha256_hex_shape() {
        let digest = sha256_hex("abc");
        assert_eq!(digest.len(), 64);
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
