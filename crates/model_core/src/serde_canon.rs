//! Canonical JSON encoding for model artifacts
//!
//! Object keys are sorted recursively and no whitespace is emitted, so the
//! same model always produces the same bytes and the same BLAKE3 hash.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CanonicalError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));

            let mut sorted = Map::with_capacity(entries.len());
            for (key, val) in entries {
                sorted.insert(key, canonicalize(val));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Serialize a value to compact JSON with sorted keys.
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<String, CanonicalError> {
    let canonical = canonicalize(serde_json::to_value(value)?);
    Ok(serde_json::to_string(&canonical)?)
}

/// BLAKE3 hash of the canonical JSON encoding, hex encoded.
pub fn content_hash_hex<T: Serialize>(value: &T) -> Result<String, CanonicalError> {
    let json = to_canonical_json(value)?;
    Ok(hex::encode(blake3::hash(json.as_bytes()).as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Inner {
        zeta: i64,
        alpha: i64,
    }

    #[derive(Serialize)]
    struct Outer {
        second: Inner,
        first: Vec<Inner>,
        label: String,
    }

    fn sample(zeta: i64) -> Outer {
        Outer {
            second: Inner { zeta, alpha: 1 },
            first: vec![Inner { zeta: 3, alpha: 4 }],
            label: "gbdt".to_string(),
        }
    }

    #[test]
    fn keys_are_sorted_at_every_level() {
        let json = to_canonical_json(&sample(2)).unwrap();
        assert_eq!(
            json,
            r#"{"first":[{"alpha":4,"zeta":3}],"label":"gbdt","second":{"alpha":1,"zeta":2}}"#
        );
    }

    #[test]
    fn hash_is_stable_and_sensitive() {
        let a = content_hash_hex(&sample(2)).unwrap();
        let b = content_hash_hex(&sample(2)).unwrap();
        let c = content_hash_hex(&sample(5)).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
