// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Storage wire shape shared by every backend.
//
// Values travel as strings. Strings are stored verbatim, anything else is
// JSON-serialized. Reads optionally attempt a JSON parse and silently fall
// back to the raw string.

use playbridge_core::error::{BridgeError, Result};
use serde_json::{Map, Value};
use tracing::trace;

use crate::host::LocalStore;

/// String form of `value` as written to a backend.
pub fn encode_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Value read back from a backend.
pub fn decode_value(raw: &str, try_parse_json: bool) -> Value {
    if try_parse_json {
        if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
            return parsed;
        }
        trace!("stored value is not JSON, returning raw string");
    }
    Value::String(raw.to_string())
}

/// Batched writes need one value per key.
pub fn ensure_aligned(keys: &[String], values: &[Value]) -> Result<()> {
    if keys.len() != values.len() {
        return Err(BridgeError::InvalidArgument(format!(
            "{} keys but {} values",
            keys.len(),
            values.len()
        )));
    }
    Ok(())
}

pub fn read_local(
    store: &dyn LocalStore,
    keys: &[String],
    try_parse_json: bool,
) -> Result<Vec<Value>> {
    keys.iter()
        .map(|key| {
            Ok(store
                .get_item(key)?
                .map(|raw| decode_value(&raw, try_parse_json))
                .unwrap_or(Value::Null))
        })
        .collect()
}

pub fn write_local(store: &dyn LocalStore, keys: &[String], values: &[Value]) -> Result<()> {
    ensure_aligned(keys, values)?;
    for (key, value) in keys.iter().zip(values) {
        store.set_item(key, &encode_value(value))?;
    }
    Ok(())
}

pub fn delete_local(store: &dyn LocalStore, keys: &[String]) -> Result<()> {
    for key in keys {
        store.remove_item(key)?;
    }
    Ok(())
}

/// Read `keys` out of a platform snapshot whose values are already JSON.
///
/// String entries are re-decoded so values written through
/// [`encode_value`] round-trip.
pub fn read_snapshot(snapshot: &Map<String, Value>, keys: &[String], try_parse_json: bool) -> Vec<Value> {
    keys.iter()
        .map(|key| match snapshot.get(key) {
            None | Some(Value::Null) => Value::Null,
            Some(Value::String(raw)) => decode_value(raw, try_parse_json),
            Some(other) => other.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::host::MemoryLocalStore;

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn batch_alignment_survives_delete() {
        let store = MemoryLocalStore::new();
        write_local(&store, &keys(&["a", "b"]), &[json!(1), json!(2)]).unwrap();
        assert_eq!(
            read_local(&store, &keys(&["a", "b"]), true).unwrap(),
            vec![json!(1), json!(2)]
        );

        delete_local(&store, &keys(&["a"])).unwrap();
        assert_eq!(
            read_local(&store, &keys(&["a", "b"]), true).unwrap(),
            vec![Value::Null, json!(2)]
        );
    }

    #[test]
    fn unparseable_string_comes_back_verbatim() {
        let store = MemoryLocalStore::new();
        write_local(&store, &keys(&["s", "o"]), &[json!("not json"), json!({ "x": 1 })]).unwrap();

        let values = read_local(&store, &keys(&["s", "o"]), true).unwrap();
        assert_eq!(values, vec![json!("not json"), json!({ "x": 1 })]);
    }

    #[test]
    fn parse_can_be_disabled() {
        let store = MemoryLocalStore::new();
        write_local(&store, &keys(&["o"]), &[json!({ "x": 1 })]).unwrap();
        assert_eq!(
            read_local(&store, &keys(&["o"]), false).unwrap(),
            vec![json!(r#"{"x":1}"#)]
        );
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let store = MemoryLocalStore::new();
        let err = write_local(&store, &keys(&["a", "b"]), &[json!(1)]).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArgument(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn snapshot_reads_mixed_values() {
        let snapshot = json!({ "level": 3, "name": "\"ann\"", "raw": "plain" });
        let Value::Object(map) = snapshot else { unreachable!() };
        assert_eq!(
            read_snapshot(&map, &keys(&["level", "name", "raw", "missing"]), true),
            vec![json!(3), json!("ann"), json!("plain"), Value::Null]
        );
    }
}
