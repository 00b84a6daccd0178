//! services/api/src/adapters/mirror.rs
//!
//! Shared helpers for the mirror backends (gist, local file). Both hold the
//! whole store as a single JSON document shaped
//! `{"<collection>": {"<doc id>": {...}}}`; the helpers here implement the
//! document operations over that in-memory value.

use serde_json::{Map, Value};

/// Looks up one document inside a mirror value.
pub fn document<'a>(mirror: &'a Value, collection: &str, id: &str) -> Option<&'a Value> {
    mirror.get(collection)?.get(id)
}

/// Creates or replaces one document inside a mirror value.
pub fn set_document(mirror: &mut Value, collection: &str, id: &str, doc: Value) {
    let root = ensure_object(mirror);
    let coll = root
        .entry(collection.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    ensure_object(coll).insert(id.to_string(), doc);
}

/// Sets a single value at `path` inside one document, creating the document
/// and any intermediate objects as needed.
pub fn patch_document(mirror: &mut Value, collection: &str, id: &str, path: &[&str], value: Value) {
    let root = ensure_object(mirror);
    let coll = root
        .entry(collection.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    let doc = ensure_object(coll)
        .entry(id.to_string())
        .or_insert_with(|| Value::Object(Map::new()));

    let mut target = doc;
    for segment in &path[..path.len().saturating_sub(1)] {
        target = ensure_object(target)
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    match path.last() {
        Some(last) => {
            ensure_object(target).insert((*last).to_string(), value);
        }
        // An empty path replaces the whole document.
        None => *target = value,
    }
}

/// Removes one document; returns whether it existed.
pub fn remove_document(mirror: &mut Value, collection: &str, id: &str) -> bool {
    mirror
        .get_mut(collection)
        .and_then(Value::as_object_mut)
        .map(|coll| coll.remove(id).is_some())
        .unwrap_or(false)
}

/// All documents of a collection, in key order.
pub fn documents(mirror: &Value, collection: &str) -> Vec<Value> {
    mirror
        .get(collection)
        .and_then(Value::as_object)
        .map(|coll| coll.values().cloned().collect())
        .unwrap_or_default()
}

/// Coerces a value into an object map; non-object content (a corrupted or
/// legacy-format mirror) is replaced by an empty object.
fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    value.as_object_mut().expect("value was just made an object")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_and_get_document() {
        let mut mirror = json!({});
        set_document(&mut mirror, "users", "yamada", json!({"display_name": "山田"}));
        assert_eq!(
            document(&mirror, "users", "yamada"),
            Some(&json!({"display_name": "山田"}))
        );
        assert_eq!(document(&mirror, "users", "other"), None);
    }

    #[test]
    fn patch_creates_intermediate_objects() {
        let mut mirror = json!({});
        patch_document(
            &mut mirror,
            "user_attendance",
            "yamada",
            &["2025-07-08", "check_in"],
            json!("09:00"),
        );
        assert_eq!(
            document(&mirror, "user_attendance", "yamada"),
            Some(&json!({"2025-07-08": {"check_in": "09:00"}}))
        );
    }

    #[test]
    fn patch_preserves_sibling_fields() {
        let mut mirror = json!({
            "user_attendance": {
                "yamada": {"2025-07-08": {"check_in": "09:00", "notes": "客先"}}
            }
        });
        patch_document(
            &mut mirror,
            "user_attendance",
            "yamada",
            &["2025-07-08", "check_out"],
            json!("18:00"),
        );
        assert_eq!(
            document(&mirror, "user_attendance", "yamada"),
            Some(&json!({
                "2025-07-08": {"check_in": "09:00", "check_out": "18:00", "notes": "客先"}
            }))
        );
    }

    #[test]
    fn remove_and_list() {
        let mut mirror = json!({"user_sessions": {"a": {"token": "a"}, "b": {"token": "b"}}});
        assert!(remove_document(&mut mirror, "user_sessions", "a"));
        assert!(!remove_document(&mut mirror, "user_sessions", "a"));
        assert_eq!(documents(&mirror, "user_sessions"), vec![json!({"token": "b"})]);
        assert!(documents(&mirror, "missing").is_empty());
    }
}
