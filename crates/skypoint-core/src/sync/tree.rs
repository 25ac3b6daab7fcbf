// Path operations on a JSON document tree.
//
// Objects are the only interior nodes. Writing `null` is the same as
// removing, and removing a path prunes parents left empty.

use serde_json::{Map, Value};

/// The value at `segments`, or `None` when any segment is missing.
pub fn get<'a>(root: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(root, |node, seg| node.as_object()?.get(*seg))
}

/// The value at `segments`, or `Value::Null` when absent.
pub fn get_or_null(root: &Value, segments: &[&str]) -> Value {
    get(root, segments).cloned().unwrap_or(Value::Null)
}

/// Write `value` at `segments`, creating intermediate objects and replacing
/// any scalar found on the way.
pub fn set(root: &mut Value, segments: &[&str], value: Value) {
    if value.is_null() {
        remove(root, segments);
        return;
    }

    let Some((last, parents)) = segments.split_last() else {
        *root = value;
        return;
    };

    let mut node = root;
    for seg in parents {
        node = ensure_object(node)
            .entry((*seg).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    ensure_object(node).insert((*last).to_string(), value);
}

/// Remove the value at `segments`. Returns true if something was removed.
pub fn remove(root: &mut Value, segments: &[&str]) -> bool {
    let Some((first, rest)) = segments.split_first() else {
        let had_value = !root.is_null();
        *root = Value::Null;
        return had_value;
    };

    let Some(map) = root.as_object_mut() else {
        return false;
    };

    let removed = if rest.is_empty() {
        map.remove(*first).is_some()
    } else {
        match map.get_mut(*first) {
            Some(child) => {
                let removed = remove(child, rest);
                if removed && is_empty_node(child) {
                    map.remove(*first);
                }
                removed
            }
            None => false,
        }
    };

    if removed && map.is_empty() {
        *root = Value::Null;
    }
    removed
}

/// Whether a change at `written` can alter the subtree at `watched`: one of
/// the paths is a prefix of the other.
pub fn overlaps(written: &[&str], watched: &[&str]) -> bool {
    written.iter().zip(watched.iter()).all(|(a, b)| a == b)
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}

fn is_empty_node(node: &Value) -> bool {
    match node {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_creates_intermediate_objects() {
        let mut root = Value::Null;
        set(&mut root, &["rooms", "ABC123", "session", "isRevealed"], json!(true));
        assert_eq!(root, json!({"rooms": {"ABC123": {"session": {"isRevealed": true}}}}));
    }

    #[test]
    fn set_replaces_scalar_parent() {
        let mut root = json!({"a": 5});
        set(&mut root, &["a", "b"], json!("x"));
        assert_eq!(root, json!({"a": {"b": "x"}}));
    }

    #[test]
    fn set_at_root_replaces_document() {
        let mut root = json!({"a": 1});
        set(&mut root, &[], json!({"b": 2}));
        assert_eq!(root, json!({"b": 2}));
    }

    #[test]
    fn set_null_removes() {
        let mut root = json!({"a": {"b": 1, "c": 2}});
        set(&mut root, &["a", "b"], Value::Null);
        assert_eq!(root, json!({"a": {"c": 2}}));
    }

    #[test]
    fn remove_prunes_empty_parents() {
        let mut root = json!({"rooms": {"R": {"users": {"u1": {"name": "A"}}}}});
        assert!(remove(&mut root, &["rooms", "R", "users", "u1"]));
        assert_eq!(root, Value::Null);
    }

    #[test]
    fn remove_keeps_non_empty_siblings() {
        let mut root = json!({"users": {"u1": 1, "u2": 2}});
        assert!(remove(&mut root, &["users", "u1"]));
        assert_eq!(root, json!({"users": {"u2": 2}}));
    }

    #[test]
    fn remove_missing_path_is_noop() {
        let mut root = json!({"users": {"u1": 1}});
        assert!(!remove(&mut root, &["users", "u9"]));
        assert!(!remove(&mut root, &["users", "u1", "deeper"]));
        assert_eq!(root, json!({"users": {"u1": 1}}));
    }

    #[test]
    fn get_follows_segments() {
        let root = json!({"a": {"b": {"c": 3}}});
        assert_eq!(get(&root, &["a", "b", "c"]), Some(&json!(3)));
        assert_eq!(get(&root, &["a", "x"]), None);
        assert_eq!(get_or_null(&root, &["a", "b", "c", "d"]), Value::Null);
        assert_eq!(get(&root, &[]), Some(&root));
    }

    #[test]
    fn overlap_is_prefix_either_way() {
        assert!(overlaps(&["rooms", "R", "users", "u1"], &["rooms", "R"]));
        assert!(overlaps(&["rooms"], &["rooms", "R"]));
        assert!(overlaps(&["rooms", "R"], &["rooms", "R"]));
        assert!(!overlaps(&["rooms", "S", "users"], &["rooms", "R"]));
    }
}
