//! Raw scraped values and the traversal primitives shared by every stage.
//!
//! A [`RawNode`] is whatever a collaborator handed us: a parsed XHR body, a
//! capture dump, or the tree built from an HTML page. Mappings keep their
//! source key order, so every walk over the same node visits values in the
//! same order.

use serde_json::{Map, Value};

/// Mapping | Sequence | Scalar, with no fixed schema.
pub type RawNode = Value;

/// Mapping variant of a [`RawNode`].
pub type RawMap = Map<String, Value>;

/// Depth-first, pre-order iterator over the scalar leaves under a node.
///
/// Uses an explicit stack so deeply nested payloads cannot exhaust the call
/// stack.
pub struct Leaves<'a> {
    stack: Vec<&'a Value>,
}

impl<'a> Leaves<'a> {
    pub fn new(root: &'a Value) -> Self {
        Self { stack: vec![root] }
    }
}

impl<'a> Iterator for Leaves<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            match node {
                Value::Object(map) => self.stack.extend(map.values().rev()),
                Value::Array(items) => self.stack.extend(items.iter().rev()),
                scalar => return Some(scalar),
            }
        }
        None
    }
}

/// All scalar leaves under `node`, in source order.
pub fn leaves(node: &Value) -> Leaves<'_> {
    Leaves::new(node)
}

/// String leaves under `node`, in source order.
pub fn string_leaves(node: &Value) -> impl Iterator<Item = &str> {
    leaves(node).filter_map(Value::as_str)
}

/// Same as [`string_leaves`] for a mapping that is not wrapped in a `Value`.
pub fn map_string_leaves(map: &RawMap) -> impl Iterator<Item = &str> {
    map.values().flat_map(string_leaves)
}

/// Same as [`leaves`] for a bare mapping.
pub fn map_leaves(map: &RawMap) -> impl Iterator<Item = &Value> {
    map.values().flat_map(leaves)
}

/// Look up `key`, preferring an exact match and falling back to an ASCII
/// case-insensitive one (`productname` finds `productName`).
pub fn get_key<'a>(map: &'a RawMap, key: &str) -> Option<&'a Value> {
    map.get(key).or_else(|| {
        map.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

/// True when the mapping holds any of `keys` (case-insensitively).
pub fn has_any_key(map: &RawMap, keys: &[String]) -> bool {
    keys.iter().any(|key| get_key(map, key).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_leaves_are_in_source_order() {
        let node = json!({
            "a": "first",
            "b": {"c": ["second", 3, {"d": "fourth"}]},
            "e": null
        });

        let collected: Vec<Value> = leaves(&node).cloned().collect();
        assert_eq!(
            collected,
            vec![json!("first"), json!("second"), json!(3), json!("fourth"), Value::Null]
        );

        let strings: Vec<&str> = string_leaves(&node).collect();
        assert_eq!(strings, vec!["first", "second", "fourth"]);
    }

    #[test]
    fn test_scalar_root_is_its_own_leaf() {
        let node = json!("lonely");
        assert_eq!(string_leaves(&node).collect::<Vec<_>>(), vec!["lonely"]);
    }

    #[test]
    fn test_deep_nesting_does_not_recurse() {
        let mut node = json!("bottom");
        for _ in 0..1_000 {
            node = json!([node]);
        }
        assert_eq!(string_leaves(&node).count(), 1);
    }

    #[test]
    fn test_get_key_case_insensitive() {
        let node = json!({"productName": "Kulaklık"});
        let map = node.as_object().unwrap();

        assert_eq!(get_key(map, "productName"), Some(&json!("Kulaklık")));
        assert_eq!(get_key(map, "productname"), Some(&json!("Kulaklık")));
        assert_eq!(get_key(map, "title"), None);
    }
}
