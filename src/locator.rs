//! Record Locator: find product-shaped mappings in an arbitrary tree
//!
//! The walk is depth-first and pre-order, so a product mapping is emitted
//! before anything nested inside it. Every mapping and sequence element is
//! visited once per reference; nothing is memoized.

use serde_json::Value;

use crate::fields::FieldExtractor;
use crate::node::{get_key, has_any_key, map_string_leaves, RawMap, RawNode};
use crate::profile::Strictness;

/// Lazy iterator over the candidate mappings under a root node.
pub struct Candidates<'a, 'p> {
    stack: Vec<&'a Value>,
    fields: &'a FieldExtractor<'p>,
    strictness: Strictness,
}

impl<'a, 'p> Candidates<'a, 'p> {
    pub fn new(root: &'a RawNode, fields: &'a FieldExtractor<'p>, strictness: Strictness) -> Self {
        let stack = match root {
            Value::Object(_) | Value::Array(_) => vec![root],
            _ => Vec::new(),
        };
        Self {
            stack,
            fields,
            strictness,
        }
    }
}

impl<'a, 'p> Iterator for Candidates<'a, 'p> {
    type Item = &'a RawMap;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            match node {
                Value::Object(map) => {
                    self.stack
                        .extend(map.values().rev().filter(|v| v.is_object() || v.is_array()));
                    if is_candidate(map, self.fields, self.strictness) {
                        return Some(map);
                    }
                }
                Value::Array(items) => {
                    self.stack
                        .extend(items.iter().rev().filter(|v| v.is_object() || v.is_array()));
                }
                _ => {}
            }
        }
        None
    }
}

/// Candidate mappings under `root`, in pre-order.
pub fn locate<'a, 'p>(
    root: &'a RawNode,
    fields: &'a FieldExtractor<'p>,
    strictness: Strictness,
) -> Candidates<'a, 'p> {
    Candidates::new(root, fields, strictness)
}

/// Does this mapping look like a product record at the given strictness?
pub fn is_candidate(map: &RawMap, fields: &FieldExtractor<'_>, strictness: Strictness) -> bool {
    if !has_name_key(map, fields) {
        return false;
    }
    match strictness {
        Strictness::Loose => has_secondary_signal(map, fields),
        Strictness::Standard => has_secondary_signal(map, fields) && !is_denied(map, fields),
        Strictness::Strict => {
            fields.image(map, true).is_some()
                && fields.price(map).is_some()
                && !is_denied(map, fields)
        }
    }
}

fn has_name_key(map: &RawMap, fields: &FieldExtractor<'_>) -> bool {
    fields.profile().keys.name.iter().any(|key| {
        get_key(map, key)
            .and_then(Value::as_str)
            .is_some_and(|s| !s.trim().is_empty())
    })
}

fn has_secondary_signal(map: &RawMap, fields: &FieldExtractor<'_>) -> bool {
    let keys = &fields.profile().keys;
    has_any_key(map, &keys.price)
        || has_any_key(map, &keys.image)
        || has_any_key(map, &keys.id)
        || map_string_leaves(map).any(|s| fields.detail_url(s).is_some())
}

/// True when any string leaf contains a denylisted substring (case-insensitive).
pub fn is_denied(map: &RawMap, fields: &FieldExtractor<'_>) -> bool {
    let denylist: Vec<String> = fields
        .profile()
        .denylist
        .iter()
        .map(|d| d.to_lowercase())
        .collect();
    if denylist.is_empty() {
        return false;
    }
    map_string_leaves(map).any(|s| {
        let low = s.to_lowercase();
        denylist.iter().any(|d| low.contains(d.as_str()))
    })
}
