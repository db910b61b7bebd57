//! JSON-LD blocks from <script type="application/ld+json">
//!
//! Blocks are grouped by `@type`, with `@graph` arrays flattened, so a
//! product page yields `{"Product": {...}, "BreadcrumbList": {...}}`.

use scraper::{Html, Selector};
use serde_json::{Map, Number, Value};

/// schema.org price properties. Their text always uses a dot decimal.
const SCHEMA_PRICE_KEYS: &[&str] = &["price", "lowPrice", "highPrice"];

/// Every JSON-LD object on the page, keyed by `@type`.
pub fn extract_jsonld(document: &Html) -> Value {
    let selector = match Selector::parse(r#"script[type="application/ld+json"]"#) {
        Ok(s) => s,
        Err(_) => return Value::Object(Map::new()),
    };

    let mut result: Map<String, Value> = Map::new();
    for element in document.select(&selector) {
        let content = element.text().collect::<String>();
        let trimmed = content.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(mut json) => {
                numeric_prices(&mut json);
                collect_typed(json, &mut result)
            }
            Err(e) => tracing::debug!(error = %e, "skipping malformed JSON-LD block"),
        }
    }
    Value::Object(result)
}

fn collect_typed(value: Value, result: &mut Map<String, Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_typed(item, result);
            }
        }
        Value::Object(mut obj) => match obj.remove("@graph") {
            Some(Value::Array(graph)) => {
                for item in graph {
                    collect_typed(item, result);
                }
            }
            Some(other) => {
                obj.insert("@graph".to_string(), other);
                insert_typed(Value::Object(obj), result);
            }
            None => insert_typed(Value::Object(obj), result),
        },
        _ => {}
    }
}

fn insert_typed(value: Value, result: &mut Map<String, Value>) {
    let type_name = match value.get("@type") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(types)) => match types.first().and_then(Value::as_str) {
            Some(s) => s.to_string(),
            None => return,
        },
        _ => return,
    };
    push_grouped(result, type_name, value);
}

/// Rewrite string values under schema.org price keys as numbers, so the
/// dot decimal is never read as thousands grouping downstream.
fn numeric_prices(value: &mut Value) {
    match value {
        Value::Array(items) => items.iter_mut().for_each(numeric_prices),
        Value::Object(obj) => {
            for (key, inner) in obj.iter_mut() {
                let replacement = match &*inner {
                    Value::String(text) if is_schema_price_key(key) => Some(schema_price(text)),
                    _ => None,
                };
                match replacement {
                    Some(number) => *inner = number,
                    None => numeric_prices(inner),
                }
            }
        }
        _ => {}
    }
}

pub(crate) fn is_schema_price_key(key: &str) -> bool {
    SCHEMA_PRICE_KEYS.contains(&key)
}

/// A schema.org price as a JSON number, or the original text when it is
/// not a plain decimal (`"2.499,00 TL"` is left for the price parser).
pub(crate) fn schema_price(text: &str) -> Value {
    text.trim()
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(text.to_string()))
}

/// Insert under `key`, turning a repeated key into an array.
pub(crate) fn push_grouped(result: &mut Map<String, Value>, key: String, value: Value) {
    match result.get_mut(&key) {
        Some(Value::Array(arr)) => arr.push(value),
        Some(existing) => {
            let old = existing.take();
            *existing = Value::Array(vec![old, value]);
        }
        None => {
            result.insert(key, value);
        }
    }
}
