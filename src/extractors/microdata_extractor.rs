//! Microdata items (itemscope / itemprop / itemtype)
//!
//! Top-level items are grouped by the last path segment of their
//! `itemtype`; nested items become nested objects under their `itemprop`.

use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};

use super::jsonld_extractor::{is_schema_price_key, push_grouped, schema_price};

/// Every top-level microdata item on the page, keyed by type name.
pub fn extract_microdata(document: &Html) -> Value {
    let (scope_sel, prop_sel) = match (Selector::parse("[itemscope]"), Selector::parse("[itemprop]")) {
        (Ok(a), Ok(b)) => (a, b),
        _ => return Value::Object(Map::new()),
    };

    let mut result: Map<String, Value> = Map::new();
    for element in document.select(&scope_sel) {
        let nested = element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|el| el.value().attr("itemscope").is_some());
        if nested {
            continue;
        }
        let item = read_item(element, &prop_sel);
        let type_name = item
            .get("@type")
            .and_then(Value::as_str)
            .unwrap_or("Thing")
            .to_string();
        push_grouped(&mut result, type_name, item);
    }
    Value::Object(result)
}

fn read_item(scope: ElementRef<'_>, prop_sel: &Selector) -> Value {
    let mut item: Map<String, Value> = Map::new();

    if let Some(itemtype) = scope.value().attr("itemtype") {
        let type_name = itemtype.trim_end_matches('/').rsplit('/').next().unwrap_or(itemtype);
        item.insert("@type".to_string(), Value::String(type_name.to_string()));
    }
    if let Some(itemid) = scope.value().attr("itemid") {
        item.insert("@id".to_string(), Value::String(itemid.to_string()));
    }

    for prop in scope.select(prop_sel) {
        if !owned_by(prop, scope) {
            continue;
        }
        let Some(name) = prop.value().attr("itemprop") else {
            continue;
        };
        let value = if prop.value().attr("itemscope").is_some() {
            read_item(prop, prop_sel)
        } else if is_schema_price_key(name) {
            schema_price(&prop_text(prop))
        } else {
            Value::String(prop_text(prop))
        };
        push_grouped(&mut item, name.to_string(), value);
    }
    Value::Object(item)
}

/// Is `scope` the nearest ancestor of `prop` carrying `itemscope`?
fn owned_by(prop: ElementRef<'_>, scope: ElementRef<'_>) -> bool {
    prop.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().attr("itemscope").is_some())
        .is_some_and(|el| el.id() == scope.id())
}

fn prop_text(prop: ElementRef<'_>) -> String {
    let el = prop.value();
    let attr = |name: &str| el.attr(name).unwrap_or("").to_string();
    let raw = match el.name() {
        "meta" => attr("content"),
        "link" | "a" | "area" => attr("href"),
        "img" | "audio" | "video" | "source" => el
            .attr("src")
            .or_else(|| el.attr("data-src"))
            .unwrap_or("")
            .to_string(),
        "time" => el
            .attr("datetime")
            .map(str::to_string)
            .unwrap_or_else(|| prop.text().collect()),
        "data" | "meter" => attr("value"),
        _ => el
            .attr("content")
            .map(str::to_string)
            .unwrap_or_else(|| prop.text().collect()),
    };
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
