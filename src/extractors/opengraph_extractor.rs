//! OpenGraph and product meta tags

use scraper::{Html, Selector};
use serde_json::{Map, Value};

use super::jsonld_extractor::{push_grouped, schema_price};

/// `og:*` and `product:*` meta tags as one flat object.
///
/// `og:title` becomes `title`, `product:price:amount` (or `og:price:amount`)
/// becomes `price`, and repeated tags such as `og:image` collect into an
/// array. Returns an empty object when the page has no such tags.
pub fn extract_opengraph(document: &Html) -> Value {
    let selector = match Selector::parse("meta[property], meta[name]") {
        Ok(s) => s,
        Err(_) => return Value::Object(Map::new()),
    };

    let mut og: Map<String, Value> = Map::new();
    for element in document.select(&selector) {
        let el = element.value();
        let Some(property) = el.attr("property").or_else(|| el.attr("name")) else {
            continue;
        };
        let content = el.attr("content").unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }
        if let Some(key) = og_key(property) {
            let value = if key == "price" {
                schema_price(content)
            } else {
                Value::String(content.to_string())
            };
            push_grouped(&mut og, key, value);
        }
    }
    Value::Object(og)
}

fn og_key(property: &str) -> Option<String> {
    let property = property.trim().to_ascii_lowercase();
    let key = match property.as_str() {
        "og:price:amount" | "product:price:amount" => "price",
        "og:price:currency" | "product:price:currency" => "currency",
        "og:image:secure_url" | "og:image:url" => "image",
        "product:retailer_item_id" => "id",
        "product:category" => "category",
        other => {
            let stripped = other.strip_prefix("og:")?;
            if stripped.contains(':') {
                return None;
            }
            return Some(stripped.to_string());
        }
    };
    Some(key.to_string())
}

/// Is this OpenGraph object describing a product page?
pub fn is_product_page(og: &Value) -> bool {
    let type_is_product = og
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|t| t.to_ascii_lowercase().starts_with("product"));
    type_is_product || og.get("price").is_some()
}
