//! JSON payloads embedded in <script type="application/json"> tags
//! (Next.js `__NEXT_DATA__`, Nuxt state and similar)

use scraper::{Html, Selector};
use serde_json::{Map, Value};

/// Embedded JSON documents keyed by the script's `id`, or `script_<n>`
/// when the tag has none.
pub fn extract_embedded_json(document: &Html) -> Value {
    let selector = match Selector::parse(r#"script[type="application/json"]"#) {
        Ok(s) => s,
        Err(_) => return Value::Object(Map::new()),
    };

    let mut result = Map::new();
    for (i, element) in document.select(&selector).enumerate() {
        let text = element.text().collect::<String>();
        let Ok(json) = serde_json::from_str::<Value>(text.trim()) else {
            continue;
        };
        let key = element
            .value()
            .attr("id")
            .filter(|id| !id.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("script_{i}"));
        result.insert(key, json);
    }
    Value::Object(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_data_and_anonymous_blocks() {
        let html = r#"
        <script id="__NEXT_DATA__" type="application/json">
            {"props": {"pageProps": {"products": [{"title": "Blender Seti"}]}}}
        </script>
        <script type="application/json">{"flag": true}</script>
        <script type="application/json">not json</script>
        "#;

        let embedded = extract_embedded_json(&Html::parse_document(html));
        assert_eq!(
            embedded["__NEXT_DATA__"]["props"]["pageProps"]["products"][0]["title"],
            "Blender Seti"
        );
        assert_eq!(embedded["script_1"]["flag"], true);
        assert_eq!(embedded.as_object().unwrap().len(), 2);
    }
}
