//! HTML adapters
//!
//! Each module turns one kind of in-page data into plain JSON. [`page_to_node`]
//! runs them all over a parsed document and bundles the results into a
//! single tree for the record locator.

mod css_extractor;
mod embedded_json_extractor;
mod js_extractor;
mod jsonld_extractor;
mod microdata_extractor;
mod opengraph_extractor;

pub use css_extractor::*;
pub use embedded_json_extractor::*;
pub use js_extractor::*;
pub use jsonld_extractor::extract_jsonld;
pub use microdata_extractor::*;
pub use opengraph_extractor::*;

use scraper::Html;
use serde_json::{Map, Value};

use crate::node::RawNode;
use crate::profile::SiteProfile;

/// Bundle every structured source on an HTML page into one RawNode.
///
/// Sections appear in a fixed order (`jsonld`, `microdata`, `opengraph`,
/// `embedded`, `js`, `cards`) and empty sections are left out. OpenGraph
/// tags are only kept on product pages; on listings they describe the page
/// itself.
pub fn page_to_node(html: &str, profile: &SiteProfile) -> RawNode {
    let document = Html::parse_document(html);

    let og = extract_opengraph(&document);
    let sections = [
        ("jsonld", extract_jsonld(&document)),
        ("microdata", extract_microdata(&document)),
        ("opengraph", if is_product_page(&og) { og } else { Value::Null }),
        ("embedded", extract_embedded_json(&document)),
        ("js", extract_js_variables(&document)),
        ("cards", extract_cards(&document, profile)),
    ];

    let mut node = Map::new();
    for (name, value) in sections {
        if !is_empty(&value) {
            node.insert(name.to_string(), value);
        }
    }
    tracing::debug!(
        site = %profile.name,
        sections = ?node.keys().collect::<Vec<_>>(),
        "converted html page"
    );
    Value::Object(node)
}

/// Does this look like an HTML document rather than JSON?
pub fn looks_like_html(text: &str) -> bool {
    text.trim_start_matches('\u{feff}').trim_start().starts_with('<')
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extract_records_with;
    use crate::profile::Strictness;

    const PRODUCT_PAGE: &str = r#"<!DOCTYPE html>
    <html><head>
      <meta property="og:type" content="product">
      <meta property="og:title" content="Arzum Okka Türk Kahvesi Makinesi">
      <script type="application/ld+json">
      {"@context": "https://schema.org", "@type": "Product",
       "name": "Arzum Okka Türk Kahvesi Makinesi",
       "image": ["https://cdn.dsmcdn.com/ty/okka.jpg"],
       "sku": "OK004",
       "offers": {"@type": "Offer", "price": 2899, "priceCurrency": "TRY",
                  "url": "https://www.trendyol.com/arzum/okka-p-55"}}
      </script>
    </head><body></body></html>"#;

    #[test]
    fn test_page_to_node_sections() {
        let profile = SiteProfile::trendyol();
        let node = page_to_node(PRODUCT_PAGE, &profile);
        let keys: Vec<&String> = node.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["jsonld", "opengraph"]);
        assert_eq!(node["jsonld"]["Product"]["sku"], "OK004");
    }

    #[test]
    fn test_product_page_flows_through_pipeline() {
        let profile = SiteProfile::trendyol();
        let node = page_to_node(PRODUCT_PAGE, &profile);
        let records = extract_records_with(&node, "trendyol", &profile, Strictness::Strict);

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.name, "Arzum Okka Türk Kahvesi Makinesi");
        assert_eq!(record.price, Some(2899.0));
        assert_eq!(record.image_url.as_deref(), Some("https://cdn.dsmcdn.com/ty/okka.jpg"));
        assert_eq!(record.url.as_deref(), Some("https://www.trendyol.com/arzum/okka-p-55"));
        assert_eq!(record.id.as_deref(), Some("OK004"));
    }

    #[test]
    fn test_schema_dot_decimal_prices_keep_their_value() {
        let page = r#"<html><head>
          <meta property="og:type" content="product">
          <meta property="og:title" content="Philips Saç Kurutma Makinesi">
          <meta property="og:image" content="https://cdn.dsmcdn.com/ty/philips.jpg">
          <meta property="product:price:amount" content="899.90">
          <script type="application/ld+json">
          {"@type": "Product", "name": "Philips Saç Kurutma Makinesi",
           "image": "https://cdn.dsmcdn.com/ty/philips.jpg",
           "offers": {"@type": "Offer", "price": "1299.90", "priceCurrency": "TRY"}}
          </script>
        </head><body>
          <div itemscope itemtype="https://schema.org/Product">
            <span itemprop="name">Arzum Çay Makinesi</span>
            <img itemprop="image" src="https://cdn.dsmcdn.com/ty/cay.jpg">
            <div itemprop="offers" itemscope itemtype="https://schema.org/Offer">
              <meta itemprop="price" content="2499.00">
            </div>
          </div>
        </body></html>"#;

        let profile = SiteProfile::trendyol();
        let node = page_to_node(page, &profile);
        let records = extract_records_with(&node, "trendyol", &profile, Strictness::Loose);

        let price_of = |name: &str| {
            records
                .iter()
                .find(|r| r.name == name)
                .and_then(|r| r.price)
        };
        assert_eq!(price_of("Philips Saç Kurutma Makinesi"), Some(1299.9));
        assert_eq!(price_of("Arzum Çay Makinesi"), Some(2499.0));
        assert_eq!(node["opengraph"]["price"], 899.9);
    }

    #[test]
    fn test_looks_like_html() {
        assert!(looks_like_html("  <!DOCTYPE html><html>"));
        assert!(looks_like_html("<div>"));
        assert!(!looks_like_html(r#"{"products": []}"#));
        assert!(!looks_like_html("[1, 2]"));
    }
}
