//! Product tiles selected by CSS
//!
//! Listing pages that ship no structured data still render one element per
//! product. Each element matched by the profile's card selector becomes a
//! small object (`title`, `image`, `url`, `price`, `id`, `position`) that
//! the locator treats like any other candidate.

use std::iter;

use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};
use url::Url;

use crate::price::find_currency_amount;
use crate::profile::SiteProfile;

/// Used when a profile has no card selector of its own.
pub const DEFAULT_CARD_SELECTOR: &str =
    ".p-card-wrppr, .product-card, .product-item, .productListContent-item, li.search-item, a[href*='/p/']";

const TITLE_SELECTOR: &str =
    ".prdct-desc-cntnr-name, .p-card__title, .prd-name, .product-title, .product-name, h3, h4";

/// Parents climbed when a tile renders its price outside the matched element.
const PRICE_SEARCH_DEPTH: usize = 3;

/// One object per element matching the profile's card selector, in page
/// order. Elements without any title text are skipped.
pub fn extract_cards(document: &Html, profile: &SiteProfile) -> Value {
    let selector_str = profile.card_selector.as_deref().unwrap_or(DEFAULT_CARD_SELECTOR);
    let (card_sel, title_sel, img_sel, link_sel) = match (
        Selector::parse(selector_str),
        Selector::parse(TITLE_SELECTOR),
        Selector::parse("img"),
        Selector::parse("a[href]"),
    ) {
        (Ok(c), Ok(t), Ok(i), Ok(l)) => (c, t, i, l),
        _ => return Value::Array(Vec::new()),
    };
    let base = profile.base_url.as_deref().and_then(|b| Url::parse(b).ok());

    let mut cards = Vec::new();
    for card in document.select(&card_sel) {
        let Some(title) = card_title(card, &title_sel, &img_sel) else {
            continue;
        };

        let mut item = Map::new();
        item.insert("title".to_string(), Value::String(title));
        if let Some(image) = card_image(card, &img_sel, base.as_ref()) {
            item.insert("image".to_string(), Value::String(image));
        }
        if let Some(url) = card_link(card, &link_sel, base.as_ref()) {
            item.insert("url".to_string(), Value::String(url));
        }
        if let Some(price) = card_price(card, &card_sel) {
            item.insert("price".to_string(), Value::String(price));
        }
        if let Some(id) = ["data-product-id", "data-id", "data-content-id"]
            .iter()
            .find_map(|attr| card.value().attr(attr))
            .filter(|id| !id.trim().is_empty())
        {
            item.insert("id".to_string(), Value::String(id.trim().to_string()));
        }
        item.insert("position".to_string(), Value::from(cards.len() + 1));
        cards.push(Value::Object(item));
    }
    tracing::trace!(selector = selector_str, cards = cards.len(), "selected product cards");
    Value::Array(cards)
}

/// Text nodes of an element, one trimmed line per non-empty node.
fn text_lines(el: ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn card_title(card: ElementRef<'_>, title_sel: &Selector, img_sel: &Selector) -> Option<String> {
    if let Some(text) = card.select(title_sel).find_map(|t| non_empty(&text_lines(t))) {
        return Some(text);
    }
    let el = card.value();
    ["title", "aria-label", "data-title"]
        .iter()
        .find_map(|attr| el.attr(attr).and_then(non_empty))
        .or_else(|| {
            card.select(img_sel)
                .find_map(|img| img.value().attr("alt").and_then(non_empty))
        })
        .or_else(|| non_empty(&text_lines(card)))
}

fn resolve(raw: &str, base: Option<&Url>) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty()
        || raw.starts_with('#')
        || raw.starts_with("data:")
        || raw.starts_with("javascript:")
        || raw.starts_with("mailto:")
    {
        return None;
    }
    if let Some(rest) = raw.strip_prefix("//") {
        return Some(format!("https://{rest}"));
    }
    match Url::parse(raw) {
        Ok(absolute) => Some(absolute.to_string()),
        Err(_) => base?.join(raw).ok().map(|u| u.to_string()),
    }
}

fn card_image(card: ElementRef<'_>, img_sel: &Selector, base: Option<&Url>) -> Option<String> {
    let parent = card.parent().and_then(ElementRef::wrap);
    let img = card
        .select(img_sel)
        .next()
        .or_else(|| parent.and_then(|p| p.select(img_sel).next()))?;
    ["data-src", "data-original", "src"]
        .iter()
        .filter_map(|attr| img.value().attr(attr))
        .find_map(|src| resolve(src, base))
}

fn card_link(card: ElementRef<'_>, link_sel: &Selector, base: Option<&Url>) -> Option<String> {
    let own = (card.value().name() == "a")
        .then(|| card.value().attr("href"))
        .flatten();
    let href = own
        .or_else(|| card.select(link_sel).find_map(|a| a.value().attr("href")))
        .or_else(|| {
            card.ancestors()
                .filter_map(ElementRef::wrap)
                .find(|el| el.value().name() == "a")
                .and_then(|a| a.value().attr("href"))
        })?;
    resolve(href, base)
}

/// Price text in the card, or in a parent that holds no other card.
fn card_price(card: ElementRef<'_>, card_sel: &Selector) -> Option<String> {
    iter::once(card)
        .chain(card.ancestors().filter_map(ElementRef::wrap))
        .take(PRICE_SEARCH_DEPTH + 1)
        .take_while(|el| el.select(card_sel).all(|other| other.id() == card.id()))
        .find_map(|el| {
            let text = el.text().collect::<Vec<_>>().join(" ");
            find_currency_amount(&text).map(str::to_string)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
    <html><body>
      <div class="prdct-cntnr-wrppr">
        <div class="p-card-wrppr" data-id="725">
          <a href="/philips/sac-kurutma-p-725">
            <img data-src="https://cdn.dsmcdn.com/ty/725.jpg" src="data:image/gif;base64,R0l">
            <div class="prdct-desc-cntnr-name">Philips   Saç Kurutma Makinesi</div>
            <div class="prc-box-dscntd">1.299,99 TL</div>
          </a>
        </div>
        <div class="p-card-wrppr" data-id="726">
          <a href="https://www.trendyol.com/arzum/cay-makinesi-p-726">
            <img src="//cdn.dsmcdn.com/ty/726.jpg" alt="Arzum Çay Makinesi">
          </a>
        </div>
        <div class="p-card-wrppr"><span>   </span></div>
      </div>
    </body></html>
    "#;

    #[test]
    fn test_trendyol_cards() {
        let profile = SiteProfile::trendyol();
        let cards = extract_cards(&Html::parse_document(LISTING), &profile);
        let cards = cards.as_array().unwrap();
        assert_eq!(cards.len(), 2);

        let first = &cards[0];
        assert_eq!(first["title"], "Philips   Saç Kurutma Makinesi");
        assert_eq!(first["image"], "https://cdn.dsmcdn.com/ty/725.jpg");
        assert_eq!(first["url"], "https://www.trendyol.com/philips/sac-kurutma-p-725");
        assert_eq!(first["price"], "1.299,99 TL");
        assert_eq!(first["id"], "725");
        assert_eq!(first["position"], 1);

        let second = &cards[1];
        assert_eq!(second["title"], "Arzum Çay Makinesi");
        // the shared container holds the first card's price
        assert!(second.get("price").is_none());
        assert_eq!(second["image"], "https://cdn.dsmcdn.com/ty/726.jpg");
        assert_eq!(second["position"], 2);
    }

    #[test]
    fn test_price_found_in_parent() {
        let html = r#"
        <li class="search-item">
          <div class="info"><span class="price">₺349,90</span></div>
          <a class="tile" href="/urun/termos-123"><h3>Çelik Termos</h3></a>
        </li>
        "#;
        let profile = SiteProfile {
            card_selector: Some("a.tile".to_string()),
            ..SiteProfile::n11()
        };
        let cards = extract_cards(&Html::parse_document(html), &profile);
        assert_eq!(cards[0]["title"], "Çelik Termos");
        assert_eq!(cards[0]["price"], "₺349,90");
        assert_eq!(cards[0]["url"], "https://www.n11.com/urun/termos-123");
    }

    #[test]
    fn test_bad_selector_yields_nothing() {
        let profile = SiteProfile {
            card_selector: Some("div[".to_string()),
            ..SiteProfile::generic()
        };
        let cards = extract_cards(&Html::parse_document(LISTING), &profile);
        assert_eq!(cards, Value::Array(Vec::new()));
    }
}
