//! Price text parsing for Turkish and international number formats
//!
//! `"1.234,56 TL"` and `"1,234.56"` both parse to `1234.56`. Strings that
//! look like dates or identifiers are rejected outright so a timestamp is
//! never read as a price.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::profile::PriceBounds;

static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d[\d.,]*").unwrap());

static CURRENCY_AMOUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)₺\s*\d[\d.,]*|\d[\d.,]*\s*(?:tl\b|try\b|₺)").unwrap()
});

static ISO_DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\d{4}-\d{2}-\d{2}").unwrap());

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").unwrap()
});

/// Starts with an ISO-8601 date (`2024-01-01`, `2024-01-01T10:00:00Z`).
pub fn is_iso_date(text: &str) -> bool {
    ISO_DATE_RE.is_match(text)
}

/// Canonical 8-4-4-4-12 hex UUID, ignoring surrounding whitespace.
pub fn is_uuid(text: &str) -> bool {
    UUID_RE.is_match(text.trim())
}

/// A `-` or `−` directly before `start` that is not joining two words
/// (`-50 TL` is negative, `X-2` is a model name).
fn has_minus_sign(text: &str, start: usize) -> bool {
    let mut before = text[..start].chars().rev();
    match before.next() {
        Some('-' | '\u{2212}') => !before.next().is_some_and(char::is_alphanumeric),
        _ => false,
    }
}

/// Parse the first number in `text`, ignoring bounds.
///
/// Separator rules: with both `,` and `.` present the rightmost one is the
/// decimal point; a single `,` followed by one or two digits is a decimal
/// comma; otherwise every separator is thousands grouping. A negative
/// number is a failure, never its absolute value.
pub fn parse_number_text(text: &str) -> Option<f64> {
    if is_iso_date(text) || is_uuid(text) {
        return None;
    }
    let found = NUMBER_RE.find(text)?;
    if has_minus_sign(text, found.start()) {
        return None;
    }
    let raw = found.as_str();
    let raw = raw.trim_end_matches(['.', ',']);

    let normalized = match (raw.rfind(','), raw.rfind('.')) {
        (Some(comma), Some(dot)) => {
            if comma > dot {
                raw.replace('.', "").replace(',', ".")
            } else {
                raw.replace(',', "")
            }
        }
        (Some(comma), None) => {
            let decimals = raw.len() - comma - 1;
            if raw.matches(',').count() == 1 && (1..=2).contains(&decimals) {
                raw.replace(',', ".")
            } else {
                raw.replace(',', "")
            }
        }
        (None, Some(_)) => raw.replace('.', ""),
        (None, None) => raw.to_string(),
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// First amount in `text` written with a lira marker (`499,90 TL`, `₺1.299`).
pub fn find_currency_amount(text: &str) -> Option<&str> {
    CURRENCY_AMOUNT_RE.find(text).map(|m| m.as_str().trim())
}

/// Parse a price string and keep it only if it falls within `bounds`.
pub fn parse_price_text(text: &str, bounds: &PriceBounds) -> Option<f64> {
    parse_number_text(text).filter(|v| bounds.contains(*v))
}

/// Interpret a scalar as a price: numbers are range-checked, strings parsed.
pub fn price_from_scalar(value: &Value, bounds: &PriceBounds) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| bounds.contains(*v)),
        Value::String(s) => parse_price_text(s, bounds),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(text: &str) -> Option<f64> {
        parse_price_text(text, &PriceBounds::default())
    }

    #[test]
    fn test_turkish_format() {
        assert_eq!(parse("1.234,56 TL"), Some(1234.56));
        assert_eq!(parse("₺12.499,90"), Some(12499.90));
        assert_eq!(parse("49,9 TL"), Some(49.9));
    }

    #[test]
    fn test_international_format() {
        assert_eq!(parse("1,234.56"), Some(1234.56));
        assert_eq!(parse("$2,500,000.00"), None); // over the default bound
    }

    #[test]
    fn test_plain_and_grouped_integers() {
        assert_eq!(parse("999"), Some(999.0));
        assert_eq!(parse("1.299 TL"), Some(1299.0));
        assert_eq!(parse("1,299"), Some(1299.0));
        assert_eq!(parse("12.345.678"), None);
    }

    #[test]
    fn test_trailing_separator_ignored() {
        assert_eq!(parse("En çok satan 3. ürün"), Some(3.0));
        assert_eq!(parse("499, indirimli"), Some(499.0));
    }

    #[test]
    fn test_dates_and_ids_rejected() {
        assert_eq!(parse("2024-01-01"), None);
        assert_eq!(parse("2024-01-01T10:00:00Z"), None);
        assert_eq!(parse("550e8400-e29b-41d4-a716-446655440000"), None);
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        assert_eq!(parse("0"), None);
        assert_eq!(parse("0,50"), None);
        assert_eq!(parse("no digits here"), None);
    }

    #[test]
    fn test_negative_amounts_rejected() {
        assert_eq!(parse("-50 TL"), None);
        assert_eq!(parse("\u{2212}1.299,00 TL"), None);
        assert_eq!(parse("İndirim: -250,00 TL"), None);
        assert_eq!(parse("100-200 TL"), Some(100.0));
        assert_eq!(parse("Kulaklık X-2"), Some(2.0));
    }

    #[test]
    fn test_find_currency_amount() {
        assert_eq!(find_currency_amount("Sepette 1.299,99 TL'den başlayan"), Some("1.299,99 TL"));
        assert_eq!(find_currency_amount("Fiyat: ₺349,90"), Some("₺349,90"));
        assert_eq!(find_currency_amount("3 adet 250 gr"), None);
    }

    #[test]
    fn test_scalar_values() {
        let bounds = PriceBounds::default();
        assert_eq!(price_from_scalar(&json!(499), &bounds), Some(499.0));
        assert_eq!(price_from_scalar(&json!(-5), &bounds), None);
        assert_eq!(price_from_scalar(&json!("499 TL"), &bounds), Some(499.0));
        assert_eq!(price_from_scalar(&json!(true), &bounds), None);
    }
}
