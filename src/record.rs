//! The canonical product record and the name handling around it

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A category is sometimes a single label, sometimes a breadcrumb list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Category {
    One(String),
    Many(Vec<String>),
}

/// One normalized product, either fresh from extraction or reconciled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    #[serde(rename = "product_name", alias = "name")]
    pub name: String,
    #[serde(default)]
    pub normalized_name: String,
    pub price: Option<f64>,
    #[serde(alias = "image")]
    pub image_url: Option<String>,
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(alias = "site")]
    pub source: String,
    #[serde(default)]
    pub rank: Option<u32>,
    #[serde(default)]
    pub score: u32,
    #[serde(default = "one")]
    pub count: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_rank: Option<f64>,
}

fn one() -> u32 {
    1
}

impl ProductRecord {
    /// A bare record carrying only a name and its source.
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        let name = name.into();
        let source = source.into();
        let mut record = Self {
            normalized_name: normalize_name(&name),
            name,
            price: None,
            image_url: None,
            url: None,
            id: None,
            category: None,
            sources: vec![source.clone()],
            source,
            rank: None,
            score: 0,
            count: 1,
            avg_rank: None,
        };
        record.score = completeness_score(&record);
        record
    }
}

/// Completeness score: price +3, image +3, detail URL +2, identifier +1,
/// plus one point per ten name characters, capped at 3.
pub fn completeness_score(record: &ProductRecord) -> u32 {
    let mut score = 0;
    if record.price.is_some() {
        score += 3;
    }
    if record.image_url.is_some() {
        score += 3;
    }
    if record.url.is_some() {
        score += 2;
    }
    if record.id.is_some() {
        score += 1;
    }
    let name_chars = record.name.chars().count() as u32;
    score + (name_chars / 10).min(3)
}

/// Merge key for a product name.
///
/// Lower-cases (`İ` becomes plain `i`), drops punctuation, and collapses
/// whitespace. Turkish letters survive untouched.
pub fn normalize_name(name: &str) -> String {
    let mut kept = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_whitespace() {
            kept.push(' ');
        } else if c == 'İ' {
            kept.push('i');
        } else if c.is_alphanumeric() {
            kept.extend(c.to_lowercase());
        }
    }
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

static BADGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\ben\s+çok\s+(satan|sat[ıi]lan|z[iıİ]yaret\s+ed[iıİ]len|değerlend[iıİ]r[iıİ]len|favor[iıİ]lenen)(\s+\d+\.\s*ürün)?",
    )
    .unwrap()
});

static RANK_BADGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bçok\s+satan\s+\d+\.\s*ürün").unwrap());

static QUANTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*\d+\s*adet\b\.?\s*[:\-–—]?\s*").unwrap());

static MULTIPLIER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\d+\s*[xX×]\s+").unwrap());

/// Strip marketplace badge text and quantity prefixes from a scraped title.
///
/// Product tiles often render as several lines (brand, badge, title); the
/// longest line that is not just a short brand token is kept. Never returns
/// an empty string for a non-empty input.
pub fn clean_title(raw: &str) -> String {
    let without_badges = BADGE_RE.replace_all(raw, "");
    let without_badges = RANK_BADGE_RE.replace_all(&without_badges, "");

    let lines: Vec<&str> = without_badges
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let meaningful: Vec<&str> = lines
        .iter()
        .copied()
        .filter(|l| l.chars().count() > 8 || l.split_whitespace().count() > 1)
        .collect();
    let pool = if meaningful.is_empty() { &lines } else { &meaningful };
    let chosen = pool
        .iter()
        .copied()
        .fold("", |best, l| if l.chars().count() > best.chars().count() { l } else { best });

    let chosen = QUANTITY_RE.replace(chosen, "");
    let chosen = MULTIPLIER_RE.replace(&chosen, "");
    let chosen = chosen.split_whitespace().collect::<Vec<_>>().join(" ");

    if chosen.is_empty() {
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    } else {
        chosen
    }
}
