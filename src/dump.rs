//! On-disk inputs and outputs
//!
//! Capture dumps are either raw JSON, JSON wrapped as `{"url": ..., "json": ...}`
//! by the capture scripts, or saved HTML pages. Ranked output files are JSON
//! arrays of products; readers accept the key variants older writers used.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::{ParserError, Result};
use crate::extractors::{looks_like_html, page_to_node};
use crate::node::{get_key, RawNode};
use crate::price::{find_currency_amount, price_from_scalar};
use crate::profile::{PriceBounds, ProfileSet};
use crate::record::{completeness_score, normalize_name, Category, ProductRecord};

/// One captured page or XHR response.
#[derive(Debug, Clone)]
pub struct Dump {
    pub path: PathBuf,
    /// Request URL from the capture envelope, when there was one.
    pub url: Option<String>,
    /// Detected site profile name.
    pub site: Option<String>,
    pub node: RawNode,
}

/// Read a capture file. HTML pages are converted with the site's profile;
/// JSON envelopes are unwrapped.
///
/// `site` forces the site instead of detecting it.
pub fn load_dump(path: &Path, profiles: &ProfileSet, site: Option<&str>) -> Result<Dump> {
    let text = fs::read_to_string(path)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let forced = site.map(|s| profiles.resolve(s).name.clone());

    if looks_like_html(&text) {
        let site = forced.or_else(|| {
            detect_site(&file_name, None, &Value::String(text.clone()), profiles)
        });
        let profile = profiles.resolve(site.as_deref().unwrap_or_default());
        let node = page_to_node(&text, profile);
        return Ok(Dump {
            path: path.to_path_buf(),
            url: None,
            site,
            node,
        });
    }

    let value: Value = serde_json::from_str(text.trim_start_matches('\u{feff}'))?;
    let (url, node) = unwrap_envelope(value);
    let site = forced.or_else(|| detect_site(&file_name, url.as_deref(), &node, profiles));
    tracing::debug!(path = %path.display(), site = ?site, url = ?url, "loaded dump");
    Ok(Dump {
        path: path.to_path_buf(),
        url,
        site,
        node,
    })
}

/// Split `{"url": ..., "json": ...}` into its parts. Anything else is
/// returned as-is with no URL. A `json` field holding a string is parsed.
fn unwrap_envelope(value: Value) -> (Option<String>, RawNode) {
    let Value::Object(mut obj) = value else {
        return (None, value);
    };
    if !obj.contains_key("json") {
        return (None, Value::Object(obj));
    }
    let url = obj.remove("url").and_then(|u| u.as_str().map(str::to_string));
    let node = match obj.remove("json") {
        Some(Value::String(inner)) => serde_json::from_str(&inner).unwrap_or(Value::String(inner)),
        Some(inner) => inner,
        None => Value::Null,
    };
    (url, node)
}

/// Which site a dump belongs to: by file name, then envelope URL, then the
/// site whose domains the content mentions most.
pub fn detect_site(
    file_name: &str,
    url: Option<&str>,
    node: &RawNode,
    profiles: &ProfileSet,
) -> Option<String> {
    let lower_name = file_name.to_lowercase();
    if let Some(p) = profiles
        .sites()
        .find(|p| lower_name.contains(&p.name.to_lowercase()))
    {
        return Some(p.name.clone());
    }
    if let Some(url) = url {
        if let Some(p) = profiles.sites().find(|p| p.mentions_domain(url)) {
            return Some(p.name.clone());
        }
    }

    let content = match node {
        Value::String(s) => s.to_ascii_lowercase(),
        other => serde_json::to_string(other).ok()?.to_ascii_lowercase(),
    };
    profiles
        .sites()
        .map(|p| {
            let hits: usize = p
                .domains
                .iter()
                .map(|d| content.matches(&d.to_ascii_lowercase()).count())
                .sum();
            (hits, p)
        })
        .filter(|(hits, _)| *hits > 0)
        .fold(None, |best: Option<(usize, &_)>, (hits, p)| match best {
            Some((top, _)) if top >= hits => best,
            _ => Some((hits, p)),
        })
        .map(|(_, p)| p.name.clone())
}

fn first_str(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| {
        get_key(map, k)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

fn positive_u32(value: Option<&Value>) -> Option<u32> {
    let n = match value? {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    u32::try_from(n).ok().filter(|n| *n > 0)
}

/// Read a ranked output file written by this crate or an older writer.
///
/// Accepts a bare array or an object holding `items`, `products` or
/// `products_list`. Entries without a name are skipped; missing ranks
/// become the entry's 1-based position.
pub fn load_ranked_items(path: &Path, default_source: &str) -> Result<Vec<ProductRecord>> {
    let text = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(text.trim_start_matches('\u{feff}'))?;
    let entries = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => ["items", "products", "products_list"]
            .iter()
            .find_map(|k| match obj.remove(*k) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .ok_or_else(|| {
                ParserError::InvalidInput(format!("{}: no product list found", path.display()))
            })?,
        _ => {
            return Err(ParserError::InvalidInput(format!(
                "{}: expected a JSON array or object",
                path.display()
            )))
        }
    };

    let bounds = PriceBounds::default();
    let mut records = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let Value::Object(map) = entry else {
            continue;
        };
        let Some(name) = first_str(map, &["product_name", "name", "title"]) else {
            continue;
        };
        let normalized_name = normalize_name(&name);
        if normalized_name.is_empty() {
            continue;
        }

        let price = get_key(map, "price")
            .and_then(|p| price_from_scalar(p, &bounds))
            .or_else(|| {
                find_currency_amount(&name).and_then(|t| price_from_scalar(&Value::from(t), &bounds))
            });
        let source = first_str(map, &["source", "site", "marketplace"])
            .unwrap_or_else(|| default_source.to_string())
            .to_lowercase();
        let sources = get_key(map, "sources")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_lowercase)
                    .collect::<Vec<_>>()
            })
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| vec![source.clone()]);
        let id = match get_key(map, "id") {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        let mut record = ProductRecord {
            name,
            normalized_name,
            price,
            image_url: first_str(map, &["image_url", "image"]),
            url: first_str(map, &["url", "link"]),
            id,
            category: get_key(map, "category")
                .and_then(|c| serde_json::from_value::<Category>(c.clone()).ok()),
            source,
            rank: positive_u32(get_key(map, "rank")).or(u32::try_from(i + 1).ok()),
            score: 0,
            count: positive_u32(get_key(map, "count")).unwrap_or(1),
            sources,
            avg_rank: get_key(map, "avg_rank")
                .and_then(Value::as_f64)
                .filter(|r| r.is_finite() && *r > 0.0),
        };
        record.score = completeness_score(&record);
        records.push(record);
    }
    tracing::debug!(path = %path.display(), records = records.len(), "loaded ranked items");
    Ok(records)
}

/// Write records as a pretty-printed JSON array, creating parent directories.
pub fn write_ranked_items(path: &Path, records: &[ProductRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(records)?;
    fs::write(path, json)?;
    tracing::info!(path = %path.display(), records = records.len(), "wrote ranked items");
    Ok(())
}
