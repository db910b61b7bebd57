//! Field extraction from a candidate mapping
//!
//! Each field is resolved the same way: walk the profile's ordered key list
//! and take the first value that passes the field's shape check, then fall
//! back to scanning the candidate's leaves. Nothing here fails; a field that
//! cannot be found is `None`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use url::Url;

use crate::node::{get_key, leaves, map_leaves, map_string_leaves, string_leaves, RawMap};
use crate::price::{is_iso_date, is_uuid, price_from_scalar};
use crate::profile::SiteProfile;
use crate::record::{clean_title, Category};

static IMAGE_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^https?://[\w.-]+(:\d+)?/\S*\.(jpe?g|png|webp)([?#]\S*)?$").unwrap()
});

static NUMERIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\d\s.,:/+-]+$").unwrap());

/// Shortest accepted name, in characters.
const MIN_NAME_CHARS: usize = 4;

/// Absolute http(s) URL pointing at a jpg/jpeg/png/webp file.
pub fn is_image_url(text: &str) -> bool {
    IMAGE_URL_RE.is_match(text.trim())
}

fn is_bare_url(text: &str) -> bool {
    let t = text.trim_start();
    t.starts_with("http://") || t.starts_with("https://") || t.starts_with("//") || t.starts_with("www.")
}

/// Absolute URL or site-relative path; digits inside these are never prices.
fn is_url_like(text: &str) -> bool {
    is_bare_url(text) || text.trim_start().starts_with('/')
}

fn long_enough(name: String) -> Option<String> {
    (name.chars().count() >= MIN_NAME_CHARS).then_some(name)
}

/// Field extractor bound to one site profile.
///
/// Compiles the profile's product-path patterns once; reuse it for every
/// candidate in a run.
pub struct FieldExtractor<'p> {
    profile: &'p SiteProfile,
    product_paths: Vec<Regex>,
    base_url: Option<Url>,
}

impl<'p> FieldExtractor<'p> {
    pub fn new(profile: &'p SiteProfile) -> Self {
        // Invalid patterns are caught by `SiteProfile::validate`; anything
        // that slipped through just never matches.
        let product_paths = profile
            .product_paths
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();
        let base_url = profile.base_url.as_deref().and_then(|b| Url::parse(b).ok());
        Self {
            profile,
            product_paths,
            base_url,
        }
    }

    pub fn profile(&self) -> &SiteProfile {
        self.profile
    }

    /// Product title: first name key whose cleaned text has more than three
    /// characters, else the longest plausible string leaf after cleaning.
    pub fn name(&self, node: &RawMap) -> Option<String> {
        self.name_from_keys(node)
            .or_else(|| self.name_from_leaves(node))
    }

    fn name_from_keys(&self, node: &RawMap) -> Option<String> {
        self.profile.keys.name.iter().find_map(|key| {
            let text = get_key(node, key)?.as_str()?;
            long_enough(clean_title(text))
        })
    }

    fn name_from_leaves(&self, node: &RawMap) -> Option<String> {
        map_string_leaves(node)
            .map(str::trim)
            .filter(|s| !is_bare_url(s) && !NUMERIC_RE.is_match(s))
            .filter(|s| !is_uuid(s) && !is_iso_date(s))
            .filter_map(|s| long_enough(clean_title(s)))
            .fold(None, |best: Option<String>, s| match best {
                Some(b) if b.chars().count() >= s.chars().count() => Some(b),
                _ => Some(s),
            })
    }

    /// Price within the profile's bounds, from a price key or any leaf.
    pub fn price(&self, node: &RawMap) -> Option<f64> {
        let bounds = &self.profile.price_bounds;
        let from_keys = self.profile.keys.price.iter().find_map(|key| {
            let value = get_key(node, key)?;
            match value {
                Value::Object(_) | Value::Array(_) => {
                    leaves(value).find_map(|leaf| price_from_scalar(leaf, bounds))
                }
                scalar => price_from_scalar(scalar, bounds),
            }
        });
        from_keys.or_else(|| {
            map_leaves(node)
                .filter(|leaf| !leaf.as_str().is_some_and(is_url_like))
                .find_map(|leaf| price_from_scalar(leaf, bounds))
        })
    }

    /// Image URL. With `strict`, the host must be on the profile's CDN list.
    pub fn image(&self, node: &RawMap, strict: bool) -> Option<String> {
        let accept = |s: &str| is_image_url(s) && (!strict || self.allowed_image_host(s));

        let from_keys = self.profile.keys.image.iter().find_map(|key| {
            string_leaves(get_key(node, key)?).find(|&s| accept(s))
        });
        from_keys
            .or_else(|| map_string_leaves(node).find(|&s| accept(s)))
            .map(|s| s.trim().to_string())
    }

    fn allowed_image_host(&self, text: &str) -> bool {
        let Ok(parsed) = Url::parse(text.trim()) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        self.profile.image_hosts.iter().any(|allowed| {
            let allowed = allowed.to_ascii_lowercase();
            host == allowed || host.ends_with(&format!(".{allowed}"))
        })
    }

    /// Detail-page URL found anywhere under the candidate.
    ///
    /// Detail URLs are rarely stored under a predictable key, so this only
    /// scans string leaves.
    pub fn url(&self, node: &RawMap) -> Option<String> {
        map_string_leaves(node).find_map(|s| self.detail_url(s))
    }

    /// Resolve `text` to an absolute detail URL if it looks like one.
    pub fn detail_url(&self, text: &str) -> Option<String> {
        let text = text.trim();
        if text.is_empty() || text.len() > self.profile.max_url_len || is_image_url(text) {
            return None;
        }
        let path_match = self.product_paths.iter().any(|re| re.is_match(text));

        if let Ok(absolute) = Url::parse(text) {
            if !matches!(absolute.scheme(), "http" | "https") {
                return None;
            }
            return (self.profile.mentions_domain(text) || path_match).then(|| absolute.to_string());
        }

        if !path_match || text.contains(char::is_whitespace) {
            return None;
        }
        let base = self.base_url.as_ref()?;
        let joined = if text.starts_with("//") {
            Url::parse(&format!("{}:{}", base.scheme(), text)).ok()?
        } else {
            base.join(text).ok()?
        };
        Some(joined.to_string())
    }

    /// Identifier from the id keys, stringified.
    pub fn id(&self, node: &RawMap) -> Option<String> {
        self.profile
            .keys
            .id
            .iter()
            .find_map(|key| match get_key(node, key)? {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
    }

    pub fn category(&self, node: &RawMap) -> Option<Category> {
        self.profile
            .keys
            .category
            .iter()
            .find_map(|key| match get_key(node, key)? {
                Value::String(s) if !s.trim().is_empty() => Some(Category::One(s.trim().to_string())),
                Value::Array(items) => {
                    let labels: Vec<String> = items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect();
                    (!labels.is_empty()).then_some(Category::Many(labels))
                }
                Value::Object(inner) => inner
                    .get("name")
                    .and_then(Value::as_str)
                    .filter(|s| !s.trim().is_empty())
                    .map(|s| Category::One(s.trim().to_string())),
                _ => None,
            })
    }

    /// Position the source itself reports, if any.
    pub fn rank(&self, node: &RawMap) -> Option<u32> {
        self.profile
            .keys
            .rank
            .iter()
            .find_map(|key| match get_key(node, key)? {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.trim().parse::<u64>().ok(),
                _ => None,
            })
            .filter(|r| *r > 0)
            .and_then(|r| u32::try_from(r).ok())
    }
}
