//! Per-site heuristics as data
//!
//! Everything that differs between marketplaces (which keys hold a title,
//! which hosts serve product images, what a detail-page path looks like)
//! lives in a [`SiteProfile`]. Adding a site means adding a profile, not a
//! code path. Profiles can be loaded from TOML or JSON files; any field a
//! file omits falls back to the generic defaults.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::error::{ParserError, Result};

/// How many corroborating signals the locator wants before emitting a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Name-like key plus any secondary signal.
    Loose,
    /// Loose, minus anything that trips the denylist.
    #[default]
    Standard,
    /// Name, allow-listed image and price all resolved, and no denylist hit.
    Strict,
}

impl FromStr for Strictness {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "loose" => Ok(Self::Loose),
            "standard" | "tight" | "tighter" => Ok(Self::Standard),
            "strict" => Ok(Self::Strict),
            other => Err(format!(
                "unknown strictness '{other}' (expected loose, standard or strict)"
            )),
        }
    }
}

impl fmt::Display for Strictness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Loose => "loose",
            Self::Standard => "standard",
            Self::Strict => "strict",
        };
        f.write_str(s)
    }
}

/// Ordered key-preference lists, one per field. Earlier keys win.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeySets {
    pub name: Vec<String>,
    pub price: Vec<String>,
    pub image: Vec<String>,
    pub id: Vec<String>,
    pub category: Vec<String>,
    pub rank: Vec<String>,
}

impl Default for KeySets {
    fn default() -> Self {
        Self {
            name: strings(&[
                "name",
                "title",
                "productName",
                "product_name",
                "displayName",
                "productTitle",
                "titleText",
                "title_tr",
                "urun_adi",
                "baslik",
                "ad",
                "label",
            ]),
            price: strings(&[
                "price",
                "salePrice",
                "sellingPrice",
                "discountedPrice",
                "currentPrice",
                "priceValue",
                "originalPrice",
                "listPrice",
                "priceText",
                "price_text",
                "price_display",
                "price_str",
                "fiyat",
                "amount",
                "offers",
            ]),
            image: strings(&[
                "image",
                "imageUrl",
                "image_url",
                "images",
                "mainImage",
                "thumbnail",
                "thumbnailUrl",
                "img",
                "picture",
            ]),
            id: strings(&["id", "productId", "product_id", "contentId", "sku", "pid", "itemId"]),
            category: strings(&["category", "categoryName", "kategori", "cat"]),
            rank: strings(&["rank", "position", "sira"]),
        }
    }
}

/// Accepted numeric range for a price, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceBounds {
    pub min: f64,
    pub max: f64,
}

impl Default for PriceBounds {
    fn default() -> Self {
        Self {
            min: 1.0,
            max: 1_000_000.0,
        }
    }
}

impl PriceBounds {
    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }
}

/// Heuristic configuration for one marketplace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    pub name: String,
    /// Domains whose URLs count as detail pages (substring match).
    pub domains: Vec<String>,
    /// Base used to resolve relative product paths.
    pub base_url: Option<String>,
    /// Regexes matched against URL-ish strings to spot detail pages.
    pub product_paths: Vec<String>,
    /// CDN hosts accepted for images in strict mode.
    pub image_hosts: Vec<String>,
    /// Substrings that disqualify a candidate (cookie banners, tracking).
    pub denylist: Vec<String>,
    pub keys: KeySets,
    pub price_bounds: PriceBounds,
    /// CSS selector for product tiles when the input is an HTML page.
    pub card_selector: Option<String>,
    /// Strings longer than this are never taken as detail URLs.
    pub max_url_len: usize,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            name: "generic".to_string(),
            domains: Vec::new(),
            base_url: None,
            product_paths: strings(&["/p/"]),
            image_hosts: Vec::new(),
            denylist: default_denylist(),
            keys: KeySets::default(),
            price_bounds: PriceBounds::default(),
            card_selector: None,
            max_url_len: 500,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_denylist() -> Vec<String> {
    strings(&[
        "cookielaw.org",
        "otPc",
        "otFlat",
        "otPcCenter",
        "consent",
        "vendorlist",
        "datalayer",
        "googleData.json",
    ])
}

impl SiteProfile {
    pub fn generic() -> Self {
        Self::default()
    }

    pub fn trendyol() -> Self {
        let mut denylist = default_denylist();
        denylist.push("apigw.trendyol.com/discovery-mweb-accountgw-service".to_string());
        Self {
            name: "trendyol".to_string(),
            domains: strings(&["trendyol.com"]),
            base_url: Some("https://www.trendyol.com".to_string()),
            product_paths: strings(&[r"-p-\d+", "/p/"]),
            image_hosts: strings(&[
                "cdn.dsmcdn.com",
                "cdn.trendyol.com",
                "productimages.trendyol.com",
                "trendyol-res.cloudinary.com",
                "trendyol.com",
            ]),
            denylist,
            card_selector: Some("div.p-card-wrppr, [data-id]".to_string()),
            ..Self::default()
        }
    }

    pub fn hepsiburada() -> Self {
        Self {
            name: "hepsiburada".to_string(),
            domains: strings(&["hepsiburada.com"]),
            base_url: Some("https://www.hepsiburada.com".to_string()),
            product_paths: strings(&[r"-p-[A-Za-z0-9]+", "/p/"]),
            image_hosts: strings(&["productimages.hepsiburada.net", "images.hepsiburada.net"]),
            card_selector: Some("a[href*='-p-']".to_string()),
            ..Self::default()
        }
    }

    pub fn n11() -> Self {
        Self {
            name: "n11".to_string(),
            domains: strings(&["n11.com"]),
            base_url: Some("https://www.n11.com".to_string()),
            product_paths: strings(&["/urun/", "/urun-", "/product"]),
            image_hosts: strings(&["n11scdn.akamaized.net", "n11scdn1.akamaized.net"]),
            card_selector: Some("[data-product-id]".to_string()),
            ..Self::default()
        }
    }

    pub fn amazon() -> Self {
        Self {
            name: "amazon".to_string(),
            domains: strings(&["amazon.com.tr"]),
            base_url: Some("https://www.amazon.com.tr".to_string()),
            product_paths: strings(&[r"/dp/[A-Z0-9]{10}", "/gp/product/"]),
            image_hosts: strings(&["m.media-amazon.com", "images-eu.ssl-images-amazon.com"]),
            card_selector: Some("a[href*='/dp/']".to_string()),
            ..Self::default()
        }
    }

    /// Check everything that would otherwise fail silently at match time.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| ParserError::InvalidProfile {
            site: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("profile name is empty".to_string()));
        }
        if !self.price_bounds.min.is_finite()
            || !self.price_bounds.max.is_finite()
            || self.price_bounds.min <= 0.0
            || self.price_bounds.min > self.price_bounds.max
        {
            return Err(invalid(format!(
                "price bounds {}..{} are not a positive range",
                self.price_bounds.min, self.price_bounds.max
            )));
        }
        for pattern in &self.product_paths {
            Regex::new(pattern)
                .map_err(|e| invalid(format!("bad product path pattern '{pattern}': {e}")))?;
        }
        if let Some(selector) = &self.card_selector {
            Selector::parse(selector)
                .map_err(|e| invalid(format!("bad card selector '{selector}': {e:?}")))?;
        }
        if let Some(base) = &self.base_url {
            url::Url::parse(base).map_err(|e| invalid(format!("bad base url '{base}': {e}")))?;
        }
        Ok(())
    }

    /// Does `text` mention one of this site's domains?
    pub fn mentions_domain(&self, text: &str) -> bool {
        let low = text.to_ascii_lowercase();
        self.domains
            .iter()
            .any(|d| low.contains(&d.to_ascii_lowercase()))
    }
}

/// Shape of a profile file: `[[site]]` tables in TOML, `{"site": [...]}` in JSON.
#[derive(Debug, Default, Deserialize)]
struct ProfileFile {
    #[serde(default)]
    site: Vec<SiteProfile>,
}

/// Named collection of site profiles with a generic fallback.
#[derive(Debug, Clone)]
pub struct ProfileSet {
    profiles: Vec<SiteProfile>,
    fallback: SiteProfile,
}

static BUILTIN: Lazy<ProfileSet> = Lazy::new(ProfileSet::builtin);

impl ProfileSet {
    pub fn builtin() -> Self {
        Self {
            profiles: vec![
                SiteProfile::trendyol(),
                SiteProfile::hepsiburada(),
                SiteProfile::n11(),
                SiteProfile::amazon(),
            ],
            fallback: SiteProfile::generic(),
        }
    }

    /// Shared built-in set, used by [`crate::extract_records`].
    pub fn shared() -> &'static ProfileSet {
        &BUILTIN
    }

    /// Built-ins overlaid with the profiles in `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let file: ProfileFile = if is_json {
            serde_json::from_str(&text)?
        } else {
            toml::from_str(&text)?
        };

        let mut set = Self::builtin();
        for profile in file.site {
            set.insert(profile)?;
        }
        tracing::debug!(path = %path.display(), sites = set.profiles.len(), "loaded site profiles");
        Ok(set)
    }

    /// Add a profile, replacing any existing profile with the same name.
    pub fn insert(&mut self, profile: SiteProfile) -> Result<()> {
        profile.validate()?;
        if profile.name.eq_ignore_ascii_case(&self.fallback.name) {
            self.fallback = profile;
            return Ok(());
        }
        match self
            .profiles
            .iter_mut()
            .find(|p| p.name.eq_ignore_ascii_case(&profile.name))
        {
            Some(existing) => *existing = profile,
            None => self.profiles.push(profile),
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&SiteProfile> {
        let name = name.trim();
        if name.eq_ignore_ascii_case(&self.fallback.name) {
            return Some(&self.fallback);
        }
        self.profiles
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Like [`ProfileSet::get`] but an unknown name yields the generic profile.
    pub fn resolve(&self, name: &str) -> &SiteProfile {
        self.get(name).unwrap_or(&self.fallback)
    }

    /// Site-specific profiles, excluding the generic fallback.
    pub fn sites(&self) -> impl Iterator<Item = &SiteProfile> {
        self.profiles.iter()
    }
}

impl Default for ProfileSet {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_profiles_validate() {
        let set = ProfileSet::builtin();
        for profile in set.sites() {
            profile.validate().unwrap();
        }
        SiteProfile::generic().validate().unwrap();
    }

    #[test]
    fn test_resolve_falls_back_to_generic() {
        let set = ProfileSet::builtin();
        assert_eq!(set.resolve("Trendyol").name, "trendyol");
        assert_eq!(set.resolve("unknown-shop").name, "generic");
        assert!(set.get("unknown-shop").is_none());
    }

    #[test]
    fn test_strictness_from_str() {
        assert_eq!("STRICT".parse::<Strictness>(), Ok(Strictness::Strict));
        assert_eq!("tighter".parse::<Strictness>(), Ok(Strictness::Standard));
        assert!("medium".parse::<Strictness>().is_err());
        assert_eq!(Strictness::Loose.to_string(), "loose");
    }

    #[test]
    fn test_load_toml_overlays_builtins() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[[site]]
name = "ciceksepeti"
domains = ["ciceksepeti.com"]
product_paths = ["-kcm\\d+"]

[[site]]
name = "trendyol"
domains = ["trendyol.com"]
image_hosts = ["cdn.dsmcdn.com"]

[site.price_bounds]
min = 5.0
max = 50000.0
"#
        )
        .unwrap();

        let set = ProfileSet::load(file.path()).unwrap();

        let custom = set.get("ciceksepeti").unwrap();
        assert_eq!(custom.domains, vec!["ciceksepeti.com".to_string()]);
        // omitted fields use generic defaults
        assert_eq!(custom.keys, KeySets::default());
        assert_eq!(custom.max_url_len, 500);

        let trendyol = set.get("trendyol").unwrap();
        assert_eq!(trendyol.image_hosts, vec!["cdn.dsmcdn.com".to_string()]);
        assert_eq!(trendyol.price_bounds.min, 5.0);
        assert!(set.get("n11").is_some());
    }

    #[test]
    fn test_load_rejects_bad_pattern() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"site": [{{"name": "broken", "product_paths": ["(unclosed"]}}]}}"#).unwrap();

        let err = ProfileSet::load(file.path()).unwrap_err();
        assert!(matches!(err, ParserError::InvalidProfile { .. }));
    }

    #[test]
    fn test_inverted_price_bounds_rejected() {
        let profile = SiteProfile {
            price_bounds: PriceBounds { min: 10.0, max: 1.0 },
            ..SiteProfile::generic()
        };
        assert!(profile.validate().is_err());
    }
}
