//! Locator + Field Extractor over one raw node

use std::collections::HashSet;

use crate::fields::FieldExtractor;
use crate::locator::locate;
use crate::node::RawNode;
use crate::profile::{ProfileSet, SiteProfile, Strictness};
use crate::record::{completeness_score, normalize_name, ProductRecord};

/// Extract product records from `raw` using the built-in profile for `source`.
///
/// Unknown sources use the generic profile. Same input, same output: the
/// call holds no state between invocations.
pub fn extract_records(raw: &RawNode, source: &str, strictness: Strictness) -> Vec<ProductRecord> {
    let profile = ProfileSet::shared().resolve(source);
    extract_records_with(raw, source, profile, strictness)
}

/// Extract product records from `raw` with an explicit profile.
///
/// Records without a usable name are dropped. Within one call, a record
/// repeating an earlier (normalized name, url) pair is dropped too, so a
/// product listed twice in the same payload counts once.
pub fn extract_records_with(
    raw: &RawNode,
    source: &str,
    profile: &SiteProfile,
    strictness: Strictness,
) -> Vec<ProductRecord> {
    let fields = FieldExtractor::new(profile);
    let strict_images = strictness == Strictness::Strict;

    let mut seen: HashSet<(String, Option<String>)> = HashSet::new();
    let mut records = Vec::new();

    for candidate in locate(raw, &fields, strictness) {
        let Some(name) = fields.name(candidate) else {
            continue;
        };
        let normalized_name = normalize_name(&name);
        if normalized_name.is_empty() {
            continue;
        }
        let url = fields.url(candidate);
        if !seen.insert((normalized_name.clone(), url.clone())) {
            continue;
        }

        let position = records.len() as u32 + 1;
        let mut record = ProductRecord {
            name,
            normalized_name,
            price: fields.price(candidate),
            image_url: fields.image(candidate, strict_images),
            url,
            id: fields.id(candidate),
            category: fields.category(candidate),
            source: source.to_string(),
            rank: Some(fields.rank(candidate).unwrap_or(position)),
            score: 0,
            count: 1,
            sources: vec![source.to_string()],
            avg_rank: None,
        };
        record.score = completeness_score(&record);
        records.push(record);
    }

    tracing::debug!(
        source,
        profile = %profile.name,
        %strictness,
        records = records.len(),
        "extracted records"
    );
    records
}
