//! Reconciler: merge records across sources, score, rank and cap
//!
//! Aggregates are keyed by normalized name and live only for the duration
//! of one [`reconcile`] call. Re-running the reconciler over the union of
//! several per-site outputs is how multi-site lists are built; counts and
//! average ranks stay additive across that second pass.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::record::{completeness_score, normalize_name, Category, ProductRecord};

/// In-progress accumulator for one normalized name.
#[derive(Debug)]
struct Aggregate {
    name: String,
    normalized_name: String,
    first_price: Option<f64>,
    price_samples: Vec<f64>,
    image_url: Option<String>,
    url: Option<String>,
    id: Option<String>,
    category: Option<Category>,
    source: String,
    sources: Vec<String>,
    count: u32,
    rank_sum: f64,
    rank_weight: u32,
}

impl Aggregate {
    fn seed(source: String, record: ProductRecord, normalized_name: String) -> Self {
        let mut agg = Self {
            name: record.name.clone(),
            normalized_name,
            first_price: None,
            price_samples: Vec::new(),
            image_url: None,
            url: None,
            id: None,
            category: None,
            source: if record.source.is_empty() {
                source.clone()
            } else {
                record.source.clone()
            },
            sources: Vec::new(),
            count: 0,
            rank_sum: 0.0,
            rank_weight: 0,
        };
        agg.absorb(source, record);
        agg
    }

    fn absorb(&mut self, source: String, record: ProductRecord) {
        let weight = record.count.max(1);
        self.count += weight;

        if let Some(price) = record.price.filter(|p| p.is_finite()) {
            self.first_price.get_or_insert(price);
            self.price_samples.push(price);
        }
        if self.image_url.is_none() {
            self.image_url = record.image_url;
        }
        if self.url.is_none() {
            self.url = record.url;
        }
        if self.id.is_none() {
            self.id = record.id;
        }
        if self.category.is_none() {
            self.category = record.category;
        }

        let observed = record.avg_rank.or(record.rank.map(f64::from));
        if let Some(rank) = observed.filter(|r| r.is_finite() && *r > 0.0) {
            self.rank_sum += rank * f64::from(weight);
            self.rank_weight += weight;
        }

        let incoming = if record.sources.is_empty() {
            vec![source]
        } else {
            record.sources
        };
        for s in incoming {
            if !s.is_empty() && !self.sources.contains(&s) {
                self.sources.push(s);
            }
        }
    }

    fn price(&self) -> Option<f64> {
        let first = self.first_price?;
        let mut samples = self.price_samples.clone();
        samples.sort_by(f64::total_cmp);
        samples.dedup();
        if samples.len() < 2 {
            return Some(first);
        }
        let mut all = self.price_samples.clone();
        all.sort_by(f64::total_cmp);
        Some(median(&all))
    }

    fn avg_rank(&self) -> Option<f64> {
        (self.rank_weight > 0).then(|| self.rank_sum / f64::from(self.rank_weight))
    }

    fn finish(self) -> ProductRecord {
        let price = self.price();
        let avg_rank = self.avg_rank();
        let mut record = ProductRecord {
            name: self.name,
            normalized_name: self.normalized_name,
            price,
            image_url: self.image_url,
            url: self.url,
            id: self.id,
            category: self.category,
            source: self.source,
            rank: None,
            score: 0,
            count: self.count,
            sources: self.sources,
            avg_rank,
        };
        record.score = completeness_score(&record);
        record
    }
}

/// Median of an already sorted, non-empty slice.
fn median(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Ranking order: count desc, average rank asc (unranked last), score desc,
/// name asc, normalized name asc.
fn ranking(a: &ProductRecord, b: &ProductRecord) -> Ordering {
    b.count
        .cmp(&a.count)
        .then_with(|| match (a.avg_rank, b.avg_rank) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| b.score.cmp(&a.score))
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.normalized_name.cmp(&b.normalized_name))
}

/// Merge `(source, record)` pairs into at most `limit` ranked records.
///
/// The merge key is always recomputed from `name`; an incoming
/// `normalized_name` is ignored. Records whose name normalizes to nothing
/// are dropped. Output `rank` is
/// the 1-based position in the returned list, and no two returned records
/// share a normalized name. An empty input gives an empty list.
pub fn reconcile<I>(records: I, limit: usize) -> Vec<ProductRecord>
where
    I: IntoIterator<Item = (String, ProductRecord)>,
{
    let mut order: Vec<String> = Vec::new();
    let mut aggregates: HashMap<String, Aggregate> = HashMap::new();
    let mut dropped = 0usize;

    for (source, record) in records {
        let key = normalize_name(&record.name);
        if key.is_empty() {
            dropped += 1;
            continue;
        }
        match aggregates.get_mut(&key) {
            Some(agg) => agg.absorb(source, record),
            None => {
                order.push(key.clone());
                aggregates.insert(key.clone(), Aggregate::seed(source, record, key));
            }
        }
    }

    let mut merged: Vec<ProductRecord> = order
        .into_iter()
        .filter_map(|key| aggregates.remove(&key))
        .map(Aggregate::finish)
        .collect();
    merged.sort_by(ranking);

    let total = merged.len();
    let mut out: Vec<ProductRecord> = Vec::with_capacity(limit.min(total));
    for record in merged {
        if out.len() >= limit {
            break;
        }
        if out.iter().any(|r| r.normalized_name == record.normalized_name) {
            continue;
        }
        out.push(record);
    }
    for (i, record) in out.iter_mut().enumerate() {
        record.rank = u32::try_from(i + 1).ok();
    }

    tracing::debug!(aggregates = total, dropped, kept = out.len(), limit, "reconciled records");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(name: &str, source: &str) -> ProductRecord {
        ProductRecord::new(name, source)
    }

    fn pairs(records: Vec<ProductRecord>) -> Vec<(String, ProductRecord)> {
        records
            .into_iter()
            .map(|r| (r.source.clone(), r))
            .collect()
    }

    #[test]
    fn test_multi_source_merge() {
        let mut a = rec("Kulaklık X", "a");
        a.image_url = Some("http://cdn/a.jpg".to_string());
        let mut b = rec("Kulaklık X", "b");
        b.price = Some(499.0);

        let out = reconcile(pairs(vec![a, b]), 10);
        assert_eq!(out.len(), 1);
        let merged = &out[0];
        assert_eq!(merged.name, "Kulaklık X");
        assert_eq!(merged.price, Some(499.0));
        assert_eq!(merged.image_url.as_deref(), Some("http://cdn/a.jpg"));
        assert_eq!(merged.count, 2);
        assert_eq!(merged.sources, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(merged.rank, Some(1));
        assert_eq!(merged.score, 3 + 3 + 1);
    }

    #[test]
    fn test_first_seen_wins_and_median_price() {
        let mut a = rec("Akıllı Saat", "a");
        a.price = Some(100.0);
        a.url = Some("https://www.n11.com/urun/saat-1".to_string());
        let mut b = rec("AKILLI  saat", "b");
        b.price = Some(300.0);
        b.url = Some("https://www.trendyol.com/saat-p-2".to_string());
        let mut c = rec("akıllı saat!", "c");
        c.price = Some(120.0);

        let out = reconcile(pairs(vec![a, b, c]), 10);
        // "AKILLI" lowercases to "akilli", a different key from "akıllı"
        assert_eq!(out.len(), 2);
        let saat = out.iter().find(|r| r.normalized_name == "akıllı saat").unwrap();
        assert_eq!(saat.name, "Akıllı Saat");
        assert_eq!(saat.url.as_deref(), Some("https://www.n11.com/urun/saat-1"));
        assert_eq!(saat.price, Some(110.0));
        assert_eq!(saat.count, 2);
    }

    #[test]
    fn test_stale_normalized_name_is_recomputed() {
        let a = rec("Kulaklık X", "a");
        let mut b = rec("placeholder", "b");
        b.name = "Kulaklık X".to_string();
        let mut c = rec("Kulaklık X", "c");
        c.normalized_name = "Kulaklık X".to_string();

        let out = reconcile(pairs(vec![a, b, c]), 10);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].normalized_name, "kulaklık x");
        assert_eq!(out[0].count, 3);
    }

    #[test]
    fn test_repeated_same_price_keeps_first() {
        let mut a = rec("Termos Bardak", "a");
        a.price = Some(250.0);
        let mut b = rec("Termos Bardak", "b");
        b.price = Some(250.0);
        let out = reconcile(pairs(vec![a, b]), 10);
        assert_eq!(out[0].price, Some(250.0));
    }

    #[test]
    fn test_sort_order() {
        let mut seen_twice = rec("Zeytinyağı", "a");
        seen_twice.count = 2;
        let mut ranked_high = rec("Bal Kavanozu", "a");
        ranked_high.rank = Some(1);
        let mut ranked_low = rec("Ayran Paketi", "a");
        ranked_low.rank = Some(5);
        let mut unranked_rich = rec("Çay Bardağı", "a");
        unranked_rich.price = Some(50.0);
        let unranked_poor_b = rec("Bardak Seti", "a");
        let unranked_poor_a = rec("Altlık Seti", "a");

        let out = reconcile(
            pairs(vec![
                unranked_poor_b,
                ranked_low,
                unranked_rich,
                seen_twice,
                unranked_poor_a,
                ranked_high,
            ]),
            10,
        );
        let names: Vec<&str> = out.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Zeytinyağı",
                "Bal Kavanozu",
                "Ayran Paketi",
                "Çay Bardağı",
                "Altlık Seti",
                "Bardak Seti"
            ]
        );
        let ranks: Vec<Option<u32>> = out.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, (1..=6).map(Some).collect::<Vec<_>>());
    }

    #[test]
    fn test_count_and_avg_rank_are_additive() {
        let mut site_a = rec("Kahve Makinesi", "trendyol");
        site_a.count = 3;
        site_a.avg_rank = Some(2.0);
        site_a.sources = vec!["trendyol".to_string()];
        let mut site_b = rec("Kahve Makinesi", "n11");
        site_b.count = 1;
        site_b.rank = Some(6);

        let out = reconcile(pairs(vec![site_a, site_b]), 10);
        assert_eq!(out[0].count, 4);
        assert_eq!(out[0].avg_rank, Some(3.0));
        assert_eq!(out[0].sources, vec!["trendyol".to_string(), "n11".to_string()]);
    }

    #[test]
    fn test_dedup_and_monotonic_truncation() {
        let names = [
            "Kulaklık", "kulaklık", "KULAKLIK", "Telefon Kılıfı", "Şarj Aleti", "Powerbank",
            "Ekran Koruyucu", "telefon kılıfı!", "Tablet Kalemi",
        ];
        let input: Vec<(String, ProductRecord)> = names
            .iter()
            .enumerate()
            .map(|(i, n)| {
                let mut r = rec(n, "s");
                r.rank = Some(i as u32 + 1);
                ("s".to_string(), r)
            })
            .collect();

        let full = reconcile(input.clone(), 100);
        let mut keys: Vec<&str> = full.iter().map(|r| r.normalized_name.as_str()).collect();
        keys.sort();
        let before = keys.len();
        keys.dedup();
        assert_eq!(before, keys.len());

        for n in 0..full.len() {
            let shorter = reconcile(input.clone(), n);
            let longer = reconcile(input.clone(), n + 1);
            assert!(shorter.len() <= n);
            assert_eq!(shorter[..], longer[..shorter.len()]);
        }
    }

    #[test]
    fn test_empty_and_nameless_input() {
        assert!(reconcile(Vec::new(), 10).is_empty());
        let out = reconcile(pairs(vec![rec("???", "a"), rec("   ", "b")]), 10);
        assert!(out.is_empty());
        assert!(reconcile(pairs(vec![rec("Kulaklık X", "a")]), 0).is_empty());
    }
}
