//! Product-record extraction and reconciliation for marketplace listings
//!
//! Takes already-fetched content (XHR JSON dumps or HTML pages), finds
//! product-shaped records anywhere inside it, and merges records from many
//! pages and sites into one ranked, deduplicated list:
//! - Record Locator: depth-first walk yielding candidate mappings
//! - Field Extractor: name, price, image, detail URL and identifier
//! - Reconciler: merge by normalized name, score, sort, cap
//!
//! Per-site behaviour lives in [`SiteProfile`] data. HTML pages are turned
//! into JSON trees by [`extractors::page_to_node`] (JSON-LD, microdata,
//! OpenGraph, embedded JSON, JavaScript state and CSS-selected cards).

pub mod dump;
pub mod error;
pub mod extractors;
pub mod ffi;
pub mod fields;
pub mod locator;
pub mod logging;
pub mod node;
pub mod pipeline;
pub mod price;
pub mod profile;
pub mod reconcile;
pub mod record;

pub use error::{ParserError, Result};
pub use ffi::*;
pub use node::RawNode;
pub use pipeline::{extract_records, extract_records_with};
pub use profile::{ProfileSet, SiteProfile, Strictness};
pub use reconcile::reconcile;
pub use record::{normalize_name, Category, ProductRecord};
