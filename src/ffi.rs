//! C interface for embedding the pipeline
//!
//! Everything crossing the boundary is a JSON string. Results carry either
//! a JSON payload or an error message; both are owned by Rust and must be
//! released with [`market_free_result`].

use std::ffi::{c_char, CStr, CString};
use std::ptr;

use serde::{Deserialize, Serialize};

use crate::error::{ParserError, Result};
use crate::extractors::{looks_like_html, page_to_node};
use crate::pipeline::extract_records_with;
use crate::profile::{ProfileSet, Strictness};
use crate::reconcile::reconcile;
use crate::record::ProductRecord;

/// Result returned across the C boundary.
/// Exactly one pointer is non-null.
#[repr(C)]
pub struct MarketResultFFI {
    /// JSON-serialized result (null-terminated)
    pub json_ptr: *mut c_char,
    /// Error message (null-terminated), or null on success
    pub error_ptr: *mut c_char,
}

/// How to read the raw payload handed to [`market_extract_records`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// HTML when the payload starts with `<`, JSON otherwise.
    #[default]
    Auto,
    Json,
    Html,
}

#[derive(Debug, Deserialize)]
struct ExtractRequest {
    source: String,
    #[serde(default)]
    strictness: Strictness,
    #[serde(default)]
    format: InputFormat,
}

#[derive(Debug, Serialize)]
struct RecordsResponse<'a> {
    records: &'a [ProductRecord],
}

/// Extract product records from a raw JSON or HTML payload.
///
/// `request_json` is `{"source": "trendyol", "strictness": "standard",
/// "format": "auto"}`; only `source` is required. On success the result
/// holds `{"records": [...]}`.
///
/// # Safety
/// - `raw_ptr` must point to at least `raw_len` readable bytes (or be null
///   with `raw_len == 0`)
/// - `request_json` must be a valid null-terminated C string
/// - The result must be freed with `market_free_result`
#[no_mangle]
pub unsafe extern "C" fn market_extract_records(
    raw_ptr: *const c_char,
    raw_len: usize,
    request_json: *const c_char,
) -> MarketResultFFI {
    let outcome = match (read_bytes(raw_ptr, raw_len), read_cstr(request_json, "request JSON")) {
        (Ok(raw), Ok(request)) => run_extract(raw, request),
        (Err(e), _) | (_, Err(e)) => Err(e),
    };
    into_ffi(outcome)
}

/// Reconcile a JSON array of product records into at most `limit` entries.
///
/// Each record's own `source` is used as its source tag. On success the
/// result holds `{"records": [...]}`.
///
/// # Safety
/// - `records_json` must be a valid null-terminated C string
/// - The result must be freed with `market_free_result`
#[no_mangle]
pub unsafe extern "C" fn market_reconcile(
    records_json: *const c_char,
    limit: usize,
) -> MarketResultFFI {
    let outcome = match read_cstr(records_json, "records JSON") {
        Ok(text) => run_reconcile(text, limit),
        Err(e) => Err(e),
    };
    into_ffi(outcome)
}

/// Free a result returned by any `market_*` function.
///
/// # Safety
/// - `result` must come from this library and be freed only once
#[no_mangle]
pub unsafe extern "C" fn market_free_result(result: MarketResultFFI) {
    if !result.json_ptr.is_null() {
        drop(CString::from_raw(result.json_ptr));
    }
    if !result.error_ptr.is_null() {
        drop(CString::from_raw(result.error_ptr));
    }
}

fn run_extract(raw: &str, request: &str) -> Result<String> {
    let request: ExtractRequest = serde_json::from_str(request)?;
    let profile = ProfileSet::shared().resolve(&request.source);

    let is_html = match request.format {
        InputFormat::Html => true,
        InputFormat::Json => false,
        InputFormat::Auto => looks_like_html(raw),
    };
    let node = if is_html {
        page_to_node(raw, profile)
    } else {
        serde_json::from_str(raw)?
    };

    let records = extract_records_with(&node, &request.source, profile, request.strictness);
    Ok(serde_json::to_string(&RecordsResponse { records: &records })?)
}

fn run_reconcile(text: &str, limit: usize) -> Result<String> {
    let records: Vec<ProductRecord> = serde_json::from_str(text)?;
    let merged = reconcile(records.into_iter().map(|r| (r.source.clone(), r)), limit);
    Ok(serde_json::to_string(&RecordsResponse { records: &merged })?)
}

unsafe fn read_bytes<'a>(ptr: *const c_char, len: usize) -> Result<&'a str> {
    if ptr.is_null() || len == 0 {
        return Ok("");
    }
    let slice = std::slice::from_raw_parts(ptr as *const u8, len);
    std::str::from_utf8(slice)
        .map_err(|_| ParserError::InvalidInput("invalid UTF-8 in payload".to_string()))
}

unsafe fn read_cstr<'a>(ptr: *const c_char, what: &str) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(ParserError::InvalidInput(format!("{what} is null")));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| ParserError::InvalidInput(format!("invalid UTF-8 in {what}")))
}

fn into_ffi(outcome: Result<String>) -> MarketResultFFI {
    match outcome {
        Ok(json) => match CString::new(json) {
            Ok(cstr) => MarketResultFFI {
                json_ptr: cstr.into_raw(),
                error_ptr: ptr::null_mut(),
            },
            Err(_) => make_error_result("result JSON contains null bytes"),
        },
        Err(e) => make_error_result(&e.to_string()),
    }
}

fn make_error_result(msg: &str) -> MarketResultFFI {
    let error = CString::new(msg.replace('\0', " ")).unwrap_or_default();
    MarketResultFFI {
        json_ptr: ptr::null_mut(),
        error_ptr: error.into_raw(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    /// Take ownership of a result and return (json, error).
    fn collect(result: MarketResultFFI) -> (Option<Value>, Option<String>) {
        let json = (!result.json_ptr.is_null()).then(|| unsafe {
            serde_json::from_str(CStr::from_ptr(result.json_ptr).to_str().unwrap()).unwrap()
        });
        let error = (!result.error_ptr.is_null())
            .then(|| unsafe { CStr::from_ptr(result.error_ptr).to_string_lossy().into_owned() });
        unsafe { market_free_result(result) };
        (json, error)
    }

    #[test]
    fn test_extract_json_payload() {
        let raw = r#"{"products": [{"name": "Kablosuz Kulaklık", "price": "499,90 TL"}]}"#;
        let request = CString::new(r#"{"source": "trendyol", "strictness": "loose"}"#).unwrap();
        let result = unsafe {
            market_extract_records(raw.as_ptr() as *const c_char, raw.len(), request.as_ptr())
        };

        let (json, error) = collect(result);
        assert!(error.is_none());
        let json = json.unwrap();
        assert_eq!(json["records"][0]["product_name"], "Kablosuz Kulaklık");
        assert_eq!(json["records"][0]["price"], 499.9);
    }

    #[test]
    fn test_extract_reports_errors() {
        let request = CString::new(r#"{"source": "n11"}"#).unwrap();
        let raw = "{not json";
        let (json, error) = collect(unsafe {
            market_extract_records(raw.as_ptr() as *const c_char, raw.len(), request.as_ptr())
        });
        assert!(json.is_none());
        assert!(error.unwrap().starts_with("JSON error"));

        let (json, error) = collect(unsafe { market_extract_records(ptr::null(), 0, ptr::null()) });
        assert!(json.is_none());
        assert!(error.unwrap().contains("request JSON is null"));
    }

    #[test]
    fn test_reconcile_round_trip() {
        let records = CString::new(
            r#"[
                {"product_name": "Kulaklık X", "normalized_name": "kulaklık x", "price": null,
                 "image_url": "http://cdn/a.jpg", "url": null, "source": "a"},
                {"name": "Kulaklık X", "normalized_name": "kulaklık x", "price": 499.0,
                 "image_url": null, "url": null, "site": "b"}
            ]"#,
        )
        .unwrap();
        let (json, error) = collect(unsafe { market_reconcile(records.as_ptr(), 10) });
        assert!(error.is_none());
        let json = json.unwrap();
        let out = json["records"].as_array().unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["price"], 499.0);
        assert_eq!(out[0]["image_url"], "http://cdn/a.jpg");
        assert_eq!(out[0]["count"], 2);
        assert_eq!(out[0]["rank"], 1);
    }
}
