use thiserror::Error;

/// Errors surfaced at the crate boundary (files, profiles, FFI input).
///
/// The extraction and reconciliation core never returns these: a field that
/// cannot be found is `None`, not an error.
#[derive(Error, Debug)]
pub enum ParserError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid site profile '{site}': {reason}")]
    InvalidProfile { site: String, reason: String },

    #[error("Unknown site: {0}")]
    UnknownSite(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, ParserError>;
