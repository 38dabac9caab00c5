//! Error types for kvsget

use thiserror::Error;

/// Main error type for kvsget operations
#[derive(Debug, Error)]
pub enum KvsError {
    #[error("Player configuration not found on {url}")]
    ConfigurationNotFound { url: String },

    #[error("Player configuration could not be parsed ({reason}) near: {fragment}")]
    ConfigurationParseError { fragment: String, reason: String },

    #[error("Malformed license code: {0}")]
    MalformedLicense(String),

    #[error("License token too short: need {needed} digits, have {available}")]
    TokenTooShort { needed: usize, available: usize },

    #[error("Malformed media URL: {0}")]
    MalformedUrl(String),

    #[error("No playable formats found")]
    NoPlayableFormats,

    #[error("Access restricted: {0}")]
    AccessRestricted(String),

    #[error("Page has no {0}")]
    MissingField(&'static str),

    #[error("Failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} while fetching {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported URL: {0}")]
    UnsupportedUrl(String),

    #[error("No suitable format found")]
    NoFormatFound,

    #[error("Download failed: {0}")]
    DownloadFailed(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error("Generic error: {0}")]
    Generic(String),
}

impl KvsError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            KvsError::Fetch { .. } | KvsError::DownloadFailed(_) | KvsError::TimeoutError(_) => {
                true
            }
            KvsError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Check if error comes from the page markup rather than the network
    pub fn is_extraction_error(&self) -> bool {
        matches!(
            self,
            KvsError::ConfigurationNotFound { .. }
                | KvsError::ConfigurationParseError { .. }
                | KvsError::MalformedLicense(_)
                | KvsError::TokenTooShort { .. }
                | KvsError::MalformedUrl(_)
                | KvsError::NoPlayableFormats
        )
    }
}
