//! Player configuration (`var flashvars = {...};`) extraction

use crate::error::KvsError;
use crate::utils::js::{fragment_at, js_to_json};
use crate::utils::url::scheme_prefix;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

static FLASHVARS_SCRIPT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<script\b[^>]*>.*?var\s+flashvars\s*=\s*(\{.+?\});.*?</script>").unwrap()
});
static URL_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^video_(?:url|alt_url\d*)$").unwrap());

/// Parsed player configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Flashvars {
    values: Map<String, Value>,
}

impl Flashvars {
    /// Raw value for a key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Value for a key as text; numbers are rendered, other types ignored
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.values.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Numeric video identifier
    pub fn video_id(&self) -> Result<String, KvsError> {
        self.get_str("video_id")
            .filter(|id| !id.is_empty())
            .ok_or_else(|| KvsError::ConfigurationParseError {
                fragment: "video_id".to_string(),
                reason: "player configuration has no video_id".to_string(),
            })
    }

    /// License code keying the URL cipher
    pub fn license_code(&self) -> Option<String> {
        self.get_str("license_code")
    }

    /// Thumbnail URL; scheme-relative values take the page's scheme
    pub fn thumbnail(&self, page_url: &str) -> Option<String> {
        let preview = self.get_str("preview_url").filter(|p| !p.is_empty())?;
        if preview.starts_with("//") {
            let scheme = scheme_prefix(page_url).ok()?;
            Some(format!("{}{}", scheme, preview))
        } else {
            Some(preview)
        }
    }

    /// Keys that may hold a media URL, in configuration order
    pub fn url_keys(&self) -> Vec<&str> {
        self.values
            .keys()
            .map(String::as_str)
            .filter(|key| URL_KEY.is_match(key))
            .collect()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if configuration is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Locate the `flashvars` object in a page and parse it
pub fn extract_flashvars(markup: &str, page_url: &str) -> Result<Flashvars, KvsError> {
    let source = FLASHVARS_SCRIPT
        .captures(markup)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| KvsError::ConfigurationNotFound {
            url: page_url.to_string(),
        })?;
    debug!("Found flashvars block ({} bytes)", source.len());

    parse_flashvars(source)
}

/// Parse the source text of a `flashvars` object literal
pub fn parse_flashvars(source: &str) -> Result<Flashvars, KvsError> {
    let json = js_to_json(source)?;
    let value: Value =
        serde_json::from_str(&json).map_err(|e| KvsError::ConfigurationParseError {
            fragment: fragment_at(&json, char_offset(&json, e.line(), e.column())),
            reason: e.to_string(),
        })?;

    match value {
        Value::Object(values) => Ok(Flashvars { values }),
        other => Err(KvsError::ConfigurationParseError {
            fragment: fragment_at(source, 0),
            reason: format!("expected an object, found {}", json_type(&other)),
        }),
    }
}

/// Character offset of a 1-based line/column position
fn char_offset(text: &str, line: usize, column: usize) -> usize {
    let preceding: usize = text
        .split('\n')
        .take(line.saturating_sub(1))
        .map(|l| l.chars().count() + 1)
        .sum();
    preceding + column.saturating_sub(1)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
