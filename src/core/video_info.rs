//! Video metadata structures

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Resolved video page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Numeric video ID from the player configuration
    pub id: String,
    /// Slug from the canonical URL
    pub display_id: Option<String>,
    /// Video title
    pub title: String,
    /// Thumbnail URL
    pub thumbnail: Option<String>,
    /// Uploader name
    pub uploader: Option<String>,
    /// Uploader member ID
    pub uploader_id: Option<String>,
    /// Site content is adult-only
    pub age_restricted: bool,
    /// Page the formats were resolved from; sent as `Referer`
    pub webpage_url: String,
    /// Playable formats, best first
    pub formats: Vec<FormatCandidate>,
}

impl VideoMetadata {
    /// Create metadata with no formats
    pub fn new(id: String, title: String, webpage_url: String) -> Self {
        Self {
            id,
            display_id: None,
            title,
            thumbnail: None,
            uploader: None,
            uploader_id: None,
            age_restricted: true,
            webpage_url,
            formats: Vec::new(),
        }
    }

    /// Minimum viewer age implied by `age_restricted`
    pub fn age_limit(&self) -> u8 {
        if self.age_restricted {
            18
        } else {
            0
        }
    }

    /// Best format (formats are kept sorted)
    pub fn best_format(&self) -> Option<&FormatCandidate> {
        self.formats.first()
    }

    /// Format by its ID
    pub fn format_by_id(&self, format_id: &str) -> Option<&FormatCandidate> {
        self.formats.iter().find(|f| f.format_id == format_id)
    }
}

/// Videos linked from a member or playlist page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Listing {
    /// Member or playlist ID
    pub id: String,
    /// Listing title
    pub title: Option<String>,
    /// Video page URLs in page order
    pub entries: Vec<String>,
}

/// One playable rendition from the player configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatCandidate {
    /// Quality label (e.g. "720p") or the configuration key
    pub format_id: String,
    /// Configuration key the URL came from
    pub key: String,
    /// Playable URL
    pub url: String,
    /// URL as found in the configuration
    pub raw_url: String,
    /// Container extension
    pub ext: String,
    /// Video width
    pub width: Option<u32>,
    /// Video height
    pub height: Option<u32>,
    /// Fallback rank when no resolution is known
    pub quality: Option<i32>,
    /// Position in the configuration
    pub order: usize,
    /// Headers the CDN expects
    pub http_headers: BTreeMap<String, String>,
}

impl FormatCandidate {
    /// Check if a resolution was inferred
    pub fn has_resolution(&self) -> bool {
        self.height.is_some()
    }

    /// `Referer` header value
    pub fn referer(&self) -> Option<&str> {
        self.http_headers.get("Referer").map(String::as_str)
    }

    /// Get human-readable resolution string
    pub fn resolution_string(&self) -> String {
        match (self.width, self.height) {
            (Some(width), Some(height)) => format!("{}x{}", width, height),
            (None, Some(height)) => format!("{}p", height),
            _ => "unknown".to_string(),
        }
    }
}

/// Format selector for choosing a download
#[derive(Debug, Clone)]
pub struct FormatSelector {
    /// Quality selector
    pub quality: QualitySelector,
    /// Maximum height constraint
    pub height_limit: Option<u32>,
    /// Minimum height constraint
    pub height_min: Option<u32>,
}

impl FormatSelector {
    /// Create a new format selector
    pub fn new(quality: QualitySelector) -> Self {
        Self {
            quality,
            height_limit: None,
            height_min: None,
        }
    }

    /// Set height limit
    pub fn with_height_limit(mut self, height: u32) -> Self {
        self.height_limit = Some(height);
        self
    }

    /// Set minimum height
    pub fn with_height_min(mut self, height: u32) -> Self {
        self.height_min = Some(height);
        self
    }
}

impl Default for FormatSelector {
    fn default() -> Self {
        Self::new(QualitySelector::Best)
    }
}

/// Quality selection criteria
#[derive(Debug, Clone, PartialEq)]
pub enum QualitySelector {
    /// Best quality available
    Best,
    /// Worst quality available
    Worst,
    /// Specific format ID
    Id(String),
    /// Specific height
    Height(u32),
    /// Height less than or equal to
    HeightLessOrEqual(u32),
    /// Height greater than or equal to
    HeightGreaterOrEqual(u32),
}

impl FromStr for QualitySelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let lower = s.to_lowercase();

        let parse_height = |value: &str| {
            value
                .parse::<u32>()
                .map_err(|_| format!("Invalid height: {}", value))
        };

        match lower.as_str() {
            "" => Err("Empty format selector".to_string()),
            "best" => Ok(QualitySelector::Best),
            "worst" => Ok(QualitySelector::Worst),
            _ => {
                if let Some(height) = lower.strip_prefix("height<=") {
                    Ok(QualitySelector::HeightLessOrEqual(parse_height(height)?))
                } else if let Some(height) = lower.strip_prefix("height>=") {
                    Ok(QualitySelector::HeightGreaterOrEqual(parse_height(height)?))
                } else if let Some(height) = lower.strip_prefix("height=") {
                    Ok(QualitySelector::Height(parse_height(height)?))
                } else if let Some(id) = s.strip_prefix("id=") {
                    Ok(QualitySelector::Id(id.to_string()))
                } else {
                    // bare format IDs such as "720p" or "video_alt_url"
                    Ok(QualitySelector::Id(s.to_string()))
                }
            }
        }
    }
}
