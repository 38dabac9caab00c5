//! URL utilities for classifying ThisVid page URLs

use crate::error::KvsError;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Video or embed page
pub const VIDEO_URL_PATTERN: &str =
    r"https?://(?:www\.)?thisvid\.com/(?P<type>videos|embed)/(?P<id>[A-Za-z0-9-]+)";

/// Member profile and its video listings
pub const MEMBER_URL_PATTERN: &str = r"https?://(?:www\.)?thisvid\.com/members/(?P<id>\d+)";

/// Playlist page anchored on one of its videos
pub const PLAYLIST_URL_PATTERN: &str =
    r"https?://(?:www\.)?thisvid\.com/playlist/(?P<id>\d+)/video/(?P<video_id>[A-Za-z0-9-]+)";

static VIDEO_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^{}", VIDEO_URL_PATTERN)).unwrap());
static MEMBER_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^{}", MEMBER_URL_PATTERN)).unwrap());
static PLAYLIST_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^{}", PLAYLIST_URL_PATTERN)).unwrap());

/// Kind of page a URL points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageKind {
    /// `/videos/<slug>/`
    Video { slug: String },
    /// `/embed/<id>/`
    Embed { id: String },
    /// `/members/<id>/...`
    Member { id: String },
    /// `/playlist/<id>/video/<slug>/`
    Playlist { id: String, video_slug: String },
}

impl PageKind {
    /// Check if page lists several videos
    pub fn is_listing(&self) -> bool {
        matches!(self, PageKind::Member { .. } | PageKind::Playlist { .. })
    }

    /// Identifier from the URL path
    pub fn id(&self) -> &str {
        match self {
            PageKind::Video { slug } => slug,
            PageKind::Embed { id } | PageKind::Member { id } | PageKind::Playlist { id, .. } => id,
        }
    }
}

/// Classify a page URL
pub fn classify_url(url: &str) -> Result<PageKind, KvsError> {
    Url::parse(url)?;

    if let Some(captures) = PLAYLIST_URL.captures(url) {
        return Ok(PageKind::Playlist {
            id: captures["id"].to_string(),
            video_slug: captures["video_id"].to_string(),
        });
    }
    if let Some(captures) = MEMBER_URL.captures(url) {
        return Ok(PageKind::Member {
            id: captures["id"].to_string(),
        });
    }
    if let Some(captures) = VIDEO_URL.captures(url) {
        let id = captures["id"].to_string();
        return Ok(match &captures["type"] {
            "embed" => PageKind::Embed { id },
            _ => PageKind::Video { slug: id },
        });
    }

    Err(KvsError::UnsupportedUrl(url.to_string()))
}

/// Check if URL is a supported page URL
pub fn is_supported_url(url: &str) -> bool {
    classify_url(url).is_ok()
}

/// Main video page for a playlist entry URL
pub fn playlist_video_url(playlist_url: &str) -> Result<String, KvsError> {
    match classify_url(playlist_url)? {
        PageKind::Playlist { video_slug, .. } => {
            let base = Url::parse(playlist_url)?;
            Ok(base.join(&format!("/videos/{}/", video_slug))?.into())
        }
        _ => Err(KvsError::InvalidUrl(format!(
            "{} is not a playlist URL",
            playlist_url
        ))),
    }
}

/// Last non-empty path segment, used when a page gives no better id
pub fn generic_id(url: &str) -> Result<String, KvsError> {
    let parsed = Url::parse(url)?;
    parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(str::to_string)
        .ok_or_else(|| KvsError::InvalidUrl(format!("No path in {}", url)))
}

/// Scheme of `url` followed by `:`, e.g. `https:`
pub fn scheme_prefix(url: &str) -> Result<String, KvsError> {
    let parsed = Url::parse(url)?;
    Ok(format!("{}:", parsed.scheme()))
}
