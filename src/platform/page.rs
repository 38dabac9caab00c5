//! Metadata around the player: title, uploader, access restrictions

use crate::error::KvsError;
use crate::utils::html::{canonical_href, clean_html, find_element_by_class, search_first_match};
use crate::utils::url::{generic_id, VIDEO_URL_PATTERN};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Marker the site puts in the player area of private videos
pub const PRIVATE_VIDEO_MARKER: &str = ">This video is a private video";

static TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<title\b[^>]*?>(?:Video:\s+)?(.+?)(?:\s+-\s+ThisVid(?:\.com| tube))?</title>")
        .unwrap()
});
static UPLOADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?s)<span\b[^>]*>Added by:\s*</span><a\b[^>]+\bclass\s*=\s*["']author\b[^>]+\bhref\s*=\s*["']https://thisvid\.com/members/([0-9]+/.{3,}?)\s*</a>"#,
    )
    .unwrap()
});
static UPLOADER_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r#"/["'][^>]*>\s*"#).unwrap());
static EMBED_ALT_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"video_alt_url\s*:\s+'({}/)',", VIDEO_URL_PATTERN)).unwrap()
});

/// Fail with `AccessRestricted` if the player area says the video is private
pub fn check_access(markup: &str) -> Result<(), KvsError> {
    let holder = find_element_by_class(markup, "video-holder").unwrap_or_default();
    if !holder.contains(PRIVATE_VIDEO_MARKER) {
        return Ok(());
    }

    let text = clean_html(&holder);
    let message = text
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .unwrap_or("Private video");
    debug!("Private video marker found");
    Err(KvsError::AccessRestricted(message.to_string()))
}

/// Video title without the site suffix
pub fn extract_title(markup: &str) -> Result<String, KvsError> {
    search_first_match(markup, &TITLE)
        .map(|title| clean_html(&title))
        .filter(|title| !title.is_empty())
        .ok_or(KvsError::MissingField("title"))
}

/// Uploader name and member ID; the name may be absent when the ID is known
pub fn extract_uploader(markup: &str) -> (Option<String>, Option<String>) {
    let Some(found) = search_first_match(markup, &UPLOADER) else {
        return (None, None);
    };
    let parts: Vec<&str> = UPLOADER_SPLIT.split(&found).collect();
    match parts.as_slice() {
        [id, name] if !id.is_empty() => {
            let name = clean_html(name);
            let name = if name.is_empty() { None } else { Some(name) };
            (name, Some(id.to_string()))
        }
        _ => (None, None),
    }
}

/// Slug of the canonical page URL
pub fn extract_display_id(markup: &str) -> Option<String> {
    canonical_href(markup).and_then(|href| generic_id(&href).ok())
}

/// Main page URL an embed page points at, if any
pub fn embed_alt_url(markup: &str) -> Option<String> {
    search_first_match(markup, &EMBED_ALT_URL).filter(|url| url.starts_with("http"))
}
