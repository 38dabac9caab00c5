//! Member and playlist listing pages

use crate::utils::html::{anchor_hrefs, clean_html, find_element_by_class, join_url, meta_content};
use crate::utils::url::{classify_url, playlist_video_url, PageKind};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use url::Url;

static TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<title\b[^>]*>(.+?)</title").unwrap());
static SITE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*\|\s*ThisVid\.com\s*$").unwrap());

/// Listing title: `og:title`, else `<title>`, without the site suffix
pub fn listing_title(markup: &str) -> Option<String> {
    let raw = meta_content(markup, "og:title").or_else(|| {
        TITLE
            .captures(markup)
            .and_then(|captures| captures.get(1))
            .map(|m| clean_html(m.as_str()))
    })?;

    let title = match SITE_SUFFIX.find(&raw) {
        Some(suffix) => &raw[..suffix.start()],
        None => raw.as_str(),
    };
    let title = title.trim();
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}

/// Collapse playlist titles rendered as `X - X` to `X`
pub fn collapse_doubled_title(title: &str) -> String {
    let chars: Vec<char> = title.chars().collect();
    let len = chars.len();
    if len > 5 && len % 2 != 0 && chars[len / 2] == '-' {
        let first: String = chars[..len / 2].iter().collect();
        let second: String = chars[len / 2 + 1..].iter().collect();
        let (first, second) = (first.trim(), second.trim());
        if !first.is_empty() && first == second {
            return first.to_string();
        }
    }
    title.to_string()
}

/// Video page links on a listing page, deduplicated in page order.
///
/// Playlist entries link to `/playlist/<id>/video/<slug>/`; these are
/// rewritten to the video page itself.
pub fn video_links(markup: &str, kind: &PageKind) -> Vec<String> {
    let mut seen = HashSet::new();
    anchor_hrefs(markup)
        .into_iter()
        .filter_map(|href| {
            let href = href.trim().to_string();
            match (kind, classify_url(&href).ok()?) {
                (PageKind::Playlist { .. }, PageKind::Playlist { .. }) => {
                    playlist_video_url(&href).ok()
                }
                (PageKind::Playlist { .. }, _) => None,
                (_, PageKind::Video { .. } | PageKind::Embed { .. }) => Some(href),
                _ => None,
            }
        })
        .filter(|link| seen.insert(link.clone()))
        .collect()
}

/// URL of the page after `current` in the listing that began at `start`.
///
/// A `pagination-next` element with a link wins; the link is joined against
/// `start`. Without a usable link the trailing page number of `current` is
/// incremented. A missing or empty element means the last page.
pub fn next_page_url(start: &str, current: &str, markup: &str) -> Option<String> {
    let next = find_element_by_class(markup, "pagination-next")
        .filter(|element| !element.trim().is_empty())?;

    let link = anchor_hrefs(&next)
        .into_iter()
        .map(|href| href.trim().to_string())
        .find(|href| !href.is_empty() && !href.starts_with('#'));
    let candidate = match link {
        Some(link) => join_url(start, &link)?,
        None => increment_page_number(current)?,
    };

    if candidate == current {
        None
    } else {
        Some(candidate)
    }
}

/// `/x/` → `/x/2`, `/x/3` → `/x/4`
fn increment_page_number(page_url: &str) -> Option<String> {
    let mut parsed = Url::parse(page_url).ok()?;
    let path = parsed.path().to_string();
    let (base, last) = path.rsplit_once('/')?;

    let (base, number) = match last.parse::<u32>() {
        Ok(number) => (base.to_string(), number),
        Err(_) => (path.trim_end_matches('/').to_string(), 1),
    };
    parsed.set_path(&format!("{}/{}", base, number + 1));
    Some(parsed.into())
}
