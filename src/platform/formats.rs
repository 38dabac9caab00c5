//! Format assembly, ranking and selection

use crate::core::video_info::{FormatCandidate, FormatSelector, QualitySelector};
use crate::error::KvsError;
use crate::platform::cipher::{is_obfuscated, reconstruct_url};
use crate::platform::flashvars::Flashvars;
use crate::utils::html::unescape_html;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Substring every downloadable media URL contains
pub const DOWNLOAD_ENDPOINT_MARKER: &str = "/get_file/";

/// Container of every KVS rendition
pub const FORMAT_EXT: &str = "mp4";

/// Rank given to formats with no known resolution
pub const UNKNOWN_RESOLUTION_QUALITY: i32 = 1;

static DIMENSIONS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^a-zA-Z0-9])(\d+)\s*[xX×,]\s*(\d+)(?:[^a-zA-Z0-9]|$)").unwrap()
});
static HEIGHT_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^a-zA-Z0-9])(\d+)[pPiI](?:[^a-zA-Z0-9]|$)").unwrap());
static K_RESOLUTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([48])[kK]\b").unwrap());

/// Width and height parsed from text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Resolution {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Find a resolution in a label or URL: `1280x720`, `720p`, `1080i` or `4k`
pub fn parse_resolution(text: &str) -> Option<Resolution> {
    if let Some(captures) = DIMENSIONS.captures(text) {
        let width = captures[1].parse().ok();
        let height = captures[2].parse().ok();
        if height.is_some() {
            return Some(Resolution { width, height });
        }
    }

    if let Some(captures) = HEIGHT_SUFFIX.captures(text) {
        if let Ok(height) = captures[1].parse() {
            return Some(Resolution {
                width: None,
                height: Some(height),
            });
        }
    }

    K_RESOLUTION
        .captures(text)
        .and_then(|captures| captures[1].parse::<u32>().ok())
        .map(|k| Resolution {
            width: None,
            height: Some(k * 540),
        })
}

/// Build the ranked format list from a player configuration
pub fn assemble_formats(
    flashvars: &Flashvars,
    page_url: &str,
) -> Result<Vec<FormatCandidate>, KvsError> {
    let license_code = flashvars.license_code();
    let mut formats = Vec::new();

    for (order, key) in flashvars.url_keys().into_iter().enumerate() {
        let Some(raw_url) = flashvars.get_str(key) else {
            continue;
        };
        if !raw_url.contains(DOWNLOAD_ENDPOINT_MARKER) {
            debug!("Skipping {}: not a download URL", key);
            continue;
        }

        let format_id = flashvars
            .get_str(&format!("{}_text", key))
            .map(|label| unescape_html(label.trim()))
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| key.to_string());

        let url = if is_obfuscated(&raw_url) {
            let license_code = license_code.as_deref().ok_or_else(|| {
                KvsError::MalformedLicense(format!("{} is obfuscated but no license_code", key))
            })?;
            reconstruct_url(&raw_url, license_code)?
        } else {
            raw_url.clone()
        };

        let resolution = parse_resolution(&format_id)
            .or_else(|| parse_resolution(&raw_url))
            .unwrap_or_default();
        let quality = match resolution.height {
            Some(_) => None,
            None => Some(UNKNOWN_RESOLUTION_QUALITY),
        };

        let mut http_headers = BTreeMap::new();
        http_headers.insert("Referer".to_string(), page_url.to_string());

        debug!(
            "Format {} from {}: {:?}x{:?}",
            format_id, key, resolution.width, resolution.height
        );
        formats.push(FormatCandidate {
            format_id,
            key: key.to_string(),
            url,
            raw_url,
            ext: FORMAT_EXT.to_string(),
            width: resolution.width,
            height: resolution.height,
            quality,
            order,
            http_headers,
        });
    }

    if formats.is_empty() {
        warn!("No downloadable URLs among {} configuration entries", flashvars.len());
        return Err(KvsError::NoPlayableFormats);
    }

    sort_formats(&mut formats);
    Ok(formats)
}

/// Sort formats best first.
///
/// Formats with a height come first (taller, then wider), formats without
/// one after them; ties keep configuration order.
pub fn sort_formats(formats: &mut [FormatCandidate]) {
    formats.sort_by(compare_formats);
}

fn compare_formats(a: &FormatCandidate, b: &FormatCandidate) -> Ordering {
    let rank = match (a.height, b.height) {
        (Some(a_h), Some(b_h)) => b_h
            .cmp(&a_h)
            .then_with(|| b.width.unwrap_or(0).cmp(&a.width.unwrap_or(0))),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.quality.unwrap_or(0).cmp(&a.quality.unwrap_or(0)),
    };
    rank.then_with(|| a.order.cmp(&b.order))
}

/// Pick a format from a best-first list
pub fn select_format<'a>(
    formats: &'a [FormatCandidate],
    selector: &FormatSelector,
) -> Result<&'a FormatCandidate, KvsError> {
    let mut candidates: Vec<&FormatCandidate> = formats.iter().collect();

    if let Some(height_limit) = selector.height_limit {
        candidates.retain(|f| f.height.map_or(false, |h| h <= height_limit));
    }
    if let Some(height_min) = selector.height_min {
        candidates.retain(|f| f.height.map_or(false, |h| h >= height_min));
    }

    if candidates.is_empty() {
        return Err(KvsError::NoFormatFound);
    }

    let selected = match &selector.quality {
        QualitySelector::Best => candidates.first().copied(),
        QualitySelector::Worst => candidates
            .iter()
            .rev()
            .find(|f| f.has_resolution())
            .or_else(|| candidates.last())
            .copied(),
        QualitySelector::Id(format_id) => candidates
            .iter()
            .find(|f| &f.format_id == format_id || &f.key == format_id)
            .copied(),
        QualitySelector::Height(target) => candidates
            .iter()
            .find(|f| f.height == Some(*target))
            .copied(),
        QualitySelector::HeightLessOrEqual(target) => candidates
            .iter()
            .find(|f| f.height.map_or(false, |h| h <= *target))
            .copied(),
        QualitySelector::HeightGreaterOrEqual(target) => candidates
            .iter()
            .find(|f| f.height.map_or(false, |h| h >= *target))
            .copied(),
    };
    selected.ok_or(KvsError::NoFormatFound)
}
