//! Small HTML helpers over `scraper` and `regex`

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use scraper::{Html, Selector};
use ::url::Url;

static NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\n\s*").unwrap());
static LINE_BREAKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<\s*br\s*/?\s*>").unwrap());
static PARAGRAPHS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<\s*/\s*p\s*>\s*<\s*p[^>]*>").unwrap());
static ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").unwrap());

/// Inner HTML of the first element carrying `class_name`
pub fn find_element_by_class(markup: &str, class_name: &str) -> Option<String> {
    let document = Html::parse_document(markup);
    let selector = Selector::parse("*").ok()?;
    let found = document
        .select(&selector)
        .find(|element| element.value().classes().any(|class| class == class_name))
        .map(|element| element.inner_html());
    found
}

/// Text content of an HTML fragment, entities decoded
pub fn strip_tags(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text: String = fragment.root_element().text().collect();
    text
}

/// Decode character references in plain text; unknown entities are kept
pub fn unescape_html(text: &str) -> String {
    ENTITY
        .replace_all(text, |captures: &Captures| {
            decode_entity(&captures[1])
                .map(String::from)
                .unwrap_or_else(|| captures[0].to_string())
        })
        .into_owned()
}

fn decode_entity(entity: &str) -> Option<char> {
    if let Some(hex) = entity
        .strip_prefix("#x")
        .or_else(|| entity.strip_prefix("#X"))
    {
        return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
    }
    if let Some(decimal) = entity.strip_prefix('#') {
        return decimal.parse().ok().and_then(char::from_u32);
    }
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => None,
    }
}

/// Collapse an HTML fragment to readable text.
///
/// Source newlines become spaces, `<br>` and paragraph breaks become newlines.
pub fn clean_html(html: &str) -> String {
    let flattened = NEWLINES.replace_all(html, " ");
    let broken = LINE_BREAKS.replace_all(&flattened, "\n");
    let broken = PARAGRAPHS.replace_all(&broken, "\n");
    strip_tags(&broken).trim().to_string()
}

/// First non-empty capture group of the first match
pub fn search_first_match(markup: &str, pattern: &Regex) -> Option<String> {
    let captures = pattern.captures(markup)?;
    captures
        .iter()
        .skip(1)
        .flatten()
        .map(|m| m.as_str())
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Resolve `relative` against `base`
pub fn join_url(base: &str, relative: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(relative.trim()).ok().map(String::from)
}

/// `content` of the first `<meta property=...>` or `<meta name=...>` tag
pub fn meta_content(markup: &str, property: &str) -> Option<String> {
    let document = Html::parse_document(markup);
    let selector = Selector::parse("meta").ok()?;
    let content = document
        .select(&selector)
        .find(|element| {
            let value = element.value();
            value.attr("property") == Some(property) || value.attr("name") == Some(property)
        })
        .and_then(|element| element.value().attr("content"))
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty());
    content
}

/// `href` of the `<link rel="canonical">` tag
pub fn canonical_href(markup: &str) -> Option<String> {
    let document = Html::parse_document(markup);
    let selector = Selector::parse(r#"link[rel="canonical"]"#).ok()?;
    let href = document
        .select(&selector)
        .next()
        .and_then(|element| element.value().attr("href"))
        .map(str::to_string);
    href
}

/// Every `<a href>` target, in document order
pub fn anchor_hrefs(markup: &str) -> Vec<String> {
    let document = Html::parse_document(markup);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let hrefs = document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .map(str::to_string)
        .collect();
    hrefs
}
