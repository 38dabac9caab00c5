//! Safe filename generation utilities

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

const MAX_STEM_BYTES: usize = 200;

static INVALID_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).unwrap());

/// Convert a title to a safe filename by replacing invalid characters
pub fn to_safe_filename(title: &str, extension: &str) -> String {
    let replaced = INVALID_CHARS.replace_all(title, "_");
    let mut safe_title = replaced
        .trim_matches(|c: char| c == '.' || c.is_whitespace())
        .to_string();

    if safe_title.len() > MAX_STEM_BYTES {
        let mut cut = MAX_STEM_BYTES;
        while !safe_title.is_char_boundary(cut) {
            cut -= 1;
        }
        safe_title.truncate(cut);
        safe_title = safe_title.trim_end().to_string();
    }

    if safe_title.is_empty() {
        safe_title = "video".to_string();
    }

    match extension.trim_start_matches('.') {
        "" => safe_title,
        ext => format!("{}.{}", safe_title, ext),
    }
}

/// Default name for a downloaded video: `<title> [<id>].<ext>`
pub fn video_filename(title: &str, id: &str, extension: &str) -> String {
    to_safe_filename(&format!("{} [{}]", title, id), extension)
}

/// Where to write `filename` given the user's `--output` value.
///
/// No value or an existing directory gets a unique name inside it; anything
/// else is taken as the file path.
pub fn resolve_output_path(output: Option<&Path>, filename: &str) -> std::io::Result<PathBuf> {
    let dir = match output {
        Some(path) if !path.is_dir() => return Ok(path.to_path_buf()),
        Some(path) => path.to_path_buf(),
        None => PathBuf::from("."),
    };
    let unique = generate_unique_filename(&dir, filename)?;
    Ok(dir.join(unique))
}

/// Where to write one entry of a multi-video listing.
///
/// A file path given as `--output` becomes a numbered series in its parent
/// directory (`clip.mp4`, `clip (1).mp4`, ...) so entries never overwrite
/// each other.
pub fn resolve_listing_output_path(
    output: Option<&Path>,
    filename: &str,
) -> std::io::Result<PathBuf> {
    let Some(path) = output.filter(|path| !path.is_dir()) else {
        return resolve_output_path(output, filename);
    };

    let name = match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => filename.to_string(),
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let unique = generate_unique_filename(&dir, &name)?;
    Ok(dir.join(unique))
}

/// Generate a unique filename by appending a number if the file already exists
pub fn generate_unique_filename(base_path: &Path, filename: &str) -> std::io::Result<String> {
    let path = Path::new(filename);
    let stem = path.file_stem().unwrap_or_default().to_string_lossy();
    let extension = path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    let mut final_filename = filename.to_string();
    let mut counter = 1;
    while base_path.join(&final_filename).exists() {
        if counter > 10000 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "Too many files with similar names",
            ));
        }
        final_filename = format!("{} ({}){}", stem, counter, extension);
        counter += 1;
    }

    Ok(final_filename)
}
