use std::path::{Path, PathBuf};

use url::Url;

const FALLBACK_FILENAME: &str = "download";

/// Sanitize filename to remove invalid characters
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            _ => c,
        })
        .collect::<String>()
        .trim()
        .trim_matches('.')
        .to_string()
}

/// Pick a local filename from the last path segment of a download URL
pub fn filename_from_url(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());

    let name = sanitize_filename(&decoded);
    if name.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        name
    }
}

/// Paths to try in turn when saving `filename` into `dir`:
/// `name.ext`, then `name (1).ext`, `name (2).ext`, ...
pub fn candidate_paths<'a>(
    dir: &'a Path,
    filename: &'a str,
) -> impl Iterator<Item = PathBuf> + 'a {
    let (stem, ext) = match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (filename, None),
    };

    std::iter::once(dir.join(filename)).chain((1u32..).map(move |n| match ext {
        Some(ext) => dir.join(format!("{stem} ({n}).{ext}")),
        None => dir.join(format!("{stem} ({n})")),
    }))
}
