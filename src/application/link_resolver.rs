//! Recovers the real remote file URL from a slicer deep link.
//!
//! Slicer vendors disagree on where the payload URL goes: a `file` query
//! parameter, a percent-encoded path segment after `open/`, or somewhere
//! ad hoc. Several of these schemes are not valid hierarchical URLs, so each
//! extraction strategy works independently and the first one to produce an
//! `http` URL wins.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;
use url::Url;

use crate::domain::model::has_http_prefix;
use crate::domain::{LinkProtocol, ResolutionError, ResolvedFileUrl, SlicerLink};

static ENCODED_HTTP_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?%3[Aa]%2[Ff]%2[Ff].+$").expect("valid regex"));
static PLAIN_HTTP_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://.+$").expect("valid regex"));
static FILE_FRAGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]file=([^&]+)").expect("valid regex"));

const OPEN_PATH_MARKER: &str = "://open/http";

/// One way of digging a file URL out of a slicer link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// `scheme://open?file=<url>`
    QueryParam,
    /// `scheme://open/<url>`, with or without percent-encoding
    EmbeddedOpenPath,
    /// A `file=` fragment anywhere in the raw string
    FileFragment,
}

impl Strategy {
    pub const ORDERED: [Strategy; 3] = [
        Strategy::QueryParam,
        Strategy::EmbeddedOpenPath,
        Strategy::FileFragment,
    ];

    pub fn extract(self, raw_href: &str) -> Option<String> {
        match self {
            Strategy::QueryParam => query_param(raw_href),
            Strategy::EmbeddedOpenPath => embedded_open_path(raw_href),
            Strategy::FileFragment => file_fragment(raw_href),
        }
    }
}

fn query_param(raw_href: &str) -> Option<String> {
    let url = Url::parse(raw_href).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "file")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

fn embedded_open_path(raw_href: &str) -> Option<String> {
    if !raw_href.contains(OPEN_PATH_MARKER) {
        return None;
    }
    let found = ENCODED_HTTP_URL
        .find(raw_href)
        .or_else(|| PLAIN_HTTP_URL.find(raw_href))?;
    percent_decode(found.as_str())
}

fn file_fragment(raw_href: &str) -> Option<String> {
    let caps = FILE_FRAGMENT.captures(raw_href)?;
    percent_decode(&caps[1])
}

fn percent_decode(value: &str) -> Option<String> {
    urlencoding::decode(value).ok().map(|s| s.into_owned())
}

/// Resolve a clicked href to the remote file URL it points at.
///
/// Direct http(s) links are returned unchanged; surrounding whitespace is
/// dropped only when it hides the http prefix. Values are decoded once;
/// double-encoded payloads are not unwrapped further.
pub fn resolve(raw_href: &str) -> Result<ResolvedFileUrl, ResolutionError> {
    let link = SlicerLink::parse(raw_href)?;

    let protocol = match link.protocol() {
        LinkProtocol::Http | LinkProtocol::Https => {
            return ResolvedFileUrl::parse(link.raw_href())
                .or_else(|_| ResolvedFileUrl::parse(link.href()));
        }
        LinkProtocol::Slicer(protocol) => protocol,
    };

    if !protocol.carries_file_url() {
        debug!(scheme = protocol.scheme(), "link scheme carries no file url");
        return Err(ResolutionError::NoFileUrl);
    }

    for strategy in Strategy::ORDERED {
        let Some(candidate) = strategy.extract(link.href()) else {
            continue;
        };
        if has_http_prefix(&candidate) {
            debug!(?strategy, url = %candidate, "resolved slicer link");
            return ResolvedFileUrl::parse(candidate);
        }
        debug!(?strategy, %candidate, "candidate is not an http url");
    }

    Err(ResolutionError::NoFileUrl)
}

/// Whether an href uses one of the known slicer schemes.
pub fn is_slicer_href(href: &str) -> bool {
    SlicerLink::parse(href).is_ok_and(|link| matches!(link.protocol(), LinkProtocol::Slicer(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_links_unchanged() {
        for href in [
            "https://example.com/model.stl",
            "http://example.com/files/a%20b.3mf?x=1&file=ignored",
        ] {
            assert_eq!(resolve(href).unwrap().as_str(), href);
        }

        let trailing = "https://example.com/model.stl ";
        assert_eq!(resolve(trailing).unwrap().as_str(), trailing);
        assert_eq!(
            resolve("  https://example.com/model.stl").unwrap().as_str(),
            "https://example.com/model.stl"
        );
    }

    #[test]
    fn test_query_param() {
        let resolved = resolve("orcaslicer://open?file=https%3A%2F%2Fexample.com%2Fm.3mf").unwrap();
        assert_eq!(resolved.as_str(), "https://example.com/m.3mf");

        let resolved = resolve("prusaslicer://open?file=https://example.com/p.stl").unwrap();
        assert_eq!(resolved.as_str(), "https://example.com/p.stl");

        let resolved =
            resolve("cura://open?name=x&file=https%3A%2F%2Fexample.com%2Fc.stl").unwrap();
        assert_eq!(resolved.as_str(), "https://example.com/c.stl");
    }

    #[test]
    fn test_embedded_open_path() {
        let resolved = resolve("lycheeslicer://open/https%3A%2F%2Fexample.com%2Fm.lys").unwrap();
        assert_eq!(resolved.as_str(), "https://example.com/m.lys");

        let resolved = resolve("superslicer://open/https://example.com/s.stl").unwrap();
        assert_eq!(resolved.as_str(), "https://example.com/s.stl");
    }

    #[test]
    fn test_file_fragment_when_url_is_malformed() {
        let href = "prusaslicer://[open?file=https%3A%2F%2Fexample.com%2Fa.stl";
        assert_eq!(Strategy::QueryParam.extract(href), None);
        assert_eq!(Strategy::EmbeddedOpenPath.extract(href), None);
        assert_eq!(resolve(href).unwrap().as_str(), "https://example.com/a.stl");
    }

    #[test]
    fn test_strategies_are_isolated() {
        assert_eq!(Strategy::QueryParam.extract("cura://open?file="), None);
        assert_eq!(Strategy::EmbeddedOpenPath.extract("cura://open?file=https://a/b"), None);
        assert_eq!(
            Strategy::FileFragment.extract("anything&file=https%3A%2F%2Fa%2Fb&x=1"),
            Some("https://a/b".to_string())
        );
        assert_eq!(Strategy::FileFragment.extract("file=https://a/b"), None);
    }

    #[test]
    fn test_double_encoding_is_decoded_once() {
        let resolved =
            resolve("elegooslicer://open?file=https%3A%2F%2Fexample.com%2Fa%2520b.stl").unwrap();
        assert_eq!(resolved.as_str(), "https://example.com/a%20b.stl");
    }

    #[test]
    fn test_unresolvable_links() {
        assert_eq!(resolve("cura://open?file=model.stl"), Err(ResolutionError::NoFileUrl));
        assert_eq!(resolve("orcaslicer://open"), Err(ResolutionError::NoFileUrl));
        assert_eq!(
            resolve("bambu-connect://import-file?url=https%3A%2F%2Fa%2Fb.3mf"),
            Err(ResolutionError::NoFileUrl)
        );
        assert!(matches!(
            resolve("mailto:someone@example.com"),
            Err(ResolutionError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_is_slicer_href() {
        assert!(is_slicer_href("cura://open?file=x"));
        assert!(is_slicer_href("bambu-connect://import-file"));
        assert!(!is_slicer_href("https://example.com/model.stl"));
        assert!(!is_slicer_href("javascript:void(0)"));
    }
}
