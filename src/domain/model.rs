use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use super::error::ResolutionError;

/// Custom URL schemes registered by desktop slicers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlicerProtocol {
    Cura,
    OrcaSlicer,
    ElegooSlicer,
    PrusaSlicer,
    SuperSlicer,
    LycheeSlicer,
    BambuConnect,
}

impl SlicerProtocol {
    pub const ALL: [SlicerProtocol; 7] = [
        SlicerProtocol::Cura,
        SlicerProtocol::OrcaSlicer,
        SlicerProtocol::ElegooSlicer,
        SlicerProtocol::PrusaSlicer,
        SlicerProtocol::SuperSlicer,
        SlicerProtocol::LycheeSlicer,
        SlicerProtocol::BambuConnect,
    ];

    pub fn scheme(self) -> &'static str {
        match self {
            SlicerProtocol::Cura => "cura",
            SlicerProtocol::OrcaSlicer => "orcaslicer",
            SlicerProtocol::ElegooSlicer => "elegooslicer",
            SlicerProtocol::PrusaSlicer => "prusaslicer",
            SlicerProtocol::SuperSlicer => "superslicer",
            SlicerProtocol::LycheeSlicer => "lycheeslicer",
            SlicerProtocol::BambuConnect => "bambu-connect",
        }
    }

    pub fn from_scheme(scheme: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.scheme().eq_ignore_ascii_case(scheme))
    }

    /// Whether links of this scheme embed a downloadable file URL.
    ///
    /// Bambu Connect links identify a print job rather than a file, so they
    /// mark a slicer menu but cannot be resolved.
    pub fn carries_file_url(self) -> bool {
        !matches!(self, SlicerProtocol::BambuConnect)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkProtocol {
    Http,
    Https,
    Slicer(SlicerProtocol),
}

/// An anchor href as authored in the page, tagged with its recognized scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlicerLink {
    raw_href: String,
    protocol: LinkProtocol,
}

impl SlicerLink {
    pub fn parse(raw_href: &str) -> Result<Self, ResolutionError> {
        let href = raw_href.trim();
        let scheme = match Url::parse(href) {
            Ok(url) => url.scheme().to_string(),
            // Some vendor links are not valid hierarchical URLs; fall back to the prefix.
            Err(_) => scheme_prefix(href)
                .ok_or_else(|| ResolutionError::InvalidHref(href.to_string()))?
                .to_ascii_lowercase(),
        };

        let protocol = match scheme.as_str() {
            "http" => LinkProtocol::Http,
            "https" => LinkProtocol::Https,
            other => SlicerProtocol::from_scheme(other)
                .map(LinkProtocol::Slicer)
                .ok_or(ResolutionError::UnsupportedScheme(scheme.clone()))?,
        };

        Ok(Self {
            raw_href: raw_href.to_string(),
            protocol,
        })
    }

    /// The href exactly as given.
    pub fn raw_href(&self) -> &str {
        &self.raw_href
    }

    /// The href without surrounding whitespace.
    pub fn href(&self) -> &str {
        self.raw_href.trim()
    }

    pub fn protocol(&self) -> LinkProtocol {
        self.protocol
    }

    pub fn is_direct(&self) -> bool {
        matches!(self.protocol, LinkProtocol::Http | LinkProtocol::Https)
    }
}

fn scheme_prefix(raw: &str) -> Option<&str> {
    let (scheme, _) = raw.split_once(':')?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    let valid = first.is_ascii_alphabetic()
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some(scheme)
}

/// A remote file URL that is safe to hand to the download host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedFileUrl(String);

impl ResolvedFileUrl {
    pub fn parse(candidate: impl Into<String>) -> Result<Self, ResolutionError> {
        let candidate = candidate.into();
        if has_http_prefix(&candidate) {
            Ok(Self(candidate))
        } else {
            Err(ResolutionError::NoFileUrl)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ResolvedFileUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub(crate) fn has_http_prefix(candidate: &str) -> bool {
    candidate
        .get(..4)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("http"))
}

/// Opaque download-session identifier issued by the download host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DownloadId(pub u64);

impl fmt::Display for DownloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadState {
    InProgress,
    Complete,
    Interrupted,
}

impl DownloadState {
    pub fn is_terminal(self) -> bool {
        matches!(self, DownloadState::Complete | DownloadState::Interrupted)
    }
}

/// The driver's view of one download session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadHandle {
    pub id: DownloadId,
    pub state: DownloadState,
}

impl DownloadHandle {
    pub fn new(id: DownloadId) -> Self {
        Self {
            id,
            state: DownloadState::InProgress,
        }
    }
}

/// Local path of a finished download, as reported by the download host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalFileRef {
    pub path: String,
}

impl LocalFileRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl fmt::Display for LocalFileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}
