//! Fragment identity inferred from URL structure.
//!
//! Canvas videos are served as WebM fragments under paths such as
//! `.../sources/<hex source id>/profiles/<profile id>/inits/...` and
//! `.../sources/<hex source id>/profiles/<profile id>/<index>.webm`.
//! Group, role and order are all derived from those path tokens.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::SegmentConfig;
use crate::resolver::ContentKind;

static SOURCE_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"sources/([a-f0-9]+)/").unwrap());
static PROFILE_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"profiles/(\d+)/").unwrap());
static FINAL_SEGMENT_INDEX_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)(?:\.\w+)?$").unwrap());
static LEGACY_INDEX_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(\d+)\.webm").unwrap());

/// How media fragments are recognized and ordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SegmentOrdering {
    /// The final path segment, minus its extension, is the index when it
    /// is purely numeric; any fragment carrying one is a media fragment.
    #[default]
    TrailingToken,
    /// Compatibility mode: only `/<n>.webm` paths whose index is in the
    /// configured fixed set are media fragments.
    Legacy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentRole {
    Init,
    Media,
    Unknown,
}

/// Identity of one logical stream: `(source id, profile id)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SegmentGroupKey {
    pub source_id: String,
    pub profile_id: String,
}

impl SegmentGroupKey {
    pub fn from_url(url: &str) -> Option<Self> {
        let source_id = SOURCE_ID_REGEX.captures(url)?.get(1)?.as_str();
        let profile_id = PROFILE_ID_REGEX.captures(url)?.get(1)?.as_str();
        Some(Self {
            source_id: source_id.to_owned(),
            profile_id: profile_id.to_owned(),
        })
    }
}

impl fmt::Display for SegmentGroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_profile_{}", self.source_id, self.profile_id)
    }
}

/// Segment metadata attached to a resolved video candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentInfo {
    /// `None` when the URL lacks a source or profile identifier.
    pub group: Option<SegmentGroupKey>,
    pub role: SegmentRole,
    pub index: u64,
}

/// Segment detection rules taken from [`SegmentConfig`].
#[derive(Debug, Clone)]
pub struct SegmentRules {
    init_marker: String,
    ordering: SegmentOrdering,
    legacy_media_indices: Vec<u64>,
}

impl SegmentRules {
    pub fn new(config: &SegmentConfig) -> Self {
        Self {
            init_marker: config.init_marker.clone(),
            ordering: config.ordering,
            legacy_media_indices: config.legacy_media_indices.clone(),
        }
    }

    /// Whether a resolved video looks like a WebM fragment at all.
    pub fn is_fragment(url: &str, kind: ContentKind) -> bool {
        kind == ContentKind::Webm || url.to_ascii_lowercase().contains("webm")
    }

    /// Derive segment metadata for a resolved video.
    ///
    /// Returns `None` when the item is not a fragment.
    pub fn detect(&self, url: &str, kind: ContentKind) -> Option<SegmentInfo> {
        if !Self::is_fragment(url, kind) {
            return None;
        }

        let index = self.index(url);
        let role = if url.contains(self.init_marker.as_str()) {
            SegmentRole::Init
        } else {
            match self.ordering {
                SegmentOrdering::TrailingToken if index.is_some() => SegmentRole::Media,
                SegmentOrdering::Legacy
                    if index.is_some_and(|i| self.legacy_media_indices.contains(&i)) =>
                {
                    SegmentRole::Media
                }
                _ => SegmentRole::Unknown,
            }
        };

        Some(SegmentInfo {
            group: SegmentGroupKey::from_url(url),
            role,
            index: index.unwrap_or(0),
        })
    }

    fn index(&self, url: &str) -> Option<u64> {
        match self.ordering {
            SegmentOrdering::TrailingToken => trailing_numeric_token(url),
            SegmentOrdering::Legacy => LEGACY_INDEX_REGEX
                .captures(url)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse().ok()),
        }
    }
}

/// The numeric stem of the final URL path segment (`.../17.webm` is 17).
///
/// Digits elsewhere in the path, such as the profile id, never count.
pub fn trailing_numeric_token(url: &str) -> Option<u64> {
    let parsed = Url::parse(url).ok();
    let path = match &parsed {
        Some(u) => u.path(),
        None => url.split(['?', '#']).next().unwrap_or(url),
    };
    let last = path.rsplit('/').next()?;
    FINAL_SEGMENT_INDEX_REGEX
        .captures(last)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
