//! Discovery of image references hidden inside API response bodies.
//!
//! Two strategies feed the same [`DiscoveredUrls`] set:
//!
//! - a bounded walk over a parsed JSON body collecting image URLs stored under
//!   a curated set of keys,
//! - a free-text scan for the provider's hexadecimal image identifiers, each
//!   of which expands into a fixed set of canonical URLs.
//!
//! The scanner never checks that a derived URL resolves; that is left to the
//! resolver.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ScannerConfig;
use crate::domain::DomainClassifier;

/// Image identifier conventions. Matches starting at the same offset are
/// merged, keeping the longest.
static IMAGE_ID_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"ab67616[a-f0-9]{32}").unwrap(),
        Regex::new(r"ab6761610000[a-f0-9]{24}").unwrap(),
        Regex::new(r"ab67616d[a-f0-9]{32}").unwrap(),
    ]
});

/// Deduplicated, run-scoped set of URLs found by scanning.
///
/// Grows monotonically; iteration order is lexicographic so runs are
/// reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredUrls {
    urls: BTreeSet<String>,
}

impl DiscoveredUrls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, other: impl IntoIterator<Item = String>) {
        self.urls.extend(other);
    }

    pub fn count(&self) -> usize {
        self.urls.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.urls.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.urls.iter().cloned().collect()
    }
}

/// How a body was scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Parsed as JSON and walked.
    Structured,
    /// JSON parsing failed; identifier patterns only.
    FreeText,
    /// Walked, then pattern-scanned as well.
    Both,
}

/// Result of scanning one response body.
#[derive(Debug, Clone)]
pub struct BodyScan {
    pub urls: BTreeSet<String>,
    pub mode: ScanMode,
    /// Nodes deeper than the configured limit were skipped.
    pub depth_limited: bool,
}

pub struct ReferenceScanner {
    domains: DomainClassifier,
    image_keys: HashSet<String>,
    max_depth: usize,
    templates: Vec<String>,
    scan_text_of_json: bool,
}

impl ReferenceScanner {
    pub fn new(domains: DomainClassifier, config: &ScannerConfig) -> Self {
        Self {
            domains,
            image_keys: config.image_keys.iter().cloned().collect(),
            max_depth: config.max_depth,
            templates: config.derived_url_templates.clone(),
            scan_text_of_json: config.scan_text_of_json_bodies,
        }
    }

    /// Scan a decoded response body: structured walk first, identifier
    /// patterns when the body is not JSON.
    pub fn scan_body(&self, text: &str, source_url: &str) -> BodyScan {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => {
                let (mut urls, depth_limited) = self.walk(&value, source_url);
                let mode = if self.scan_text_of_json {
                    urls.extend(self.scan_text(text, source_url));
                    ScanMode::Both
                } else {
                    ScanMode::Structured
                };
                BodyScan {
                    urls,
                    mode,
                    depth_limited,
                }
            }
            Err(e) => {
                debug!(source = source_url, error = %e, "Body is not JSON, scanning as text");
                BodyScan {
                    urls: self.scan_text(text, source_url),
                    mode: ScanMode::FreeText,
                    depth_limited: false,
                }
            }
        }
    }

    /// Collect image URLs stored under curated keys anywhere in `value`.
    pub fn scan_value(&self, value: &Value, source_url: &str) -> BTreeSet<String> {
        self.walk(value, source_url).0
    }

    fn walk(&self, root: &Value, source_url: &str) -> (BTreeSet<String>, bool) {
        let mut found = BTreeSet::new();
        let mut depth_limited = false;
        let mut stack: Vec<(&Value, usize)> = vec![(root, 0)];

        while let Some((node, depth)) = stack.pop() {
            if depth > self.max_depth {
                depth_limited = true;
                continue;
            }

            match node {
                Value::Object(map) => {
                    for (key, value) in map {
                        if self.image_keys.contains(key)
                            && let Value::String(url) = value
                            && self.domains.is_image_url(url)
                        {
                            debug!(source = source_url, url = %url, "Found image reference in API body");
                            found.insert(url.clone());
                        }
                        if value.is_object() || value.is_array() {
                            stack.push((value, depth + 1));
                        }
                    }
                }
                Value::Array(items) => {
                    stack.extend(
                        items
                            .iter()
                            .filter(|v| v.is_object() || v.is_array())
                            .map(|v| (v, depth + 1)),
                    );
                }
                _ => {}
            }
        }

        if depth_limited {
            warn!(
                source = source_url,
                max_depth = self.max_depth,
                "Body nesting exceeds depth limit, deeper nodes skipped"
            );
        }

        (found, depth_limited)
    }

    /// Find image identifiers in free text and expand each into its derived
    /// canonical URLs.
    pub fn scan_text(&self, text: &str, source_url: &str) -> BTreeSet<String> {
        let mut urls = BTreeSet::new();
        for id in find_image_ids(text) {
            for template in &self.templates {
                let url = template.replace("{id}", id);
                debug!(source = source_url, url = %url, "Derived image URL from identifier");
                urls.insert(url);
            }
        }
        urls
    }
}

/// Distinct image identifiers in `text`, one per match offset.
pub fn find_image_ids(text: &str) -> BTreeSet<&str> {
    let mut by_start: BTreeMap<usize, &str> = BTreeMap::new();
    for pattern in IMAGE_ID_PATTERNS.iter() {
        for m in pattern.find_iter(text) {
            by_start
                .entry(m.start())
                .and_modify(|current| {
                    if m.as_str().len() > current.len() {
                        *current = m.as_str();
                    }
                })
                .or_insert(m.as_str());
        }
    }
    by_start.into_values().collect()
}
