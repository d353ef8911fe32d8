//! Host-list predicates deciding which provider CDN a URL belongs to.

use url::Url;

use crate::config::HostLists;

/// Pure predicates over the configured host lists.
///
/// A pattern matches when it is a substring of the URL's host. Strings that do
/// not parse as URLs are matched as a whole, so any input is accepted and
/// non-matches simply return `false`.
#[derive(Debug, Clone)]
pub struct DomainClassifier {
    hosts: HostLists,
}

impl DomainClassifier {
    pub fn new(hosts: HostLists) -> Self {
        Self { hosts }
    }

    pub fn is_image_url(&self, url: &str) -> bool {
        host_matches(url, &self.hosts.image_hosts)
    }

    pub fn is_video_url(&self, url: &str) -> bool {
        host_matches(url, &self.hosts.video_hosts)
    }

    /// API/client hosts whose bodies are worth scanning for references.
    pub fn is_api_url(&self, url: &str) -> bool {
        host_matches(url, &self.hosts.api_hosts)
    }
}

impl Default for DomainClassifier {
    fn default() -> Self {
        Self::new(HostLists::default())
    }
}

/// Whether the host of `url` contains any of `patterns`.
pub fn host_matches(url: &str, patterns: &[String]) -> bool {
    let parsed = Url::parse(url).ok();
    let haystack = parsed
        .as_ref()
        .and_then(|u| u.host_str())
        .unwrap_or(url);
    patterns
        .iter()
        .any(|pattern| !pattern.is_empty() && haystack.contains(pattern.as_str()))
}
