//! Turns a media candidate into bytes, a content kind and a safe filename.
//!
//! Embedded payloads are used as-is; everything else is fetched once through
//! the [`MediaFetcher`] collaborator. Persisting the result is the caller's
//! job (see [`crate::sink`]).

mod fetch;
mod filename;
mod kind;

use std::sync::Arc;

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::capture::MediaCandidate;
use crate::config::HarvestConfig;
use crate::domain::host_matches;
use crate::error::ResolveError;

pub use fetch::{FetchResponse, HttpFetcher, MediaFetcher, install_rustls_provider, request_headers};
pub use filename::{generate_filename, sanitize_filename};
pub use kind::{ContentKind, infer_kind, kind_from_content_type, sniff};

/// Output category, mapped to the `images/` and `videos/` folders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaCategory {
    Image,
    Video,
}

impl MediaCategory {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Image => "images",
            Self::Video => "videos",
        }
    }
}

/// Bytes plus everything needed to store them.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedMedia {
    #[serde(skip)]
    pub bytes: Bytes,
    pub size: usize,
    pub kind: ContentKind,
    pub category: MediaCategory,
    pub filename: String,
    /// Content type the kind was inferred from, if any.
    pub content_type: Option<String>,
    /// Whether the bytes came from a live fetch rather than the capture.
    pub fetched: bool,
}

pub struct MediaResolver {
    fetcher: Arc<dyn MediaFetcher>,
    headers: HeaderMap,
    min_body_len: usize,
    fallback_prefix: String,
    segment_hosts: Vec<String>,
}

impl MediaResolver {
    pub fn new(config: &HarvestConfig, fetcher: Arc<dyn MediaFetcher>) -> Self {
        Self {
            fetcher,
            headers: request_headers(&config.fetch),
            min_body_len: config.fetch.min_body_len,
            fallback_prefix: config.output.fallback_name_prefix.clone(),
            segment_hosts: config.segments.hosts.clone(),
        }
    }

    /// Produce bytes, kind and filename for a candidate.
    pub async fn resolve(&self, candidate: &MediaCandidate) -> Result<ResolvedMedia, ResolveError> {
        if let Some(bytes) = &candidate.embedded {
            debug!(url = %candidate.url, bytes = bytes.len(), "Using embedded payload");
            let content_type = Some(candidate.content_type.as_str()).filter(|c| !c.is_empty());
            return Ok(self.describe(&candidate.url, content_type, bytes.clone(), false));
        }

        info!(url = %candidate.url, "Downloading");
        let response = self.fetcher.get(&candidate.url, &self.headers).await?;

        if response.status != StatusCode::OK {
            return Err(ResolveError::fetch_failed(
                &candidate.url,
                format!("unexpected status {}", response.status),
            ));
        }
        if response.body.len() <= self.min_body_len {
            return Err(ResolveError::fetch_failed(
                &candidate.url,
                format!(
                    "body of {} bytes is below the {} byte minimum",
                    response.body.len(),
                    self.min_body_len
                ),
            ));
        }

        let content_type = response.content_type().map(ToOwned::to_owned);
        Ok(self.describe(
            &candidate.url,
            content_type.as_deref(),
            response.body,
            true,
        ))
    }

    fn describe(
        &self,
        url: &str,
        content_type: Option<&str>,
        bytes: Bytes,
        fetched: bool,
    ) -> ResolvedMedia {
        let kind = infer_kind(content_type, &bytes);
        let category = self.categorize(url, content_type, kind);
        let filename = generate_filename(url, kind, &self.fallback_prefix);
        if kind == ContentKind::Binary {
            warn!(url, "Could not infer a media kind, storing as binary");
        }

        ResolvedMedia {
            size: bytes.len(),
            bytes,
            kind,
            category,
            filename,
            content_type: content_type.map(ToOwned::to_owned),
            fetched,
        }
    }

    /// Video when the content type says so, the kind is a video container, or
    /// the URL lives on a fragmented-video host.
    pub fn categorize(&self, url: &str, content_type: Option<&str>, kind: ContentKind) -> MediaCategory {
        let declared_video = content_type.is_some_and(|c| c.to_ascii_lowercase().contains("video"));
        if declared_video || kind.is_video() || host_matches(url, &self.segment_hosts) {
            MediaCategory::Video
        } else {
            MediaCategory::Image
        }
    }
}
