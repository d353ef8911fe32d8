//! Routes each capture entry to the right handling path.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::capture::{CandidateSource, Entry, MediaCandidate};
use crate::domain::DomainClassifier;
use crate::error::{DecodeError, EntryError};
use crate::scanner::{ReferenceScanner, ScanMode};

/// Category of a URL, checked in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlClass {
    DirectImage,
    DirectVideo,
    ApiReference,
    Irrelevant,
}

/// Outcome of classifying one entry.
#[derive(Debug)]
pub enum ClassifiedEntry {
    DirectImage {
        candidate: MediaCandidate,
        /// Set when an embedded payload failed to decode; the candidate will
        /// be fetched instead.
        decode_error: Option<DecodeError>,
    },
    DirectVideo {
        candidate: MediaCandidate,
        decode_error: Option<DecodeError>,
    },
    ApiReference {
        source_url: String,
        urls: BTreeSet<String>,
        /// `None` when the entry carried no body.
        mode: Option<ScanMode>,
    },
    Irrelevant,
}

pub struct EntryClassifier {
    domains: DomainClassifier,
    scanner: ReferenceScanner,
}

impl EntryClassifier {
    pub fn new(domains: DomainClassifier, scanner: ReferenceScanner) -> Self {
        Self { domains, scanner }
    }

    pub fn classify_url(&self, url: &str) -> UrlClass {
        if self.domains.is_image_url(url) {
            UrlClass::DirectImage
        } else if self.domains.is_video_url(url) {
            UrlClass::DirectVideo
        } else if self.domains.is_api_url(url) {
            UrlClass::ApiReference
        } else {
            UrlClass::Irrelevant
        }
    }

    pub fn classify(&self, entry: &Entry) -> Result<ClassifiedEntry, EntryError> {
        let url = entry.url();
        match self.classify_url(url) {
            UrlClass::DirectImage => {
                let (candidate, decode_error) =
                    MediaCandidate::from_entry(entry, CandidateSource::DirectImage);
                log_decode_error(url, decode_error.as_ref());
                info!(url, "Found image");
                Ok(ClassifiedEntry::DirectImage {
                    candidate,
                    decode_error,
                })
            }
            UrlClass::DirectVideo => {
                let (candidate, decode_error) =
                    MediaCandidate::from_entry(entry, CandidateSource::DirectVideo);
                log_decode_error(url, decode_error.as_ref());
                info!(url, "Found video");
                Ok(ClassifiedEntry::DirectVideo {
                    candidate,
                    decode_error,
                })
            }
            UrlClass::ApiReference => self.scan_api_entry(entry),
            UrlClass::Irrelevant => Ok(ClassifiedEntry::Irrelevant),
        }
    }

    fn scan_api_entry(&self, entry: &Entry) -> Result<ClassifiedEntry, EntryError> {
        let url = entry.url();
        let text = entry
            .response
            .content
            .decoded_text()
            .map_err(|source| EntryError::Decode {
                url: url.to_owned(),
                source,
            })?;

        let Some(text) = text else {
            return Ok(ClassifiedEntry::ApiReference {
                source_url: url.to_owned(),
                urls: BTreeSet::new(),
                mode: None,
            });
        };

        let scan = self.scanner.scan_body(&text, url);
        if !scan.urls.is_empty() {
            debug!(url, found = scan.urls.len(), mode = ?scan.mode, "Scanned API body");
        }
        Ok(ClassifiedEntry::ApiReference {
            source_url: url.to_owned(),
            urls: scan.urls,
            mode: Some(scan.mode),
        })
    }
}

fn log_decode_error(url: &str, error: Option<&DecodeError>) {
    if let Some(e) = error {
        warn!(url, error = %e, "Embedded payload could not be decoded, will fetch instead");
    }
}
