//! HAR capture document model and media candidates built from it.

use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DecodeError, EntryError, HarvestError};
use crate::resolver::ResolvedMedia;
use crate::segment::SegmentInfo;

/// A parsed capture with a recognizable `log.entries` collection.
///
/// Entries are kept as raw JSON and decoded one at a time so a single odd
/// entry never rejects the whole document.
#[derive(Debug, Clone)]
pub struct CaptureDocument {
    info: CaptureInfo,
    entries: Vec<Value>,
}

/// Descriptive fields of the capture, carried into the run summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CaptureInfo {
    pub version: String,
    pub creator: Value,
    pub total_entries: usize,
}

impl CaptureDocument {
    pub fn from_value(value: Value) -> Result<Self, HarvestError> {
        let Value::Object(mut root) = value else {
            return Err(HarvestError::malformed("top-level value is not an object"));
        };
        let Some(Value::Object(mut log)) = root.remove("log") else {
            return Err(HarvestError::malformed("missing `log` object"));
        };
        let Some(Value::Array(entries)) = log.remove("entries") else {
            return Err(HarvestError::malformed("missing `log.entries` array"));
        };

        let info = CaptureInfo {
            version: log
                .get("version")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned(),
            creator: log.remove("creator").unwrap_or(Value::Null),
            total_entries: entries.len(),
        };

        Ok(Self { info, entries })
    }

    pub fn from_json_str(text: &str) -> Result<Self, HarvestError> {
        Self::from_value(serde_json::from_str(text)?)
    }

    pub fn info(&self) -> &CaptureInfo {
        &self.info
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Decode entries in capture order.
    pub fn entries(&self) -> impl Iterator<Item = Result<Entry, EntryError>> + '_ {
        self.entries.iter().enumerate().map(|(index, raw)| {
            Entry::deserialize(raw).map_err(|source| EntryError::Shape { index, source })
        })
    }
}

/// One logged network transaction.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Entry {
    pub request: Request,
    pub response: Response,
    pub started_date_time: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Request {
    pub url: String,
    pub method: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Response {
    pub status: u16,
    pub headers: Vec<Header>,
    pub content: Content,
    pub body_size: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// Response body descriptor.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Content {
    pub text: Option<String>,
    pub encoding: Option<String>,
    pub mime_type: Option<String>,
    pub size: Option<i64>,
}

impl Content {
    pub fn is_base64(&self) -> bool {
        self.encoding
            .as_deref()
            .is_some_and(|e| e.eq_ignore_ascii_case("base64"))
    }

    /// Non-empty body text, if any.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.is_empty())
    }

    /// Body decoded as UTF-8 text, honoring the declared encoding.
    pub fn decoded_text(&self) -> Result<Option<String>, DecodeError> {
        let Some(text) = self.text() else {
            return Ok(None);
        };
        if self.is_base64() {
            let bytes = decode_base64(text)?;
            Ok(Some(String::from_utf8(bytes.to_vec())?))
        } else {
            Ok(Some(text.to_owned()))
        }
    }
}

impl Entry {
    pub fn url(&self) -> &str {
        &self.request.url
    }

    pub fn method(&self) -> &str {
        if self.request.method.is_empty() {
            "GET"
        } else {
            &self.request.method
        }
    }

    /// Value of the `content-type` response header, falling back to the
    /// body's declared MIME type.
    pub fn content_type(&self) -> String {
        self.response
            .headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case("content-type"))
            .map(|h| h.value.clone())
            .or_else(|| self.response.content.mime_type.clone())
            .unwrap_or_default()
    }

    pub fn declared_size(&self) -> i64 {
        self.response.body_size.unwrap_or(0)
    }
}

/// Decode standard base64, tolerating embedded line breaks.
pub fn decode_base64(text: &str) -> Result<Bytes, DecodeError> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    Ok(Bytes::from(STANDARD.decode(compact.as_bytes())?))
}

/// Where a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    DirectImage,
    DirectVideo,
    Discovered,
}

/// A unit of potential output media.
#[derive(Debug, Clone, Serialize)]
pub struct MediaCandidate {
    pub url: String,
    pub method: String,
    pub status: u16,
    pub content_type: String,
    pub declared_size: i64,
    pub timestamp: String,
    pub source: CandidateSource,
    /// Payload embedded in the capture, already decoded.
    #[serde(skip)]
    pub embedded: Option<Bytes>,
    pub embedded_size: Option<usize>,
    /// Filled in by resolution.
    pub resolved: Option<ResolvedMedia>,
    pub output_path: Option<PathBuf>,
    /// Filled in by resolution for fragmented video.
    pub segment: Option<SegmentInfo>,
}

impl MediaCandidate {
    /// Build a candidate from a capture entry.
    ///
    /// An embedded payload is attached only for base64 bodies. When decoding
    /// fails the candidate is still returned, without a payload, together
    /// with the error.
    pub fn from_entry(entry: &Entry, source: CandidateSource) -> (Self, Option<DecodeError>) {
        let mut candidate = Self {
            url: entry.url().to_owned(),
            method: entry.method().to_owned(),
            status: entry.response.status,
            content_type: entry.content_type(),
            declared_size: entry.declared_size(),
            timestamp: entry.started_date_time.clone(),
            source,
            embedded: None,
            embedded_size: None,
            resolved: None,
            output_path: None,
            segment: None,
        };

        let content = &entry.response.content;
        let mut error = None;
        if content.is_base64()
            && let Some(text) = content.text()
        {
            match decode_base64(text) {
                Ok(bytes) => {
                    candidate.embedded_size = Some(bytes.len());
                    candidate.embedded = Some(bytes);
                }
                Err(e) => error = Some(e),
            }
        }

        (candidate, error)
    }

    /// A candidate for a URL found by scanning, to be fetched.
    pub fn discovered(url: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_owned(),
            status: 0,
            content_type: content_type.into(),
            declared_size: 0,
            timestamp: String::new(),
            source: CandidateSource::Discovered,
            embedded: None,
            embedded_size: None,
            resolved: None,
            output_path: None,
            segment: None,
        }
    }

    pub fn is_segment(&self) -> bool {
        self.segment.is_some()
    }

    /// Resolved bytes, when resolution succeeded.
    pub fn data(&self) -> Option<&Bytes> {
        self.resolved.as_ref().map(|r| &r.bytes)
    }
}
