use std::path::PathBuf;

/// Run-level errors. Only these abort a harvest run.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("malformed capture document: {reason}")]
    DocumentMalformed { reason: String },

    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

impl HarvestError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::DocumentMalformed {
            reason: reason.into(),
        }
    }
}

/// A payload could not be decoded under its declared encoding.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Failure while classifying or scanning a single capture entry.
///
/// The entry is skipped and the run continues.
#[derive(Debug, thiserror::Error)]
pub enum EntryError {
    #[error("entry {index} has an unexpected shape: {source}")]
    Shape {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("body of {url} could not be decoded: {source}")]
    Decode {
        url: String,
        #[source]
        source: DecodeError,
    },
}

impl EntryError {
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

/// A candidate could not be turned into bytes.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("fetch failed for {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("failed to persist {filename}: {source}")]
    Sink {
        filename: String,
        #[source]
        source: std::io::Error,
    },
}

impl ResolveError {
    pub fn fetch_failed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FetchFailed {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error came from the remote side rather than local storage.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, Self::FetchFailed { .. } | Self::Network { .. })
    }
}

/// Soft failures of the optional transcoding step.
#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    #[error("transcoder `{program}` is not available")]
    Unavailable { program: String },

    #[error("transcoding {input} failed with exit code {code}: {stderr}")]
    Failed {
        input: PathBuf,
        code: i32,
        stderr: String,
    },

    #[error("transcoding {input} timed out")]
    TimedOut { input: PathBuf },

    #[error("transcoder I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}
