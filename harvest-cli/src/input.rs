use std::fmt;
use std::path::PathBuf;

use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::error::{AppError, Result};

/// Where the capture document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureSource {
    Path(PathBuf),
    /// The document text itself, passed on the command line.
    Literal(String),
    Stdin,
}

/// Brace-delimited text is treated as the document itself.
pub fn looks_like_json(input: &str) -> bool {
    let trimmed = input.trim();
    trimmed.starts_with('{') && trimmed.ends_with('}')
}

impl CaptureSource {
    pub fn detect(input: Option<&str>) -> Self {
        match input {
            None | Some("-") => Self::Stdin,
            Some(text) if looks_like_json(text) => Self::Literal(text.trim().to_string()),
            Some(path) => Self::Path(PathBuf::from(path)),
        }
    }

    pub async fn read(&self) -> Result<String> {
        match self {
            Self::Path(path) => match tokio::fs::read_to_string(path).await {
                Ok(text) => {
                    debug!(path = %path.display(), bytes = text.len(), "Read capture file");
                    Ok(text)
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AppError::InvalidInput(
                    format!("capture file not found: {}", path.display()),
                )),
                Err(e) => Err(e.into()),
            },
            Self::Literal(text) => Ok(text.clone()),
            Self::Stdin => {
                let mut text = String::new();
                tokio::io::stdin().read_to_string(&mut text).await?;
                if text.trim().is_empty() {
                    return Err(AppError::InvalidInput("no input provided".to_string()));
                }
                Ok(text)
            }
        }
    }
}

impl fmt::Display for CaptureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Literal(text) => write!(f, "<inline JSON, {} bytes>", text.len()),
            Self::Stdin => f.write_str("<stdin>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_rules() {
        assert_eq!(CaptureSource::detect(None), CaptureSource::Stdin);
        assert_eq!(CaptureSource::detect(Some("-")), CaptureSource::Stdin);
        assert_eq!(
            CaptureSource::detect(Some("  {\"log\": {}}\n")),
            CaptureSource::Literal("{\"log\": {}}".to_string())
        );
        assert_eq!(
            CaptureSource::detect(Some("captures/open.spotify.com.har")),
            CaptureSource::Path(PathBuf::from("captures/open.spotify.com.har"))
        );
        // an opening brace alone is not JSON
        assert!(matches!(
            CaptureSource::detect(Some("{draft.har")),
            CaptureSource::Path(_)
        ));
    }

    #[tokio::test]
    async fn reads_files_and_reports_missing_ones() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.har");
        tokio::fs::write(&path, "{\"log\": {\"entries\": []}}").await.unwrap();

        let text = CaptureSource::Path(path).read().await.unwrap();
        assert!(text.contains("entries"));

        let err = CaptureSource::Path(dir.path().join("missing.har"))
            .read()
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn literal_is_returned_as_is() {
        let source = CaptureSource::detect(Some("{\"log\":{\"entries\":[]}}"));
        assert_eq!(source.read().await.unwrap(), "{\"log\":{\"entries\":[]}}");
        assert_eq!(source.to_string(), "<inline JSON, 22 bytes>");
    }
}
