use std::time::{SystemTime, UNIX_EPOCH};

use url::Url;

use super::kind::ContentKind;

/// Sanitize a string for use as a filename.
///
/// Every character outside `[A-Za-z0-9_.-]` becomes `_`.
pub fn sanitize_filename(input: &str) -> String {
    input
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Final path segment of `url`, if it has a non-empty one.
fn last_path_segment(url: &str) -> Option<String> {
    match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .and_then(|path| path.trim_end_matches('/').rsplit('/').next())
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned),
    }
}

/// Strip one trailing extension, `a.b.webm` → `a.b`.
fn strip_extension(name: &str) -> &str {
    name.rsplit_once('.').map_or(name, |(stem, _)| stem)
}

/// Build a safe output filename for `url`.
///
/// Uses the URL's final path segment without its extension, sanitized. When
/// nothing usable remains a name is synthesized from `fallback_prefix` and the
/// current Unix time. The inferred extension is always appended.
pub fn generate_filename(url: &str, kind: ContentKind, fallback_prefix: &str) -> String {
    let stem = last_path_segment(url)
        .map(|segment| sanitize_filename(strip_extension(&segment)))
        .filter(|s| !s.is_empty());

    let stem = stem.unwrap_or_else(|| {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let prefix = sanitize_filename(fallback_prefix);
        let prefix = if prefix.is_empty() { "media".to_owned() } else { prefix };
        format!("{prefix}_{now}")
    });

    format!("{stem}{}", kind.extension())
}
