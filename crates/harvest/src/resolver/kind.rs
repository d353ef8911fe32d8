//! Content kind inference.
//!
//! Two ordered rule tables are evaluated in sequence: the declared
//! `content-type` first, then magic bytes. The first matching rule wins; when
//! nothing matches the item is generic binary. The order of both tables
//! decides whether an item is routed to the video or the image folder, so it
//! must not be reshuffled.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Jpeg,
    Png,
    Gif,
    Webp,
    Webm,
    Mp4,
    Binary,
}

impl ContentKind {
    /// File extension including the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => ".jpg",
            Self::Png => ".png",
            Self::Gif => ".gif",
            Self::Webp => ".webp",
            Self::Webm => ".webm",
            Self::Mp4 => ".mp4",
            Self::Binary => ".bin",
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, Self::Webm | Self::Mp4)
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension().trim_start_matches('.'))
    }
}

/// Substring of a lowercased content type → kind.
const HEADER_RULES: &[(&str, ContentKind)] = &[
    ("jpeg", ContentKind::Jpeg),
    ("jpg", ContentKind::Jpeg),
    ("png", ContentKind::Png),
    ("gif", ContentKind::Gif),
    ("webp", ContentKind::Webp),
    ("webm", ContentKind::Webm),
    ("mp4", ContentKind::Mp4),
];

type MagicTest = fn(&[u8]) -> bool;

/// Leading-bytes signature → kind.
const MAGIC_RULES: &[(MagicTest, ContentKind)] = &[
    (is_jpeg, ContentKind::Jpeg),
    (is_png, ContentKind::Png),
    (is_gif, ContentKind::Gif),
    (is_webp, ContentKind::Webp),
    (is_ebml, ContentKind::Webm),
    (is_iso_bmff, ContentKind::Mp4),
];

fn is_jpeg(data: &[u8]) -> bool {
    data.starts_with(&[0xFF, 0xD8, 0xFF])
}

fn is_png(data: &[u8]) -> bool {
    data.starts_with(b"\x89PNG")
}

fn is_gif(data: &[u8]) -> bool {
    data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a")
}

fn is_webp(data: &[u8]) -> bool {
    data.starts_with(b"RIFF") && contains(head(data, 20), b"WEBP")
}

fn is_ebml(data: &[u8]) -> bool {
    data.starts_with(&[0x1A, 0x45, 0xDF, 0xA3])
}

fn is_iso_bmff(data: &[u8]) -> bool {
    data.starts_with(&[0x00, 0x00, 0x00]) && contains(head(data, 20), b"ftyp")
}

fn head(data: &[u8], n: usize) -> &[u8] {
    &data[..data.len().min(n)]
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Kind declared by a content type, if the header table knows it.
pub fn kind_from_content_type(content_type: &str) -> Option<ContentKind> {
    let lowered = content_type.to_ascii_lowercase();
    HEADER_RULES
        .iter()
        .find(|(needle, _)| lowered.contains(needle))
        .map(|(_, kind)| *kind)
}

/// Kind recognized from leading bytes, if any signature matches.
pub fn sniff(data: &[u8]) -> Option<ContentKind> {
    MAGIC_RULES
        .iter()
        .find(|(test, _)| test(data))
        .map(|(_, kind)| *kind)
}

/// Infer the kind of a payload: header first, magic bytes second.
pub fn infer_kind(content_type: Option<&str>, data: &[u8]) -> ContentKind {
    content_type
        .and_then(kind_from_content_type)
        .or_else(|| sniff(data))
        .unwrap_or(ContentKind::Binary)
}
