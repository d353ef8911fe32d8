//! Configuration for a harvest run.
//!
//! Every host list, key set and template the engine consults lives here so new
//! CDN hosts can be added from a config file without touching scanning or
//! assembly code. Defaults reproduce the provider's known constants.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::segment::SegmentOrdering;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/134.0.6998.178 Safari/537.36";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub hosts: HostLists,
    pub scanner: ScannerConfig,
    pub fetch: FetchConfig,
    pub segments: SegmentConfig,
    pub output: OutputConfig,
    pub transcode: TranscodeConfig,
}

/// Host lists used by the domain classifier.
///
/// Entries are matched as substrings of a URL's host, so `spclient` matches
/// every regional `*-spclient.spotify.com` host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostLists {
    /// Image CDN hosts
    pub image_hosts: Vec<String>,
    /// Video and canvas CDN hosts
    pub video_hosts: Vec<String>,
    /// API and client hosts whose response bodies may reference images
    pub api_hosts: Vec<String>,
}

impl Default for HostLists {
    fn default() -> Self {
        Self {
            image_hosts: strings(&[
                "i.scdn.co",
                "mosaic.scdn.co",
                "seed-mix-image.spotifycdn.com",
                "lineup-images.scdn.co",
                "thisis-images.scdn.co",
                "charts-images.scdn.co",
                "daily-mix.scdn.co",
                "mixed-media-images.spotifycdn.com",
            ]),
            video_hosts: strings(&[
                "video-akpcw.spotifycdn.com",
                "video-fa723fc0e0b4479496acdae1c1f.spotifycdn.com",
                "canvas.scdn.co",
                "canvaz.scdn.co",
            ]),
            api_hosts: strings(&["api.spotify.com", "spclient"]),
        }
    }
}

/// Reference scanner settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Mapping keys whose string values are collected when they are image URLs
    pub image_keys: Vec<String>,
    /// Maximum nesting depth visited in a structured body
    pub max_depth: usize,
    /// Templates used to derive canonical URLs from an image identifier.
    /// `{id}` is replaced with the identifier.
    pub derived_url_templates: Vec<String>,
    /// Also run the identifier pattern scan on bodies that parsed as JSON
    pub scan_text_of_json_bodies: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            image_keys: strings(&[
                "image",
                "images",
                "cover_art",
                "avatar",
                "picture",
                "artwork",
            ]),
            max_depth: 64,
            derived_url_templates: strings(&[
                "https://i.scdn.co/image/{id}",
                "https://mosaic.scdn.co/640/{id}",
                "https://mosaic.scdn.co/300/{id}",
            ]),
            scan_text_of_json_bodies: false,
        }
    }
}

/// Live fetch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub user_agent: String,
    /// Referer header, the provider's web player origin
    pub referer: String,
    pub accept: String,
    /// Timeout for a single request, in seconds. Requests are never retried.
    pub timeout_secs: u64,
    /// Bodies of this many bytes or fewer are treated as failed fetches
    pub min_body_len: usize,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            referer: "https://open.spotify.com/".to_owned(),
            accept: "*/*".to_owned(),
            timeout_secs: 30,
            min_body_len: 100,
        }
    }
}

/// Fragmented video settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Hosts serving fragmented canvas video
    pub hosts: Vec<String>,
    /// Literal URL marker identifying an init segment
    pub init_marker: String,
    pub ordering: SegmentOrdering,
    /// Media indices accepted by [`SegmentOrdering::Legacy`]
    pub legacy_media_indices: Vec<u64>,
    /// Prefix of assembled stream file names
    pub output_prefix: String,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            hosts: strings(&["video-akpcw.spotifycdn.com"]),
            init_marker: "inits".to_owned(),
            ordering: SegmentOrdering::default(),
            legacy_media_indices: vec![0, 1, 2],
            output_prefix: "spotify_canvas".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Prefix of names synthesized for URLs without a usable path segment
    pub fallback_name_prefix: String,
    /// Content type recorded for candidates promoted from discovered URLs
    pub discovered_content_type: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            fallback_name_prefix: "spotify_media".to_owned(),
            discovered_content_type: "image/jpeg".to_owned(),
        }
    }
}

/// External transcoder settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    pub enabled: bool,
    /// Path to the ffmpeg binary. Falls back to `FFMPEG_PATH`, then `ffmpeg`.
    pub ffmpeg_path: Option<String>,
    pub timeout_secs: u64,
}

impl TranscodeConfig {
    pub fn ffmpeg_path(&self) -> String {
        self.ffmpeg_path
            .clone()
            .or_else(|| std::env::var("FFMPEG_PATH").ok())
            .unwrap_or_else(|| "ffmpeg".to_owned())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ffmpeg_path: None,
            timeout_secs: 60,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}
