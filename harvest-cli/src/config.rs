//! Configuration file loading and command-line overrides.

use std::path::{Path, PathBuf};

use harvest_engine::HarvestConfig;
use harvest_engine::segment::SegmentOrdering;
use tracing::debug;

use crate::error::{AppError, Result};

/// `<config dir>/harvest/config.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("harvest").join("config.toml"))
}

pub fn parse_config(text: &str) -> Result<HarvestConfig> {
    toml::from_str(text).map_err(|e| AppError::Config(e.to_string()))
}

/// Load the configuration.
///
/// An explicit path must exist. Without one the default location is used
/// when present, otherwise built-in defaults apply.
pub fn load_config(explicit: Option<&Path>) -> Result<HarvestConfig> {
    let path = match explicit {
        Some(path) => {
            if !path.is_file() {
                return Err(AppError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            path.to_path_buf()
        }
        None => match default_config_path().filter(|p| p.is_file()) {
            Some(path) => path,
            None => {
                debug!("No config file, using defaults");
                return Ok(HarvestConfig::default());
            }
        },
    };

    debug!(path = %path.display(), "Loading config");
    let text = std::fs::read_to_string(&path)?;
    parse_config(&text)
}

/// Individual fields set from the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub ordering: Option<SegmentOrdering>,
    pub ffmpeg_path: Option<String>,
    pub no_transcode: bool,
    pub timeout_secs: Option<u64>,
}

impl Overrides {
    pub fn apply(&self, config: &mut HarvestConfig) {
        if let Some(ordering) = self.ordering {
            config.segments.ordering = ordering;
        }
        if let Some(path) = &self.ffmpeg_path {
            config.transcode.ffmpeg_path = Some(path.clone());
        }
        if self.no_transcode {
            config.transcode.enabled = false;
        }
        if let Some(secs) = self.timeout_secs {
            config.fetch.timeout_secs = secs;
        }
    }
}
