//! Optional conversion of assembled WebM streams to MP4.
//!
//! Failures here never fail a run; the caller keeps the original file.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::TranscodeConfig;
use crate::error::TranscodeError;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Convert `input`, returning the path of the new file.
    async fn transcode(&self, input: &Path) -> Result<PathBuf, TranscodeError>;
}

/// [`Transcoder`] that shells out to ffmpeg
/// (H.264 video, AAC audio, faststart).
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    ffmpeg_path: String,
    timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(config: &TranscodeConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path(),
            timeout: config.timeout(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_args(input: &Path, output: &Path) -> Vec<String> {
        vec![
            "-n".to_string(),
            "-i".to_string(),
            input.to_string_lossy().into_owned(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            output.to_string_lossy().into_owned(),
        ]
    }
}

/// Sibling `.mp4` path, never equal to the input.
pub fn output_path_for(input: &Path) -> PathBuf {
    let candidate = input.with_extension("mp4");
    if candidate == input {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        input.with_file_name(format!("{stem}.transcoded.mp4"))
    } else {
        candidate
    }
}

/// [`output_path_for`], suffixed `_1`, `_2`, ... past files that already exist.
pub async fn free_output_path(input: &Path) -> PathBuf {
    let preferred = output_path_for(input);
    if !exists(&preferred).await {
        return preferred;
    }
    let stem = preferred
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut n = 1u32;
    loop {
        let candidate = preferred.with_file_name(format!("{stem}_{n}.mp4"));
        if !exists(&candidate).await {
            return candidate;
        }
        n += 1;
    }
}

async fn exists(path: &Path) -> bool {
    matches!(tokio::fs::try_exists(path).await, Ok(true))
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, input: &Path) -> Result<PathBuf, TranscodeError> {
        let output = free_output_path(input).await;
        let args = Self::build_args(input, &output);
        debug!("FFmpeg args: {:?}", args);

        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.args(&args)
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            cmd.as_std_mut().creation_flags(CREATE_NO_WINDOW);
        }

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TranscodeError::Unavailable {
                    program: self.ffmpeg_path.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let command_output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(TranscodeError::TimedOut {
                    input: input.to_path_buf(),
                });
            }
        };

        if !command_output.status.success() {
            let stderr = String::from_utf8_lossy(&command_output.stderr);
            let last_line = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("Unknown ffmpeg error")
                .to_string();
            return Err(TranscodeError::Failed {
                input: input.to_path_buf(),
                code: command_output.status.code().unwrap_or(-1),
                stderr: last_line,
            });
        }

        if tokio::fs::metadata(&output).await.is_err() {
            return Err(TranscodeError::Failed {
                input: input.to_path_buf(),
                code: 0,
                stderr: "no output file produced".to_string(),
            });
        }

        info!(input = %input.display(), output = %output.display(), "Transcoded to MP4");
        Ok(output)
    }
}
