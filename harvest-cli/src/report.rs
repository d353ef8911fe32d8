//! Machine-readable run report written under `data/`.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use harvest_engine::capture::CandidateSource;
use harvest_engine::{CaptureInfo, MediaCandidate, RunStats, RunSummary};
use serde::Serialize;
use tracing::info;

use crate::error::Result;

#[derive(Debug, Serialize)]
pub struct ExtractionSummary {
    /// Candidates taken directly from capture entries.
    pub total_media_found: usize,
    pub images: usize,
    pub videos: usize,
    pub by_content_type: BTreeMap<String, usize>,
    pub unique_urls: usize,
    pub combined_videos: usize,
    pub files_written: usize,
}

#[derive(Debug, Serialize)]
pub struct AnalysisReport<'a> {
    pub timestamp: String,
    pub har_info: &'a CaptureInfo,
    pub extraction_summary: ExtractionSummary,
    pub stats: &'a RunStats,
    pub extracted_media: &'a [MediaCandidate],
    pub found_urls: &'a [String],
    pub output_files: &'a [PathBuf],
}

impl<'a> AnalysisReport<'a> {
    pub fn new(summary: &'a RunSummary, now: DateTime<Local>) -> Self {
        let direct: Vec<&MediaCandidate> = summary
            .candidates
            .iter()
            .filter(|c| c.source != CandidateSource::Discovered)
            .collect();

        let mut by_content_type = BTreeMap::new();
        for candidate in &direct {
            let key = if candidate.content_type.is_empty() {
                "unknown".to_string()
            } else {
                candidate.content_type.to_ascii_lowercase()
            };
            *by_content_type.entry(key).or_insert(0) += 1;
        }

        let count = |needle: &str| {
            direct
                .iter()
                .filter(|c| c.content_type.to_ascii_lowercase().contains(needle))
                .count()
        };

        Self {
            timestamp: now.format("%Y-%m-%d %H:%M:%S").to_string(),
            har_info: &summary.capture,
            extraction_summary: ExtractionSummary {
                total_media_found: direct.len(),
                images: count("image"),
                videos: count("video"),
                by_content_type,
                unique_urls: summary.discovered_urls.len(),
                combined_videos: summary.assembled_streams,
                files_written: summary.output_files.len(),
            },
            stats: &summary.stats,
            extracted_media: &summary.candidates,
            found_urls: &summary.discovered_urls,
            output_files: &summary.output_files,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// `har_analysis_<unix seconds>.json`
pub fn report_file_name(now: DateTime<Local>) -> String {
    format!("har_analysis_{}.json", now.timestamp())
}

/// Write the report into `data_dir` and return its path.
pub async fn write_report(data_dir: &Path, summary: &RunSummary) -> Result<PathBuf> {
    let now = Local::now();
    let report = AnalysisReport::new(summary, now);
    let path = data_dir.join(report_file_name(now));
    tokio::fs::create_dir_all(data_dir).await?;
    tokio::fs::write(&path, report.to_json()?).await?;
    info!(path = %path.display(), "Analysis report saved");
    Ok(path)
}

/// Human-readable completion summary.
pub fn render_summary(summary: &RunSummary, output_root: &Path, report: Option<&Path>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Extraction complete");
    let _ = writeln!(out, "  Media found:     {}", summary.candidates.len());
    let _ = writeln!(out, "  Files written:   {}", summary.output_files.len());
    let _ = writeln!(out, "  Combined videos: {}", summary.assembled_streams);
    let _ = writeln!(out, "  Output folder:   {}", output_root.display());
    if let Some(report) = report {
        let _ = writeln!(out, "  Report:          {}", report.display());
    }

    let stats = &summary.stats;
    let skipped = stats.entries_failed
        + stats.fetch_failures
        + stats.write_failures
        + stats.segments_skipped
        + stats.groups_incomplete;
    if skipped > 0 || stats.transcode_failures > 0 {
        let _ = writeln!(
            out,
            "  Skipped:         {} entries, {} fetches, {} writes, {} segments, {} groups, {} transcodes",
            stats.entries_failed,
            stats.fetch_failures,
            stats.write_failures,
            stats.segments_skipped,
            stats.groups_incomplete,
            stats.transcode_failures,
        );
    }

    for path in &summary.output_files {
        let _ = writeln!(out, "    {}", path.display());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::Value;

    fn candidate(url: &str, content_type: &str, source: CandidateSource) -> MediaCandidate {
        let mut c = MediaCandidate::discovered(url, content_type);
        c.source = source;
        c
    }

    fn summary() -> RunSummary {
        RunSummary {
            success: true,
            candidates: vec![
                candidate("https://i.scdn.co/image/a", "image/jpeg", CandidateSource::DirectImage),
                candidate("https://i.scdn.co/image/b", "Image/JPEG", CandidateSource::DirectImage),
                candidate("https://canvaz.scdn.co/v.mp4", "video/mp4", CandidateSource::DirectVideo),
                candidate("https://i.scdn.co/image/c", "image/jpeg", CandidateSource::Discovered),
            ],
            discovered_urls: vec!["https://i.scdn.co/image/c".to_string()],
            output_files: vec![PathBuf::from("out/images/a.jpg")],
            assembled_streams: 1,
            ..Default::default()
        }
    }

    #[test]
    fn summary_counts_direct_media_by_content_type() {
        let summary = summary();
        let now = Local.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap();
        let report = AnalysisReport::new(&summary, now);

        assert_eq!(report.timestamp, "2025-03-01 12:30:00");
        let s = &report.extraction_summary;
        assert_eq!(s.total_media_found, 3);
        assert_eq!(s.images, 2);
        assert_eq!(s.videos, 1);
        assert_eq!(s.by_content_type["image/jpeg"], 2);
        assert_eq!(s.unique_urls, 1);
        assert_eq!(s.combined_videos, 1);
    }

    #[test]
    fn json_carries_metadata_without_payloads() {
        let summary = summary();
        let json = AnalysisReport::new(&summary, Local::now()).to_json().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        let first = &value["extracted_media"][0];
        assert_eq!(first["url"], "https://i.scdn.co/image/a");
        assert!(first.get("embedded").is_none());
        assert_eq!(value["found_urls"][0], "https://i.scdn.co/image/c");
    }

    #[tokio::test]
    async fn report_lands_in_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_report(dir.path(), &summary()).await.unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("har_analysis_") && name.ends_with(".json"));
        assert!(path.starts_with(dir.path()));
    }

    #[test]
    fn rendered_summary_lists_files() {
        let text = render_summary(&summary(), Path::new("out"), Some(Path::new("out/data/r.json")));
        assert!(text.contains("Media found:     4"));
        assert!(text.contains("out/images/a.jpg"));
        assert!(!text.contains("Skipped"));
    }
}
