//! One full pass over a capture document.
//!
//! Classification, resolution and assembly run strictly in sequence. All
//! mutable state of a run (discovered URLs, candidates, written files and
//! counters) lives in a context owned by that single call, so a runner
//! can be reused and runs never observe each other.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::assembler::{IncompleteGroup, SegmentAssembler};
use crate::capture::{CaptureDocument, CaptureInfo, MediaCandidate};
use crate::classifier::{ClassifiedEntry, EntryClassifier};
use crate::config::HarvestConfig;
use crate::domain::DomainClassifier;
use crate::error::{HarvestError, ResolveError};
use crate::resolver::{MediaCategory, MediaFetcher, MediaResolver};
use crate::scanner::{DiscoveredUrls, ReferenceScanner};
use crate::segment::SegmentRules;
use crate::sink::MediaSink;
use crate::transcode::Transcoder;

/// Counters for everything a run found, produced or skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub entries_total: usize,
    /// Entries with an unexpected shape or an undecodable API body.
    pub entries_failed: usize,
    /// Payloads that failed to decode, whether or not the entry survived.
    pub decode_errors: usize,
    pub direct_images: usize,
    pub direct_videos: usize,
    pub api_entries: usize,
    pub irrelevant_entries: usize,
    pub discovered_promoted: usize,
    pub resolved: usize,
    pub fetch_failures: usize,
    pub write_failures: usize,
    /// Fragments without identifiers or with an unrecognized role.
    pub segments_skipped: usize,
    pub groups_incomplete: usize,
    pub streams_assembled: usize,
    pub transcoded: usize,
    pub transcode_failures: usize,
}

/// Aggregate result of a run, handed to the reporting layer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub success: bool,
    pub error: Option<String>,
    pub capture: CaptureInfo,
    pub stats: RunStats,
    pub candidates: Vec<MediaCandidate>,
    pub discovered_urls: Vec<String>,
    pub output_files: Vec<PathBuf>,
    pub assembled_streams: usize,
    pub incomplete_groups: Vec<IncompleteGroup>,
}

impl RunSummary {
    fn failed(error: &HarvestError) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            ..Default::default()
        }
    }

    /// Candidates that ended up as images.
    pub fn images(&self) -> impl Iterator<Item = &MediaCandidate> {
        self.candidates.iter().filter(|c| {
            c.resolved
                .as_ref()
                .is_some_and(|r| r.category == MediaCategory::Image)
        })
    }

    /// Candidates that ended up as videos.
    pub fn videos(&self) -> impl Iterator<Item = &MediaCandidate> {
        self.candidates.iter().filter(|c| {
            c.resolved
                .as_ref()
                .is_some_and(|r| r.category == MediaCategory::Video)
        })
    }
}

#[derive(Default)]
struct RunContext {
    discovered: DiscoveredUrls,
    candidates: Vec<MediaCandidate>,
    output_files: Vec<PathBuf>,
    stats: RunStats,
}

pub struct PipelineRunner {
    classifier: EntryClassifier,
    resolver: MediaResolver,
    rules: SegmentRules,
    assembler: SegmentAssembler,
    sink: Arc<dyn MediaSink>,
    transcoder: Option<Arc<dyn Transcoder>>,
    stream_prefix: String,
    discovered_content_type: String,
}

impl PipelineRunner {
    pub fn new(config: &HarvestConfig, fetcher: Arc<dyn MediaFetcher>, sink: Arc<dyn MediaSink>) -> Self {
        let domains = DomainClassifier::new(config.hosts.clone());
        let scanner = ReferenceScanner::new(domains.clone(), &config.scanner);
        Self {
            classifier: EntryClassifier::new(domains, scanner),
            resolver: MediaResolver::new(config, fetcher),
            rules: SegmentRules::new(&config.segments),
            assembler: SegmentAssembler::new(&config.segments),
            sink,
            transcoder: None,
            stream_prefix: config.segments.output_prefix.clone(),
            discovered_content_type: config.output.discovered_content_type.clone(),
        }
    }

    /// Hand assembled streams to `transcoder` after they are written.
    pub fn with_transcoder(mut self, transcoder: Arc<dyn Transcoder>) -> Self {
        self.transcoder = Some(transcoder);
        self
    }

    /// Run over capture JSON text.
    pub async fn run_str(&self, text: &str) -> RunSummary {
        match CaptureDocument::from_json_str(text) {
            Ok(document) => self.run_document(&document).await,
            Err(e) => {
                warn!(error = %e, "Rejecting capture document");
                RunSummary::failed(&e)
            }
        }
    }

    /// Run over an already parsed JSON value.
    pub async fn run(&self, value: Value) -> RunSummary {
        match CaptureDocument::from_value(value) {
            Ok(document) => self.run_document(&document).await,
            Err(e) => {
                warn!(error = %e, "Rejecting capture document");
                RunSummary::failed(&e)
            }
        }
    }

    pub async fn run_document(&self, document: &CaptureDocument) -> RunSummary {
        info!(entries = document.entry_count(), "Analyzing capture for media");
        let mut ctx = RunContext::default();
        ctx.stats.entries_total = document.entry_count();

        self.classify_entries(document, &mut ctx);
        info!(
            candidates = ctx.candidates.len(),
            discovered = ctx.discovered.count(),
            "Classification complete"
        );

        let mut candidates = std::mem::take(&mut ctx.candidates);
        for candidate in &mut candidates {
            self.resolve_and_store(candidate, &mut ctx).await;
        }

        let incomplete_groups = self.assemble_streams(&candidates, &mut ctx).await;

        let known: HashSet<&str> =
            candidates.iter().map(|c| c.url.as_str()).collect();
        let mut promoted: Vec<MediaCandidate> = ctx
            .discovered
            .iter()
            .filter(|url| !known.contains(url))
            .map(|url| MediaCandidate::discovered(url, self.discovered_content_type.as_str()))
            .collect();
        ctx.stats.discovered_promoted = promoted.len();
        for candidate in &mut promoted {
            self.resolve_and_store(candidate, &mut ctx).await;
        }
        candidates.extend(promoted);

        let assembled_streams = ctx.stats.streams_assembled;
        info!(
            files = ctx.output_files.len(),
            streams = assembled_streams,
            "Run complete"
        );

        RunSummary {
            success: true,
            error: None,
            capture: document.info().clone(),
            discovered_urls: ctx.discovered.to_vec(),
            stats: ctx.stats,
            candidates,
            output_files: ctx.output_files,
            assembled_streams,
            incomplete_groups,
        }
    }

    fn classify_entries(&self, document: &CaptureDocument, ctx: &mut RunContext) {
        for entry in document.entries() {
            let classified = entry.and_then(|entry| self.classifier.classify(&entry));
            match classified {
                Ok(ClassifiedEntry::DirectImage {
                    candidate,
                    decode_error,
                }) => {
                    ctx.stats.direct_images += 1;
                    ctx.stats.decode_errors += usize::from(decode_error.is_some());
                    ctx.candidates.push(candidate);
                }
                Ok(ClassifiedEntry::DirectVideo {
                    candidate,
                    decode_error,
                }) => {
                    ctx.stats.direct_videos += 1;
                    ctx.stats.decode_errors += usize::from(decode_error.is_some());
                    ctx.candidates.push(candidate);
                }
                Ok(ClassifiedEntry::ApiReference { urls, .. }) => {
                    ctx.stats.api_entries += 1;
                    ctx.discovered.merge(urls);
                }
                Ok(ClassifiedEntry::Irrelevant) => ctx.stats.irrelevant_entries += 1,
                Err(e) => {
                    warn!(error = %e, "Skipping entry");
                    ctx.stats.entries_failed += 1;
                    if e.is_decode() {
                        ctx.stats.decode_errors += 1;
                    }
                }
            }
        }
    }

    /// Resolve one candidate, tag fragments and persist the bytes.
    async fn resolve_and_store(&self, candidate: &mut MediaCandidate, ctx: &mut RunContext) {
        let media = match self.resolver.resolve(candidate).await {
            Ok(media) => media,
            Err(e) => {
                warn!(url = %candidate.url, error = %e, "Could not resolve media");
                if e.is_fetch_failure() {
                    ctx.stats.fetch_failures += 1;
                }
                return;
            }
        };
        ctx.stats.resolved += 1;

        if media.category == MediaCategory::Video {
            candidate.segment = self.rules.detect(&candidate.url, media.kind);
            if let Some(info) = &candidate.segment {
                info!(url = %candidate.url, role = ?info.role, index = info.index, "Video segment detected");
            }
        }

        match self.sink.write(media.category, &media.filename, &media.bytes).await {
            Ok(path) => {
                candidate.output_path = Some(path.clone());
                ctx.output_files.push(path);
            }
            Err(source) => {
                let e = ResolveError::Sink {
                    filename: media.filename.clone(),
                    source,
                };
                warn!(url = %candidate.url, error = %e, "Could not store media");
                ctx.stats.write_failures += 1;
            }
        }
        candidate.resolved = Some(media);
    }

    async fn assemble_streams(
        &self,
        candidates: &[MediaCandidate],
        ctx: &mut RunContext,
    ) -> Vec<IncompleteGroup> {
        let report = self.assembler.assemble(candidates);
        ctx.stats.segments_skipped = report.missing_identifiers + report.unknown_role;
        ctx.stats.groups_incomplete = report.incomplete.len();
        ctx.stats.streams_assembled = report.streams.len();

        for stream in &report.streams {
            let filename = stream.filename(&self.stream_prefix);
            let path = match self.sink.write(MediaCategory::Video, &filename, &stream.bytes).await {
                Ok(path) => path,
                Err(e) => {
                    warn!(group = %stream.key, error = %e, "Could not store combined video");
                    ctx.stats.write_failures += 1;
                    continue;
                }
            };
            info!(path = %path.display(), bytes = stream.bytes.len(), "Combined video saved");
            ctx.output_files.push(path.clone());

            let Some(transcoder) = &self.transcoder else {
                continue;
            };
            match transcoder.transcode(&path).await {
                Ok(converted) => {
                    ctx.stats.transcoded += 1;
                    ctx.output_files.push(converted);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Transcoding skipped, keeping original stream");
                    ctx.stats.transcode_failures += 1;
                }
            }
        }

        report.incomplete
    }
}
