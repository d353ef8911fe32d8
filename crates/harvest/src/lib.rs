//! # Harvest Engine
//!
//! Extracts media assets of a single content provider from an HTTP archive (HAR)
//! capture: images and canvas videos referenced directly by capture entries,
//! image references buried inside API response bodies, and fragmented WebM
//! canvas streams that are stitched back into a single playable container.
//!
//! ## Flow
//!
//! capture document → [`EntryClassifier`] (per entry) → direct candidates plus
//! [`ReferenceScanner`] discoveries → [`MediaResolver`] (bytes, kind, filename)
//! → [`SegmentAssembler`] (group, order, concatenate) → [`RunSummary`].
//!
//! All I/O happens behind three collaborator traits so a run can be driven
//! entirely in memory: [`MediaFetcher`], [`MediaSink`] and [`Transcoder`].
//!
//! ## License
//!
//! MIT OR Apache-2.0

pub mod assembler;
pub mod capture;
pub mod classifier;
pub mod config;
pub mod domain;
pub mod error;
pub mod pipeline;
pub mod resolver;
pub mod scanner;
pub mod segment;
pub mod sink;
pub mod transcode;

/// Re-export key traits and types
pub use assembler::{
    AssembledStream, AssemblyReport, IncompleteGroup, IncompleteReason, SegmentAssembler,
};
pub use capture::{CandidateSource, CaptureDocument, CaptureInfo, Entry, MediaCandidate};
pub use classifier::{ClassifiedEntry, EntryClassifier, UrlClass};
pub use config::HarvestConfig;
pub use domain::DomainClassifier;
pub use error::{DecodeError, EntryError, HarvestError, ResolveError, TranscodeError};
pub use pipeline::{PipelineRunner, RunStats, RunSummary};
pub use resolver::{
    ContentKind, FetchResponse, HttpFetcher, MediaCategory, MediaFetcher, MediaResolver,
    ResolvedMedia,
};
pub use scanner::{DiscoveredUrls, ReferenceScanner};
pub use segment::{SegmentGroupKey, SegmentInfo, SegmentOrdering, SegmentRole, SegmentRules};
pub use sink::{FsSink, MediaSink, MemorySink, OutputLayout};
pub use transcode::{FfmpegTranscoder, Transcoder};
