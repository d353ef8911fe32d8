use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use harvest::config::{Overrides, load_config};
use harvest::error::{AppError, Result};
use harvest::input::CaptureSource;
use harvest::report::{AnalysisReport, render_summary, write_report};
use harvest_engine::segment::SegmentOrdering;
use harvest_engine::{
    FfmpegTranscoder, FsSink, HttpFetcher, MemorySink, OutputLayout, PipelineRunner, RunSummary,
};
use tracing::{Level, error, info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OrderingArg {
    /// Index is the numeric name of the final path segment
    TrailingToken,
    /// Only `/0.webm`, `/1.webm` and `/2.webm` are media fragments
    Legacy,
}

impl From<OrderingArg> for SegmentOrdering {
    fn from(arg: OrderingArg) -> Self {
        match arg {
            OrderingArg::TrailingToken => SegmentOrdering::TrailingToken,
            OrderingArg::Legacy => SegmentOrdering::Legacy,
        }
    }
}

/// Extract images and canvas videos from HTTP archive (HAR) captures
#[derive(Parser, Debug)]
#[command(name = "harvest", author, version, about, long_about = None)]
struct Args {
    /// HAR file path, literal HAR JSON, or `-` to read standard input
    input: Option<String>,

    /// Output folder (images/, videos/ and data/ are created inside)
    #[arg(short, long, default_value = "har_extracted")]
    output_dir: PathBuf,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fragment ordering rule
    #[arg(long, value_enum)]
    ordering: Option<OrderingArg>,

    /// Path to the ffmpeg binary
    #[arg(long)]
    ffmpeg: Option<String>,

    /// Keep assembled WebM streams without converting them to MP4
    #[arg(long)]
    no_transcode: bool,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Resolve everything but write nothing; print the report instead
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            ordering: self.ordering.map(Into::into),
            ffmpeg_path: self.ffmpeg.clone(),
            no_transcode: self.no_transcode,
            timeout_secs: self.timeout,
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = run(args).await {
        error!("Application error: {}", e);
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    init_logging(args.verbose, args.quiet)?;

    let mut config = load_config(args.config.as_deref())?;
    args.overrides().apply(&mut config);

    let source = CaptureSource::detect(args.input.as_deref());
    info!(source = %source, "Reading capture");
    let text = source.read().await?;

    let fetcher = Arc::new(HttpFetcher::new(&config.fetch)?);

    if args.dry_run {
        let runner = PipelineRunner::new(&config, fetcher, Arc::new(MemorySink::new()));
        let summary = ensure_success(runner.run_str(&text).await)?;
        let report = AnalysisReport::new(&summary, chrono::Local::now());
        println!("{}", report.to_json()?);
        return Ok(());
    }

    let layout = OutputLayout::create(&args.output_dir).await?;
    let mut runner = PipelineRunner::new(&config, fetcher, Arc::new(FsSink::new(layout.clone())));
    if config.transcode.enabled {
        runner = runner.with_transcoder(Arc::new(FfmpegTranscoder::new(&config.transcode)));
    }

    let summary = ensure_success(runner.run_str(&text).await)?;
    let report_path = write_report(&layout.data, &summary).await?;
    print!("{}", render_summary(&summary, &layout.root, Some(&report_path)));
    Ok(())
}

fn ensure_success(summary: RunSummary) -> Result<RunSummary> {
    if summary.success {
        return Ok(summary);
    }
    let reason = summary
        .error
        .unwrap_or_else(|| "unknown error".to_string());
    warn!(%reason, "Capture was rejected");
    Err(AppError::Extraction(reason))
}

fn init_logging(verbose: bool, quiet: bool) -> Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(verbose)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .map_err(|e| AppError::Logging(e.to_string()))
}
