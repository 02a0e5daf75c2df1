//! # CLI Module
//!
//! Command-line interface for the WARC image classifier.
//!
//! ## Usage
//! ```bash
//! # Classify every image in a local archive
//! warc-classify classify --model nsfw.onnx crawl.warc.gz
//!
//! # Share deduplication with other runs and print source URLs
//! warc-classify classify --model nsfw.onnx --server dedup:5000 --print-url crawl.warc.gz
//!
//! # JSON lines with a progress spinner on stderr
//! warc-classify classify --model nsfw.onnx --output json --progress crawl.warc.gz
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use warc_image_classifier::core::classifier::OnnxClassifier;
use warc_image_classifier::core::filter::{
    RecordFilter, DEFAULT_MAX_LENGTH, DEFAULT_MIN_LENGTH, DEFAULT_TYPES,
};
use warc_image_classifier::core::output;
use warc_image_classifier::core::pipeline::{default_parallelism, Pipeline, PipelineResult};
use warc_image_classifier::core::source::Source;
use warc_image_classifier::error::{Result, WarcClassifierError};
use warc_image_classifier::events::{Event, EventChannel, PipelineEvent, ReaderEvent, WorkerEvent};

/// WARC Image Classifier - score every image in a web archive
#[derive(Parser, Debug)]
#[command(name = "warc-classify")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract and classify the images in one or more archives
    Classify(ClassifyArgs),
}

#[derive(clap::Args, Debug)]
struct ClassifyArgs {
    /// Archive paths or http(s) URLs
    #[arg(required = true)]
    sources: Vec<String>,

    /// ONNX model to score images with
    #[arg(short, long)]
    model: PathBuf,

    /// Smallest payload to consider, in bytes
    #[arg(long, default_value_t = DEFAULT_MIN_LENGTH)]
    min_length: u64,

    /// Largest payload to consider, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_LENGTH)]
    max_length: u64,

    /// Content types to accept (several values, or one space separated list)
    #[arg(
        long,
        num_args = 1..,
        value_delimiter = ' ',
        default_values_t = DEFAULT_TYPES.iter().map(|t| t.to_string()).collect::<Vec<String>>()
    )]
    types: Vec<String>,

    /// Dedup lookup service as host:port
    #[arg(long)]
    server: Option<String>,

    /// Seconds to wait on the dedup service before giving up on a source
    #[arg(long)]
    dedup_timeout: Option<u64>,

    /// Archive reader threads (default: number of CPUs)
    #[arg(long)]
    readers: Option<usize>,

    /// Classification worker threads (default: number of CPUs)
    #[arg(long)]
    workers: Option<usize>,

    /// Append the source URL to each result line
    #[arg(long)]
    print_url: bool,

    /// Output format
    #[arg(short, long, default_value = "plain")]
    output: OutputFormat,

    /// Show a progress spinner and a summary on stderr
    #[arg(long)]
    progress: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// `<identifier> <score>` per line
    Plain,
    /// One JSON object per line
    Json,
}

impl From<OutputFormat> for output::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Plain => output::OutputFormat::Plain,
            OutputFormat::Json => output::OutputFormat::Json,
        }
    }
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Classify(args) => {
            warc_image_classifier::init_tracing(args.verbose);
            run_classify(args)
        }
    }
}

fn run_classify(args: ClassifyArgs) -> Result<()> {
    let term = Term::stderr();

    if args.min_length > args.max_length {
        return Err(WarcClassifierError::Config(format!(
            "--min-length ({}) exceeds --max-length ({})",
            args.min_length, args.max_length
        )));
    }

    let filter = RecordFilter::new()
        .with_length_range(args.min_length, args.max_length)
        .with_types(&args.types);
    let sources: Vec<Source> = args.sources.iter().map(|s| Source::parse(s)).collect();

    // Build pipeline
    let pipeline = Pipeline::builder(OnnxClassifier::factory(args.model.clone()))
        .readers(args.readers.unwrap_or_else(default_parallelism))
        .workers(args.workers.unwrap_or_else(default_parallelism))
        .filter(filter)
        .dedup_server(args.server.clone())
        .dedup_timeout(args.dedup_timeout.map(Duration::from_secs))
        .output_format(args.output.into())
        .print_url(args.print_url)
        .build();

    // Set up event handling
    let (sender, receiver) = EventChannel::new();

    let progress = if args.progress {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} [{elapsed_precise}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    } else {
        None
    };

    let progress_clone = progress.clone();
    let verbose = args.verbose;

    // Handle events in a separate thread
    let event_thread = thread::spawn(move || {
        let mut phase = String::new();
        let (mut queued, mut scored) = (0usize, 0usize);

        for event in receiver.iter() {
            match event {
                Event::Pipeline(PipelineEvent::PhaseChanged { phase: next }) => {
                    phase = next.to_string();
                }
                Event::Reader(ReaderEvent::ImageQueued { .. }) => queued += 1,
                Event::Worker(WorkerEvent::Classified { .. })
                | Event::Worker(WorkerEvent::ClassificationFailed { .. }) => scored += 1,
                Event::Reader(ReaderEvent::SourceStarted { source }) if verbose => {
                    if let Some(ref pb) = progress_clone {
                        pb.println(format!("  {} {}", style("→").dim(), source));
                    }
                }
                Event::Pipeline(PipelineEvent::Completed { .. })
                | Event::Pipeline(PipelineEvent::Error { .. }) => {
                    if let Some(ref pb) = progress_clone {
                        pb.finish_and_clear();
                    }
                    continue;
                }
                _ => continue,
            }

            if let Some(ref pb) = progress_clone {
                pb.set_message(format!("{}: {} queued, {} scored", phase, queued, scored));
            }
        }
    });

    // Run the pipeline
    let result = pipeline.run_with_events(sources, &sender);

    // Drop sender to signal event thread to finish
    drop(sender);
    event_thread.join().ok();

    let result = result?;
    if progress.is_some() {
        print_summary(&term, &result);
    }

    Ok(())
}

fn print_summary(term: &Term, result: &PipelineResult) {
    let summary = &result.summary;

    term.write_line(&format!(
        "{} Classification Complete",
        style("✓").green().bold()
    ))
    .ok();

    term.write_line(&format!(
        "  {} sources read in {:.1}s",
        style(summary.sources - summary.sources_failed).cyan(),
        summary.duration_ms as f64 / 1000.0
    ))
    .ok();

    if summary.sources_failed > 0 {
        term.write_line(&format!(
            "  {} sources failed",
            style(summary.sources_failed).red()
        ))
        .ok();
    }

    term.write_line(&format!(
        "  {} images classified",
        style(summary.classified).cyan()
    ))
    .ok();

    if summary.classification_failures > 0 {
        term.write_line(&format!(
            "  {} images could not be scored",
            style(summary.classification_failures).yellow()
        ))
        .ok();
    }

    if summary.duplicates_skipped > 0 {
        term.write_line(&format!(
            "  {} duplicates skipped",
            style(summary.duplicates_skipped).dim()
        ))
        .ok();
    }
}
