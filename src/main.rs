//! `mail-segment` command line interface

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use mail_segment::{
    BatchRunner, Document, HeuristicClassifier, JsonLinesSink, LabelStats, Record, RecordSink,
    Segmenter, SegmenterConfig, document_from_rfc5322, label_document,
};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Line-level structural segmentation of email messages
#[derive(Debug, Parser)]
#[command(name = "mail-segment", version, about)]
struct Cli {
    /// Increase verbosity
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress progress output and informational logs
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Segment JSONL documents into annotation records
    Segment(SegmentArgs),
    /// Print the quotation tree of one message as JSON
    Unnest(MessageArgs),
    /// Print per-label segment statistics of one message as JSON
    Stats(StatsArgs),
    /// Derive per-line labels from annotated JSONL documents
    Label(LabelArgs),
}

#[derive(Debug, Args)]
struct SegmentArgs {
    /// JSONL input, one document per line (`-` for stdin)
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long, value_name = "FILE", env = "MAIL_SEGMENT_CONFIG")]
    config: Option<PathBuf>,

    /// Worker threads (0 for one per core)
    #[arg(short, long, default_value_t = 0)]
    threads: usize,

    /// Documents per batch
    #[arg(long, default_value_t = 100)]
    docs_per_batch: usize,
}

#[derive(Debug, Args)]
struct MessageArgs {
    /// Raw message text (`-` for stdin)
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Configuration file
    #[arg(short, long, value_name = "FILE", env = "MAIL_SEGMENT_CONFIG")]
    config: Option<PathBuf>,

    /// Input is a full RFC 5322 message with headers
    #[arg(long)]
    rfc5322: bool,
}

#[derive(Debug, Args)]
struct StatsArgs {
    #[command(flatten)]
    message: MessageArgs,

    /// Print the paragraph text instead of the statistics
    #[arg(long)]
    paragraphs: bool,
}

#[derive(Debug, Args)]
struct LabelArgs {
    /// Annotated JSONL input (`-` for stdin)
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    debug!("Arguments: {:?}", cli);

    match &cli.command {
        Commands::Segment(args) => cmd_segment(args, cli.quiet),
        Commands::Unnest(args) => cmd_unnest(args),
        Commands::Stats(args) => cmd_stats(args),
        Commands::Label(args) => cmd_label(args),
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let default = match (quiet, verbose) {
        (true, _) => "mail_segment=warn",
        (false, 0) => "mail_segment=info",
        (false, 1) => "mail_segment=debug",
        (false, _) => "mail_segment=trace",
    };

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

fn load_config(path: Option<&Path>) -> Result<SegmenterConfig> {
    match path {
        Some(path) => SegmenterConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(SegmenterConfig::default()),
    }
}

fn open_input(path: &Path) -> Result<Box<dyn BufRead>> {
    if path == Path::new("-") {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

/// JSON objects of a JSONL stream; malformed lines are logged and skipped
fn read_objects(reader: impl BufRead) -> impl Iterator<Item = Map<String, Value>> {
    reader
        .lines()
        .enumerate()
        .filter_map(|(n, line)| match line {
            Ok(line) if line.trim().is_empty() => None,
            Ok(line) => match serde_json::from_str::<Map<String, Value>>(&line) {
                Ok(object) => Some(object),
                Err(e) => {
                    warn!("Skipping malformed input line {}: {e}", n + 1);
                    None
                }
            },
            Err(e) => {
                warn!("Failed to read input line {}: {e}", n + 1);
                None
            }
        })
}

/// Message text of a raw input, decoding a full message when asked to
fn read_message(args: &MessageArgs) -> Result<String> {
    let mut raw = Vec::new();
    open_input(&args.input)?
        .read_to_end(&mut raw)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;

    if args.rfc5322 {
        let document = document_from_rfc5322(&raw).context("Failed to parse message")?;
        return Ok(document
            .metadata
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string());
    }
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

#[cfg(unix)]
struct ShutdownSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    fn register() -> io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    async fn recv(&mut self) {
        tokio::select! {
            _ = self.interrupt.recv() => warn!("Received SIGINT"),
            _ = self.terminate.recv() => warn!("Received SIGTERM"),
        }
    }
}

#[cfg(not(unix))]
struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    #[allow(clippy::unnecessary_wraps)]
    const fn register() -> io::Result<Self> {
        Ok(Self)
    }

    #[allow(clippy::unused_self)]
    async fn recv(&mut self) {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl-C");
        } else {
            std::future::pending::<()>().await;
        }
    }
}

/// Raise `shutdown` on the first SIGINT/SIGTERM and exit on the second
///
/// Handlers are registered before this returns.
fn listen_for_shutdown(shutdown: Arc<AtomicBool>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start signal runtime")?;
    let mut signals = runtime
        .block_on(async { ShutdownSignals::register() })
        .context("Failed to install signal handlers")?;

    thread::Builder::new()
        .name("shutdown".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                signals.recv().await;
                warn!("Finishing in-flight batches, signal again to abort");
                shutdown.store(true, Ordering::SeqCst);

                signals.recv().await;
                std::process::exit(130);
            });
        })
        .context("Failed to spawn signal listener")?;
    Ok(())
}

/// Counts written records on a spinner
struct ProgressSink<S> {
    inner: S,
    bar: Option<ProgressBar>,
}

impl<S: RecordSink> ProgressSink<S> {
    fn new(inner: S, quiet: bool) -> Self {
        let bar = (!quiet).then(|| {
            let bar = ProgressBar::new_spinner();
            if let Ok(style) =
                ProgressStyle::with_template("[{elapsed_precise}] {spinner} {pos} records {msg}")
            {
                bar.set_style(style);
            }
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        });
        Self { inner, bar }
    }

    fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_with_message("Complete");
        }
    }
}

impl<S: RecordSink> RecordSink for ProgressSink<S> {
    fn write_record(&mut self, record: &Record) -> mail_segment::Result<()> {
        self.inner.write_record(record)?;
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
        Ok(())
    }

    fn flush(&mut self) -> mail_segment::Result<()> {
        self.inner.flush()
    }
}

fn cmd_segment(args: &SegmentArgs, quiet: bool) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let classifier = HeuristicClassifier;
    let segmenter = Segmenter::new(&classifier, config).context("Invalid configuration")?;
    let runner = BatchRunner::new(segmenter, args.docs_per_batch).with_threads(args.threads);
    listen_for_shutdown(runner.shutdown_handle())?;

    let writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    };
    let mut sink = ProgressSink::new(JsonLinesSink::new(writer), quiet);

    let documents = read_objects(open_input(&args.input)?).map(Document::from_json);
    let summary = runner.run(documents, &mut sink)?;
    sink.finish();

    info!(
        "Wrote {} records from {} documents ({} dropped, {} skipped)",
        summary.records, summary.documents, summary.dropped, summary.skipped
    );
    if summary.cancelled {
        bail!("Interrupted after {} records", summary.records);
    }
    if summary.failed_batches > 0 || summary.sink_failures > 0 {
        bail!(
            "{} batches failed and {} records could not be written",
            summary.failed_batches,
            summary.sink_failures
        );
    }
    Ok(())
}

fn cmd_unnest(args: &MessageArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let classifier = HeuristicClassifier;
    let segmenter = Segmenter::new(&classifier, config).context("Invalid configuration")?;

    let text = read_message(args)?;
    let tree = segmenter.unnest_text(&text)?;
    println!("{}", serde_json::to_string_pretty(&tree)?);
    Ok(())
}

fn cmd_stats(args: &StatsArgs) -> Result<()> {
    let config = load_config(args.message.config.as_deref())?;
    let classifier = HeuristicClassifier;
    let segmenter = Segmenter::new(&classifier, config).context("Invalid configuration")?;

    let text = read_message(&args.message)?;
    let stats = LabelStats::from_lines(&segmenter.segment_text(&text)?);
    if args.paragraphs {
        print!("{}", stats.paragraph_text());
    } else {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    }
    Ok(())
}

fn cmd_label(args: &LabelArgs) -> Result<()> {
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    let mut labeled = 0;
    for object in read_objects(open_input(&args.input)?) {
        match label_document(&object) {
            Ok(Some(lines)) => {
                let pairs: Vec<(&str, _)> =
                    lines.iter().map(|l| (l.text.as_str(), l.label)).collect();
                serde_json::to_writer(&mut out, &pairs)?;
                writeln!(out)?;
                labeled += 1;
            }
            Ok(None) => debug!("Document without annotations, skipping"),
            Err(e) => warn!("Skipping document with malformed annotations: {e}"),
        }
    }
    out.flush()?;

    info!("Labelled {labeled} documents");
    Ok(())
}
