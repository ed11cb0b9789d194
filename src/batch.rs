//! Parallel batch processing with cooperative shutdown

use crate::classifier::LineClassifier;
use crate::document::{Document, Record};
use crate::error::{Result, SegmentError};
use crate::segmenter::{BatchOutput, Segmenter};
use rayon::prelude::*;
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};

/// Destination for emitted records
pub trait RecordSink {
    fn write_record(&mut self, record: &Record) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl RecordSink for Vec<Record> {
    fn write_record(&mut self, record: &Record) -> Result<()> {
        self.push(record.clone());
        Ok(())
    }
}

/// Writes one JSON object per line
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn write_record(&mut self, record: &Record) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Documents read from the input
    pub documents: usize,
    /// Batches that completed
    pub batches: usize,
    /// Records accepted by the sink
    pub records: usize,
    /// Documents over the line ceiling
    pub dropped: usize,
    /// Documents without spans or text
    pub skipped: usize,
    /// Batches lost to classifier failures
    pub failed_batches: usize,
    /// Records the sink rejected
    pub sink_failures: usize,
    /// Stopped early by the shutdown flag
    pub cancelled: bool,
}

/// Splits documents into batches and segments them on a worker pool
///
/// Results are emitted in input order. Setting the shutdown flag stops
/// new batches from being submitted; output already written is kept.
pub struct BatchRunner<'c, C: LineClassifier + ?Sized> {
    segmenter: Segmenter<'c, C>,
    docs_per_batch: usize,
    threads: usize,
    shutdown: Arc<AtomicBool>,
}

impl<'c, C: LineClassifier + ?Sized> BatchRunner<'c, C> {
    #[must_use]
    pub fn new(segmenter: Segmenter<'c, C>, docs_per_batch: usize) -> Self {
        Self {
            segmenter,
            docs_per_batch: docs_per_batch.max(1),
            threads: 0,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Worker count, `0` for one per core
    #[must_use]
    pub const fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    #[must_use]
    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Flag that stops the run when set
    #[must_use]
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    fn stopping(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Segment every document and write the records to `sink`
    pub fn run<I, S>(&self, documents: I, sink: &mut S) -> Result<RunSummary>
    where
        I: IntoIterator<Item = Document>,
        S: RecordSink + ?Sized,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .map_err(|e| SegmentError::Config(format!("worker pool: {e}")))?;
        let wave_size = pool.current_num_threads() * self.docs_per_batch;

        let mut summary = RunSummary::default();
        let mut documents = documents.into_iter().peekable();

        while documents.peek().is_some() {
            if self.stopping() {
                warn!("Shutdown requested, not submitting further batches");
                summary.cancelled = true;
                break;
            }

            let wave: Vec<Document> = documents.by_ref().take(wave_size).collect();
            summary.documents += wave.len();

            let mut batches: Vec<Vec<Document>> = Vec::new();
            let mut wave = wave.into_iter().peekable();
            while wave.peek().is_some() {
                batches.push(wave.by_ref().take(self.docs_per_batch).collect());
            }

            let results: Vec<Option<Result<BatchOutput>>> = pool.install(|| {
                batches
                    .into_par_iter()
                    .map(|batch| {
                        if self.stopping() {
                            None
                        } else {
                            Some(self.segmenter.segment_batch(batch))
                        }
                    })
                    .collect()
            });

            for result in results {
                match result {
                    None => summary.cancelled = true,
                    Some(Err(e)) => {
                        error!("Batch failed: {e}");
                        summary.failed_batches += 1;
                    }
                    Some(Ok(output)) => {
                        summary.batches += 1;
                        summary.dropped += output.dropped;
                        summary.skipped += output.skipped;
                        for record in &output.records {
                            match sink.write_record(record) {
                                Ok(()) => summary.records += 1,
                                Err(e) => {
                                    error!("Failed to write record: {e}");
                                    summary.sink_failures += 1;
                                }
                            }
                        }
                    }
                }
            }

            if let Err(e) = sink.flush() {
                error!("Failed to flush sink: {e}");
            }
        }

        info!(
            "Processed {} documents: {} records, {} dropped, {} skipped, {} failed batches",
            summary.documents,
            summary.records,
            summary.dropped,
            summary.skipped,
            summary.failed_batches
        );
        Ok(summary)
    }
}
