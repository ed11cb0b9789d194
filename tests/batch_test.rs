use mail_segment::{
    BatchRunner, ContextWindow, Document, JsonLinesSink, Label, LabelDistribution,
    LineClassifier, LookupClassifier, Record, RecordSink, Result, RunSummary, SegmentError,
    Segmenter, SegmenterConfig,
};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

fn numbered(n: u64, text: &str) -> Document {
    let mut metadata = Map::new();
    metadata.insert("n".into(), json!(n));
    metadata.insert("text".into(), Value::String(text.into()));
    Document::from_json(metadata)
}

fn documents(count: u64) -> Vec<Document> {
    (0..count)
        .map(|n| numbered(n, &format!("message {n}\n")))
        .collect()
}

fn paragraph_fallback() -> LookupClassifier {
    LookupClassifier::new(LabelDistribution::one_hot(Label::Paragraph))
}

/// Fails every window centred on a line containing "boom"
struct FailingClassifier;

impl LineClassifier for FailingClassifier {
    fn classify(&self, window: &ContextWindow<'_>) -> Result<LabelDistribution> {
        match window.center() {
            Some(line) if line.contains("boom") => {
                Err(SegmentError::Classifier("model crashed".into()))
            }
            _ => Ok(LabelDistribution::one_hot(Label::Paragraph)),
        }
    }
}

/// Rejects records whose `n` is in the list
struct RejectingSink {
    reject: Vec<u64>,
    accepted: Vec<Record>,
}

impl RecordSink for RejectingSink {
    fn write_record(&mut self, record: &Record) -> Result<()> {
        let n = record.metadata["n"].as_u64().unwrap_or_default();
        if self.reject.contains(&n) {
            return Err(SegmentError::Sink(format!("index unavailable for {n}")));
        }
        self.accepted.push(record.clone());
        Ok(())
    }
}

fn order(records: &[Record]) -> Vec<u64> {
    records
        .iter()
        .map(|r| r.metadata["n"].as_u64().unwrap())
        .collect()
}

// --- Ordering ---

#[test]
fn test_records_follow_input_order() {
    let classifier = paragraph_fallback();
    let segmenter = Segmenter::new(&classifier, SegmenterConfig::default()).unwrap();
    let runner = BatchRunner::new(segmenter, 3).with_threads(4);

    let mut sink: Vec<Record> = Vec::new();
    let summary = runner.run(documents(20), &mut sink).unwrap();

    assert_eq!(order(&sink), (0..20).collect::<Vec<_>>());
    assert_eq!(summary.documents, 20);
    assert_eq!(summary.records, 20);
    assert_eq!(summary.batches, 7);
    assert!(!summary.cancelled);
}

#[test]
fn test_thread_count_does_not_change_output() {
    let classifier = paragraph_fallback().with_label("message 3", Label::Closing);

    let run = |threads| {
        let segmenter = Segmenter::new(&classifier, SegmenterConfig::default()).unwrap();
        let mut sink: Vec<Record> = Vec::new();
        BatchRunner::new(segmenter, 2)
            .with_threads(threads)
            .run(documents(9), &mut sink)
            .unwrap();
        sink
    };

    assert_eq!(run(1), run(3));
}

// --- Failures ---

#[test]
fn test_sink_failure_does_not_abort_siblings() {
    let classifier = paragraph_fallback();
    let segmenter = Segmenter::new(&classifier, SegmenterConfig::default()).unwrap();
    let runner = BatchRunner::new(segmenter, 5).with_threads(1);

    let mut sink = RejectingSink {
        reject: vec![1, 3],
        accepted: Vec::new(),
    };
    let summary = runner.run(documents(5), &mut sink).unwrap();

    assert_eq!(summary.sink_failures, 2);
    assert_eq!(summary.records, 3);
    assert_eq!(order(&sink.accepted), [0, 2, 4]);
}

#[test]
fn test_classifier_failure_only_loses_its_batch() {
    let segmenter = Segmenter::new(&FailingClassifier, SegmenterConfig::default()).unwrap();
    let runner = BatchRunner::new(segmenter, 1).with_threads(2);

    let input = vec![
        numbered(0, "fine\n"),
        numbered(1, "boom\n"),
        numbered(2, "also fine\n"),
    ];
    let mut sink: Vec<Record> = Vec::new();
    let summary = runner.run(input, &mut sink).unwrap();

    assert_eq!(summary.failed_batches, 1);
    assert_eq!(order(&sink), [0, 2]);
}

#[test]
fn test_dropped_and_skipped_are_counted() {
    let classifier = paragraph_fallback();
    let segmenter = Segmenter::new(&classifier, SegmenterConfig::default()).unwrap();
    let runner = BatchRunner::new(segmenter, 10);

    let input = vec![
        numbered(0, &"x\n".repeat(6000)),
        numbered(1, "\n\n"),
        numbered(2, "kept\n"),
    ];
    let mut sink: Vec<Record> = Vec::new();
    let summary = runner.run(input, &mut sink).unwrap();

    assert_eq!(
        summary,
        RunSummary {
            documents: 3,
            batches: 1,
            records: 1,
            dropped: 1,
            skipped: 1,
            failed_batches: 0,
            sink_failures: 0,
            cancelled: false,
        }
    );
}

// --- Cancellation ---

#[test]
fn test_shutdown_before_start_submits_nothing() {
    let classifier = paragraph_fallback();
    let segmenter = Segmenter::new(&classifier, SegmenterConfig::default()).unwrap();
    let shutdown = Arc::new(AtomicBool::new(true));
    let runner = BatchRunner::new(segmenter, 2).with_shutdown(Arc::clone(&shutdown));

    let mut sink: Vec<Record> = Vec::new();
    let summary = runner.run(documents(6), &mut sink).unwrap();

    assert!(summary.cancelled);
    assert!(sink.is_empty());
    assert_eq!(summary.documents, 0);
}

#[test]
fn test_shutdown_mid_run_keeps_written_output() {
    struct StopAfterFirst {
        shutdown: Arc<AtomicBool>,
        records: Vec<Record>,
    }

    impl RecordSink for StopAfterFirst {
        fn write_record(&mut self, record: &Record) -> Result<()> {
            self.records.push(record.clone());
            self.shutdown.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    let classifier = paragraph_fallback();
    let segmenter = Segmenter::new(&classifier, SegmenterConfig::default()).unwrap();
    let runner = BatchRunner::new(segmenter, 1).with_threads(1);

    let mut sink = StopAfterFirst {
        shutdown: runner.shutdown_handle(),
        records: Vec::new(),
    };
    let summary = runner.run(documents(4), &mut sink).unwrap();

    assert!(summary.cancelled);
    assert_eq!(order(&sink.records), [0]);
}

// --- Sinks ---

#[test]
fn test_json_lines_sink_writes_one_object_per_line() {
    let classifier = paragraph_fallback();
    let segmenter = Segmenter::new(&classifier, SegmenterConfig::default()).unwrap();
    let runner = BatchRunner::new(segmenter, 2);

    let mut sink = JsonLinesSink::new(Vec::new());
    runner.run(documents(3), &mut sink).unwrap();
    let output = String::from_utf8(sink.into_inner()).unwrap();

    let lines: Vec<Value> = output
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[2]["n"], json!(2));
    assert_eq!(lines[2]["text"], json!("message 2\n\n"));
    assert_eq!(lines[2]["labels"], json!([[0, 9, "paragraph"]]));
}
