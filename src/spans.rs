//! Span extraction from corrected label streams

use crate::config::OutputConfig;
use crate::document::{LabeledLine, Record, Span};
use crate::label::Label;
use crate::window::FlatStream;
use chrono::Utc;
use tracing::debug;

/// Accumulates one document's reconstructed text and spans
///
/// The text is the concatenation of the document's lines with leading
/// whitespace of the whole document removed. Offsets count characters
/// and span ends are inclusive.
#[derive(Debug, Clone, Default)]
pub struct SpanBuilder {
    text: String,
    chars: usize,
    start: usize,
    open: Option<Label>,
    spans: Vec<Span>,
}

impl SpanBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line carrying its corrected label
    pub fn push(&mut self, line: &str, label: Label) {
        match self.open {
            Some(open) if open == label => {}
            Some(open) => {
                self.close(open);
                self.open = Some(label);
                self.start = self.chars;
            }
            None => {
                self.open = Some(label);
                self.start = self.chars;
            }
        }

        let piece = if self.text.is_empty() {
            line.trim_start()
        } else {
            line
        };
        self.text.push_str(piece);
        self.chars += piece.chars().count();
    }

    fn close(&mut self, label: Label) {
        if !label.is_sentinel() && self.chars > self.start {
            self.spans
                .push(Span::new(self.start, self.chars - 1, label));
        }
    }

    /// Flush the open span and return the text with its spans
    #[must_use]
    pub fn finish(mut self) -> (String, Vec<Span>) {
        if let Some(open) = self.open.take() {
            self.close(open);
        }
        (self.text, self.spans)
    }
}

/// Spans of a single labelled document
#[must_use]
pub fn spans_for(lines: &[LabeledLine]) -> (String, Vec<Span>) {
    let mut builder = SpanBuilder::new();
    for line in lines {
        builder.push(&line.text, line.label);
    }
    builder.finish()
}

/// Records produced from one flat stream
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// One record per surviving document, in input order
    pub records: Vec<Record>,

    /// Documents without spans or text
    pub skipped: usize,
}

/// Walks a corrected stream and emits one record per document
#[derive(Debug, Clone, Copy)]
pub struct SpanExtractor<'a> {
    output: &'a OutputConfig,
}

impl<'a> SpanExtractor<'a> {
    #[must_use]
    pub const fn new(output: &'a OutputConfig) -> Self {
        Self { output }
    }

    /// `labels` holds the corrected label of every stream position
    #[must_use]
    pub fn extract(&self, stream: &FlatStream, labels: &[Label]) -> Extraction {
        let mut extraction = Extraction::default();
        let mut current: Option<usize> = None;
        let mut builder = SpanBuilder::new();

        for (i, (line, label)) in stream.lines().iter().zip(labels).enumerate() {
            if let Some(doc) = stream.document_ending_at(i) {
                let finished = std::mem::take(&mut builder);
                if current == Some(doc) {
                    self.emit(stream, doc, finished, &mut extraction);
                }
                current = None;
            }
            if let Some(doc) = stream.document_starting_at(i) {
                current = Some(doc);
                builder = SpanBuilder::new();
            }

            if let (Some(_), Some(text)) = (current, line.text()) {
                builder.push(text, *label);
            }
        }

        // A stream cut short of its trailing padding still flushes
        if let Some(doc) = current {
            self.emit(stream, doc, builder, &mut extraction);
        }

        extraction
    }

    fn emit(&self, stream: &FlatStream, doc: usize, builder: SpanBuilder, out: &mut Extraction) {
        let (text, spans) = builder.finish();
        if spans.is_empty() || text.is_empty() {
            debug!("Document {doc} produced no spans, skipping");
            out.skipped += 1;
            return;
        }

        // The raw input text is superseded by the trimmed text the offsets refer to
        let mut metadata = stream.documents()[doc].metadata.clone();
        metadata.remove("text");
        for field in &self.output.strip_fields {
            metadata.remove(field);
        }

        out.records.push(Record {
            metadata,
            labels: spans,
            text: self.output.include_text.then_some(text),
            modified: self
                .output
                .timestamp
                .then(|| Utc::now().timestamp_millis()),
        });
    }
}
