//! Pipeline driver: windowing, classification, correction and span extraction

use crate::classifier::LineClassifier;
use crate::config::SegmenterConfig;
use crate::context::assemble;
use crate::correction::CorrectionEngine;
use crate::document::{Document, LabeledLine, QuotationNode, Record};
use crate::error::{Result, SegmentError};
use crate::label::{Label, LabelDistribution};
use crate::spans::SpanExtractor;
use crate::unnest::Unnester;
use crate::window::{FlatStream, Windower};
use serde_json::Map;
use tracing::debug;

/// Result of segmenting one batch of documents
#[derive(Debug, Clone, Default)]
pub struct BatchOutput {
    /// One record per surviving document, in input order
    pub records: Vec<Record>,

    /// Documents over the line ceiling
    pub dropped: usize,

    /// Documents that produced no spans or text
    pub skipped: usize,
}

/// Runs the full segmentation pipeline with a borrowed classifier
///
/// The classifier is loaded and owned by the caller; a segmenter only
/// borrows it, so one model can serve many segmenters across threads.
#[derive(Debug)]
pub struct Segmenter<'c, C: LineClassifier + ?Sized> {
    classifier: &'c C,
    config: SegmenterConfig,
    windower: Windower,
    engine: CorrectionEngine,
}

impl<'c, C: LineClassifier + ?Sized> Segmenter<'c, C> {
    pub fn new(classifier: &'c C, config: SegmenterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            classifier,
            windower: Windower::new(config.context, config.max_lines),
            engine: CorrectionEngine::from_config(&config),
            config,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Raw distribution for every stream position
    ///
    /// Pad positions are never sent to the classifier and score `<pad>`.
    pub fn classify_stream(&self, stream: &FlatStream) -> Result<Vec<LabelDistribution>> {
        let lines = stream.lines();
        let mut distributions = Vec::with_capacity(lines.len());

        let mut start = 0;
        while start < lines.len() {
            let end = (start + self.config.batch_size).min(lines.len());
            let windows = assemble(lines, start..end, self.config.context);
            let content: Vec<_> = windows.iter().filter(|w| !w.is_pad()).cloned().collect();

            let scored = self.classifier.classify_batch(&content)?;
            if scored.len() < content.len() {
                return Err(SegmentError::MissingDistribution {
                    position: content[scored.len()].position(),
                });
            }

            let mut scored = scored.into_iter();
            for window in &windows {
                if window.is_pad() {
                    distributions.push(LabelDistribution::one_hot(Label::Pad));
                } else {
                    distributions.push(scored.next().ok_or_else(|| {
                        SegmentError::MissingDistribution {
                            position: window.position(),
                        }
                    })?);
                }
            }
            start = end;
        }

        Ok(distributions)
    }

    /// Corrected label for every stream position
    pub fn label_stream(&self, stream: &FlatStream) -> Result<Vec<Label>> {
        let distributions = self.classify_stream(stream)?;
        self.engine.correct(stream.lines(), &distributions)
    }

    /// Segment a batch of documents into output records
    pub fn segment_batch(&self, documents: Vec<Document>) -> Result<BatchOutput> {
        let stream = self.windower.window(documents);
        let labels = self.label_stream(&stream)?;
        let extraction = SpanExtractor::new(&self.config.output).extract(&stream, &labels);

        debug!(
            "Segmented batch: {} records, {} dropped, {} skipped",
            extraction.records.len(),
            stream.dropped(),
            extraction.skipped
        );

        Ok(BatchOutput {
            records: extraction.records,
            dropped: stream.dropped(),
            skipped: extraction.skipped,
        })
    }

    /// Corrected lines of each accepted document, in input order
    pub fn label_documents(&self, documents: Vec<Document>) -> Result<Vec<Vec<LabeledLine>>> {
        let stream = self.windower.window(documents);
        let labels = self.label_stream(&stream)?;
        Ok(labeled_documents(&stream, &labels))
    }

    /// Corrected lines of a single raw text
    ///
    /// The text forms one synthetic document that is exempt from the
    /// line ceiling.
    pub fn segment_text(&self, text: &str) -> Result<Vec<LabeledLine>> {
        let stream = self
            .windower
            .single(Document::from_text(text, Map::new()));
        let labels = self.label_stream(&stream)?;
        Ok(labeled_documents(&stream, &labels)
            .into_iter()
            .next()
            .unwrap_or_default())
    }

    /// Segment a raw text and unnest its quotations
    pub fn unnest_text(&self, text: &str) -> Result<Vec<QuotationNode>> {
        let lines = self.segment_text(text)?;
        Unnester::new(self, &self.config.unnest).unnest(&lines)
    }
}

fn labeled_documents(stream: &FlatStream, labels: &[Label]) -> Vec<Vec<LabeledLine>> {
    stream
        .document_ranges()
        .into_iter()
        .map(|(_, range)| {
            stream.lines()[range.clone()]
                .iter()
                .zip(&labels[range])
                .filter_map(|(line, label)| line.text().map(|t| LabeledLine::new(t, *label)))
                .collect()
        })
        .collect()
}
