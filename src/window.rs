//! Document windowing: batches of documents into one padded line stream

use crate::document::{Document, Line};
use std::collections::HashMap;
use std::ops::Range;
use tracing::{debug, warn};

/// Default half-window size around each line
pub const DEFAULT_CONTEXT: usize = 4;

/// Documents with more lines than this are treated as degenerate
pub const DEFAULT_MAX_LINES: usize = 5000;

/// Flat, context-padded line stream over a batch of documents
///
/// Every accepted document is surrounded by exactly `context` pad lines.
/// The two boundary maps key flat indices of a document's first real
/// line and one-past-its-last real line to the document's index.
#[derive(Debug, Clone, Default)]
pub struct FlatStream {
    lines: Vec<Line>,
    documents: Vec<Document>,
    starts: HashMap<usize, usize>,
    ends: HashMap<usize, usize>,
    context: usize,
    dropped: usize,
}

impl FlatStream {
    #[must_use]
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Accepted documents in input order
    #[must_use]
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    #[must_use]
    pub fn into_documents(self) -> Vec<Document> {
        self.documents
    }

    #[must_use]
    pub const fn context(&self) -> usize {
        self.context
    }

    /// Documents rejected for exceeding the line ceiling
    #[must_use]
    pub const fn dropped(&self) -> usize {
        self.dropped
    }

    /// Index of the document whose first real line sits at `index`
    #[must_use]
    pub fn document_starting_at(&self, index: usize) -> Option<usize> {
        self.starts.get(&index).copied()
    }

    /// Index of the document whose last real line sits just before `index`
    #[must_use]
    pub fn document_ending_at(&self, index: usize) -> Option<usize> {
        self.ends.get(&index).copied()
    }

    /// Flat range of each accepted document's real lines, in order
    #[must_use]
    pub fn document_ranges(&self) -> Vec<(usize, Range<usize>)> {
        let mut ranges: Vec<(usize, Range<usize>)> = self
            .starts
            .iter()
            .map(|(&start, &doc)| (doc, start..start + self.documents[doc].len()))
            .collect();
        ranges.sort_by_key(|(doc, _)| *doc);
        ranges
    }

    fn push(&mut self, document: Document) {
        let start = self.lines.len() + self.context;
        let end = start + document.len();
        let doc = self.documents.len();

        self.starts.insert(start, doc);
        self.ends.insert(end, doc);

        self.lines.extend(std::iter::repeat_n(Line::Pad, self.context));
        self.lines
            .extend(document.lines.iter().map(|l| Line::Text(l.clone())));
        self.lines.extend(std::iter::repeat_n(Line::Pad, self.context));
        self.documents.push(document);
    }
}

/// Lays documents end to end with pad lines between them
#[derive(Debug, Clone, Copy)]
pub struct Windower {
    context: usize,
    max_lines: usize,
}

impl Default for Windower {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT, DEFAULT_MAX_LINES)
    }
}

impl Windower {
    #[must_use]
    pub const fn new(context: usize, max_lines: usize) -> Self {
        Self { context, max_lines }
    }

    /// Build a flat stream from a batch of documents
    ///
    /// Documents over the line ceiling are skipped and counted. Documents
    /// without any line contribute nothing.
    pub fn window<I>(&self, documents: I) -> FlatStream
    where
        I: IntoIterator<Item = Document>,
    {
        let mut stream = FlatStream {
            context: self.context,
            ..FlatStream::default()
        };

        for document in documents {
            if document.len() > self.max_lines {
                warn!(
                    "Skipping document with {} lines (ceiling {})",
                    document.len(),
                    self.max_lines
                );
                stream.dropped += 1;
                continue;
            }
            if document.is_empty() {
                debug!("Skipping document without lines");
                continue;
            }
            stream.push(document);
        }

        debug!(
            "Windowed {} documents into {} lines ({} dropped)",
            stream.documents.len(),
            stream.lines.len(),
            stream.dropped
        );
        stream
    }

    /// Stream holding a single document, exempt from the line ceiling
    #[must_use]
    pub fn single(&self, document: Document) -> FlatStream {
        let mut stream = FlatStream {
            context: self.context,
            ..FlatStream::default()
        };
        if !document.is_empty() {
            stream.push(document);
        }
        stream
    }
}
