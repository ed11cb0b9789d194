//! Core types flowing through the segmentation pipeline

use crate::label::Label;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One position of a flat line stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// Structural padding between documents
    Pad,
    /// Raw line text including its terminator
    Text(String),
}

impl Line {
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Pad => None,
            Self::Text(t) => Some(t),
        }
    }

    #[must_use]
    pub const fn is_pad(&self) -> bool {
        matches!(self, Self::Pad)
    }

    /// Whitespace-only text line
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.text().is_some_and(|t| t.trim().is_empty())
    }
}

/// Split text on `\n`, re-attaching the terminator to every line
///
/// The final line always gets a terminator, so `"a\nb"` yields
/// `["a\n", "b\n"]` and `""` yields `["\n"]`.
#[must_use]
pub fn split_lines(text: &str) -> Vec<String> {
    text.split('\n').map(|l| format!("{l}\n")).collect()
}

/// An ingested message: its lines plus opaque metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    /// Lines with terminators preserved
    pub lines: Vec<String>,

    /// Attributes from the ingesting collaborator, round-tripped unchanged
    pub metadata: Map<String, Value>,
}

impl Document {
    pub fn new(lines: Vec<String>, metadata: Map<String, Value>) -> Self {
        Self { lines, metadata }
    }

    /// Document from raw newline-delimited text
    #[must_use]
    pub fn from_text(text: &str, metadata: Map<String, Value>) -> Self {
        Self::new(split_lines(text), metadata)
    }

    /// Document from a JSON object carrying a `text` field
    ///
    /// The whole object is kept as metadata. A missing or non-string
    /// `text` yields a document without lines.
    #[must_use]
    pub fn from_json(object: Map<String, Value>) -> Self {
        let lines = object
            .get("text")
            .and_then(Value::as_str)
            .map(split_lines)
            .unwrap_or_default();
        Self::new(lines, object)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// A line of one document together with its corrected label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledLine {
    pub text: String,
    pub label: Label,
}

impl LabeledLine {
    pub fn new(text: impl Into<String>, label: Label) -> Self {
        Self {
            text: text.into(),
            label,
        }
    }
}

/// A contiguous run of one label in reconstructed document text
///
/// Offsets count characters and `end_offset` is inclusive. Serialized
/// as a `[start, end, label]` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "(usize, usize, Label)", from = "(usize, usize, Label)")]
pub struct Span {
    pub start_offset: usize,
    pub end_offset: usize,
    pub label: Label,
}

impl Span {
    #[must_use]
    pub const fn new(start_offset: usize, end_offset: usize, label: Label) -> Self {
        Self {
            start_offset,
            end_offset,
            label,
        }
    }

    /// Number of characters covered, zero for an inverted span
    #[must_use]
    pub const fn char_len(&self) -> usize {
        if self.end_offset < self.start_offset {
            0
        } else {
            self.end_offset - self.start_offset + 1
        }
    }

    /// The covered substring of `text`
    #[must_use]
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        let mut indices = text.char_indices().map(|(i, _)| i).chain([text.len()]);
        let start = indices.nth(self.start_offset).unwrap_or(text.len());
        if self.end_offset < self.start_offset {
            return &text[start..start];
        }
        let end = indices
            .nth(self.end_offset - self.start_offset)
            .unwrap_or(text.len());
        &text[start..end]
    }
}

impl From<Span> for (usize, usize, Label) {
    fn from(span: Span) -> Self {
        (span.start_offset, span.end_offset, span.label)
    }
}

impl From<(usize, usize, Label)> for Span {
    fn from((start, end, label): (usize, usize, Label)) -> Self {
        Self::new(start, end, label)
    }
}

/// One output record per surviving document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Original metadata minus the raw `text` and stripped fields
    #[serde(flatten)]
    pub metadata: Map<String, Value>,

    /// Annotation spans in document order
    pub labels: Vec<Span>,

    /// Left-trimmed reconstructed text the offsets refer to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Annotation time in epoch milliseconds
    #[serde(rename = "@modified", skip_serializing_if = "Option::is_none")]
    pub modified: Option<i64>,
}

/// Recursively unnested message structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotationNode {
    /// A run of text carrying one label
    Leaf { text: String, label: Label },
    /// A re-segmented quotation block
    Nested(Vec<QuotationNode>),
}

impl QuotationNode {
    pub fn leaf(text: impl Into<String>, label: Label) -> Self {
        Self::Leaf {
            text: text.into(),
            label,
        }
    }

    #[must_use]
    pub fn label(&self) -> Option<Label> {
        match self {
            Self::Leaf { label, .. } => Some(*label),
            Self::Nested(_) => None,
        }
    }

    /// Nesting depth below this node, zero for leaves
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::Leaf { .. } => 0,
            Self::Nested(children) => 1 + children.iter().map(Self::depth).max().unwrap_or(0),
        }
    }
}
