// Enforce at crate level
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]
#![allow(clippy::significant_drop_tightening)]

//! Mail Segment
//!
//! Line-level structural segmentation of email and newsgroup messages.
//! Every line of a message is assigned one of a fixed set of structural
//! labels (paragraph, quotation, signature, patch, ...), the labels are
//! repaired with a chain of sequence rules, and contiguous runs are
//! exported as character-offset spans.
//!
//! # Features
//!
//! - Context windows over a padded multi-document line stream
//! - A pluggable [`LineClassifier`] seam with a regex baseline
//! - Ordered, configurable label correction rules
//! - Span export, per-label statistics and recursive quotation unnesting
//! - Parallel batch processing with cooperative shutdown
//!
//! # Example
//!
//! ```rust
//! use mail_segment::{HeuristicClassifier, Label, Segmenter, SegmenterConfig};
//!
//! let segmenter = Segmenter::new(&HeuristicClassifier, SegmenterConfig::default()).unwrap();
//! let lines = segmenter.segment_text("Hi Bob,\n\n> quoted text\n").unwrap();
//!
//! assert_eq!(lines[0].label, Label::Salutation);
//! assert_eq!(lines[2].label, Label::Quotation);
//! ```

mod batch;
mod classifier;
mod config;
mod context;
mod correction;
mod document;
mod error;
mod label;
mod message;
mod segmenter;
mod spans;
mod stats;
mod truth;
mod unnest;
mod window;

pub use batch::{BatchRunner, JsonLinesSink, RecordSink, RunSummary};
pub use classifier::{HeuristicClassifier, LineClassifier, LookupClassifier};
pub use config::{ClassSet, CorrectionConfig, OutputConfig, SegmenterConfig, UnnestConfig};
pub use context::{ContextWindow, PAD_FEATURE, assemble};
pub use correction::{Correction, CorrectionEngine, Rule, RuleContext};
pub use document::{Document, LabeledLine, Line, QuotationNode, Record, Span, split_lines};
pub use error::{Result, SegmentError};
pub use label::{Label, LabelDistribution};
pub use message::document_from_rfc5322;
pub use segmenter::{BatchOutput, Segmenter};
pub use spans::{Extraction, SpanBuilder, SpanExtractor, spans_for};
pub use stats::{LabelStat, LabelStats, ParagraphQuotation, Segment};
pub use truth::{Annotation, label_document, label_lines};
pub use unnest::{Unnester, common_marker_prefix};
pub use window::{DEFAULT_CONTEXT, DEFAULT_MAX_LINES, FlatStream, Windower};
