//! Segmenter configuration
//!
//! Every value has a default matching the tuned pipeline; any subset can
//! be overridden from TOML for experimentation.

use crate::correction::Rule;
use crate::error::{Result, SegmentError};
use crate::label::Label;
use crate::window::{DEFAULT_CONTEXT, DEFAULT_MAX_LINES};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::warn;

/// A set of label names
///
/// Names outside the schema are kept verbatim and simply never match,
/// which lets legacy class names survive a config round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassSet(BTreeSet<String>);

impl ClassSet {
    #[must_use]
    pub fn new(names: &[&str]) -> Self {
        Self(names.iter().map(ToString::to_string).collect())
    }

    #[must_use]
    pub fn from_labels(labels: &[Label]) -> Self {
        Self(labels.iter().map(|l| l.as_str().to_string()).collect())
    }

    #[must_use]
    pub fn contains(&self, label: Label) -> bool {
        self.0.contains(label.as_str())
    }

    /// Names that do not correspond to any schema label
    pub fn unknown(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .map(String::as_str)
            .filter(|n| n.parse::<Label>().is_err())
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Half-window size around each line
    pub context: usize,

    /// Line-count ceiling above which documents are dropped
    pub max_lines: usize,

    /// Positions per classifier call; affects throughput only
    pub batch_size: usize,

    pub correction: CorrectionConfig,

    pub unnest: UnnestConfig,

    pub output: OutputConfig,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            context: DEFAULT_CONTEXT,
            max_lines: DEFAULT_MAX_LINES,
            batch_size: 256,
            correction: CorrectionConfig::default(),
            unnest: UnnestConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl SegmenterConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.context == 0 {
            return Err(SegmentError::Config("context must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(SegmentError::Config("batch_size must be at least 1".into()));
        }
        if self.correction.top_k == 0 {
            return Err(SegmentError::Config("correction.top_k must be at least 1".into()));
        }
        if self.unnest.max_depth == 0 {
            return Err(SegmentError::Config("unnest.max_depth must be at least 1".into()));
        }

        let sets = [
            ("correction.quotation_exempt", &self.correction.quotation_exempt),
            ("correction.short_run", &self.correction.short_run),
            ("correction.long_block", &self.correction.long_block),
            ("correction.stray", &self.correction.stray),
            ("unnest.excluded", &self.unnest.excluded),
            ("unnest.collapse_to_space", &self.unnest.collapse_to_space),
        ];
        for (key, set) in sets {
            for name in set.unknown() {
                warn!("{key}: '{name}' is not a known label and will never match");
            }
        }
        Ok(())
    }

    /// Number of corrected/raw labels the correction rules look at on each side
    #[must_use]
    pub fn history(&self) -> usize {
        self.correction.history.min(self.context).max(1)
    }
}

/// Label correction rule parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    /// Requested history length, clamped to `context`
    pub history: usize,

    /// How many best-scoring labels count as "ranks highly"
    pub top_k: usize,

    /// Rules in evaluation order; the first match wins
    pub rules: Vec<Rule>,

    /// Raw labels left alone by the quotation-start rule
    pub quotation_exempt: ClassSet,

    /// Runs a single stray line inside is absorbed
    pub short_run: ClassSet,

    /// Long homogeneous blocks protected against one wrong line
    pub long_block: ClassSet,

    /// Block classes that may not start from a single line
    pub stray: ClassSet,

    /// Leading characters that mark a quoted line
    pub quote_markers: Vec<char>,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            history: 3,
            top_k: 3,
            rules: Rule::DEFAULT_ORDER.to_vec(),
            // Legacy header spellings; neither matches `inline_headers`
            quotation_exempt: ClassSet::new(&["quotation", "quotation_marker", "inline_header"]),
            short_run: ClassSet::new(&[
                "closing",
                "personal_signature",
                "mua_signature",
                "inline-header",
                "technical",
            ]),
            long_block: ClassSet::new(&[
                "mua_signature",
                "personal_signature",
                "patch",
                "code",
                "tabular",
                "technical",
            ]),
            stray: ClassSet::from_labels(&[
                Label::Technical,
                Label::MuaSignature,
                Label::PersonalSignature,
                Label::Patch,
                Label::Tabular,
            ]),
            quote_markers: vec!['>', '|'],
        }
    }
}

/// Quotation unnesting parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnnestConfig {
    /// Recursion limit; blocks at this depth stay flat
    pub max_depth: usize,

    /// Labels dropped at every level
    pub excluded: ClassSet,

    /// Labels whose adjacent leaves are joined with a space
    pub collapse_to_space: ClassSet,
}

impl Default for UnnestConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            excluded: ClassSet::from_labels(&[
                Label::PersonalSignature,
                Label::MuaSignature,
                Label::Technical,
            ]),
            collapse_to_space: ClassSet::from_labels(&[Label::QuotationMarker, Label::Closing]),
        }
    }
}

/// Record emission parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Metadata fields removed before emission
    pub strip_fields: Vec<String>,

    /// Attach the reconstructed text to each record
    pub include_text: bool,

    /// Stamp records with `@modified`
    pub timestamp: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            strip_fields: vec!["id".to_string()],
            include_text: true,
            timestamp: false,
        }
    }
}
