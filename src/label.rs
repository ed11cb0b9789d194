//! Line label schema and per-line score distributions

use crate::error::{Result, SegmentError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Structural role of a single message line
///
/// The declaration order is the label's rank, which indexes
/// [`LabelDistribution`] scores.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Label {
    #[serde(rename = "paragraph")]
    Paragraph,
    #[serde(rename = "closing")]
    Closing,
    #[serde(rename = "inline_headers")]
    InlineHeaders,
    #[serde(rename = "log_data")]
    LogData,
    #[serde(rename = "mua_signature")]
    MuaSignature,
    #[serde(rename = "patch")]
    Patch,
    #[serde(rename = "personal_signature")]
    PersonalSignature,
    #[serde(rename = "quotation")]
    Quotation,
    #[serde(rename = "quotation_marker")]
    QuotationMarker,
    #[serde(rename = "raw_code")]
    RawCode,
    #[serde(rename = "salutation")]
    Salutation,
    #[serde(rename = "section_heading")]
    SectionHeading,
    #[serde(rename = "tabular")]
    Tabular,
    #[serde(rename = "technical")]
    Technical,
    #[serde(rename = "visual_separator")]
    VisualSeparator,
    /// Blank line
    #[serde(rename = "<empty>")]
    Empty,
    /// Structural padding, never real content
    #[serde(rename = "<pad>")]
    Pad,
}

impl Label {
    /// Number of labels in the schema
    pub const COUNT: usize = 17;

    /// All labels in rank order
    pub const ALL: [Self; Self::COUNT] = [
        Self::Paragraph,
        Self::Closing,
        Self::InlineHeaders,
        Self::LogData,
        Self::MuaSignature,
        Self::Patch,
        Self::PersonalSignature,
        Self::Quotation,
        Self::QuotationMarker,
        Self::RawCode,
        Self::Salutation,
        Self::SectionHeading,
        Self::Tabular,
        Self::Technical,
        Self::VisualSeparator,
        Self::Empty,
        Self::Pad,
    ];

    /// Integer rank used for one-hot encoding and argmax decoding
    #[must_use]
    pub const fn rank(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn from_rank(rank: usize) -> Option<Self> {
        Self::ALL.get(rank).copied()
    }

    /// `<empty>` and `<pad>` are sentinels, never emitted as spans
    #[must_use]
    pub const fn is_sentinel(self) -> bool {
        matches!(self, Self::Empty | Self::Pad)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Paragraph => "paragraph",
            Self::Closing => "closing",
            Self::InlineHeaders => "inline_headers",
            Self::LogData => "log_data",
            Self::MuaSignature => "mua_signature",
            Self::Patch => "patch",
            Self::PersonalSignature => "personal_signature",
            Self::Quotation => "quotation",
            Self::QuotationMarker => "quotation_marker",
            Self::RawCode => "raw_code",
            Self::Salutation => "salutation",
            Self::SectionHeading => "section_heading",
            Self::Tabular => "tabular",
            Self::Technical => "technical",
            Self::VisualSeparator => "visual_separator",
            Self::Empty => "<empty>",
            Self::Pad => "<pad>",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = SegmentError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| SegmentError::InvalidLabel(s.to_string()))
    }
}

/// Dense score vector over the label schema, one score per rank
///
/// Scores need not form a probability simplex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>")]
pub struct LabelDistribution(Vec<f32>);

impl LabelDistribution {
    /// Wrap a raw score vector, checking its length
    pub fn new(scores: Vec<f32>) -> Result<Self> {
        if scores.len() != Label::COUNT {
            return Err(SegmentError::DistributionShape {
                position: 0,
                expected: Label::COUNT,
                actual: scores.len(),
            });
        }
        Ok(Self(scores))
    }

    /// One-hot vector at `label`
    #[must_use]
    pub fn one_hot(label: Label) -> Self {
        let mut scores = vec![0.0; Label::COUNT];
        scores[label.rank()] = 1.0;
        Self(scores)
    }

    /// Build a distribution from `(label, score)` pairs, all other labels at zero
    #[must_use]
    pub fn from_scores(pairs: &[(Label, f32)]) -> Self {
        let mut scores = vec![0.0; Label::COUNT];
        for (label, score) in pairs {
            scores[label.rank()] = *score;
        }
        Self(scores)
    }

    #[must_use]
    pub fn scores(&self) -> &[f32] {
        &self.0
    }

    #[must_use]
    pub fn score(&self, label: Label) -> f32 {
        self.0[label.rank()]
    }

    /// Best label; ties resolve to the lowest rank
    #[must_use]
    pub fn argmax(&self) -> Label {
        self.ranked()[0]
    }

    /// Labels ordered by descending score, ties broken by rank
    #[must_use]
    pub fn ranked(&self) -> Vec<Label> {
        let mut labels = Label::ALL.to_vec();
        labels.sort_by(|a, b| {
            self.0[b.rank()]
                .total_cmp(&self.0[a.rank()])
                .then_with(|| a.rank().cmp(&b.rank()))
        });
        labels
    }

    /// Whether `label` is among the `k` best-scoring labels
    #[must_use]
    pub fn in_top(&self, label: Label, k: usize) -> bool {
        self.ranked().iter().take(k).any(|l| *l == label)
    }
}

impl TryFrom<Vec<f32>> for LabelDistribution {
    type Error = SegmentError;

    fn try_from(scores: Vec<f32>) -> Result<Self> {
        Self::new(scores)
    }
}
