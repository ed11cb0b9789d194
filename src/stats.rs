//! Per-label segment statistics of a corrected message

use crate::document::LabeledLine;
use crate::label::Label;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A labelled byte range of the raw message text
///
/// Blank lines extend the running segment instead of opening one, so a
/// segment may span sentinel lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub start: usize,
    pub end: usize,
    pub label: Label,
}

/// Aggregate figures for one label
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelStat {
    /// Number of segments
    pub num: usize,
    /// Total segment length in bytes
    pub chars: usize,
    /// Newlines inside the segments
    pub lines: usize,
    /// `chars / num`
    pub avg_len: f64,
}

/// Paragraph-to-quotation ratios, `-1.0` when there is no quotation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParagraphQuotation {
    pub num_ratio: f64,
    pub lines_ratio: f64,
}

/// Statistics over the segments of one message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelStats {
    #[serde(flatten)]
    pub labels: BTreeMap<Label, LabelStat>,

    pub paragraph_quotation: ParagraphQuotation,

    #[serde(skip)]
    pub segments: Vec<Segment>,

    #[serde(skip)]
    text: String,
}

impl LabelStats {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_lines(lines: &[LabeledLine]) -> Self {
        let text: String = lines.iter().map(|l| l.text.as_str()).collect();
        let segments = segments(lines);

        let mut labels: BTreeMap<Label, LabelStat> = BTreeMap::new();
        for segment in &segments {
            let stat = labels.entry(segment.label).or_default();
            stat.num += 1;
            stat.chars += segment.end - segment.start;
            stat.lines += text[segment.start..segment.end].matches('\n').count();
        }
        for stat in labels.values_mut() {
            stat.avg_len = stat.chars as f64 / stat.num as f64;
        }

        let get = |label: Label| labels.get(&label).copied().unwrap_or_default();
        let (paragraph, quotation) = (get(Label::Paragraph), get(Label::Quotation));
        let paragraph_quotation = ParagraphQuotation {
            num_ratio: if quotation.num > 0 {
                paragraph.num as f64 / quotation.num as f64
            } else {
                -1.0
            },
            lines_ratio: if quotation.lines > 0 {
                paragraph.lines as f64 / quotation.lines as f64
            } else {
                -1.0
            },
        };

        Self {
            labels,
            paragraph_quotation,
            segments,
            text,
        }
    }

    #[must_use]
    pub fn get(&self, label: Label) -> Option<&LabelStat> {
        self.labels.get(&label)
    }

    /// Trimmed paragraph segments, one per line
    #[must_use]
    pub fn paragraph_text(&self) -> String {
        self.segments
            .iter()
            .filter(|s| s.label == Label::Paragraph)
            .map(|s| format!("{}\n", self.text[s.start..s.end].trim()))
            .collect()
    }
}

fn segments(lines: &[LabeledLine]) -> Vec<Segment> {
    let mut segments = Vec::new();
    let (mut start, mut end) = (0, 0);
    let mut current: Option<Label> = None;

    for line in lines {
        if line.label.is_sentinel() {
            end += line.text.len();
            continue;
        }
        match current {
            Some(label) if label != line.label => {
                segments.push(Segment { start, end, label });
                start = end;
            }
            _ => {}
        }
        current = Some(line.label);
        end += line.text.len();
    }

    if let Some(label) = current {
        segments.push(Segment { start, end, label });
    }
    segments
}
