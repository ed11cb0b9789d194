//! Recursive quotation unnesting
//!
//! Runs of quotation lines are stripped of their common quote-marker
//! prefix and segmented again as an independent document, producing a
//! tree of labelled leaves and nested blocks.

use crate::classifier::LineClassifier;
use crate::config::{ClassSet, UnnestConfig};
use crate::document::{LabeledLine, QuotationNode};
use crate::error::Result;
use crate::label::Label;
use crate::segmenter::Segmenter;
use tracing::debug;

pub struct Unnester<'s, 'c, C: LineClassifier + ?Sized> {
    segmenter: &'s Segmenter<'c, C>,
    config: &'s UnnestConfig,
}

impl<'s, 'c, C: LineClassifier + ?Sized> Unnester<'s, 'c, C> {
    pub const fn new(segmenter: &'s Segmenter<'c, C>, config: &'s UnnestConfig) -> Self {
        Self { segmenter, config }
    }

    /// Unnest a corrected line sequence starting at depth zero
    pub fn unnest(&self, lines: &[LabeledLine]) -> Result<Vec<QuotationNode>> {
        self.unnest_at(lines, 0)
    }

    fn unnest_at(&self, lines: &[LabeledLine], depth: usize) -> Result<Vec<QuotationNode>> {
        let kept: Vec<&LabeledLine> = lines
            .iter()
            .filter(|l| l.label != Label::Pad && !self.config.excluded.contains(l.label))
            .collect();

        let mut nodes = Vec::new();
        let mut i = 0;
        while i < kept.len() {
            if kept[i].label != Label::Quotation {
                nodes.push(QuotationNode::leaf(strip_terminator(&kept[i].text), kept[i].label));
                i += 1;
                continue;
            }

            let run = kept[i..]
                .iter()
                .take_while(|l| l.label == Label::Quotation)
                .count();
            nodes.extend(self.quotation_block(&kept[i..i + run], depth)?);
            i += run;
        }

        Ok(tidy(nodes, &self.config.collapse_to_space))
    }

    fn quotation_block(&self, block: &[&LabeledLine], depth: usize) -> Result<Vec<QuotationNode>> {
        let flat = || -> Vec<QuotationNode> {
            block
                .iter()
                .map(|l| QuotationNode::leaf(strip_terminator(&l.text), Label::Quotation))
                .collect()
        };

        if depth >= self.config.max_depth {
            debug!("Quotation depth limit {} reached, keeping block flat", self.config.max_depth);
            return Ok(flat());
        }

        let markers = &self.segmenter.config().correction.quote_markers;
        let prefix = common_marker_prefix(block.iter().map(|l| l.text.as_str()), markers);
        if !prefix.chars().any(|c| markers.contains(&c)) {
            return Ok(flat());
        }

        let dequoted: String = block
            .iter()
            .map(|l| l.text.strip_prefix(prefix.as_str()).unwrap_or(&l.text))
            .collect();
        if dequoted.trim().is_empty() {
            return Ok(Vec::new());
        }

        let text = dequoted.strip_suffix('\n').unwrap_or(&dequoted);
        let inner = self.segmenter.segment_text(text)?;
        let children = self.unnest_at(&inner, depth + 1)?;

        Ok(if children.is_empty() {
            Vec::new()
        } else {
            vec![QuotationNode::Nested(children)]
        })
    }
}

/// Longest prefix shared by all lines made of quote markers and blanks
#[must_use]
pub fn common_marker_prefix<'a, I>(lines: I, markers: &[char]) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut common: Option<String> = None;
    for line in lines {
        let own: String = line
            .chars()
            .take_while(|c| markers.contains(c) || *c == ' ' || *c == '\t')
            .collect();
        common = Some(match common {
            None => own,
            Some(prev) => prev
                .chars()
                .zip(own.chars())
                .take_while(|(a, b)| a == b)
                .map(|(a, _)| a)
                .collect(),
        });
    }
    common.unwrap_or_default()
}

fn strip_terminator(text: &str) -> &str {
    text.strip_suffix('\n')
        .map_or(text, |t| t.strip_suffix('\r').unwrap_or(t))
}

/// Merge same-label neighbours, fold markers into the block they
/// introduce and drop blank leaves at either end
fn tidy(nodes: Vec<QuotationNode>, collapse_to_space: &ClassSet) -> Vec<QuotationNode> {
    let mut merged: Vec<QuotationNode> = Vec::with_capacity(nodes.len());
    for node in nodes {
        if let (
            Some(QuotationNode::Leaf { text, label }),
            QuotationNode::Leaf {
                text: next,
                label: next_label,
            },
        ) = (merged.last_mut(), &node)
            && label == next_label
        {
            if collapse_to_space.contains(*label) {
                let joined = format!("{} {}", text.trim_end(), next.trim_start());
                *text = joined;
            } else {
                text.push('\n');
                text.push_str(next);
            }
            continue;
        }
        merged.push(node);
    }

    let mut folded: Vec<QuotationNode> = Vec::with_capacity(merged.len());
    for node in merged {
        if let QuotationNode::Nested(mut children) = node {
            if folded
                .last()
                .is_some_and(|n| n.label() == Some(Label::QuotationMarker))
                && let Some(marker) = folded.pop()
            {
                children.insert(0, marker);
            }
            folded.push(QuotationNode::Nested(children));
        } else {
            folded.push(node);
        }
    }

    let is_blank = |n: &QuotationNode| n.label() == Some(Label::Empty);
    let start = folded.iter().position(|n| !is_blank(n)).unwrap_or(folded.len());
    let end = folded.iter().rposition(|n| !is_blank(n)).map_or(start, |i| i + 1);
    folded.drain(start..end).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_prefix_keeps_shared_levels() {
        let markers = ['>', '|'];
        assert_eq!(common_marker_prefix(["> a\n", "> b\n"], &markers), "> ");
        assert_eq!(common_marker_prefix(["> > a\n", "> b\n"], &markers), "> ");
        assert_eq!(common_marker_prefix([">\n", "> b\n"], &markers), ">");
        assert_eq!(common_marker_prefix(["a\n", "> b\n"], &markers), "");
    }

    #[test]
    fn test_tidy_merges_and_folds() {
        let collapse = UnnestConfig::default().collapse_to_space;
        let nodes = vec![
            QuotationNode::leaf("", Label::Empty),
            QuotationNode::leaf("first", Label::Paragraph),
            QuotationNode::leaf("second", Label::Paragraph),
            QuotationNode::leaf("On Monday", Label::QuotationMarker),
            QuotationNode::leaf("Bob wrote:", Label::QuotationMarker),
            QuotationNode::Nested(vec![QuotationNode::leaf("quoted", Label::Paragraph)]),
            QuotationNode::leaf("", Label::Empty),
        ];

        assert_eq!(
            tidy(nodes, &collapse),
            vec![
                QuotationNode::leaf("first\nsecond", Label::Paragraph),
                QuotationNode::Nested(vec![
                    QuotationNode::leaf("On Monday Bob wrote:", Label::QuotationMarker),
                    QuotationNode::leaf("quoted", Label::Paragraph),
                ]),
            ]
        );
    }
}
