//! Rule-based correction of raw classifier labels
//!
//! Positions are corrected strictly left to right. Each position sees the
//! corrected labels of the positions before it (the history) and the raw
//! argmax labels of the positions after it (the lookahead), so
//! corrections propagate forward only. Rules are evaluated in order and
//! the first one that produces a label wins; otherwise the raw argmax is
//! kept.

use crate::config::{CorrectionConfig, SegmenterConfig};
use crate::document::Line;
use crate::error::{Result, SegmentError};
use crate::label::{Label, LabelDistribution};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use tracing::trace;

/// A single correction rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    /// Structural pad lines are always `<pad>`
    PadLine,
    /// Whitespace-only lines are always `<empty>`
    BlankLine,
    /// A sentinel predicted for real content takes the previous label
    MisplacedSentinel,
    /// Keeps a quotation going across a change of quoting style
    BleedingQuotation,
    /// Marker-prefixed lines become quotations
    QuotationStart,
    /// First quoted line after a break may be the attribution line
    QuotationMarker,
    /// One stray line inside a short run
    InterruptedShortBlock,
    /// One wrong line inside a long homogeneous block
    InterruptedLongBlock,
    /// A single line that would falsely open a block
    StrayInterruption,
}

impl Rule {
    pub const DEFAULT_ORDER: [Self; 9] = [
        Self::PadLine,
        Self::BlankLine,
        Self::MisplacedSentinel,
        Self::BleedingQuotation,
        Self::QuotationStart,
        Self::QuotationMarker,
        Self::InterruptedShortBlock,
        Self::InterruptedLongBlock,
        Self::StrayInterruption,
    ];

    /// Label this rule assigns in `ctx`, or `None` if it does not apply
    #[must_use]
    pub fn apply(self, ctx: &RuleContext<'_>, config: &CorrectionConfig) -> Option<Label> {
        let raw = ctx.raw_label;
        let prev = ctx.previous();
        let next = ctx.next(0);

        match self {
            Self::PadLine => ctx.line.is_none().then_some(Label::Pad),

            Self::BlankLine => ctx
                .line
                .is_some_and(|l| l.trim().is_empty())
                .then_some(Label::Empty),

            Self::MisplacedSentinel => {
                let line = ctx.line?;
                let misplaced =
                    (raw == Label::Empty && !line.trim().is_empty()) || raw == Label::Pad;
                misplaced.then(|| {
                    if prev.is_sentinel() {
                        Label::Paragraph
                    } else {
                        prev
                    }
                })
            }

            Self::BleedingQuotation => {
                let current = first_visible(ctx.line?)?;
                let previous = first_visible(ctx.previous_line?)?;
                (raw == Label::Quotation
                    && prev == Label::Quotation
                    && next != Label::Quotation
                    && previous != current)
                    .then_some(prev)
            }

            Self::QuotationStart => {
                let line = ctx.line?.trim();
                let marked = line
                    .chars()
                    .next()
                    .is_some_and(|c| config.quote_markers.contains(&c));
                (!config.quotation_exempt.contains(raw)
                    && marked
                    && (ctx.in_top(Label::Quotation, config.top_k) || prev == Label::Quotation))
                    .then_some(Label::Quotation)
            }

            Self::QuotationMarker => (raw == Label::Quotation
                && prev.is_sentinel()
                && ctx.in_top(Label::QuotationMarker, config.top_k))
            .then_some(Label::QuotationMarker),

            Self::InterruptedShortBlock => {
                (raw != prev && next == prev && config.short_run.contains(prev)).then_some(prev)
            }

            Self::InterruptedLongBlock => {
                let block = ctx.unanimous_history()?;
                (raw != block
                    && ctx.lookahead.iter().any(|l| *l == block)
                    && config.long_block.contains(block)
                    && ctx.ranked.get(1) == Some(&block))
                .then_some(block)
            }

            Self::StrayInterruption => {
                let resumes = next == prev
                    || (next == Label::Empty && ctx.lookahead.get(1) == Some(&prev));
                (config.stray.contains(raw) && prev != raw && !prev.is_sentinel() && resumes)
                    .then_some(prev)
            }
        }
    }
}

/// First non-whitespace character of a line
fn first_visible(line: &str) -> Option<char> {
    line.trim().chars().next()
}

/// Everything a rule may inspect for one position
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    /// Line text, `None` for a pad line
    pub line: Option<&'a str>,

    /// Text of the preceding stream position
    pub previous_line: Option<&'a str>,

    /// Raw argmax label
    pub raw_label: Label,

    /// Labels by descending raw score
    pub ranked: &'a [Label],

    /// Corrected labels of the preceding positions, oldest first
    pub history: &'a [Label],

    /// Raw labels of the following positions, nearest first
    pub lookahead: &'a [Label],
}

impl RuleContext<'_> {
    /// Corrected label of the immediately preceding position
    #[must_use]
    pub fn previous(&self) -> Label {
        self.history.last().copied().unwrap_or(Label::Pad)
    }

    /// Raw label `offset` positions ahead
    #[must_use]
    pub fn next(&self, offset: usize) -> Label {
        self.lookahead.get(offset).copied().unwrap_or(Label::Pad)
    }

    #[must_use]
    pub fn in_top(&self, label: Label, k: usize) -> bool {
        self.ranked.iter().take(k).any(|l| *l == label)
    }

    /// The only content label in the history, if there is exactly one
    #[must_use]
    pub fn unanimous_history(&self) -> Option<Label> {
        let content: BTreeSet<Label> = self
            .history
            .iter()
            .copied()
            .filter(|l| !l.is_sentinel())
            .collect();
        let mut labels = content.into_iter();
        match (labels.next(), labels.next()) {
            (Some(label), None) => Some(label),
            _ => None,
        }
    }
}

/// Corrected label of one position and the rule that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Correction {
    pub label: Label,
    /// `None` when the raw argmax was kept
    pub rule: Option<Rule>,
}

/// Applies the configured rule chain over a line stream
#[derive(Debug, Clone)]
pub struct CorrectionEngine {
    config: CorrectionConfig,
    history: usize,
}

impl CorrectionEngine {
    /// `history` is the number of positions looked at on each side
    #[must_use]
    pub fn new(config: CorrectionConfig, history: usize) -> Self {
        Self {
            config,
            history: history.max(1),
        }
    }

    #[must_use]
    pub fn from_config(config: &SegmenterConfig) -> Self {
        Self::new(config.correction.clone(), config.history())
    }

    /// Corrected label per position
    pub fn correct(
        &self,
        lines: &[Line],
        distributions: &[LabelDistribution],
    ) -> Result<Vec<Label>> {
        Ok(self
            .correct_traced(lines, distributions)?
            .into_iter()
            .map(|c| c.label)
            .collect())
    }

    /// Corrected label per position together with the rule that fired
    pub fn correct_traced(
        &self,
        lines: &[Line],
        distributions: &[LabelDistribution],
    ) -> Result<Vec<Correction>> {
        check_distributions(lines.len(), distributions)?;

        // Lookahead only ever sees uncorrected labels
        let raw: Vec<Label> = lines
            .iter()
            .zip(distributions)
            .map(|(line, dist)| {
                if line.is_pad() {
                    Label::Pad
                } else {
                    dist.argmax()
                }
            })
            .collect();

        let mut history: VecDeque<Label> = std::iter::repeat_n(Label::Pad, self.history).collect();
        let mut corrections = Vec::with_capacity(lines.len());

        for (i, (line, dist)) in lines.iter().zip(distributions).enumerate() {
            let ranked = dist.ranked();
            let lookahead: Vec<Label> = (1..=self.history)
                .map(|k| raw.get(i + k).copied().unwrap_or(Label::Pad))
                .collect();
            let past: Vec<Label> = history.iter().copied().collect();

            let ctx = RuleContext {
                line: line.text(),
                previous_line: i.checked_sub(1).and_then(|p| lines[p].text()),
                raw_label: raw[i],
                ranked: &ranked,
                history: &past,
                lookahead: &lookahead,
            };

            let correction = self.correct_one(&ctx);
            if correction.label != raw[i] {
                trace!(
                    "position {i}: {} -> {} ({:?})",
                    raw[i], correction.label, correction.rule
                );
            }

            history.pop_front();
            history.push_back(correction.label);
            corrections.push(correction);
        }

        Ok(corrections)
    }

    /// Run the rule chain for a single position
    #[must_use]
    pub fn correct_one(&self, ctx: &RuleContext<'_>) -> Correction {
        self.config
            .rules
            .iter()
            .find_map(|rule| {
                rule.apply(ctx, &self.config).map(|label| Correction {
                    label,
                    rule: Some(*rule),
                })
            })
            .unwrap_or(Correction {
                label: ctx.raw_label,
                rule: None,
            })
    }
}

fn check_distributions(len: usize, distributions: &[LabelDistribution]) -> Result<()> {
    if distributions.len() < len {
        return Err(SegmentError::MissingDistribution {
            position: distributions.len(),
        });
    }
    if let Some((position, dist)) = distributions
        .iter()
        .enumerate()
        .find(|(_, d)| d.scores().len() != Label::COUNT)
    {
        return Err(SegmentError::DistributionShape {
            position,
            expected: Label::COUNT,
            actual: dist.scores().len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(
        line: &'a str,
        raw: Label,
        ranked: &'a [Label],
        history: &'a [Label],
        lookahead: &'a [Label],
    ) -> RuleContext<'a> {
        RuleContext {
            line: Some(line),
            previous_line: None,
            raw_label: raw,
            ranked,
            history,
            lookahead,
        }
    }

    #[test]
    fn test_misplaced_sentinel_falls_back_to_paragraph() {
        let config = CorrectionConfig::default();
        let ranked = [Label::Empty];
        let history = [Label::Pad, Label::Empty];
        let c = ctx("text\n", Label::Empty, &ranked, &history, &[]);
        assert_eq!(
            Rule::MisplacedSentinel.apply(&c, &config),
            Some(Label::Paragraph)
        );
    }

    #[test]
    fn test_stray_interruption_skips_one_blank() {
        let config = CorrectionConfig::default();
        let ranked = [Label::Technical];
        let history = [Label::Paragraph];
        let lookahead = [Label::Empty, Label::Paragraph];
        let c = ctx("0x1f\n", Label::Technical, &ranked, &history, &lookahead);
        assert_eq!(
            Rule::StrayInterruption.apply(&c, &config),
            Some(Label::Paragraph)
        );
    }

    #[test]
    fn test_long_block_requires_second_rank() {
        let config = CorrectionConfig::default();
        let history = [Label::Patch, Label::Patch, Label::Patch];
        let lookahead = [Label::Patch, Label::Patch, Label::Patch];
        let second = [Label::Paragraph, Label::Patch];
        let third = [Label::Paragraph, Label::Closing, Label::Patch];

        let c = ctx("x\n", Label::Paragraph, &second, &history, &lookahead);
        assert_eq!(
            Rule::InterruptedLongBlock.apply(&c, &config),
            Some(Label::Patch)
        );
        let c = ctx("x\n", Label::Paragraph, &third, &history, &lookahead);
        assert_eq!(Rule::InterruptedLongBlock.apply(&c, &config), None);
    }

    #[test]
    fn test_missing_distribution_is_fatal() {
        let engine = CorrectionEngine::from_config(&SegmenterConfig::default());
        let lines = vec![Line::Text("a\n".into()), Line::Text("b\n".into())];
        let dists = vec![LabelDistribution::one_hot(Label::Paragraph)];
        assert!(matches!(
            engine.correct(&lines, &dists),
            Err(SegmentError::MissingDistribution { position: 1 })
        ));
    }
}
