//! The line classifier seam and two in-crate implementations

use crate::context::ContextWindow;
use crate::error::Result;
use crate::label::{Label, LabelDistribution};
use regex::Regex;
use std::collections::HashMap;

/// Scores one context window over the label schema
///
/// Implementations are loaded once by the caller and shared read-only
/// across workers, hence `Send + Sync`.
pub trait LineClassifier: Send + Sync {
    fn classify(&self, window: &ContextWindow<'_>) -> Result<LabelDistribution>;

    /// Score a batch of windows, one distribution per window in order
    fn classify_batch(&self, windows: &[ContextWindow<'_>]) -> Result<Vec<LabelDistribution>> {
        windows.iter().map(|w| self.classify(w)).collect()
    }
}

impl<C: LineClassifier + ?Sized> LineClassifier for &C {
    fn classify(&self, window: &ContextWindow<'_>) -> Result<LabelDistribution> {
        (**self).classify(window)
    }

    fn classify_batch(&self, windows: &[ContextWindow<'_>]) -> Result<Vec<LabelDistribution>> {
        (**self).classify_batch(windows)
    }
}

/// Replays fixed distributions keyed by the centre line's text
///
/// Lines without an entry get the fallback distribution; pad lines
/// always score `<pad>`.
#[derive(Debug, Clone)]
pub struct LookupClassifier {
    table: HashMap<String, LabelDistribution>,
    fallback: LabelDistribution,
}

impl LookupClassifier {
    #[must_use]
    pub fn new(fallback: LabelDistribution) -> Self {
        Self {
            table: HashMap::new(),
            fallback,
        }
    }

    /// Register a distribution for lines whose text (without terminator) is `line`
    #[must_use]
    pub fn with(mut self, line: &str, distribution: LabelDistribution) -> Self {
        self.table
            .insert(line.trim_end_matches('\n').to_string(), distribution);
        self
    }

    /// Register a one-hot entry
    #[must_use]
    pub fn with_label(self, line: &str, label: Label) -> Self {
        self.with(line, LabelDistribution::one_hot(label))
    }
}

impl LineClassifier for LookupClassifier {
    fn classify(&self, window: &ContextWindow<'_>) -> Result<LabelDistribution> {
        let Some(center) = window.center() else {
            return Ok(LabelDistribution::one_hot(Label::Pad));
        };
        Ok(self
            .table
            .get(center.trim_end_matches('\n'))
            .unwrap_or(&self.fallback)
            .clone())
    }
}

// Cue patterns, tested against the trimmed line
static QUOTE_MARKER_REGEX: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| {
    Regex::new(r"(?i)^(on .{0,120}wrote:?|.{0,80}(wrote|writes|schrieb|a écrit):|-+\s*original message\s*-+)$")
        .unwrap()
});

static INLINE_HEADER_REGEX: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| {
    Regex::new(r"^(From|To|Cc|Bcc|Subject|Date|Sent|Reply-To|Newsgroups|Message-ID):\s").unwrap()
});

static SALUTATION_REGEX: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| {
    Regex::new(r"(?i)^(hi|hello|hey|dear|greetings|good (morning|afternoon|evening))\b.{0,40}[,!:]?$")
        .unwrap()
});

static CLOSING_REGEX: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| {
    Regex::new(
        r"(?i)^(best( regards| wishes)?|kind regards|regards|cheers|thanks( again| a lot)?|thank you|sincerely( yours)?|yours( truly)?|greetings)[,.!]?$",
    )
    .unwrap()
});

static SEPARATOR_REGEX: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"^[-=_*#~+.]{4,}$").unwrap());

static PATCH_REGEX: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| {
    Regex::new(r"^(diff (--git|-u)|index [0-9a-f]{7,}|\+\+\+ |--- \S|@@ -\d+)").unwrap()
});

static LOG_REGEX: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| {
    Regex::new(r"^(\[?\d{4}-\d{2}-\d{2}[ T]\d{2}:\d{2}|\[\s*\d+\.\d+\]|\w{3} [ \d]\d \d{2}:\d{2}:\d{2} )")
        .unwrap()
});

static CODE_REGEX: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| {
    Regex::new(r"(^(#include|import |from \S+ import|def |fn |class |public |private |static |return\b)|[;{}]$)")
        .unwrap()
});

static MUA_REGEX: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| {
    Regex::new(r"(?i)(^sent from my |^get outlook for |mailing list$|^to unsubscribe|https?://\S*/(mailman|listinfo)/)")
        .unwrap()
});

static TABULAR_REGEX: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"\S+(\s{2,}|\t)\S+(\s{2,}|\t)\S+").unwrap());

static TECHNICAL_REGEX: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| {
    Regex::new(r"(0x[0-9a-fA-F]+|/[\w.-]+/[\w./-]+|\w+\(\)|[A-Z_]{3,}=\S+|v?\d+\.\d+\.\d+)").unwrap()
});

/// Regex-cue baseline used when no trained model is available
///
/// Looks at the centre line and its immediate predecessor. It is a
/// stand-in for the external sequence model, not a substitute for it.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicClassifier;

impl HeuristicClassifier {
    fn primary(line: &str, previous: Option<&str>) -> (Label, Label) {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            return (Label::Empty, Label::Paragraph);
        }
        if trimmed == "--" || line.trim_end_matches(['\n', '\r']) == "-- " {
            return (Label::PersonalSignature, Label::VisualSeparator);
        }
        if trimmed.starts_with('>') || trimmed.starts_with('|') {
            return (Label::Quotation, Label::Paragraph);
        }
        if QUOTE_MARKER_REGEX.is_match(trimmed) {
            return (Label::QuotationMarker, Label::Quotation);
        }
        if INLINE_HEADER_REGEX.is_match(trimmed) {
            return (Label::InlineHeaders, Label::QuotationMarker);
        }
        if PATCH_REGEX.is_match(trimmed) {
            return (Label::Patch, Label::RawCode);
        }
        if LOG_REGEX.is_match(trimmed) {
            return (Label::LogData, Label::Technical);
        }
        if MUA_REGEX.is_match(trimmed) {
            return (Label::MuaSignature, Label::PersonalSignature);
        }
        if SEPARATOR_REGEX.is_match(trimmed) {
            return (Label::VisualSeparator, Label::PersonalSignature);
        }
        if previous.is_some_and(|p| p.trim() == "--" || p.starts_with("-- ")) {
            return (Label::PersonalSignature, Label::Paragraph);
        }
        if CLOSING_REGEX.is_match(trimmed) {
            return (Label::Closing, Label::Paragraph);
        }
        if SALUTATION_REGEX.is_match(trimmed) {
            return (Label::Salutation, Label::Paragraph);
        }
        if CODE_REGEX.is_match(trimmed) {
            return (Label::RawCode, Label::Technical);
        }
        if TABULAR_REGEX.is_match(trimmed) {
            return (Label::Tabular, Label::Technical);
        }
        if TECHNICAL_REGEX.is_match(trimmed) && !has_prose(trimmed) {
            return (Label::Technical, Label::Paragraph);
        }
        if trimmed.ends_with(':') && trimmed.split_whitespace().count() <= 6 {
            return (Label::SectionHeading, Label::Paragraph);
        }

        (Label::Paragraph, Label::Closing)
    }
}

/// Rough check for running text: mostly alphabetic words
fn has_prose(text: &str) -> bool {
    let words: Vec<&str> = text.split_whitespace().collect();
    let alpha = words
        .iter()
        .filter(|w| w.chars().all(|c| c.is_alphabetic() || ",.;:!?'\"".contains(c)))
        .count();
    words.len() >= 4 && alpha * 3 >= words.len() * 2
}

impl LineClassifier for HeuristicClassifier {
    fn classify(&self, window: &ContextWindow<'_>) -> Result<LabelDistribution> {
        let Some(center) = window.center() else {
            return Ok(LabelDistribution::one_hot(Label::Pad));
        };
        let (best, second) = Self::primary(center, window.neighbor(-1));

        let mut pairs = vec![(best, 0.7), (second, 0.2)];
        if best != Label::Paragraph && second != Label::Paragraph {
            pairs.push((Label::Paragraph, 0.05));
        }
        Ok(LabelDistribution::from_scores(&pairs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::assemble;
    use crate::document::Line;

    fn classify_line(previous: &str, line: &str) -> Label {
        let lines = vec![
            Line::Text(previous.to_string()),
            Line::Text(line.to_string()),
        ];
        let windows = assemble(&lines, 1..2, 1);
        HeuristicClassifier.classify(&windows[0]).unwrap().argmax()
    }

    #[test]
    fn test_heuristic_cues() {
        let cases = [
            ("> quoted\n", Label::Quotation),
            ("On Mon, Jan 1, 2024, Alice wrote:\n", Label::QuotationMarker),
            ("Subject: Re: hello\n", Label::InlineHeaders),
            ("Best regards,\n", Label::Closing),
            ("Hi Bob,\n", Label::Salutation),
            ("diff --git a/x b/x\n", Label::Patch),
            ("==========\n", Label::VisualSeparator),
            ("\n", Label::Empty),
            ("This is an ordinary sentence of text.\n", Label::Paragraph),
        ];
        for (line, expected) in cases {
            assert_eq!(classify_line("\n", line), expected, "{line:?}");
        }
    }

    #[test]
    fn test_signature_after_delimiter() {
        assert_eq!(classify_line("-- \n", "Jane Doe\n"), Label::PersonalSignature);
    }
}
