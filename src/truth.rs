//! Ground-truth line labels derived from span annotations
//!
//! Annotated input carries character spans over the message text; the
//! classifier is trained and validated on one label per line.

use crate::document::{LabeledLine, Span, split_lines};
use crate::error::Result;
use crate::label::Label;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A labelled character range over a message text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub start_offset: usize,
    pub end_offset: usize,
    pub label: Label,
}

/// Object-style and triple-style annotations are both accepted
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum AnnotationInput {
    Object(Annotation),
    Triple(Span),
}

impl From<AnnotationInput> for Annotation {
    fn from(input: AnnotationInput) -> Self {
        match input {
            AnnotationInput::Object(a) => a,
            AnnotationInput::Triple(span) => Self {
                start_offset: span.start_offset,
                end_offset: span.end_offset,
                label: span.label,
            },
        }
    }
}

/// Label each line of `text` from its annotations
///
/// A line takes the label of the current annotation when their character
/// ranges overlap and `<empty>` otherwise. Blank lines are always
/// `<empty>`. Annotations are visited in start order and retired once
/// the running offset reaches their end.
#[must_use]
pub fn label_lines(text: &str, annotations: &[Annotation]) -> Vec<LabeledLine> {
    let mut pending: Vec<&Annotation> = annotations.iter().collect();
    pending.sort_by(|a, b| b.start_offset.cmp(&a.start_offset));

    let mut offset = 0;
    let mut labeled = Vec::new();
    for line in split_lines(text) {
        let end = offset + line.chars().count();

        while pending.last().is_some_and(|a| offset >= a.end_offset) {
            pending.pop();
        }

        let label = match pending.last() {
            Some(a) if !line.trim().is_empty() && offset < a.end_offset && end > a.start_offset => {
                a.label
            }
            _ => Label::Empty,
        };

        labeled.push(LabeledLine::new(line, label));
        offset = end;
    }
    labeled
}

/// Label an annotated JSON document
///
/// Reads `text` plus `annotations` (or `labels`). Returns `None` when the
/// document has no annotations.
pub fn label_document(object: &Map<String, Value>) -> Result<Option<Vec<LabeledLine>>> {
    let text = object.get("text").and_then(Value::as_str).unwrap_or_default();
    let Some(raw) = object
        .get("annotations")
        .or_else(|| object.get("labels"))
        .filter(|v| v.as_array().is_some_and(|a| !a.is_empty()))
    else {
        return Ok(None);
    };

    let inputs: Vec<AnnotationInput> = serde_json::from_value(raw.clone())?;
    let annotations: Vec<Annotation> = inputs.into_iter().map(Annotation::from).collect();
    Ok(Some(label_lines(text, &annotations)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passed_annotations_are_retired() {
        let text = "Hi\nbody\n\nBye";
        let annotations = [
            Annotation {
                start_offset: 0,
                end_offset: 2,
                label: Label::Salutation,
            },
            Annotation {
                start_offset: 3,
                end_offset: 7,
                label: Label::Paragraph,
            },
            Annotation {
                start_offset: 9,
                end_offset: 12,
                label: Label::Closing,
            },
        ];

        let labels: Vec<Label> = label_lines(text, &annotations)
            .into_iter()
            .map(|l| l.label)
            .collect();
        assert_eq!(
            labels,
            [Label::Salutation, Label::Paragraph, Label::Empty, Label::Closing]
        );
    }
}
