use mail_segment::{
    Document, Label, LabelDistribution, Line, LookupClassifier, Segmenter, SegmenterConfig,
    Windower, assemble,
};
use proptest::prelude::*;
use serde_json::{Map, Value, json};

fn doc(lines: usize) -> Document {
    Document::new(vec!["x\n".to_string(); lines], Map::new())
}

fn tagged(text: &str, n: u64) -> Document {
    let mut metadata = Map::new();
    metadata.insert("text".into(), Value::String(text.into()));
    metadata.insert("n".into(), json!(n));
    Document::from_json(metadata)
}

// --- Windower ---

proptest! {
    #[test]
    fn test_every_document_is_wrapped_in_context_pads(
        lengths in prop::collection::vec(1usize..40, 1..8),
        context in 1usize..6,
    ) {
        let stream = Windower::new(context, 5000).window(lengths.iter().map(|n| doc(*n)));

        let expected: usize = lengths.iter().map(|n| n + 2 * context).sum();
        prop_assert_eq!(stream.len(), expected);

        let ranges = stream.document_ranges();
        prop_assert_eq!(ranges.len(), lengths.len());
        for (index, range) in ranges {
            prop_assert_eq!(range.len(), lengths[index]);
            prop_assert!(stream.lines()[range.clone()].iter().all(|l| !l.is_pad()));
            prop_assert!(stream.lines()[range.start - context..range.start].iter().all(Line::is_pad));
            prop_assert!(stream.lines()[range.end..range.end + context].iter().all(Line::is_pad));
            prop_assert_eq!(stream.document_starting_at(range.start), Some(index));
            prop_assert_eq!(stream.document_ending_at(range.end), Some(index));
        }
    }
}

#[test]
fn test_oversized_document_is_dropped() {
    let stream = Windower::default().window([doc(6000), doc(3)]);

    assert_eq!(stream.dropped(), 1);
    assert_eq!(stream.documents().len(), 1);
    assert_eq!(stream.len(), 3 + 2 * 4);
}

#[test]
fn test_empty_document_contributes_nothing() {
    let stream = Windower::default().window([doc(0), doc(2)]);

    assert_eq!(stream.dropped(), 0);
    assert_eq!(stream.documents().len(), 1);
    assert_eq!(stream.document_starting_at(4), Some(0));
}

#[test]
fn test_oversized_document_yields_no_record() {
    let classifier = LookupClassifier::new(LabelDistribution::one_hot(Label::Paragraph));
    let segmenter = Segmenter::new(&classifier, SegmenterConfig::default()).unwrap();

    let big = "line\n".repeat(6000);
    let output = segmenter.segment_batch(vec![tagged(&big, 0)]).unwrap();
    assert!(output.records.is_empty());
    assert_eq!(output.dropped, 1);

    let output = segmenter
        .segment_batch(vec![tagged(&big, 0), tagged("short\n", 1)])
        .unwrap();
    assert_eq!(output.records.len(), 1);
    assert_eq!(output.records[0].metadata["n"], json!(1));
}

#[test]
fn test_raw_text_is_exempt_from_ceiling() {
    let classifier = LookupClassifier::new(LabelDistribution::one_hot(Label::Paragraph));
    let segmenter = Segmenter::new(&classifier, SegmenterConfig::default()).unwrap();

    let lines = segmenter.segment_text(&"line\n".repeat(6000)).unwrap();
    assert_eq!(lines.len(), 6001);
}

// --- Context windows ---

#[test]
fn test_windows_never_cross_document_boundaries() {
    let stream = Windower::new(2, 100).window([
        Document::from_text("a1\na2", Map::new()),
        Document::from_text("b1", Map::new()),
    ]);
    let windows = assemble(stream.lines(), 0..stream.len(), 2);

    let b1 = windows
        .iter()
        .find(|w| w.center() == Some("b1\n"))
        .unwrap();
    assert!(b1.slots().iter().filter(|s| s.is_some()).count() == 1);

    let a2 = windows
        .iter()
        .find(|w| w.center() == Some("a2\n"))
        .unwrap();
    assert_eq!(a2.slots(), &[None, Some("a1\n"), Some("a2\n"), None, None]);
}

#[test]
fn test_batch_size_does_not_change_output() {
    let classifier = LookupClassifier::new(LabelDistribution::one_hot(Label::Paragraph))
        .with_label("Jane Doe", Label::PersonalSignature)
        .with_label("phone 555", Label::PersonalSignature)
        .with_label("> quoted", Label::Quotation);
    let documents: Vec<Document> = (0..6)
        .map(|n| tagged("Hi\n\n> quoted\nbody\n\nJane Doe\nACME\nphone 555\n", n))
        .collect();

    let outputs: Vec<_> = [1, 7, 256]
        .into_iter()
        .map(|batch_size| {
            let config = SegmenterConfig {
                batch_size,
                ..SegmenterConfig::default()
            };
            Segmenter::new(&classifier, config)
                .unwrap()
                .segment_batch(documents.clone())
                .unwrap()
                .records
        })
        .collect();

    assert_eq!(outputs[0], outputs[1]);
    assert_eq!(outputs[1], outputs[2]);
}
