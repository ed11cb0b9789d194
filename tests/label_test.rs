use mail_segment::{Label, LabelDistribution, SegmentError};

// --- Label ---

#[test]
fn test_rank_follows_schema_order() {
    for (rank, label) in Label::ALL.iter().enumerate() {
        assert_eq!(label.rank(), rank);
        assert_eq!(Label::from_rank(rank), Some(*label));
    }
    assert_eq!(Label::from_rank(Label::COUNT), None);
    assert_eq!(Label::Paragraph.rank(), 0);
    assert_eq!(Label::Pad.rank(), 16);
}

#[test]
fn test_names_parse_and_display() {
    assert_eq!("quotation_marker".parse::<Label>().unwrap(), Label::QuotationMarker);
    assert_eq!("<empty>".parse::<Label>().unwrap(), Label::Empty);
    assert_eq!(Label::InlineHeaders.to_string(), "inline_headers");
    assert!(matches!(
        "code".parse::<Label>(),
        Err(SegmentError::InvalidLabel(name)) if name == "code"
    ));
}

#[test]
fn test_serde_uses_schema_names() {
    assert_eq!(serde_json::to_string(&Label::Pad).unwrap(), "\"<pad>\"");
    assert_eq!(
        serde_json::from_str::<Label>("\"visual_separator\"").unwrap(),
        Label::VisualSeparator
    );
    for label in Label::ALL {
        let json = serde_json::to_string(&label).unwrap();
        assert_eq!(json, format!("\"{}\"", label.as_str()));
    }
}

#[test]
fn test_only_empty_and_pad_are_sentinels() {
    let sentinels: Vec<Label> = Label::ALL
        .into_iter()
        .filter(|l| l.is_sentinel())
        .collect();
    assert_eq!(sentinels, [Label::Empty, Label::Pad]);
}

// --- LabelDistribution ---

#[test]
fn test_wrong_length_is_rejected() {
    assert!(matches!(
        LabelDistribution::new(vec![0.5; 3]),
        Err(SegmentError::DistributionShape {
            expected: 17,
            actual: 3,
            ..
        })
    ));
}

#[test]
fn test_deserialized_scores_are_checked() {
    assert!(serde_json::from_str::<LabelDistribution>("[0.5, 0.5]").is_err());

    let json = serde_json::to_string(&LabelDistribution::one_hot(Label::Tabular)).unwrap();
    let dist: LabelDistribution = serde_json::from_str(&json).unwrap();
    assert_eq!(dist.argmax(), Label::Tabular);
}

#[test]
fn test_ranking_and_top_k() {
    let dist = LabelDistribution::from_scores(&[
        (Label::Quotation, 0.6),
        (Label::QuotationMarker, 0.3),
        (Label::Paragraph, 0.1),
    ]);

    assert_eq!(dist.argmax(), Label::Quotation);
    assert_eq!(
        dist.ranked()[..3],
        [Label::Quotation, Label::QuotationMarker, Label::Paragraph]
    );
    assert!(dist.in_top(Label::QuotationMarker, 2));
    assert!(!dist.in_top(Label::Paragraph, 2));
    assert!((dist.score(Label::QuotationMarker) - 0.3).abs() < f32::EPSILON);
}

#[test]
fn test_scores_need_not_sum_to_one() {
    let mut scores = vec![-2.0; Label::COUNT];
    scores[Label::Patch.rank()] = 4.5;
    scores[Label::RawCode.rank()] = 3.0;
    let dist = LabelDistribution::new(scores).unwrap();

    assert_eq!(dist.argmax(), Label::Patch);
    assert_eq!(dist.ranked()[1], Label::RawCode);
}

#[test]
fn test_one_hot() {
    let dist = LabelDistribution::one_hot(Label::Closing);
    assert_eq!(dist.argmax(), Label::Closing);
    assert_eq!(dist.scores().iter().filter(|s| **s > 0.0).count(), 1);
}
