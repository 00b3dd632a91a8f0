//! Properties every normalization run must hold regardless of pattern

mod common;

use common::{bounds_of, inside, normalize, normalize_with, overlaps, runtime, BlankHost};
use labelkit_layout::{
    Item, LabelDocument, LayoutSolver, LayoutWarning, NormalizeOptions, PreviewSize,
    Reason, ShapeType, SolverConfigBuilder,
};
use proptest::prelude::*;

#[test]
fn test_missing_bounds_leaves_items_untouched() {
    let mut items = vec![
        Item::text("a", "Lagerplatz", 14.0).at(10, 10),
        Item::text("b", "R1-S5-F3", 14.0).at(12, 12),
    ];
    let original = items.clone();
    let mut host = BlankHost::default();
    let solver = LayoutSolver::new();
    let result = runtime().block_on(solver.normalize(
        &mut items,
        &mut host,
        NormalizeOptions::force_rebuild(),
    ));

    assert_eq!(result.reason, Reason::MissingBounds);
    assert!(!result.applied);
    assert!(!result.did_mutate);
    assert_eq!(result.confidence, 0.0);
    assert_eq!(result.warnings, vec![LayoutWarning::BoundsUnavailable]);
    assert_eq!(host.warnings, vec![LayoutWarning::BoundsUnavailable]);
    assert_eq!(host.remeasures, solver.config().bounds_retries);
    assert_eq!(items, original);
}

#[test]
fn test_marker_sits_left_of_option_text() {
    let preview = PreviewSize::new(300.0, 120.0);
    let mut items = vec![
        Item::text("q", "Einverstanden?", 16.0).at(20, 10),
        Item::shape("box", ShapeType::Rect, 16.0, 16.0).at(60, 40),
        Item::text("yes", "Ja", 14.0).at(50, 40),
    ];
    let (result, _) = normalize(&mut items, preview, NormalizeOptions::force_rebuild());
    assert!(result.applied, "{result:?}");

    let marker = items
        .iter()
        .find(|item| item.as_shape().is_some_and(|shape| shape.shape_type == ShapeType::Rect))
        .map(|item| bounds_of(&items, &item.id))
        .expect("marker shape survives");
    let option = items
        .iter()
        .filter(|item| item.as_text().is_some_and(|text| text.text.trim() == "Ja"))
        .map(|item| bounds_of(&items, &item.id))
        .next()
        .expect("option text survives");
    assert!(marker.x >= 11.0 - 0.5, "{marker:?}");
    assert!(marker.right() + 4.0 <= option.x + 0.5, "{marker:?} {option:?}");
    assert!(!overlaps(&marker, &option));
}

#[test]
fn test_crowded_layout_converges_or_says_so() {
    let preview = PreviewSize::new(160.0, 60.0);
    let mut items: Vec<Item> = (0..6)
        .map(|n| Item::text(format!("t{n}"), "Palette", 14.0).at(4 + n, 4 + n))
        .collect();
    let (result, _) = normalize(&mut items, preview, NormalizeOptions::force_rebuild());

    let all: Vec<_> = items.iter().map(|item| bounds_of(&items, &item.id)).collect();
    let clear = all
        .iter()
        .enumerate()
        .all(|(i, a)| all[i + 1..].iter().all(|b| !overlaps(a, b)));
    if result.placement_resolved {
        assert!(clear, "resolved run left overlaps: {all:?}");
    } else {
        assert_eq!(result.reason, Reason::PlacementIterationCap);
        assert!(result.confidence < 0.55);
        assert!(result.warnings.contains(&LayoutWarning::LowConfidence));
    }
    assert!(result.iterations <= 5);
}

#[test]
fn test_wedged_overlap_stops_without_spinning() {
    let preview = PreviewSize::new(100.0, 48.0);
    let mut items = vec![
        Item::text("a", "Palette", 24.0).at(0, 0),
        Item::text("b", "Palette", 24.0).at(4, 10),
    ];
    let original = items.clone();
    let (result, _) = normalize(&mut items, preview, NormalizeOptions::force_rebuild());

    assert_eq!(result.iterations, 1, "{result:?}");
    assert!(!result.placement_resolved);
    assert!(!result.did_mutate);
    assert_eq!(result.reason, Reason::PlacementIterationCap);
    assert!(result.warnings.contains(&LayoutWarning::LowConfidence));
    assert_eq!(items, original);
}

#[test]
fn test_strict_preset_keeps_ids_and_texts() {
    let preview = PreviewSize::new(300.0, 120.0);
    let mut items = vec![Item::text("t", "Einverstanden?\n☐ Ja", 16.0).at(20, 10)];
    let solver = LayoutSolver::with_config(
        SolverConfigBuilder::strict()
            .build()
            .expect("strict preset is valid"),
    );
    let (result, _) =
        normalize_with(&solver, &mut items, preview, NormalizeOptions::force_rebuild());

    assert_ne!(result.reason, Reason::RewroteMarkerGroup);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "t");
    assert_eq!(
        items[0].as_text().map(|text| text.text.as_str()),
        Some("Einverstanden?\n☐ Ja")
    );
}

#[test]
fn test_document_round_trip_after_normalize() {
    let json = r#"{
        "previewSize": {"width": 240, "height": 100},
        "items": [
            {"id": "a", "positionMode": "absolute", "xOffset": 230, "yOffset": 5,
             "type": "text", "text": "Kommission", "fontSize": 14},
            {"id": "q", "positionMode": "absolute", "xOffset": 5, "yOffset": 5,
             "type": "qr", "data": "K-1", "size": 40}
        ]
    }"#;
    let mut document = LabelDocument::from_json(json).expect("fixture parses");
    let (result, _) = normalize(
        &mut document.items,
        document.preview_size,
        NormalizeOptions::default(),
    );
    assert!(result.did_mutate, "{result:?}");
    let text = bounds_of(&document.items, "a");
    assert!(inside(&text, document.preview_size), "{text:?}");

    let reparsed = LabelDocument::from_json(&document.to_json_pretty().expect("serializes"))
        .expect("output parses");
    assert_eq!(reparsed, document);
}

fn word() -> impl Strategy<Value = String> {
    "[a-z]{1,8}"
}

fn loose_text() -> impl Strategy<Value = (String, f64, i32, i32)> {
    (word(), 8.0..16.0f64, -40..260i32, -30..140i32)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_items_end_inside_canvas(texts in prop::collection::vec(loose_text(), 1..6)) {
        let preview = PreviewSize::new(240.0, 120.0);
        let mut items: Vec<Item> = texts
            .iter()
            .enumerate()
            .map(|(n, (text, font, x, y))| Item::text(format!("t{n}"), text.as_str(), font.round()).at(*x, *y))
            .collect();
        let (result, _) = normalize(&mut items, preview, NormalizeOptions::force_rebuild());

        prop_assert!((0.0..=1.0).contains(&result.confidence));
        prop_assert!(result.iterations <= 5);
        for item in &items {
            let bounds = bounds_of(&items, &item.id);
            prop_assert!(inside(&bounds, preview), "{} at {:?}", item.id, bounds);
        }
    }

    #[test]
    fn prop_settled_layout_is_a_fixed_point(texts in prop::collection::vec(loose_text(), 1..4)) {
        let preview = PreviewSize::new(240.0, 120.0);
        let mut items: Vec<Item> = texts
            .iter()
            .enumerate()
            .map(|(n, (text, font, x, y))| Item::text(format!("t{n}"), text.as_str(), font.round()).at(*x, *y))
            .collect();
        let (first, _) = normalize(&mut items, preview, NormalizeOptions::force_rebuild());
        prop_assume!(first.placement_resolved);
        let settled = items.clone();

        let (again, _) = normalize(&mut items, preview, NormalizeOptions::force_rebuild());
        prop_assert!(!again.did_mutate, "{:?}", again);
        prop_assert_eq!(items, settled);
    }
}
