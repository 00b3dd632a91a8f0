//! QR form reconciliation end to end against the estimating renderer

mod common;

use common::{article_label, bounds_of, inside, normalize, overlaps};
use labelkit_layout::{
    Item, ItemKind, NormalizeOptions, PatternKind, PreviewSize, QrItem, Reason,
};

const TEXT_IDS: [&str; 6] = ["h1", "v1", "h2", "v2", "h3", "v3"];

fn qr_size(items: &[Item]) -> f64 {
    items
        .iter()
        .find_map(|item| match &item.kind {
            ItemKind::Qr(QrItem { size, .. }) => Some(*size),
            _ => None,
        })
        .expect("label keeps its QR code")
}

#[test]
fn test_article_label_settles_into_rows_beside_qr() {
    let preview = PreviewSize::new(480.0, 128.0);
    let mut items = article_label();
    let (result, _) = normalize(&mut items, preview, NormalizeOptions::force_rebuild());

    assert_eq!(result.pattern, Some(PatternKind::QrForm), "{result:?}");
    assert_eq!(result.reason, Reason::AppliedQrFormFidelity);
    assert!(result.placement_resolved);
    assert!(result.did_mutate);
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);

    let qr = bounds_of(&items, "qr");
    assert!(inside(&qr, preview));
    let mut previous_y = f64::NEG_INFINITY;
    for id in TEXT_IDS {
        let text = bounds_of(&items, id);
        assert!(inside(&text, preview), "{id} leaves the canvas: {text:?}");
        assert!(!overlaps(&text, &qr), "{id} overlaps the QR code");
        assert!(text.right() <= qr.x, "{id} is not left of the QR code");
        assert!(text.y > previous_y, "{id} is out of row order");
        previous_y = text.y;
    }
    for pair in TEXT_IDS.windows(2) {
        let upper = bounds_of(&items, pair[0]);
        let lower = bounds_of(&items, pair[1]);
        assert!(!overlaps(&upper, &lower), "{pair:?} overlap");
        assert!(lower.y - upper.bottom() >= 2.0 - 0.5, "{pair:?} too close");
    }
    let widest = TEXT_IDS
        .iter()
        .map(|id| bounds_of(&items, id).right())
        .fold(0.0, f64::max);
    assert!(qr.x >= widest + 2.0, "qr at {} next to text ending at {widest}", qr.x);

    for (id, underlined) in [("h1", true), ("v1", false), ("h2", true), ("v2", false)] {
        let text = items
            .iter()
            .find(|item| item.id == id)
            .and_then(Item::as_text)
            .expect("text row survives");
        assert_eq!(text.underline, underlined, "{id}");
    }
}

#[test]
fn test_second_run_is_stable() {
    let preview = PreviewSize::new(480.0, 128.0);
    let mut items = article_label();
    normalize(&mut items, preview, NormalizeOptions::force_rebuild());
    let settled = items.clone();

    let (again, _) = normalize(&mut items, preview, NormalizeOptions::force_rebuild());
    assert!(!again.did_mutate, "{again:?}");
    assert_eq!(again.reason, Reason::QrFormNoChange);
    assert_eq!(items, settled);
}

#[test]
fn test_narrow_canvas_shrinks_qr_instead_of_text() {
    let preview = PreviewSize::new(280.0, 128.0);
    let mut items: Vec<Item> = article_label().into_iter().take(4).collect();
    items.push(Item::qr("qr", "18123689", 150.0).at(120, 0));
    let (result, _) = normalize(&mut items, preview, NormalizeOptions::force_rebuild());

    assert_eq!(result.pattern, Some(PatternKind::QrForm), "{result:?}");
    let size = qr_size(&items);
    assert!((40.0..150.0).contains(&size), "qr size {size}");
    let qr = bounds_of(&items, "qr");
    assert!(inside(&qr, preview), "{qr:?}");
    for id in &TEXT_IDS[..4] {
        let text = bounds_of(&items, id);
        assert!(!overlaps(&text, &qr), "{id} overlaps the QR code");
        assert!(inside(&text, preview), "{id} leaves the canvas");
        assert_eq!(items.iter().find(|item| item.id == *id).and_then(Item::font_size), Some(14.0));
    }
}
