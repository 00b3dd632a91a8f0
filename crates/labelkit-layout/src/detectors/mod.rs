//! Role detectors
//!
//! Each detector is a pure probe over the current items and a bounds snapshot.
//! It returns [`Detection::Matched`] with concrete item ids for the pattern's
//! semantic slots, or [`Detection::Skipped`] with the first failing check.
//! Detectors never mutate; the rewriter and fidelity passes act on their roles.
//!
//! Shared evidence (marker shapes and glyph lines) is collected once per
//! solver run in [`MarkerEvidence`] because several detectors refuse to match
//! when checkbox markers are present.
//!
//! [`Detection::Matched`]: crate::reason::Detection::Matched
//! [`Detection::Skipped`]: crate::reason::Detection::Skipped

pub mod barcode_photo;
pub mod boxed_barcode;
pub mod marker_group;
pub mod qr_form;

pub use barcode_photo::{BarcodePhotoConfig, BarcodePhotoDetector, BarcodePhotoRoles};
pub use boxed_barcode::{BoxedBarcodeConfig, BoxedBarcodeDetector, BoxedBarcodeRoles};
pub use marker_group::{MarkerEvidenceKind, MarkerGroupConfig, MarkerGroupDetector, MarkerGroupRoles};
pub use qr_form::{QrFormConfig, QrFormDetector, QrFormRoles};

use crate::bounds::BoundsIndex;
use crate::text_lines::has_leading_marker;
use crate::types::{Bounds, Item, ShapeType};
use serde::{Deserialize, Serialize};

/// Largest side of a shape that can stand in for a checkbox (dots)
pub const MARKER_SHAPE_MAX_SIDE: f64 = 36.0;

/// Largest long/short side ratio of a checkbox shape
pub const MARKER_SHAPE_MAX_ASPECT: f64 = 1.65;

/// True for small near-square rectangles used as checkbox substitutes
#[must_use]
pub fn is_marker_shape(item: &Item) -> bool {
    let Some(shape) = item.as_shape() else {
        return false;
    };
    if !matches!(shape.shape_type, ShapeType::Rect | ShapeType::RoundRect) {
        return false;
    }
    let (long, short) = if shape.width >= shape.height {
        (shape.width, shape.height)
    } else {
        (shape.height, shape.width)
    };
    short > 0.0 && long <= MARKER_SHAPE_MAX_SIDE && long / short <= MARKER_SHAPE_MAX_ASPECT
}

/// Checkbox evidence present on the label
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerEvidence {
    /// Ids of marker shapes in item order
    pub shape_ids: Vec<String>,
    /// Ids of text items containing at least one glyph line, in item order
    pub glyph_item_ids: Vec<String>,
    /// Number of glyph lines over all text items
    pub glyph_lines: usize,
}

impl MarkerEvidence {
    /// Scan items for marker shapes and glyph-prefixed lines
    #[must_use]
    pub fn collect(items: &[Item]) -> Self {
        let mut evidence = Self::default();
        for item in items {
            if is_marker_shape(item) {
                evidence.shape_ids.push(item.id.clone());
            } else if let Some(text) = item.as_text() {
                let glyphs = text
                    .text
                    .split('\n')
                    .filter(|line| !line.trim().is_empty() && has_leading_marker(line))
                    .count();
                if glyphs > 0 {
                    evidence.glyph_item_ids.push(item.id.clone());
                    evidence.glyph_lines += glyphs;
                }
            }
        }
        evidence
    }

    #[inline]
    #[must_use]
    pub fn has_any(&self) -> bool {
        !self.shape_ids.is_empty() || self.glyph_lines > 0
    }

    #[inline]
    #[must_use]
    pub fn has_glyph(&self) -> bool {
        self.glyph_lines > 0
    }
}

/// Items sorted top-to-bottom then left-to-right by measured bounds
///
/// Items without bounds sort by their offsets. Ties keep item order.
#[must_use]
pub fn reading_order<'a>(items: impl IntoIterator<Item = &'a Item>, index: &BoundsIndex) -> Vec<&'a Item> {
    let mut ordered: Vec<(&Item, Bounds)> = items
        .into_iter()
        .map(|item| (item, bounds_or_offsets(item, index)))
        .collect();
    ordered.sort_by(|(_, a), (_, b)| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));
    ordered.into_iter().map(|(item, _)| item).collect()
}

/// Cached bounds, falling back to a unit box at the item offsets
#[must_use]
pub fn bounds_or_offsets(item: &Item, index: &BoundsIndex) -> Bounds {
    index.get(&item.id).unwrap_or_else(|| {
        Bounds::new(f64::from(item.x_offset), f64::from(item.y_offset), 1.0, 1.0)
    })
}

/// Lowercase with all whitespace removed, used for duplicate-text checks
#[must_use]
pub fn normalize_code_text(text: &str) -> String {
    text.chars()
        .filter(|ch| !ch.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_shape_classification() {
        assert!(is_marker_shape(&Item::shape("m", ShapeType::Rect, 20.0, 20.0)));
        assert!(is_marker_shape(&Item::shape("m", ShapeType::RoundRect, 30.0, 20.0)));
        assert!(!is_marker_shape(&Item::shape("m", ShapeType::Rect, 40.0, 30.0)));
        assert!(!is_marker_shape(&Item::shape("m", ShapeType::Rect, 34.0, 20.0)));
        assert!(!is_marker_shape(&Item::shape("m", ShapeType::Oval, 20.0, 20.0)));
        assert!(!is_marker_shape(&Item::shape("m", ShapeType::Rect, 20.0, 0.0)));
        assert!(!is_marker_shape(&Item::text("m", "☐", 20.0)));
    }

    #[test]
    fn test_marker_evidence_counts_glyph_lines() {
        let items = vec![
            Item::text("a", "Heading\n☐ Yes\n☐ No", 12.0),
            Item::text("b", "plain", 12.0),
            Item::shape("box", ShapeType::Rect, 16.0, 16.0),
        ];
        let evidence = MarkerEvidence::collect(&items);
        assert_eq!(evidence.glyph_lines, 2);
        assert_eq!(evidence.glyph_item_ids, vec!["a".to_string()]);
        assert_eq!(evidence.shape_ids, vec!["box".to_string()]);
        assert!(evidence.has_any());
        assert!(evidence.has_glyph());
    }

    #[test]
    fn test_reading_order_sorts_by_y_then_x() {
        let items = vec![
            Item::text("c", "c", 10.0).at(50, 40),
            Item::text("b", "b", 10.0).at(60, 10),
            Item::text("a", "a", 10.0).at(5, 10),
        ];
        let mut index = BoundsIndex::new();
        for item in &items {
            index.insert(
                &item.id,
                Bounds::new(f64::from(item.x_offset), f64::from(item.y_offset), 10.0, 10.0),
            );
        }
        let ids: Vec<&str> = reading_order(&items, &index)
            .iter()
            .map(|item| item.id.as_str())
            .collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn test_normalize_code_text() {
        assert_eq!(normalize_code_text(" AB 12\tcd "), "ab12cd");
    }
}
