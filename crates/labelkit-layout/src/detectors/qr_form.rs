/// QR-form detector
///
/// Matches a column of heading/value rows with one QR code on the right, the
/// usual layout of shelf and inventory labels (`Artikelname:` over its value,
/// `Lagerplatz:` over its value, QR beside them).
///
/// Rows are formed by grouping text items whose vertical centers are closer
/// than half the smaller item height; rows are sorted top-to-bottom and items
/// inside a row left-to-right.
use super::{bounds_or_offsets, MarkerEvidence};
use crate::bounds::BoundsIndex;
use crate::reason::{Detection, Reason};
use crate::types::{Bounds, Item};
use serde::{Deserialize, Serialize};

/// Configuration for the QR-form detector and its fidelity pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QrFormConfig {
    pub min_texts: usize,
    pub max_texts: usize,
    /// QR codes never shrink below this size (dots)
    pub min_qr_size: f64,
    /// Text never scales below this font size
    pub min_font_size: f64,
    /// Smallest vertical gap between stacked rows (dots)
    pub min_row_gap: f64,
    /// Largest row gap as a fraction of the line height
    pub max_row_gap_ratio: f64,
}

impl Default for QrFormConfig {
    #[inline]
    fn default() -> Self {
        Self {
            min_texts: 2,
            max_texts: 12,
            min_qr_size: 40.0,
            min_font_size: 10.0,
            min_row_gap: 2.0,
            max_row_gap_ratio: 0.35,
        }
    }
}

/// Resolved slots of a QR form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrFormRoles {
    pub qr_id: String,
    /// Text ids per row, rows top-to-bottom, items left-to-right
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QrFormDetector {
    config: QrFormConfig,
}

impl QrFormDetector {
    #[inline]
    #[must_use = "returns a new QrFormDetector instance"]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use = "returns a new QrFormDetector with custom config"]
    pub const fn with_config(config: QrFormConfig) -> Self {
        Self { config }
    }

    #[must_use = "detection result tells whether the form matched"]
    pub fn detect(
        &self,
        items: &[Item],
        evidence: &MarkerEvidence,
        index: &BoundsIndex,
    ) -> Detection<QrFormRoles> {
        let qrs: Vec<&Item> = items.iter().filter(|item| item.is_qr()).collect();
        let [qr] = qrs.as_slice() else {
            return Detection::Skipped(Reason::QrFormSkipQrCount);
        };
        if items.iter().any(Item::is_barcode) {
            return Detection::Skipped(Reason::QrFormSkipBarcodePresent);
        }
        let texts: Vec<&Item> = items.iter().filter(|item| item.is_text()).collect();
        if !(self.config.min_texts..=self.config.max_texts).contains(&texts.len()) {
            return Detection::Skipped(Reason::QrFormSkipTextCount);
        }
        if texts.iter().any(|item| item.rotation.abs() >= 0.01) {
            return Detection::Skipped(Reason::QrFormSkipRotatedText);
        }
        if evidence.has_any() {
            return Detection::Skipped(Reason::QrFormSkipMarkerEvidence);
        }
        let has_heading = texts
            .iter()
            .filter_map(|item| item.as_text())
            .any(|text| text.text.trim_end().ends_with(':'));
        if !has_heading {
            return Detection::Skipped(Reason::QrFormSkipNoHeadingRows);
        }

        let qr_center = bounds_or_offsets(qr, index).center_x();
        let left_of_qr = texts
            .iter()
            .filter(|item| bounds_or_offsets(item, index).center_x() < qr_center)
            .count();
        if left_of_qr * 2 <= texts.len() {
            return Detection::Skipped(Reason::QrFormSkipTextNotBesideQr);
        }

        let placed: Vec<(&Item, Bounds)> = texts
            .iter()
            .map(|item| (*item, bounds_or_offsets(item, index)))
            .collect();
        Detection::Matched(QrFormRoles {
            qr_id: qr.id.clone(),
            rows: group_rows(placed),
        })
    }
}

/// Group items into rows by vertical-center proximity
fn group_rows(mut placed: Vec<(&Item, Bounds)>) -> Vec<Vec<String>> {
    placed.sort_by(|(_, a), (_, b)| a.center_y().total_cmp(&b.center_y()));
    let mut rows: Vec<Vec<(&Item, Bounds)>> = Vec::new();
    for (item, bounds) in placed {
        let joins = rows.last().and_then(|row| row.first()).is_some_and(|(_, first)| {
            (first.center_y() - bounds.center_y()).abs() < 0.5 * first.height.min(bounds.height)
        });
        match rows.last_mut() {
            Some(row) if joins => row.push((item, bounds)),
            _ => rows.push(vec![(item, bounds)]),
        }
    }
    rows.into_iter()
        .map(|mut row| {
            row.sort_by(|(_, a), (_, b)| a.x.total_cmp(&b.x));
            row.into_iter().map(|(item, _)| item.id.clone()).collect()
        })
        .collect()
}
