/// Boxed barcode form detector
///
/// Sketches of paper forms often repeat a reference code twice: once in a
/// header cell and once mirrored near the barcode. Two near-duplicate code-like
/// texts plus exactly one barcode are the evidence for this pattern; the
/// fidelity pass then draws the frame and the separator lines around it.
use super::{bounds_or_offsets, normalize_code_text, reading_order};
use crate::bounds::BoundsIndex;
use crate::geometry::is_quarter_turn;
use crate::reason::{Detection, Reason};
use crate::types::Item;
use serde::{Deserialize, Serialize};

/// Configuration for the boxed barcode detector and its fidelity pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoxedBarcodeConfig {
    pub min_texts: usize,
    pub max_texts: usize,
    /// Shortest normalized code text that counts as a reference code
    pub min_code_chars: usize,
    /// Frame padding left and right of the content (dots)
    pub frame_padding_x: f64,
    /// Frame padding above and below the content (dots)
    pub frame_padding_y: f64,
    /// Header band as a fraction of the frame height
    pub header_band_ratio: f64,
    /// Attempts to push content below an overlapping header
    pub max_header_attempts: usize,
}

impl Default for BoxedBarcodeConfig {
    #[inline]
    fn default() -> Self {
        Self {
            min_texts: 3,
            max_texts: 5,
            min_code_chars: 10,
            frame_padding_x: 6.0,
            frame_padding_y: 4.0,
            header_band_ratio: 0.18,
            max_header_attempts: 10,
        }
    }
}

/// Resolved slots of a boxed barcode form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxedBarcodeRoles {
    pub barcode_id: String,
    /// Upper copy of the duplicated code
    pub header_id: String,
    /// Lower copy of the duplicated code
    pub mirror_id: String,
    /// Text row between header and barcode
    pub middle_id: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoxedBarcodeDetector {
    config: BoxedBarcodeConfig,
}

impl BoxedBarcodeDetector {
    #[inline]
    #[must_use = "returns a new BoxedBarcodeDetector instance"]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use = "returns a new BoxedBarcodeDetector with custom config"]
    pub const fn with_config(config: BoxedBarcodeConfig) -> Self {
        Self { config }
    }

    #[must_use = "detection result tells whether the form matched"]
    pub fn detect(&self, items: &[Item], index: &BoundsIndex) -> Detection<BoxedBarcodeRoles> {
        let barcodes: Vec<&Item> = items.iter().filter(|item| item.is_barcode()).collect();
        let [barcode] = barcodes.as_slice() else {
            return Detection::Skipped(Reason::BoxedBarcodeSkipBarcodeCount);
        };
        if items.iter().any(Item::is_qr) {
            return Detection::Skipped(Reason::BoxedBarcodeSkipQrPresent);
        }
        let texts = reading_order(items.iter().filter(|item| item.is_text()), index);
        if !(self.config.min_texts..=self.config.max_texts).contains(&texts.len()) {
            return Detection::Skipped(Reason::BoxedBarcodeSkipTextCount);
        }
        if texts.iter().any(|item| is_quarter_turn(item.rotation)) {
            return Detection::Skipped(Reason::BoxedBarcodeSkipRotatedText);
        }

        let Some((header, mirror)) = self.duplicate_pair(&texts) else {
            return Detection::Skipped(Reason::BoxedBarcodeSkipNoDuplicateCodeText);
        };

        let barcode_bounds = bounds_or_offsets(barcode, index);
        let middle = texts
            .iter()
            .filter(|item| item.id != header.id && item.id != mirror.id)
            .filter_map(|item| {
                let bounds = bounds_or_offsets(item, index);
                (bounds.center_y() < barcode_bounds.y)
                    .then(|| (barcode_bounds.y - bounds.bottom(), item))
            })
            .min_by(|(a, _), (b, _)| a.abs().total_cmp(&b.abs()))
            .map(|(_, item)| item);
        let Some(middle) = middle else {
            return Detection::Skipped(Reason::BoxedBarcodeSkipNoMiddleRow);
        };

        Detection::Matched(BoxedBarcodeRoles {
            barcode_id: barcode.id.clone(),
            header_id: header.id.clone(),
            mirror_id: mirror.id.clone(),
            middle_id: middle.id.clone(),
        })
    }

    /// First pair of near-duplicate code texts in reading order (upper, lower)
    fn duplicate_pair<'a>(&self, texts: &[&'a Item]) -> Option<(&'a Item, &'a Item)> {
        let codes: Vec<(&'a Item, String)> = texts
            .iter()
            .filter_map(|item| {
                let normalized = normalize_code_text(&item.as_text()?.text);
                self.is_code_like(&normalized).then_some((*item, normalized))
            })
            .collect();
        for (i, (upper, a)) in codes.iter().enumerate() {
            for (lower, b) in &codes[i + 1..] {
                if a == b || a.contains(b.as_str()) || b.contains(a.as_str()) {
                    return Some((*upper, *lower));
                }
            }
        }
        None
    }

    fn is_code_like(&self, normalized: &str) -> bool {
        normalized.chars().count() >= self.config.min_code_chars
            && normalized.chars().any(char::is_alphabetic)
            && normalized.chars().any(|ch| ch.is_ascii_digit())
    }
}
