/// Barcode-photo detector
///
/// Matches the typical "photographed shelf label" sketch: a vertical side text
/// along one canvas edge, a short big-letter token, a code text and the
/// barcode printed right below it.
///
/// Pairing score for a barcode `b` and code candidate `c`:
/// `2|dx| + |dy| + 0.2 * dist`, plus 48 when the barcode center sits more than
/// 8 dots above the code center, plus `8 * (|dx| - 64)` when `|dx| > 64`.
/// The best pair must still be physically adjacent (gap limits below).
use super::{bounds_or_offsets, reading_order, MarkerEvidence};
use crate::bounds::BoundsIndex;
use crate::geometry::{center_distance, horizontal_gap, is_quarter_turn};
use crate::reason::{Detection, Reason};
use crate::types::{Bounds, Item, PreviewSize};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static TOKEN_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\d{1,3}|\p{L})$").expect("Invalid token text regex"));

static CODE_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\p{L}\d][\p{L}\d ./\-]{2,47}$").expect("Invalid code text regex")
});

/// Configuration for the barcode-photo detector and its fidelity pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarcodePhotoConfig {
    /// Absolute text items required before the pattern is considered
    pub min_absolute_texts: usize,
    /// Largest horizontal gap between barcode and code text (dots)
    pub max_horizontal_gap: f64,
    /// Vertical gap (barcode top - code bottom) range (dots)
    pub min_vertical_gap: f64,
    pub max_vertical_gap: f64,
    /// Largest center distance of the pair (dots)
    pub max_center_distance: f64,
    /// Penalty when the barcode sits above the code
    pub above_penalty: f64,
    /// Lateral offset tolerated before the steep penalty applies
    pub lateral_free_band: f64,
    /// Per-dot penalty past the free band
    pub lateral_penalty: f64,
    /// Side text distance from the left canvas edge
    pub side_margin: f64,
    /// Gap between side text and the content column
    pub content_gap: f64,
    /// Gap between code text and barcode
    pub barcode_gap: f64,
    /// Token font relative to the code font after the rewrite
    pub token_font_ratio: f64,
}

impl Default for BarcodePhotoConfig {
    #[inline]
    fn default() -> Self {
        Self {
            min_absolute_texts: 3,
            max_horizontal_gap: 56.0,
            min_vertical_gap: -12.0,
            max_vertical_gap: 120.0,
            max_center_distance: 220.0,
            above_penalty: 48.0,
            lateral_free_band: 64.0,
            lateral_penalty: 8.0,
            side_margin: 4.0,
            content_gap: 8.0,
            barcode_gap: 4.0,
            token_font_ratio: 1.6,
        }
    }
}

/// Resolved slots of a barcode-photo layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarcodePhotoRoles {
    pub barcode_id: String,
    pub code_text_id: String,
    pub side_text_id: Option<String>,
    pub token_id: Option<String>,
}

impl BarcodePhotoRoles {
    /// Ids of every role item
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        [
            Some(self.barcode_id.as_str()),
            Some(self.code_text_id.as_str()),
            self.side_text_id.as_deref(),
            self.token_id.as_deref(),
        ]
        .into_iter()
        .flatten()
    }

    /// Point every slot holding `from` at `to`
    pub fn rename(&mut self, from: &str, to: &str) {
        let slots = [
            Some(&mut self.barcode_id),
            Some(&mut self.code_text_id),
            self.side_text_id.as_mut(),
            self.token_id.as_mut(),
        ];
        for slot in slots.into_iter().flatten() {
            if slot == from {
                *slot = to.to_string();
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BarcodePhotoDetector {
    config: BarcodePhotoConfig,
}

impl BarcodePhotoDetector {
    #[inline]
    #[must_use = "returns a new BarcodePhotoDetector instance"]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use = "returns a new BarcodePhotoDetector with custom config"]
    pub const fn with_config(config: BarcodePhotoConfig) -> Self {
        Self { config }
    }

    #[must_use = "detection result tells whether the layout matched"]
    pub fn detect(
        &self,
        items: &[Item],
        evidence: &MarkerEvidence,
        index: &BoundsIndex,
        preview: PreviewSize,
    ) -> Detection<BarcodePhotoRoles> {
        let barcodes: Vec<&Item> = items.iter().filter(|item| item.is_barcode()).collect();
        if barcodes.is_empty() {
            return Detection::Skipped(Reason::BarcodePhotoSkipNoBarcode);
        }
        let texts = reading_order(
            items.iter().filter(|item| item.is_text() && item.is_absolute()),
            index,
        );
        if texts.len() < self.config.min_absolute_texts {
            return Detection::Skipped(Reason::BarcodePhotoSkipFewAbsoluteText);
        }
        if evidence.has_any() {
            return Detection::Skipped(Reason::BarcodePhotoSkipMarkerEvidence);
        }

        let side = Self::pick_side_text(&texts, index, preview);
        let token = texts
            .iter()
            .filter(|item| Some(item.id.as_str()) != side)
            .filter(|item| {
                item.as_text()
                    .is_some_and(|text| TOKEN_TEXT.is_match(text.text.trim()))
            })
            // largest font, the upper item on ties
            .min_by(|a, b| {
                let fa = a.font_size().unwrap_or(0.0);
                let fb = b.font_size().unwrap_or(0.0);
                fb.total_cmp(&fa)
            })
            .map(|item| item.id.as_str());

        let codes: Vec<&Item> = texts
            .iter()
            .copied()
            .filter(|item| Some(item.id.as_str()) != side && Some(item.id.as_str()) != token)
            .filter(|item| item.as_text().is_some_and(|text| is_code_text(&text.text)))
            .collect();
        if codes.is_empty() {
            return Detection::Skipped(Reason::BarcodePhotoSkipNoCodeText);
        }

        let mut best: Option<(f64, &Item, &Item)> = None;
        for &barcode in &barcodes {
            let barcode_bounds = bounds_or_offsets(barcode, index);
            for &code in &codes {
                let score = self.pair_score(&barcode_bounds, &bounds_or_offsets(code, index));
                if best.map_or(true, |(current, _, _)| score < current) {
                    best = Some((score, barcode, code));
                }
            }
        }
        let Some((_, barcode, code)) = best else {
            return Detection::Skipped(Reason::BarcodePhotoSkipNoCodeText);
        };
        if !self.pair_is_adjacent(&bounds_or_offsets(barcode, index), &bounds_or_offsets(code, index)) {
            return Detection::Skipped(Reason::BarcodePhotoSkipPairTooFar);
        }

        Detection::Matched(BarcodePhotoRoles {
            barcode_id: barcode.id.clone(),
            code_text_id: code.id.clone(),
            side_text_id: side.map(str::to_string),
            token_id: token.map(str::to_string),
        })
    }

    /// Weighted distance of a barcode from a code text, lower is better
    #[must_use]
    pub fn pair_score(&self, barcode: &Bounds, code: &Bounds) -> f64 {
        let dx = (barcode.center_x() - code.center_x()).abs();
        let dy = (barcode.center_y() - code.center_y()).abs();
        let mut score = 2.0 * dx + dy + 0.2 * center_distance(barcode, code);
        if barcode.center_y() < code.center_y() - 8.0 {
            score += self.config.above_penalty;
        }
        if dx > self.config.lateral_free_band {
            score += self.config.lateral_penalty * (dx - self.config.lateral_free_band);
        }
        score
    }

    fn pair_is_adjacent(&self, barcode: &Bounds, code: &Bounds) -> bool {
        let vertical = barcode.y - code.bottom();
        horizontal_gap(barcode, code) <= self.config.max_horizontal_gap
            && (self.config.min_vertical_gap..=self.config.max_vertical_gap).contains(&vertical)
            && center_distance(barcode, code) <= self.config.max_center_distance
    }

    /// Quarter-turn text first, otherwise the tallest narrow text hugging an edge
    fn pick_side_text<'a>(
        texts: &[&'a Item],
        index: &BoundsIndex,
        preview: PreviewSize,
    ) -> Option<&'a str> {
        if let Some(rotated) = texts.iter().find(|item| is_quarter_turn(item.rotation)) {
            return Some(rotated.id.as_str());
        }
        let edge_band = preview.width * 0.15;
        texts
            .iter()
            .filter_map(|item| {
                let bounds = index.get(&item.id)?;
                let aspect = bounds.height / bounds.width;
                let edge = bounds.x.min(preview.width - bounds.right());
                (aspect >= 1.5 && edge <= edge_band).then(|| (aspect - edge / edge_band, item))
            })
            .max_by(|(a, _), (b, _)| a.total_cmp(b))
            .map(|(_, item)| item.id.as_str())
    }
}

/// Short alphanumeric reference printed next to a barcode
#[must_use]
pub fn is_code_text(text: &str) -> bool {
    let trimmed = text.trim();
    CODE_TEXT.is_match(trimmed) && trimmed.chars().filter(char::is_ascii_digit).count() >= 3
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo_label() -> Vec<Item> {
        vec![
            Item::text("side", "Regal Ost", 12.0).at(2, 20).rotated(-90.0),
            Item::text("token", "7", 20.0).at(40, 6),
            Item::text("code", "4006381333931", 14.0).at(60, 30),
            Item::barcode("bc", "4006381333931", 160.0, 50.0).at(58, 52),
        ]
    }

    fn index_for(items: &[Item]) -> BoundsIndex {
        let mut index = BoundsIndex::new();
        for item in items {
            let (w, h) = match item.id.as_str() {
                "side" => (14.0, 70.0),
                "token" => (12.0, 24.0),
                "code" => (110.0, 17.0),
                _ => (160.0, 50.0),
            };
            index.insert(
                &item.id,
                Bounds::new(f64::from(item.x_offset), f64::from(item.y_offset), w, h),
            );
        }
        index
    }

    fn detect(items: &[Item]) -> Detection<BarcodePhotoRoles> {
        BarcodePhotoDetector::new().detect(
            items,
            &MarkerEvidence::collect(items),
            &index_for(items),
            PreviewSize::new(400.0, 128.0),
        )
    }

    #[test]
    fn test_photo_label_roles() {
        let roles = detect(&photo_label()).into_roles().unwrap();
        assert_eq!(roles.barcode_id, "bc");
        assert_eq!(roles.code_text_id, "code");
        assert_eq!(roles.side_text_id.as_deref(), Some("side"));
        assert_eq!(roles.token_id.as_deref(), Some("token"));
        assert_eq!(roles.ids().count(), 4);
    }

    #[test]
    fn test_far_barcode_is_rejected() {
        let mut items = photo_label();
        items[3] = Item::barcode("bc", "4006381333931", 160.0, 50.0).at(230, 0);
        assert_eq!(detect(&items).reason(), Some(Reason::BarcodePhotoSkipPairTooFar));
    }

    #[test]
    fn test_requires_code_text() {
        let mut items = photo_label();
        items[2] = Item::text("code", "Preis", 14.0).at(60, 30);
        assert_eq!(detect(&items).reason(), Some(Reason::BarcodePhotoSkipNoCodeText));
    }

    #[test]
    fn test_skip_order() {
        let no_barcode: Vec<Item> = photo_label().into_iter().take(3).collect();
        assert_eq!(detect(&no_barcode).reason(), Some(Reason::BarcodePhotoSkipNoBarcode));

        let mut flow = photo_label();
        flow[0].position_mode = crate::types::PositionMode::Flow;
        assert_eq!(detect(&flow).reason(), Some(Reason::BarcodePhotoSkipFewAbsoluteText));

        let mut glyph = photo_label();
        glyph.push(Item::text("opt", "☐ Ja", 12.0).at(300, 10));
        assert_eq!(detect(&glyph).reason(), Some(Reason::BarcodePhotoSkipMarkerEvidence));
    }

    #[test]
    fn test_above_penalty() {
        let detector = BarcodePhotoDetector::new();
        let code = Bounds::new(0.0, 50.0, 100.0, 16.0);
        let below = Bounds::new(0.0, 70.0, 100.0, 30.0);
        let above = Bounds::new(0.0, 4.0, 100.0, 30.0);
        assert!(detector.pair_score(&below, &code) < detector.pair_score(&above, &code));
    }

    #[test]
    fn test_code_text_shape() {
        assert!(is_code_text("4006381333931"));
        assert!(is_code_text("ART-2024/117"));
        assert!(!is_code_text("Preis"));
        assert!(!is_code_text("7"));
    }
}
