/// Marker / checkbox group detector
///
/// Recognizes a heading block followed by one checkbox option, where the
/// checkbox is either a glyph at the start of a text line (`☐ Ja`) or a small
/// square shape beside the option text.
///
/// Algorithm:
/// 1. Collect text lines in reading order (see [`analyze_text_lines`])
/// 2. Anchor line:
///    - glyph evidence: the single glyph line
///    - shape evidence: the line right of the marker shape whose vertical
///      center is closest to the shape's
/// 3. Heading block = every line before the anchor
/// 4. Option block = anchor plus at most one short continuation line
///
/// Anything more complex (several options, trailing paragraphs, barcodes on
/// the same label) is left to the generic placement pass.
use super::{bounds_or_offsets, reading_order, MarkerEvidence};
use crate::bounds::BoundsIndex;
use crate::reason::{Detection, Reason};
use crate::text_lines::{analyze_text_lines, LineEntry};
use crate::types::{Bounds, Item};
use serde::{Deserialize, Serialize};

/// Configuration for the marker group detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerGroupConfig {
    /// Text items allowed when the only evidence is a marker shape
    pub max_free_text_items: usize,
    /// Longest continuation line that still belongs to the option
    pub max_continuation_chars: usize,
}

impl Default for MarkerGroupConfig {
    #[inline]
    fn default() -> Self {
        Self {
            max_free_text_items: 3,
            max_continuation_chars: 32,
        }
    }
}

/// Which kind of marker evidence the match rests on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MarkerEvidenceKind {
    Glyph,
    Shape,
}

/// Resolved slots of a marker group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerGroupRoles {
    pub evidence: MarkerEvidenceKind,
    pub heading: Vec<LineEntry>,
    /// Anchor line first, then the optional continuation
    pub option: Vec<LineEntry>,
    /// Existing marker shape, reused by the rewrite
    pub marker_shape_id: Option<String>,
    /// Text items whose lines were absorbed, in reading order
    pub source_ids: Vec<String>,
}

impl MarkerGroupRoles {
    /// True when heading and option come from the same text item
    #[must_use]
    pub fn is_monolith(&self) -> bool {
        self.source_ids.len() == 1
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkerGroupDetector {
    config: MarkerGroupConfig,
}

impl MarkerGroupDetector {
    #[inline]
    #[must_use = "returns a new MarkerGroupDetector instance"]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use = "returns a new MarkerGroupDetector with custom config"]
    pub const fn with_config(config: MarkerGroupConfig) -> Self {
        Self { config }
    }

    /// Probe the items for a heading + single checkbox option group
    #[must_use = "detection result tells whether the group matched"]
    pub fn detect(
        &self,
        items: &[Item],
        evidence: &MarkerEvidence,
        index: &BoundsIndex,
    ) -> Detection<MarkerGroupRoles> {
        let texts: Vec<&Item> = reading_order(items.iter().filter(|item| item.is_text()), index);
        if texts.is_empty() {
            return Detection::Skipped(Reason::SkipNoTextItems);
        }
        if items.iter().any(Item::is_machine_readable) {
            return Detection::Skipped(Reason::SkipMachineReadablePresent);
        }
        if !evidence.has_any() {
            return Detection::Skipped(Reason::SkipNoMarkerEvidence);
        }
        if !evidence.has_glyph() && texts.len() > self.config.max_free_text_items {
            return Detection::Skipped(Reason::SkipAmbiguousManyTextItems);
        }
        if evidence.shape_ids.len() > 1 {
            return Detection::Skipped(Reason::SkipMultipleMarkerShapes);
        }
        if evidence.glyph_lines > 1 {
            return Detection::Skipped(Reason::SkipMultipleOptionAnchors);
        }

        let lines = analyze_text_lines(&texts, index);
        let marker_shape_id = evidence.shape_ids.first().cloned();
        let (anchor, kind) = if evidence.has_glyph() {
            (lines.iter().position(|line| line.has_marker), MarkerEvidenceKind::Glyph)
        } else {
            (
                marker_shape_id
                    .as_deref()
                    .and_then(|id| items.iter().find(|item| item.id == id))
                    .and_then(|shape| Self::shape_anchor(&lines, &bounds_or_offsets(shape, index))),
                MarkerEvidenceKind::Shape,
            )
        };
        let Some(anchor) = anchor else {
            return Detection::Skipped(Reason::SkipNoOptionAnchor);
        };
        if anchor == 0 {
            return Detection::Skipped(Reason::SkipNoHeadingLines);
        }

        let trailing = &lines[anchor + 1..];
        let option_len = match trailing {
            [] => 1,
            [next]
                if !next.has_marker
                    && next.line.chars().count() <= self.config.max_continuation_chars =>
            {
                2
            }
            _ => return Detection::Skipped(Reason::SkipTrailingLines),
        };

        let mut source_ids: Vec<String> = Vec::new();
        for line in &lines {
            if !source_ids.contains(&line.item_id) {
                source_ids.push(line.item_id.clone());
            }
        }

        Detection::Matched(MarkerGroupRoles {
            evidence: kind,
            heading: lines[..anchor].to_vec(),
            option: lines[anchor..anchor + option_len].to_vec(),
            marker_shape_id,
            source_ids,
        })
    }

    /// Line right of the marker shape, vertically closest to its center
    fn shape_anchor(lines: &[LineEntry], shape: &Bounds) -> Option<usize> {
        lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.bounds.x >= shape.center_x())
            .min_by(|(_, a), (_, b)| {
                let da = (a.bounds.center_y() - shape.center_y()).abs();
                let db = (b.bounds.center_y() - shape.center_y()).abs();
                da.total_cmp(&db)
            })
            .map(|(position, _)| position)
    }
}
