//! Generic placement pass
//!
//! Runs whenever no structural pattern claims the label. One pass makes four
//! local repairs in a fixed order:
//! 1. marker shapes sit left of their paired text, at least
//!    [`PlacementConfig::marker_left_margin`] from the canvas edge
//! 2. a marker option row keeps a bounded gap below its heading
//! 3. overlapping rectangles are pushed apart in (y, x) scan order; a pair
//!    with no room on either axis is left where it is
//! 4. every item is clamped into the canvas
//!
//! Cascades (A pushes B into C) are only resolved by the solver running the
//! pass again from a fresh scan.

use crate::bounds::BoundsIndex;
use crate::detectors::is_marker_shape;
use crate::fidelity::{clamp_items, PassOutcome};
use crate::geometry::{compute_bounds_overlap, horizontal_gap, union_bounds, vertical_gap};
use crate::rewriter::{marker_gap, MARKER_LEFT_MARGIN};
use crate::types::{Bounds, Item, PreviewSize};
use serde::{Deserialize, Serialize};

/// Configuration for the generic placement pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Minimum distance of a marker shape from the left canvas edge (dots)
    pub marker_left_margin: f64,
    /// Floor of the preferred heading to option gap (dots)
    pub min_option_gap: f64,
    /// Preferred option gap as a fraction of the canvas height
    pub option_gap_canvas_ratio: f64,
    /// Preferred option gap as a fraction of the option font size
    pub option_gap_font_ratio: f64,
    /// Largest tolerated option gap as a fraction of the option font size
    pub max_option_gap_font_ratio: f64,
    /// Floor of the extra push added to an overlap depth (dots)
    pub min_overlap_step: f64,
    /// Extra push as a fraction of the canvas height
    pub overlap_step_ratio: f64,
}

impl Default for PlacementConfig {
    #[inline]
    fn default() -> Self {
        Self {
            marker_left_margin: MARKER_LEFT_MARGIN,
            min_option_gap: 4.0,
            option_gap_canvas_ratio: 0.025,
            option_gap_font_ratio: 0.32,
            max_option_gap_font_ratio: 0.7,
            min_overlap_step: 2.0,
            overlap_step_ratio: 0.02,
        }
    }
}

/// A marker shape and the text it labels, as item positions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerPair {
    pub marker: usize,
    pub text: usize,
}

impl MarkerPair {
    fn partner_of(&self, pos: usize) -> Option<usize> {
        if pos == self.marker {
            Some(self.text)
        } else if pos == self.text {
            Some(self.marker)
        } else {
            None
        }
    }
}

/// Pair every marker shape with the text beside it
///
/// A text qualifies when it shares the marker's rows (vertical distance of at
/// most half the marker height); the closest vertical center wins, then the
/// closest horizontal distance. Each text pairs at most once.
#[must_use]
pub fn pair_markers(items: &[Item], index: &BoundsIndex) -> Vec<MarkerPair> {
    let mut pairs: Vec<MarkerPair> = Vec::new();
    for (marker_pos, marker) in items.iter().enumerate() {
        if !is_marker_shape(marker) {
            continue;
        }
        let Some(marker_bounds) = index.get(&marker.id) else {
            continue;
        };
        let best = items
            .iter()
            .enumerate()
            .filter(|(pos, item)| item.is_text() && !pairs.iter().any(|pair| pair.text == *pos))
            .filter_map(|(pos, item)| Some((pos, index.get(&item.id)?)))
            .filter(|(_, bounds)| vertical_gap(&marker_bounds, bounds) <= marker_bounds.height / 2.0)
            .min_by(|(_, a), (_, b)| {
                let dy_a = (a.center_y() - marker_bounds.center_y()).abs();
                let dy_b = (b.center_y() - marker_bounds.center_y()).abs();
                dy_a.total_cmp(&dy_b).then_with(|| {
                    horizontal_gap(&marker_bounds, a).total_cmp(&horizontal_gap(&marker_bounds, b))
                })
            });
        if let Some((text_pos, _)) = best {
            pairs.push(MarkerPair {
                marker: marker_pos,
                text: text_pos,
            });
        }
    }
    pairs
}

/// Generic overlap and marker placement pass
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlacementPass {
    config: PlacementConfig,
}

impl PlacementPass {
    #[inline]
    #[must_use = "returns a new PlacementPass instance"]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use = "returns a new PlacementPass with custom config"]
    pub const fn with_config(config: PlacementConfig) -> Self {
        Self { config }
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> &PlacementConfig {
        &self.config
    }

    /// Preferred heading to option gap: `max(4, round(H * 0.025), round(fs * 0.32))`
    #[must_use]
    pub fn preferred_option_gap(&self, preview: PreviewSize, font_size: f64) -> f64 {
        (preview.height * self.config.option_gap_canvas_ratio)
            .round()
            .max((font_size * self.config.option_gap_font_ratio).round())
            .max(self.config.min_option_gap)
    }

    /// Largest tolerated heading to option gap: `round(fs * 0.7)`, never below
    /// the preferred gap
    #[must_use]
    pub fn max_option_gap(&self, preview: PreviewSize, font_size: f64) -> f64 {
        (font_size * self.config.max_option_gap_font_ratio)
            .round()
            .max(self.preferred_option_gap(preview, font_size))
    }

    /// Extra push added to an overlap depth: `max(2, round(H * 0.02))`
    #[must_use]
    pub fn overlap_step(&self, preview: PreviewSize) -> f64 {
        (preview.height * self.config.overlap_step_ratio)
            .round()
            .max(self.config.min_overlap_step)
    }

    pub fn apply(&self, items: &mut [Item], index: &mut BoundsIndex, preview: PreviewSize) -> PassOutcome {
        let mut outcome = PassOutcome::default();
        let pairs = pair_markers(items, index);

        for pair in &pairs {
            self.place_marker(items, index, *pair, &mut outcome);
        }
        for pair in &pairs {
            self.stack_option(items, index, *pair, preview, &mut outcome);
        }
        self.resolve_overlaps(items, index, &pairs, preview, &mut outcome);
        outcome.moved += clamp_items(items, index, preview);

        log::trace!(
            "generic placement: {} marker pairs, {} moved",
            pairs.len(),
            outcome.moved
        );
        outcome
    }

    /// Items inside the canvas, no overlaps, every marker left of its text
    /// with margin and gap
    #[must_use]
    pub fn is_clean(&self, items: &[Item], index: &BoundsIndex, preview: PreviewSize) -> bool {
        let all: Vec<Bounds> = items.iter().filter_map(|item| index.get(&item.id)).collect();
        let inside = all.iter().all(|b| {
            b.x >= 0.0 && b.y >= 0.0 && b.right() <= preview.width && b.bottom() <= preview.height
        });
        if !inside {
            return false;
        }
        let overlapping = all.iter().enumerate().any(|(i, a)| {
            all[i + 1..]
                .iter()
                .any(|b| !compute_bounds_overlap(a, b).is_empty())
        });
        if overlapping {
            return false;
        }
        pair_markers(items, index).iter().all(|pair| {
            let (Some(marker), Some(text)) = (
                index.get(&items[pair.marker].id),
                index.get(&items[pair.text].id),
            ) else {
                return true;
            };
            let gap = marker_gap(items[pair.text].font_size().unwrap_or_default());
            marker.x >= self.config.marker_left_margin - 0.5 && marker.right() + gap <= text.x + 0.5
        })
    }

    /// Marker left of its text with the font gap, kept off the left margin
    fn place_marker(
        &self,
        items: &mut [Item],
        index: &mut BoundsIndex,
        pair: MarkerPair,
        outcome: &mut PassOutcome,
    ) {
        let (Some(marker), Some(text)) = (
            index.get(&items[pair.marker].id),
            index.get(&items[pair.text].id),
        ) else {
            return;
        };
        let margin = self.config.marker_left_margin;
        let gap = marker_gap(items[pair.text].font_size().unwrap_or_default());
        let fitted = text.x - gap - marker.width;

        if fitted >= margin {
            let x = if marker.x <= fitted { marker.x } else { fitted.floor() };
            outcome.record_move(index.move_item(&mut items[pair.marker], x.max(margin), marker.y));
        } else {
            outcome.record_move(index.move_item(&mut items[pair.marker], margin, marker.y));
            let text_x = (margin + marker.width + gap).ceil();
            outcome.record_move(index.move_item(&mut items[pair.text], text_x, text.y));
        }
    }

    /// Keep the option row within `[preferred, max]` dots below its heading
    fn stack_option(
        &self,
        items: &mut [Item],
        index: &mut BoundsIndex,
        pair: MarkerPair,
        preview: PreviewSize,
        outcome: &mut PassOutcome,
    ) {
        let (Some(marker), Some(option)) = (
            index.get(&items[pair.marker].id),
            index.get(&items[pair.text].id),
        ) else {
            return;
        };
        let Some(row) = union_bounds([&marker, &option]) else {
            return;
        };
        let heading = items
            .iter()
            .enumerate()
            .filter(|(pos, item)| *pos != pair.text && item.is_text())
            .filter_map(|(_, item)| index.get(&item.id))
            .filter(|b| b.center_y() < option.center_y() && horizontal_gap(b, &row) <= 0.0)
            .max_by(|a, b| a.bottom().total_cmp(&b.bottom()));
        let Some(heading) = heading else {
            return;
        };

        let font_size = items[pair.text].font_size().unwrap_or_default();
        let preferred = self.preferred_option_gap(preview, font_size);
        let gap = option.y - heading.bottom();
        if gap >= preferred && gap <= self.max_option_gap(preview, font_size) {
            return;
        }
        let dy = (heading.bottom() + preferred - option.y).round();
        outcome.record_move(index.move_by(&mut items[pair.text], 0.0, dy));
        outcome.record_move(index.move_by(&mut items[pair.marker], 0.0, dy));
    }

    /// Push the later rectangle of every overlapping pair right or down
    fn resolve_overlaps(
        &self,
        items: &mut [Item],
        index: &mut BoundsIndex,
        pairs: &[MarkerPair],
        preview: PreviewSize,
        outcome: &mut PassOutcome,
    ) {
        let mut order: Vec<(usize, Bounds)> = items
            .iter()
            .enumerate()
            .filter_map(|(pos, item)| Some((pos, index.get(&item.id)?)))
            .collect();
        order.sort_by(|(_, a), (_, b)| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));
        let order: Vec<usize> = order.into_iter().map(|(pos, _)| pos).collect();
        let step = self.overlap_step(preview);
        let partner = |pos: usize| pairs.iter().find_map(|pair| pair.partner_of(pos));

        for (i, &earlier) in order.iter().enumerate() {
            for &later in &order[i + 1..] {
                if partner(later) == Some(earlier) {
                    continue;
                }
                let (Some(a), Some(b)) = (index.get(&items[earlier].id), index.get(&items[later].id))
                else {
                    continue;
                };
                let overlap = compute_bounds_overlap(&a, &b);
                if overlap.is_empty() {
                    continue;
                }

                let prefer_vertical = items[earlier].is_machine_readable()
                    || items[later].is_machine_readable()
                    || (items[earlier].is_text() && items[later].is_text());
                let right = (overlap.overlap_x + step).ceil();
                let down = (overlap.overlap_y + step).ceil();
                let room_right = b.right() + right <= preview.width;
                let room_down = b.bottom() + down <= preview.height;
                let (dx, dy) = if preview.is_landscape() && room_right && !prefer_vertical {
                    (right, 0.0)
                } else if room_down {
                    (0.0, down)
                } else if room_right {
                    (right, 0.0)
                } else {
                    log::trace!(
                        "overlap {} / {}: no room on either axis",
                        items[earlier].id,
                        items[later].id
                    );
                    continue;
                };

                log::trace!(
                    "overlap {} / {}: pushing by ({dx}, {dy})",
                    items[earlier].id,
                    items[later].id
                );
                outcome.record_move(index.move_by(&mut items[later], dx, dy));
                if let Some(other) = partner(later) {
                    outcome.record_move(index.move_by(&mut items[other], dx, dy));
                }
            }
        }
    }
}
