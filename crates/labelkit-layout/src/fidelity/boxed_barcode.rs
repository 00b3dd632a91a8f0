/// Boxed barcode fidelity pass
///
/// Draws the paper-form structure around a recognized boxed barcode:
/// 1. Push content below an overlapping header (bounded attempts)
/// 2. Frame = union of the role items padded by 6 dots left/right, 4 top/bottom
/// 3. Header separator at `max(header.bottom + 2, frame.top + 0.18 * frame.h)`
/// 4. Middle separator at `middle.bottom + 3`, clamped between the header
///    separator + 10 and the barcode top - 6
///
/// Frame and separators use ids derived from the barcode id
/// (`<id>-frame`, `<id>-sep-header`, `<id>-sep-middle`), so later runs update
/// the same shapes instead of stacking new ones.
use super::{clamp_items, position_of, PassOutcome};
use crate::bounds::BoundsIndex;
use crate::detectors::{BoxedBarcodeConfig, BoxedBarcodeRoles};
use crate::geometry::{compute_bounds_overlap, snap_within, union_bounds};
use crate::types::{Bounds, Item, ItemKind, PreviewSize, ShapeType};

/// Gap kept between the header and the content pushed below it
const HEADER_CLEARANCE: f64 = 2.0;
/// Minimum separation of the middle separator from the header separator
const MIDDLE_SEPARATOR_MIN_OFFSET: f64 = 10.0;
/// Gap between the middle separator and the barcode
const BARCODE_SEPARATOR_GAP: f64 = 6.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoxedBarcodePass {
    config: BoxedBarcodeConfig,
}

/// Placement of one structural shape
#[derive(Debug, Clone, Copy, PartialEq)]
struct ShapeTarget {
    shape_type: ShapeType,
    bounds: Bounds,
}

impl BoxedBarcodePass {
    #[inline]
    #[must_use = "returns a new BoxedBarcodePass instance"]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use = "returns a new BoxedBarcodePass with custom config"]
    pub const fn with_config(config: BoxedBarcodeConfig) -> Self {
        Self { config }
    }

    /// Ids of the frame and separator shapes owned by this barcode
    #[must_use]
    pub fn shape_ids(barcode_id: &str) -> [String; 3] {
        [
            format!("{barcode_id}-frame"),
            format!("{barcode_id}-sep-header"),
            format!("{barcode_id}-sep-middle"),
        ]
    }

    pub fn apply(
        &self,
        items: &mut Vec<Item>,
        index: &mut BoundsIndex,
        roles: &BoxedBarcodeRoles,
        preview: PreviewSize,
    ) -> PassOutcome {
        let mut outcome = PassOutcome::default();
        let role_ids = [
            roles.header_id.as_str(),
            roles.middle_id.as_str(),
            roles.barcode_id.as_str(),
            roles.mirror_id.as_str(),
        ];
        if role_ids.iter().any(|id| !index.contains(id) || position_of(items, id).is_none()) {
            return outcome;
        }

        self.clear_header(items, index, roles, &mut outcome);
        outcome.moved += clamp_items(items, index, preview);

        let Some(targets) = self.shape_targets(index, roles, preview) else {
            return outcome;
        };
        let ids = Self::shape_ids(&roles.barcode_id);
        for (slot, (id, target)) in ids.iter().zip(targets).enumerate() {
            Self::sync_shape(items, index, id, target, slot, &mut outcome);
        }
        outcome
    }

    /// Push the content stack down until nothing overlaps its upper neighbor
    fn clear_header(
        &self,
        items: &mut [Item],
        index: &mut BoundsIndex,
        roles: &BoxedBarcodeRoles,
        outcome: &mut PassOutcome,
    ) {
        let mut stack: Vec<&str> = vec![
            roles.header_id.as_str(),
            roles.middle_id.as_str(),
            roles.barcode_id.as_str(),
            roles.mirror_id.as_str(),
        ];
        stack.sort_by(|a, b| {
            let ya = index.get(a).map_or(0.0, |bounds| bounds.y);
            let yb = index.get(b).map_or(0.0, |bounds| bounds.y);
            ya.total_cmp(&yb)
        });
        // header always leads the stack
        if let Some(pos) = stack.iter().position(|id| *id == roles.header_id) {
            let header = stack.remove(pos);
            stack.insert(0, header);
        }

        for _ in 0..self.config.max_header_attempts {
            let collision = stack.windows(2).enumerate().find_map(|(i, pair)| {
                let upper = index.get(pair[0])?;
                let lower = index.get(pair[1])?;
                let overlap = compute_bounds_overlap(&upper, &lower);
                (!overlap.is_empty()).then_some((i + 1, overlap.overlap_y))
            });
            let Some((first_lower, depth)) = collision else {
                break;
            };
            let shift = (depth + HEADER_CLEARANCE).ceil();
            for id in &stack[first_lower..] {
                if let Some(pos) = position_of(items, id) {
                    outcome.record_move(index.move_by(&mut items[pos], 0.0, shift));
                }
            }
        }
    }

    /// Frame and separator placements from the current role bounds
    fn shape_targets(
        &self,
        index: &BoundsIndex,
        roles: &BoxedBarcodeRoles,
        preview: PreviewSize,
    ) -> Option<[ShapeTarget; 3]> {
        let header = index.get(&roles.header_id)?;
        let middle = index.get(&roles.middle_id)?;
        let barcode = index.get(&roles.barcode_id)?;
        let mirror = index.get(&roles.mirror_id)?;
        let content = union_bounds([&header, &middle, &barcode, &mirror])?;

        let left = (content.x - self.config.frame_padding_x).floor().max(0.0);
        let top = (content.y - self.config.frame_padding_y).floor().max(0.0);
        let right = (content.right() + self.config.frame_padding_x).ceil().min(preview.width);
        let bottom = (content.bottom() + self.config.frame_padding_y).ceil().min(preview.height);
        let frame = Bounds::new(left, top, right - left, bottom - top);

        let header_separator = (header.bottom() + HEADER_CLEARANCE)
            .max(frame.y + self.config.header_band_ratio * frame.height)
            .round();
        let middle_separator = snap_within(
            middle.bottom() + 3.0,
            header_separator + MIDDLE_SEPARATOR_MIN_OFFSET,
            barcode.y - BARCODE_SEPARATOR_GAP,
        );

        let line = |y: f64| ShapeTarget {
            shape_type: ShapeType::Line,
            bounds: Bounds::new(frame.x, y, frame.width, 0.0),
        };
        Some([
            ShapeTarget {
                shape_type: ShapeType::Rect,
                bounds: frame,
            },
            line(header_separator),
            line(middle_separator),
        ])
    }

    /// Insert the shape or move/resize the existing one onto its target
    fn sync_shape(
        items: &mut Vec<Item>,
        index: &mut BoundsIndex,
        id: &str,
        target: ShapeTarget,
        slot: usize,
        outcome: &mut PassOutcome,
    ) {
        let (width, height) = match target.shape_type {
            ShapeType::Line => (target.bounds.width, 0.0),
            _ => (target.bounds.width, target.bounds.height),
        };

        let Some(pos) = position_of(items, id) else {
            let shape = Item::shape(id, target.shape_type, width, height)
                .at(target.bounds.x as i32, target.bounds.y as i32);
            let stroke = shape.as_shape().map_or(1.0, |s| s.stroke_width);
            index.predict(id, Self::predicted(target, stroke));
            items.insert(slot.min(items.len()), shape);
            outcome.resized += 1;
            return;
        };

        let item = &mut items[pos];
        let mut resized = false;
        let mut stroke = 1.0;
        if let ItemKind::Shape(shape) = &mut item.kind {
            stroke = shape.stroke_width;
            if (shape.width - width).abs() >= 0.5 || (shape.height - height).abs() >= 0.5 {
                shape.width = width;
                shape.height = height;
                resized = true;
            }
        }
        if resized {
            if let Some(current) = index.get(id) {
                let predicted = Self::predicted(target, stroke);
                index.predict(id, predicted.moved_to(current.x, current.y));
            }
            outcome.resized += 1;
        }
        outcome.record_move(index.move_item(item, target.bounds.x, target.bounds.y));
    }

    fn predicted(target: ShapeTarget, stroke: f64) -> Bounds {
        match target.shape_type {
            ShapeType::Line => Bounds::new(
                target.bounds.x,
                target.bounds.y,
                target.bounds.width,
                stroke.max(1.0),
            ),
            _ => target.bounds,
        }
    }
}
