//! Geometry helpers over measured [`Bounds`]
//!
//! All functions are pure except [`shift_item_to`], which writes offsets on the
//! item it is given. None of them touch a bounds cache; passes go through
//! [`BoundsIndex`](crate::bounds::BoundsIndex) so offsets and cached bounds move
//! together.

use crate::types::{Bounds, Item, PreviewSize};
use serde::{Deserialize, Serialize};

/// Penetration below this is treated as touching, not overlapping
const OVERLAP_EPSILON: f64 = 0.01;

/// Rotations closer to zero than this are treated as unrotated
const ROTATION_EPSILON: f64 = 0.01;

/// Tolerance for classifying a rotation as a quarter turn
const QUARTER_TURN_TOLERANCE: f64 = 12.0;

/// Per-axis penetration depth of two rectangles
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Overlap {
    pub overlap_x: f64,
    pub overlap_y: f64,
    pub area: f64,
}

impl Overlap {
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.area <= 0.0
    }
}

/// Intersection of two rectangles
///
/// Zero on every field unless the rectangles intersect on both axes.
#[must_use]
pub fn compute_bounds_overlap(a: &Bounds, b: &Bounds) -> Overlap {
    let overlap_x = a.right().min(b.right()) - a.x.max(b.x);
    let overlap_y = a.bottom().min(b.bottom()) - a.y.max(b.y);
    if overlap_x <= OVERLAP_EPSILON || overlap_y <= OVERLAP_EPSILON {
        return Overlap::default();
    }
    Overlap {
        overlap_x,
        overlap_y,
        area: overlap_x * overlap_y,
    }
}

/// Clamp a proposed top-left so a rectangle of `bounds`' size stays on the canvas
///
/// Items larger than the canvas pin to 0 on that axis.
#[must_use]
pub fn clamp_target(bounds: &Bounds, preview: PreviewSize, x: f64, y: f64) -> (f64, f64) {
    let max_x = (preview.width - bounds.width).max(0.0);
    let max_y = (preview.height - bounds.height).max(0.0);
    (x.clamp(0.0, max_x), y.clamp(0.0, max_y))
}

/// Accumulate the delta from `bounds`' top-left to `(x, y)` into the item offsets
///
/// Deltas are rounded to whole dots. An axis less than one dot from its target
/// counts as settled, so rectangles with fractional edges stop instead of
/// stepping across a whole-dot target. Returns the applied `(dx, dy)`.
pub fn shift_item_to(item: &mut Item, bounds: &Bounds, x: f64, y: f64) -> (i32, i32) {
    let dx = settled_delta(x - bounds.x);
    let dy = settled_delta(y - bounds.y);
    item.x_offset += dx;
    item.y_offset += dy;
    (dx, dy)
}

#[inline]
fn settled_delta(delta: f64) -> i32 {
    if delta.abs() < 1.0 {
        0
    } else {
        delta.round() as i32
    }
}

/// Axis-aligned box of `bounds` rotated about its center
#[must_use]
pub fn compute_rotated_bounds(bounds: &Bounds, rotation_degrees: f64) -> Bounds {
    let rotation = normalize_rotation(rotation_degrees);
    if rotation.abs() < ROTATION_EPSILON {
        return *bounds;
    }
    let (sin, cos) = rotation.to_radians().sin_cos();
    let width = bounds.width * cos.abs() + bounds.height * sin.abs();
    let height = bounds.width * sin.abs() + bounds.height * cos.abs();
    Bounds::new(
        bounds.center_x() - width / 2.0,
        bounds.center_y() - height / 2.0,
        width,
        height,
    )
}

/// Normalize degrees into (-180, 180]
#[must_use]
pub fn normalize_rotation(degrees: f64) -> f64 {
    if !degrees.is_finite() {
        return 0.0;
    }
    let mut rotation = degrees % 360.0;
    if rotation <= -180.0 {
        rotation += 360.0;
    } else if rotation > 180.0 {
        rotation -= 360.0;
    }
    rotation
}

/// True for rotations within a few degrees of +-90
#[must_use]
pub fn is_quarter_turn(degrees: f64) -> bool {
    (normalize_rotation(degrees).abs() - 90.0).abs() <= QUARTER_TURN_TOLERANCE
}

/// Smallest rectangle containing every input, `None` for an empty input
pub fn union_bounds<'a>(bounds: impl IntoIterator<Item = &'a Bounds>) -> Option<Bounds> {
    let mut iter = bounds.into_iter();
    let first = *iter.next()?;
    let (mut l, mut t, mut r, mut b) = (first.x, first.y, first.right(), first.bottom());
    for next in iter {
        l = l.min(next.x);
        t = t.min(next.y);
        r = r.max(next.right());
        b = b.max(next.bottom());
    }
    Some(Bounds::new(l, t, r - l, b - t))
}

/// Separation between the x-intervals of two rectangles (0 when they overlap)
#[inline]
#[must_use]
pub fn horizontal_gap(a: &Bounds, b: &Bounds) -> f64 {
    (a.x.max(b.x) - a.right().min(b.right())).max(0.0)
}

/// Separation between the y-intervals of two rectangles (0 when they overlap)
#[inline]
#[must_use]
pub fn vertical_gap(a: &Bounds, b: &Bounds) -> f64 {
    (a.y.max(b.y) - a.bottom().min(b.bottom())).max(0.0)
}

#[inline]
#[must_use]
pub fn center_distance(a: &Bounds, b: &Bounds) -> f64 {
    (a.center_x() - b.center_x()).hypot(a.center_y() - b.center_y())
}

/// Round a target coordinate into `[ceil(lo), floor(hi)]`
///
/// When the range is empty the lower bound wins, so targets never go negative.
#[must_use]
pub fn snap_within(value: f64, lo: f64, hi: f64) -> f64 {
    let lo = lo.ceil();
    let hi = hi.floor();
    if hi < lo {
        return lo;
    }
    value.round().clamp(lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap_disjoint() {
        let a = Bounds::new(0.0, 0.0, 10.0, 10.0);
        let b = Bounds::new(20.0, 0.0, 10.0, 10.0);
        assert_eq!(compute_bounds_overlap(&a, &b), Overlap::default());
    }

    #[test]
    fn test_overlap_one_axis_only_is_empty() {
        let a = Bounds::new(0.0, 0.0, 10.0, 10.0);
        let b = Bounds::new(5.0, 30.0, 10.0, 10.0);
        assert!(compute_bounds_overlap(&a, &b).is_empty());
    }

    #[test]
    fn test_overlap_depth_and_area() {
        let a = Bounds::new(0.0, 0.0, 10.0, 10.0);
        let b = Bounds::new(6.0, 7.0, 10.0, 10.0);
        let overlap = compute_bounds_overlap(&a, &b);
        assert_eq!(overlap.overlap_x, 4.0);
        assert_eq!(overlap.overlap_y, 3.0);
        assert_eq!(overlap.area, 12.0);
        assert_eq!(overlap, compute_bounds_overlap(&b, &a));
    }

    #[test]
    fn test_touching_edges_do_not_overlap() {
        let a = Bounds::new(0.0, 0.0, 10.0, 10.0);
        let b = Bounds::new(10.0, 0.0, 10.0, 10.0);
        assert!(compute_bounds_overlap(&a, &b).is_empty());
    }

    #[test]
    fn test_clamp_target() {
        let preview = PreviewSize::new(100.0, 50.0);
        let bounds = Bounds::new(0.0, 0.0, 30.0, 20.0);
        assert_eq!(clamp_target(&bounds, preview, -5.0, 40.0), (0.0, 30.0));
        assert_eq!(clamp_target(&bounds, preview, 90.0, 10.0), (70.0, 10.0));
    }

    #[test]
    fn test_clamp_target_oversized_item_pins_to_origin() {
        let preview = PreviewSize::new(100.0, 50.0);
        let bounds = Bounds::new(0.0, 0.0, 130.0, 20.0);
        assert_eq!(clamp_target(&bounds, preview, 12.0, 5.0), (0.0, 5.0));
    }

    #[test]
    fn test_shift_item_to_accumulates_rounded_delta() {
        let mut item = Item::text("t", "hello", 12.0).at(5, 5);
        let bounds = Bounds::new(7.0, 9.0, 40.0, 14.0);
        let delta = shift_item_to(&mut item, &bounds, 20.4, 3.6);
        assert_eq!(delta, (13, -5));
        assert_eq!((item.x_offset, item.y_offset), (18, 0));
    }

    #[test]
    fn test_shift_item_to_settles_sub_dot_deltas() {
        let mut item = Item::text("side", "Regal Ost", 12.0).at(2, 20).rotated(-90.0);
        let bounds = Bounds::new(3.5, 34.5, 14.4, 59.4);
        assert_eq!(shift_item_to(&mut item, &bounds, 4.0, 34.0), (0, 0));
        assert_eq!((item.x_offset, item.y_offset), (2, 20));

        let delta = shift_item_to(&mut item, &Bounds::new(24.5, -2.5, 14.4, 59.4), 4.0, 34.0);
        assert_eq!(delta, (-21, 37));
        assert_eq!((item.x_offset, item.y_offset), (-19, 57));
    }

    #[test]
    fn test_rotated_bounds_identity_for_zero() {
        let bounds = Bounds::new(10.0, 10.0, 40.0, 10.0);
        assert_eq!(compute_rotated_bounds(&bounds, 0.0), bounds);
        assert_eq!(compute_rotated_bounds(&bounds, 360.0), bounds);
    }

    #[test]
    fn test_rotated_bounds_quarter_turn_swaps_extent() {
        let bounds = Bounds::new(10.0, 10.0, 40.0, 10.0);
        let rotated = compute_rotated_bounds(&bounds, 90.0);
        assert!((rotated.width - 10.0).abs() < 1e-9);
        assert!((rotated.height - 40.0).abs() < 1e-9);
        assert!((rotated.center_x() - bounds.center_x()).abs() < 1e-9);
        assert!((rotated.center_y() - bounds.center_y()).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_rotation() {
        assert_eq!(normalize_rotation(270.0), -90.0);
        assert_eq!(normalize_rotation(-180.0), 180.0);
        assert_eq!(normalize_rotation(180.0), 180.0);
        assert_eq!(normalize_rotation(-450.0), -90.0);
        assert_eq!(normalize_rotation(f64::NAN), 0.0);
    }

    #[test]
    fn test_quarter_turn() {
        assert!(is_quarter_turn(90.0));
        assert!(is_quarter_turn(-85.0));
        assert!(is_quarter_turn(270.0));
        assert!(!is_quarter_turn(45.0));
        assert!(!is_quarter_turn(0.0));
    }

    #[test]
    fn test_union_and_gaps() {
        let a = Bounds::new(0.0, 0.0, 10.0, 10.0);
        let b = Bounds::new(30.0, 25.0, 10.0, 5.0);
        let union = union_bounds([&a, &b]).unwrap();
        assert_eq!(union, Bounds::new(0.0, 0.0, 40.0, 30.0));
        assert_eq!(horizontal_gap(&a, &b), 20.0);
        assert_eq!(vertical_gap(&a, &b), 15.0);
        assert!(union_bounds(std::iter::empty()).is_none());
    }

    #[test]
    fn test_snap_within() {
        assert_eq!(snap_within(4.4, 0.0, 10.0), 4.0);
        assert_eq!(snap_within(12.0, 0.0, 10.6), 10.0);
        assert_eq!(snap_within(-3.0, 0.2, 10.0), 1.0);
        assert_eq!(snap_within(5.0, 8.0, 3.0), 8.0);
    }
}
