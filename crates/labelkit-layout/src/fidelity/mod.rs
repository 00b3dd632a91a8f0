//! Fidelity passes
//!
//! A fidelity pass nudges the items of a recognized pattern toward the
//! canonical arrangement of that pattern. Passes read and write geometry only
//! through [`BoundsIndex`], so positions stay coherent within one iteration;
//! size changes are recorded as predictions until the next remeasure.
//!
//! Every pass is idempotent on its own output: run again on a converged layout
//! it reports no mutation, which is how the solver detects convergence.

pub mod barcode_photo;
pub mod boxed_barcode;
pub mod qr_form;

pub use barcode_photo::BarcodePhotoPass;
pub use boxed_barcode::BoxedBarcodePass;
pub use qr_form::QrFormPass;

use crate::bounds::BoundsIndex;
use crate::geometry::snap_within;
use crate::types::{Item, PreviewSize};

/// What one pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassOutcome {
    /// Items whose offsets changed
    pub moved: usize,
    /// Items whose size, font size or existence changed
    pub resized: usize,
}

impl PassOutcome {
    #[inline]
    #[must_use]
    pub const fn mutated(&self) -> bool {
        self.moved > 0 || self.resized > 0
    }

    pub(crate) fn record_move(&mut self, moved: bool) {
        if moved {
            self.moved += 1;
        }
    }
}

/// Target top-left for an item, rounded and kept inside the canvas
///
/// Items larger than the canvas pin to the origin on that axis.
#[must_use]
pub fn canvas_target(width: f64, height: f64, preview: PreviewSize, x: f64, y: f64) -> (f64, f64) {
    (
        snap_within(x, 0.0, preview.width - width),
        snap_within(y, 0.0, preview.height - height),
    )
}

/// Clamp every item with cached bounds into the canvas, returning how many moved
pub fn clamp_items(items: &mut [Item], index: &mut BoundsIndex, preview: PreviewSize) -> usize {
    let mut moved = 0;
    for item in items.iter_mut() {
        let Some(bounds) = index.get(&item.id) else {
            continue;
        };
        let inside = bounds.x >= 0.0
            && bounds.y >= 0.0
            && bounds.right() <= preview.width
            && bounds.bottom() <= preview.height;
        if inside {
            continue;
        }
        let dx = inward_shift(bounds.x, bounds.right(), preview.width);
        let dy = inward_shift(bounds.y, bounds.bottom(), preview.height);
        if index.move_by(item, dx, dy) {
            moved += 1;
        }
    }
    moved
}

/// Whole-dot shift that brings `[start, end]` inside `[0, extent]`
///
/// Spans wider than the extent move their start to 0.
fn inward_shift(start: f64, end: f64, extent: f64) -> f64 {
    if start < 0.0 || end - start > extent {
        (-start).ceil()
    } else if end > extent {
        -(end - extent).ceil()
    } else {
        0.0
    }
}

/// Position of the item with `id`
#[inline]
pub(crate) fn position_of(items: &[Item], id: &str) -> Option<usize> {
    items.iter().position(|item| item.id == id)
}
