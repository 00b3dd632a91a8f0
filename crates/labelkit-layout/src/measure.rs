//! Deterministic bounds estimation
//!
//! [`EstimatingMeasurer`] is a [`LayoutHost`] for callers without a renderer:
//! the CLI and the test suites. It approximates glyph advance with a fixed
//! ratio of the font size, so results are stable across platforms but are
//! not real font metrics.

use crate::bounds::LayoutHost;
use crate::geometry::compute_rotated_bounds;
use crate::reason::LayoutWarning;
use crate::types::{Bounds, Item, ItemKind, PreviewSize, ShapeType};
use rustc_hash::FxHashMap;

/// Average glyph advance as a fraction of the font size
const CHAR_WIDTH_RATIO: f64 = 0.55;
/// Extra advance of bold glyphs
const BOLD_WIDTH_FACTOR: f64 = 1.06;
/// Rendered line box as a fraction of the font size
const LINE_HEIGHT_RATIO: f64 = 1.2;

/// Layout host backed by estimated metrics
#[derive(Debug, Clone, PartialEq)]
pub struct EstimatingMeasurer {
    preview: PreviewSize,
    measured: FxHashMap<String, Bounds>,
    warnings: Vec<LayoutWarning>,
    remeasures: usize,
}

impl EstimatingMeasurer {
    /// Host with nothing measured yet; the first remeasure fills it
    #[inline]
    #[must_use = "returns a new EstimatingMeasurer instance"]
    pub fn new(preview: PreviewSize) -> Self {
        Self {
            preview,
            measured: FxHashMap::default(),
            warnings: Vec::new(),
            remeasures: 0,
        }
    }

    /// Host with `items` already measured
    #[must_use = "returns a new EstimatingMeasurer instance"]
    pub fn with_items(preview: PreviewSize, items: &[Item]) -> Self {
        let mut measurer = Self::new(preview);
        measurer.measure_all(items);
        measurer
    }

    /// Estimated on-canvas rectangle of one item
    #[must_use]
    pub fn measure(item: &Item) -> Bounds {
        let (width, height) = match &item.kind {
            ItemKind::Text(text) => {
                let lines: Vec<&str> = text.text.split('\n').collect();
                let longest = lines.iter().map(|line| line.chars().count()).max().unwrap_or(0);
                let mut width = longest as f64 * text.font_size * CHAR_WIDTH_RATIO;
                if text.bold {
                    width *= BOLD_WIDTH_FACTOR;
                }
                (width, lines.len() as f64 * text.font_size * LINE_HEIGHT_RATIO)
            }
            ItemKind::Qr(qr) => (qr.size, qr.size),
            ItemKind::Barcode(barcode) => (barcode.width, barcode.height),
            ItemKind::Image(image) => (image.width, image.height),
            ItemKind::Icon(icon) => (icon.width, icon.height),
            ItemKind::Shape(shape) => match shape.shape_type {
                ShapeType::Line => (shape.width, shape.stroke_width.max(1.0)),
                _ => (shape.width, shape.height),
            },
        };
        let upright = Bounds::new(
            f64::from(item.x_offset),
            f64::from(item.y_offset),
            width,
            height,
        );
        compute_rotated_bounds(&upright, item.rotation)
    }

    fn measure_all(&mut self, items: &[Item]) {
        self.measured = items
            .iter()
            .map(|item| (item.id.clone(), Self::measure(item)))
            .collect();
    }

    /// Warnings received so far
    #[must_use]
    pub fn warnings(&self) -> &[LayoutWarning] {
        &self.warnings
    }

    /// Number of remeasure round-trips served
    #[must_use]
    pub const fn remeasure_count(&self) -> usize {
        self.remeasures
    }
}

impl LayoutHost for EstimatingMeasurer {
    fn bounds(&self, id: &str) -> Option<Bounds> {
        self.measured.get(id).copied()
    }

    fn preview_size(&self) -> PreviewSize {
        self.preview
    }

    async fn remeasure(&mut self, items: &[Item]) {
        self.measure_all(items);
        self.remeasures += 1;
    }

    fn warn(&mut self, warning: LayoutWarning) {
        log::warn!("layout warning: {warning:?}");
        self.warnings.push(warning);
    }
}
