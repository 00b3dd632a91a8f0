//! Shared fixtures for solver integration tests
#![allow(dead_code)]

use labelkit_layout::{
    Bounds, EstimatingMeasurer, Item, LayoutHost, LayoutSolver, NormalizeOptions,
    NormalizeResult, PreviewSize,
};

/// Run the default solver against the estimating host on a current-thread runtime
pub fn normalize(
    items: &mut Vec<Item>,
    preview: PreviewSize,
    options: NormalizeOptions,
) -> (NormalizeResult, EstimatingMeasurer) {
    normalize_with(&LayoutSolver::new(), items, preview, options)
}

pub fn normalize_with(
    solver: &LayoutSolver,
    items: &mut Vec<Item>,
    preview: PreviewSize,
    options: NormalizeOptions,
) -> (NormalizeResult, EstimatingMeasurer) {
    let mut host = EstimatingMeasurer::with_items(preview, items);
    let result = runtime().block_on(solver.normalize(items, &mut host, options));
    (result, host)
}

pub fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("Failed to build test runtime")
}

/// Estimated bounds of the item with `id`
pub fn bounds_of(items: &[Item], id: &str) -> Bounds {
    let item = items
        .iter()
        .find(|item| item.id == id)
        .unwrap_or_else(|| panic!("no item '{id}'"));
    EstimatingMeasurer::measure(item)
}

pub fn overlaps(a: &Bounds, b: &Bounds) -> bool {
    a.x < b.right() && b.x < a.right() && a.y < b.bottom() && b.y < a.bottom()
}

pub fn inside(bounds: &Bounds, preview: PreviewSize) -> bool {
    bounds.x >= 0.0
        && bounds.y >= 0.0
        && bounds.right() <= preview.width + 0.5
        && bounds.bottom() <= preview.height + 0.5
}

/// Renderer that never produces bounds
#[derive(Debug, Default)]
pub struct BlankHost {
    pub remeasures: usize,
    pub warnings: Vec<labelkit_layout::LayoutWarning>,
}

impl LayoutHost for BlankHost {
    fn bounds(&self, _id: &str) -> Option<Bounds> {
        None
    }

    fn preview_size(&self) -> PreviewSize {
        PreviewSize::new(300.0, 120.0)
    }

    async fn remeasure(&mut self, _items: &[Item]) {
        self.remeasures += 1;
    }

    fn warn(&mut self, warning: labelkit_layout::LayoutWarning) {
        self.warnings.push(warning);
    }
}

/// Six-row article label with a QR code sketched too far right and too low
pub fn article_label() -> Vec<Item> {
    let rows = [
        ("h1", "Artikelname:", 4),
        ("v1", "Hammermutter Nut 10 M8", 22),
        ("h2", "Artikelnummer:", 44),
        ("v2", "18123689", 62),
        ("h3", "Lagerplatz:", 84),
        ("v3", "R1-S5-F3", 102),
    ];
    let mut items: Vec<Item> = rows
        .iter()
        .map(|(id, text, y)| Item::text(*id, *text, 14.0).at(8, *y))
        .collect();
    for id in ["h1", "h2"] {
        if let Some(text) = items
            .iter_mut()
            .find(|item| item.id == id)
            .and_then(Item::as_text_mut)
        {
            text.underline = true;
        }
    }
    items.push(Item::qr("qr", "https://example.com/a/18123689", 88.0).at(250, 20));
    items
}
