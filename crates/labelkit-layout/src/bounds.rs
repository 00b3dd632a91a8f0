//! Bounds oracle contract and the per-iteration bounds cache
//!
//! Bounds are produced by the external renderer and are only trustworthy right
//! after a remeasure round-trip. Within one solver iteration passes read and
//! update a [`BoundsIndex`] snapshot instead of the oracle. The index is the
//! only place that moves items: [`BoundsIndex::move_item`] writes the item's
//! offsets and the cached rectangle in one step, so later passes in the same
//! iteration never see stale positions. Size changes (font scaling, QR shrink)
//! go through [`BoundsIndex::predict`], which marks the entry provisional until
//! the next snapshot.

use crate::geometry::shift_item_to;
use crate::reason::LayoutWarning;
use crate::types::{Bounds, Item, PreviewSize};
use rustc_hash::FxHashMap;
use std::future::Future;

/// External renderer as seen by the solver
///
/// Implementations own measurement. `remeasure` receives the committed item
/// list; once its future resolves, [`LayoutHost::bounds`] must reflect it.
pub trait LayoutHost {
    /// Most recently measured bounds for an item, `None` if not rendered yet
    fn bounds(&self, id: &str) -> Option<Bounds>;

    /// Current printable canvas extent (the solver applies the floors)
    fn preview_size(&self) -> PreviewSize;

    /// Re-render `items` and refresh the oracle
    fn remeasure(&mut self, items: &[Item]) -> impl Future<Output = ()>;

    /// Receive a caller-visible warning. Default drops it.
    fn warn(&mut self, warning: LayoutWarning) {
        let _ = warning;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Entry {
    bounds: Bounds,
    provisional: bool,
}

/// Id-keyed bounds snapshot for one solver iteration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundsIndex {
    entries: FxHashMap<String, Entry>,
}

impl BoundsIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot every item from the oracle
    ///
    /// Returns the ids that have no bounds yet as the error.
    pub fn snapshot<H: LayoutHost + ?Sized>(
        items: &[Item],
        host: &H,
    ) -> std::result::Result<Self, Vec<String>> {
        let mut index = Self::new();
        let mut missing = Vec::new();
        for item in items {
            match host.bounds(&item.id) {
                Some(bounds) => index.insert(&item.id, bounds),
                None => missing.push(item.id.clone()),
            }
        }
        if missing.is_empty() {
            Ok(index)
        } else {
            Err(missing)
        }
    }

    /// Record measured bounds
    pub fn insert(&mut self, id: &str, bounds: Bounds) {
        self.entries.insert(
            id.to_string(),
            Entry {
                bounds,
                provisional: false,
            },
        );
    }

    /// Record a predicted rectangle after a size mutation
    pub fn predict(&mut self, id: &str, bounds: Bounds) {
        self.entries.insert(
            id.to_string(),
            Entry {
                bounds,
                provisional: true,
            },
        );
    }

    #[inline]
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Bounds> {
        self.entries.get(id).map(|entry| entry.bounds)
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// True when the entry was predicted rather than measured
    #[must_use]
    pub fn is_provisional(&self, id: &str) -> bool {
        self.entries.get(id).is_some_and(|entry| entry.provisional)
    }

    /// True when any entry awaits a remeasure
    #[must_use]
    pub fn has_provisional(&self) -> bool {
        self.entries.values().any(|entry| entry.provisional)
    }

    pub fn remove(&mut self, id: &str) {
        self.entries.remove(id);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Move an item so its cached top-left lands on `(x, y)`
    ///
    /// Offsets change by the rounded delta and the cached rectangle follows by
    /// the same amount. Returns true if the item actually moved. Items without
    /// cached bounds are left alone.
    pub fn move_item(&mut self, item: &mut Item, x: f64, y: f64) -> bool {
        let Some(entry) = self.entries.get_mut(&item.id) else {
            return false;
        };
        let (dx, dy) = shift_item_to(item, &entry.bounds, x, y);
        if dx == 0 && dy == 0 {
            return false;
        }
        entry.bounds = entry
            .bounds
            .moved_to(entry.bounds.x + f64::from(dx), entry.bounds.y + f64::from(dy));
        true
    }

    /// Move an item by a delta in dots
    pub fn move_by(&mut self, item: &mut Item, dx: f64, dy: f64) -> bool {
        match self.get(&item.id) {
            Some(bounds) => self.move_item(item, bounds.x + dx, bounds.y + dy),
            None => false,
        }
    }
}

/// Snapshot bounds, remeasuring up to `retries` times while any are missing
///
/// `None` means the oracle never became ready; callers abort without mutating.
pub async fn ensure_bounds<H: LayoutHost>(
    items: &[Item],
    host: &mut H,
    retries: usize,
) -> Option<BoundsIndex> {
    let mut attempt = 0;
    loop {
        match BoundsIndex::snapshot(items, &*host) {
            Ok(index) => return Some(index),
            Err(missing) => {
                if attempt >= retries {
                    log::debug!(
                        "bounds still missing after {attempt} remeasures: {missing:?}"
                    );
                    return None;
                }
                attempt += 1;
                host.remeasure(items).await;
            }
        }
    }
}
