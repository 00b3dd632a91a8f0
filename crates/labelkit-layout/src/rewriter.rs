/// Structural rewriter
///
/// Turns a matched, loosely drawn pattern into canonical items:
/// - marker group: one heading text, one square marker shape, one option text
/// - barcode photo: side text, big-letter token, code text and barcode in
///   that order, with duplicate texts removed
///
/// Style is copied from the richest source item of each role. Text items whose
/// content survives unchanged keep their ids; split or glyph-stripped sources
/// are replaced by items with fresh `<base>-<n>` ids. When every slot maps back
/// onto an existing item the rewrite is skipped so repeated runs do not churn.
use crate::bounds::BoundsIndex;
use crate::detectors::{normalize_code_text, BarcodePhotoConfig, BarcodePhotoRoles, MarkerGroupRoles};
use crate::geometry::is_quarter_turn;
use crate::reason::Reason;
use crate::text_lines::{strip_leading_marker, LineEntry};
use crate::types::{Item, ItemKind, ShapeItem, ShapeType, TextItem};
use rustc_hash::FxHashSet;

/// Smallest font a demoted option line may get
const MIN_OPTION_FONT_SIZE: f64 = 6.0;

/// Left margin kept free for a checkbox marker (dots)
pub const MARKER_LEFT_MARGIN: f64 = 11.0;

/// What a rewrite did to the item list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutcome {
    pub reason: Reason,
    pub removed: Vec<String>,
    pub inserted: Vec<String>,
}

impl RewriteOutcome {
    fn unchanged(reason: Reason) -> Self {
        Self {
            reason,
            removed: Vec::new(),
            inserted: Vec::new(),
        }
    }

    /// True if the item list was modified
    #[must_use]
    pub fn mutated(&self) -> bool {
        !self.removed.is_empty() || !self.inserted.is_empty() || self.reason == Reason::RewroteBarcodePhoto
    }
}

/// Deterministic fresh id: `<base>-<n>` with the smallest unused `n >= 1`
#[must_use]
pub fn fresh_id(taken: &FxHashSet<String>, base: &str) -> String {
    (1..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Marker square side for an option block: `round(0.9 * height)` clamped to
/// `[max(14, 1.2 fs), max(28, 2.2 fs)]`
#[must_use]
pub fn marker_size(option_block_height: f64, font_size: f64) -> f64 {
    let lo = (1.2 * font_size).max(14.0);
    let hi = (2.2 * font_size).max(28.0).max(lo);
    (0.9 * option_block_height).round().clamp(lo, hi)
}

/// Gap between marker and option text: `max(4, round(fs * 0.45))`
#[inline]
#[must_use]
pub fn marker_gap(font_size: f64) -> f64 {
    (font_size * 0.45).round().max(4.0)
}

/// Gap between heading and option: `max(6, round(lineHeight * 0.55))`
#[inline]
#[must_use]
pub fn heading_gap(heading_line_height: f64) -> f64 {
    (heading_line_height * 0.55).round().max(6.0)
}

/// Rebuild a marker group as heading + marker + option
pub fn rewrite_marker_group(
    items: &mut Vec<Item>,
    roles: &MarkerGroupRoles,
    index: &BoundsIndex,
) -> RewriteOutcome {
    let Some(heading_source) = richest_source(items, &roles.heading) else {
        return RewriteOutcome::unchanged(Reason::SkipNoHeadingLines);
    };
    let Some(option_source) = richest_source(items, &roles.option) else {
        return RewriteOutcome::unchanged(Reason::SkipNoOptionAnchor);
    };

    let heading_text = roles
        .heading
        .iter()
        .map(|entry| entry.line.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let option_text = roles
        .option
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            if i == 0 {
                strip_leading_marker(&entry.line).text
            } else {
                entry.line.clone()
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    let heading_reuse = dedicated_source(items, &roles.heading, &roles.option, &heading_text);
    let option_reuse = dedicated_source(items, &roles.option, &roles.heading, &option_text);
    if heading_reuse.is_some() && option_reuse.is_some() && roles.marker_shape_id.is_some() {
        return RewriteOutcome::unchanged(Reason::SkipSameStructure);
    }

    let heading_style = heading_source.clone();
    let option_style = option_source.clone();
    let heading_font = heading_style.font_size().unwrap_or(12.0);
    let mut option_font = option_style.font_size().unwrap_or(heading_font);
    if roles.is_monolith() && (option_font - heading_font).abs() < f64::EPSILON {
        option_font = (heading_font * 0.88).round().max(MIN_OPTION_FONT_SIZE);
    }

    // Target geometry in bounds space
    let heading_lh = TextItem::new("", heading_font).line_height();
    let option_lh = TextItem::new("", option_font).line_height();
    let heading_x = roles.heading[0].bounds.x;
    let heading_y = roles.heading[0].bounds.y;
    let option_y = heading_y + heading_lh * roles.heading.len() as f64 + heading_gap(heading_lh);
    let size = marker_size(option_lh * roles.option.len() as f64, option_font);
    let marker_x = heading_x.max(MARKER_LEFT_MARGIN);
    let marker_y = (option_y + ((option_lh - size) / 2.0).round()).max(0.0);
    let option_x = marker_x + size + marker_gap(option_font);

    let mut taken: FxHashSet<String> = items.iter().map(|item| item.id.clone()).collect();
    let mut next_id = |base: &str| {
        let id = fresh_id(&taken, base);
        taken.insert(id.clone());
        id
    };
    let heading_id = heading_reuse.clone().unwrap_or_else(|| next_id("heading"));
    let option_id = option_reuse.clone().unwrap_or_else(|| next_id("option"));
    let marker_id = roles.marker_shape_id.clone().unwrap_or_else(|| next_id("marker"));

    let mut heading = heading_style.clone();
    heading.id.clone_from(&heading_id);
    if let Some(text) = heading.as_text_mut() {
        text.text = heading_text;
        text.font_size = heading_font;
    }
    place(&mut heading, &heading_style, index, heading_x, heading_y);

    let mut option = option_style.clone();
    option.id.clone_from(&option_id);
    if let Some(text) = option.as_text_mut() {
        text.text = option_text;
        text.font_size = option_font;
    }
    place(&mut option, &option_style, index, option_x, option_y);

    let mut marker = match roles
        .marker_shape_id
        .as_deref()
        .and_then(|id| items.iter().find(|item| item.id == id))
    {
        Some(existing) => existing.clone(),
        None => {
            let mut shape = Item::new(
                marker_id.clone(),
                ItemKind::Shape(ShapeItem::new(ShapeType::Rect, size, size)),
            );
            shape.position_mode = option_style.position_mode;
            shape
        }
    };
    if let ItemKind::Shape(shape) = &mut marker.kind {
        shape.width = size;
        shape.height = size;
    }
    marker.rotation = 0.0;
    let marker_reference = if index.contains(&marker.id) {
        marker.clone()
    } else {
        option_style.clone()
    };
    place(&mut marker, &marker_reference, index, marker_x, marker_y);

    // Replace absorbed items at the position of the first one
    let absorbed: FxHashSet<&str> = roles
        .source_ids
        .iter()
        .map(String::as_str)
        .chain(roles.marker_shape_id.as_deref())
        .collect();
    let Some(insert_at) = items
        .iter()
        .position(|item| absorbed.contains(item.id.as_str()))
    else {
        return RewriteOutcome::unchanged(Reason::SkipNoTextItems);
    };
    let original_ids: Vec<String> = items
        .iter()
        .filter(|item| absorbed.contains(item.id.as_str()))
        .map(|item| item.id.clone())
        .collect();
    let mut group = Some([heading, marker, option]);
    let mut kept: Vec<Item> = Vec::with_capacity(items.len() + 3);
    for (position, item) in items.drain(..).enumerate() {
        if position == insert_at {
            kept.extend(group.take().into_iter().flatten());
        }
        if !absorbed.contains(item.id.as_str()) {
            kept.push(item);
        }
    }
    *items = kept;

    let new_ids = [heading_id, marker_id, option_id];
    RewriteOutcome {
        reason: Reason::RewroteMarkerGroup,
        removed: original_ids
            .iter()
            .filter(|id| !new_ids.contains(id))
            .cloned()
            .collect(),
        inserted: new_ids
            .iter()
            .filter(|id| !original_ids.contains(id))
            .cloned()
            .collect(),
    }
}

/// Rebuild a barcode photo as the side / token / code / barcode quad
///
/// Texts duplicating a role are dropped, the token is promoted to at least
/// `token_font_ratio` times the code font, texts get tidy whitespace and
/// quarter turns snap to exactly ±90°. The quad is emitted contiguously at the
/// position of its first member. Role ids are updated in place when a member
/// is replaced by a fresh id.
pub fn rewrite_barcode_photo(
    items: &mut Vec<Item>,
    roles: &mut BarcodePhotoRoles,
    config: &BarcodePhotoConfig,
) -> RewriteOutcome {
    let find = |id: &str| items.iter().find(|item| item.id == id);
    let Some(code_source) = find(roles.code_text_id.as_str()) else {
        return RewriteOutcome::unchanged(Reason::BarcodePhotoSkipNoCodeText);
    };
    let Some(barcode_source) = find(roles.barcode_id.as_str()) else {
        return RewriteOutcome::unchanged(Reason::BarcodePhotoSkipNoBarcode);
    };

    let role_ids: FxHashSet<String> = roles.ids().map(str::to_string).collect();
    let duplicates: FxHashSet<String> = role_ids
        .iter()
        .filter_map(|id| find(id.as_str()))
        .filter_map(|item| item.as_text())
        .map(|text| normalize_code_text(&text.text))
        .filter(|normalized| !normalized.is_empty())
        .collect();
    let redundant: Vec<String> = items
        .iter()
        .filter(|item| !role_ids.contains(&item.id))
        .filter(|item| {
            item.as_text()
                .is_some_and(|text| duplicates.contains(&normalize_code_text(&text.text)))
        })
        .map(|item| item.id.clone())
        .collect();

    // Canonical members in quad order, paired with their base id
    let mut quad: Vec<(&str, Item)> = Vec::with_capacity(4);
    if let Some(side) = roles.side_text_id.as_deref().and_then(|id| find(id)) {
        let mut item = side.clone();
        if is_quarter_turn(item.rotation) {
            item.rotation = 90.0_f64.copysign(item.rotation);
        }
        quad.push(("side", item));
    }
    if let Some(token) = roles.token_id.as_deref().and_then(|id| find(id)) {
        let mut item = token.clone();
        item.rotation = 0.0;
        if let (Some(code_font), Some(text)) = (code_source.font_size(), item.as_text_mut()) {
            text.font_size = text.font_size.max((code_font * config.token_font_ratio).ceil());
        }
        quad.push(("token", item));
    }
    let mut code = code_source.clone();
    code.rotation = 0.0;
    quad.push(("code", code));
    quad.push(("barcode", barcode_source.clone()));

    let Some(insert_at) = items.iter().position(|item| role_ids.contains(&item.id)) else {
        return RewriteOutcome::unchanged(Reason::BarcodePhotoSkipNoCodeText);
    };

    let mut taken: FxHashSet<String> = items.iter().map(|item| item.id.clone()).collect();
    let mut removed = redundant;
    let mut inserted = Vec::new();
    let mut members = Vec::with_capacity(quad.len());
    for (base, mut item) in quad {
        let mut retitled = false;
        if let Some(text) = item.as_text_mut() {
            let tidy = tidy_whitespace(&text.text);
            if tidy != text.text {
                text.text = tidy;
                retitled = true;
            }
        }
        if retitled {
            let source_id = std::mem::replace(&mut item.id, fresh_id(&taken, base));
            taken.insert(item.id.clone());
            roles.rename(&source_id, &item.id);
            removed.push(source_id);
            inserted.push(item.id.clone());
        }
        members.push(item);
    }

    let dropped: FxHashSet<&str> = role_ids
        .iter()
        .map(String::as_str)
        .chain(removed.iter().map(String::as_str))
        .collect();
    let mut rebuilt: Vec<Item> = Vec::with_capacity(items.len());
    let mut members = Some(members);
    for (position, item) in items.iter().enumerate() {
        if position == insert_at {
            rebuilt.extend(members.take().into_iter().flatten());
        }
        if !dropped.contains(item.id.as_str()) {
            rebuilt.push(item.clone());
        }
    }
    if rebuilt == *items {
        return RewriteOutcome::unchanged(Reason::SkipSameStructure);
    }
    *items = rebuilt;

    RewriteOutcome {
        reason: Reason::RewroteBarcodePhoto,
        removed,
        inserted,
    }
}

/// Trim every line, collapse interior whitespace runs and drop empty lines
fn tidy_whitespace(text: &str) -> String {
    text.split('\n')
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Source item with the most style flags among the lines' items
fn richest_source<'a>(items: &'a [Item], lines: &[LineEntry]) -> Option<&'a Item> {
    let mut best: Option<&Item> = None;
    for line in lines {
        let Some(item) = items.iter().find(|item| item.id == line.item_id) else {
            continue;
        };
        let weight = item.as_text().map_or(0, TextItem::style_weight);
        let best_weight = best.and_then(Item::as_text).map_or(0, TextItem::style_weight);
        if best.is_none() || weight > best_weight {
            best = Some(item);
        }
    }
    best
}

/// Id of the single item that holds exactly `lines` and nothing from `others`
fn dedicated_source(
    items: &[Item],
    lines: &[LineEntry],
    others: &[LineEntry],
    expected_text: &str,
) -> Option<String> {
    let id = &lines.first()?.item_id;
    if lines.iter().any(|line| &line.item_id != id) || others.iter().any(|line| &line.item_id == id) {
        return None;
    }
    let text = items.iter().find(|item| &item.id == id)?.as_text()?;
    let current = text
        .text
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    (current == expected_text).then(|| id.clone())
}

/// Set offsets so the item's top-left lands on `(x, y)` in bounds space
///
/// `reference` supplies the offset-to-bounds correction (its measured top-left
/// versus its offsets); without cached bounds the target is used as is.
fn place(item: &mut Item, reference: &Item, index: &BoundsIndex, x: f64, y: f64) {
    let (dx, dy) = index.get(&reference.id).map_or((0.0, 0.0), |bounds| {
        (
            f64::from(reference.x_offset) - bounds.x,
            f64::from(reference.y_offset) - bounds.y,
        )
    });
    item.x_offset = (x + dx).round() as i32;
    item.y_offset = (y + dy).round() as i32;
}
