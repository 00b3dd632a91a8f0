/// QR-form fidelity pass
///
/// Lays out a recognized QR form as a left text column and the QR code to its
/// right:
/// 1. Edge margin `m = max(2, round(min(W, H) * 0.02))`,
///    QR gap `g = max(4, round(W * 0.015))`
/// 2. QR target size `min(size, H - 2m)`
/// 3. Width pressure shrinks the QR first (down to the minimum QR size); only
///    when the column still does not fit are fonts scaled uniformly
/// 4. Fonts also scale when the rows do not stack into the canvas height with
///    the minimum row gap
/// 5. Rows stack top-to-bottom at the column x with an even gap, the block is
///    centered vertically; the QR sits right of the widest row
///
/// Style flags (bold, underline, ...) are never modified.
use super::{clamp_items, position_of, PassOutcome};
use crate::bounds::BoundsIndex;
use crate::detectors::{QrFormConfig, QrFormRoles};
use crate::geometry::snap_within;
use crate::types::{Bounds, Item, ItemKind, PreviewSize, TextItem};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QrFormPass {
    config: QrFormConfig,
}

/// Geometry of one text row during layout
struct RowMetrics {
    members: Vec<usize>,
    width: f64,
    height: f64,
}

impl QrFormPass {
    #[inline]
    #[must_use = "returns a new QrFormPass instance"]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use = "returns a new QrFormPass with custom config"]
    pub const fn with_config(config: QrFormConfig) -> Self {
        Self { config }
    }

    /// Edge margin for a canvas
    #[inline]
    #[must_use]
    pub fn edge_margin(preview: PreviewSize) -> f64 {
        (preview.width.min(preview.height) * 0.02).round().max(2.0)
    }

    /// Horizontal gap between the text column and the QR code
    #[inline]
    #[must_use]
    pub fn qr_gap(preview: PreviewSize) -> f64 {
        (preview.width * 0.015).round().max(4.0)
    }

    pub fn apply(
        &self,
        items: &mut [Item],
        index: &mut BoundsIndex,
        roles: &QrFormRoles,
        preview: PreviewSize,
    ) -> PassOutcome {
        let mut outcome = PassOutcome::default();
        let Some(qr_pos) = position_of(items, &roles.qr_id) else {
            return outcome;
        };
        let Some(qr_bounds) = index.get(&roles.qr_id) else {
            return outcome;
        };
        let ItemKind::Qr(qr) = &items[qr_pos].kind else {
            return outcome;
        };
        let current_qr = qr.size;

        let (width, height) = (preview.width, preview.height);
        let margin = Self::edge_margin(preview);
        let gap = Self::qr_gap(preview);
        let min_gap = self.config.min_row_gap;
        let usable_height = height - 2.0 * margin;
        let qr_floor = current_qr.min(self.config.min_qr_size);

        let mut rows = Self::measure_rows(items, index, roles, gap);
        if rows.is_empty() {
            return outcome;
        }
        let text_left = rows
            .iter()
            .flat_map(|row| &row.members)
            .filter_map(|&pos| index.get(&items[pos].id))
            .map(|bounds| bounds.x)
            .fold(f64::INFINITY, f64::min);

        // Width pressure: QR first, then fonts
        let widest = Self::widest(&rows);
        let mut column_x = snap_within(text_left, margin, width - margin - widest);
        let mut qr_size = current_qr.min(usable_height).max(qr_floor);
        let available = width - margin - gap - (column_x + widest);
        if qr_size > available {
            qr_size = available.floor().max(qr_floor);
        }
        let mut scale: f64 = 1.0;
        if column_x + widest + gap + qr_size > width - margin {
            column_x = margin;
            scale = scale.min((width - margin - qr_size - gap - column_x) / widest);
        }

        // Height pressure
        let stacked: f64 = rows.iter().map(|row| row.height.ceil()).sum();
        let gaps = min_gap * (rows.len() - 1) as f64;
        if stacked + gaps > usable_height {
            scale = scale.min((usable_height - gaps) / stacked);
        }

        if scale < 0.999 {
            outcome.resized += self.scale_fonts(items, index, &rows, scale);
            rows = Self::measure_rows(items, index, roles, gap);
        }

        if (qr_size - current_qr).abs() >= 0.5 {
            if let ItemKind::Qr(qr) = &mut items[qr_pos].kind {
                qr.size = qr_size;
            }
            index.predict(
                &roles.qr_id,
                Bounds::new(qr_bounds.x, qr_bounds.y, qr_size, qr_size),
            );
            outcome.resized += 1;
        }

        // Stack rows
        let line_height = rows
            .iter()
            .flat_map(|row| &row.members)
            .filter_map(|&pos| items[pos].as_text())
            .map(TextItem::line_height)
            .fold(0.0, f64::max);
        let max_gap = (line_height * self.config.max_row_gap_ratio).round().max(min_gap);
        let stacked: f64 = rows.iter().map(|row| row.height.ceil()).sum();
        let row_gap = if rows.len() > 1 {
            ((usable_height - stacked) / (rows.len() - 1) as f64)
                .floor()
                .clamp(min_gap, max_gap)
        } else {
            0.0
        };
        let block = stacked + row_gap * (rows.len() - 1) as f64;
        let mut cursor = margin + ((usable_height - block) / 2.0).floor().max(0.0);
        let mut column_right = column_x;
        for row in &rows {
            let mut x = column_x;
            for &pos in &row.members {
                let Some(bounds) = index.get(&items[pos].id) else {
                    continue;
                };
                outcome.record_move(index.move_item(&mut items[pos], x.round(), cursor));
                x += bounds.width + gap;
                column_right = column_right.max(x - gap);
            }
            cursor += row.height.ceil() + row_gap;
        }

        // QR right of the widest row
        if let Some(bounds) = index.get(&roles.qr_id) {
            let qr_x = snap_within(bounds.x, column_right + gap, width - margin - bounds.width);
            let qr_y = snap_within(bounds.y, margin, height - margin - bounds.height);
            outcome.record_move(index.move_item(&mut items[qr_pos], qr_x, qr_y));
        }

        outcome.moved += clamp_items(items, index, preview);
        outcome
    }

    fn measure_rows(
        items: &[Item],
        index: &BoundsIndex,
        roles: &QrFormRoles,
        gap: f64,
    ) -> Vec<RowMetrics> {
        roles
            .rows
            .iter()
            .filter_map(|ids| {
                let members: Vec<usize> = ids
                    .iter()
                    .filter_map(|id| position_of(items, id))
                    .filter(|&pos| index.contains(&items[pos].id))
                    .collect();
                let bounds: Vec<Bounds> = members
                    .iter()
                    .filter_map(|&pos| index.get(&items[pos].id))
                    .collect();
                if bounds.is_empty() {
                    return None;
                }
                let width = bounds.iter().map(|b| b.width).sum::<f64>()
                    + gap * (bounds.len() - 1) as f64;
                let height = bounds.iter().map(|b| b.height).fold(0.0, f64::max);
                Some(RowMetrics {
                    members,
                    width,
                    height,
                })
            })
            .collect()
    }

    fn widest(rows: &[RowMetrics]) -> f64 {
        rows.iter().map(|row| row.width).fold(0.0, f64::max)
    }

    /// Scale every row font by `scale`, floored at the minimum font size
    fn scale_fonts(
        &self,
        items: &mut [Item],
        index: &mut BoundsIndex,
        rows: &[RowMetrics],
        scale: f64,
    ) -> usize {
        let mut resized = 0;
        for &pos in rows.iter().flat_map(|row| &row.members) {
            let item = &mut items[pos];
            let Some(bounds) = index.get(&item.id) else {
                continue;
            };
            let Some(text) = item.as_text_mut() else {
                continue;
            };
            let scaled = (text.font_size * scale).floor().max(self.config.min_font_size);
            if scaled >= text.font_size {
                continue;
            }
            let ratio = scaled / text.font_size;
            text.font_size = scaled;
            index.predict(
                &item.id,
                Bounds::new(bounds.x, bounds.y, bounds.width * ratio, bounds.height * ratio),
            );
            resized += 1;
        }
        resized
    }
}
