/// Barcode-photo fidelity pass
///
/// Canonical arrangement:
/// - side text at the left margin, vertically centered
/// - content column starting right of the side text
/// - token at the top of the content column
/// - code text right of the token, barcode left-aligned under the code
/// - every other item pushed out of the side text's column
use super::{canvas_target, clamp_items, position_of, PassOutcome};
use crate::bounds::BoundsIndex;
use crate::detectors::{BarcodePhotoConfig, BarcodePhotoRoles};
use crate::geometry::compute_bounds_overlap;
use crate::types::{Item, PreviewSize};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BarcodePhotoPass {
    config: BarcodePhotoConfig,
}

impl BarcodePhotoPass {
    #[inline]
    #[must_use = "returns a new BarcodePhotoPass instance"]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use = "returns a new BarcodePhotoPass with custom config"]
    pub const fn with_config(config: BarcodePhotoConfig) -> Self {
        Self { config }
    }

    pub fn apply(
        &self,
        items: &mut [Item],
        index: &mut BoundsIndex,
        roles: &BarcodePhotoRoles,
        preview: PreviewSize,
    ) -> PassOutcome {
        let mut outcome = PassOutcome::default();
        let (Some(code_pos), Some(barcode_pos)) = (
            position_of(items, &roles.code_text_id),
            position_of(items, &roles.barcode_id),
        ) else {
            return outcome;
        };
        let margin = self.config.side_margin;
        let content_gap = self.config.content_gap;

        // Side text
        let side = roles
            .side_text_id
            .as_deref()
            .and_then(|id| Some((position_of(items, id)?, index.get(id)?)));
        let mut content_left = None;
        if let Some((pos, bounds)) = side {
            let (x, y) = canvas_target(
                bounds.width,
                bounds.height,
                preview,
                margin,
                (preview.height - bounds.height) / 2.0,
            );
            outcome.record_move(index.move_item(&mut items[pos], x, y));
            content_left = index.get(&items[pos].id).map(|b| b.right() + content_gap);
        }
        let content_left = content_left.unwrap_or_else(|| {
            [Some(roles.code_text_id.as_str()), roles.token_id.as_deref(), Some(roles.barcode_id.as_str())]
                .into_iter()
                .flatten()
                .filter_map(|id| index.get(id))
                .map(|b| b.x)
                .fold(f64::INFINITY, f64::min)
        });

        // Token at the top of the content column
        let token = roles
            .token_id
            .as_deref()
            .and_then(|id| Some((position_of(items, id)?, index.get(id)?)));
        if let Some((pos, bounds)) = token {
            let (x, y) = canvas_target(bounds.width, bounds.height, preview, content_left, margin);
            outcome.record_move(index.move_item(&mut items[pos], x, y));
        }

        // Code text right of the token
        if let Some(code) = index.get(&roles.code_text_id) {
            let mut x = code.x.max(content_left);
            if let Some(token) = roles.token_id.as_deref().and_then(|id| index.get(id)) {
                let candidate = code.moved_to(x, code.y);
                if !compute_bounds_overlap(&candidate, &token).is_empty() {
                    x = token.right() + content_gap;
                }
            }
            let (x, y) = canvas_target(code.width, code.height, preview, x, code.y);
            outcome.record_move(index.move_item(&mut items[code_pos], x, y));
        }

        // Barcode under the code, moving the pair up when it runs off the bottom
        if let (Some(code), Some(barcode)) = (
            index.get(&roles.code_text_id),
            index.get(&roles.barcode_id),
        ) {
            let below = code.bottom() + self.config.barcode_gap;
            let overflow = below + barcode.height - preview.height;
            if overflow > 0.0 {
                let (x, y) = canvas_target(
                    code.width,
                    code.height,
                    preview,
                    code.x,
                    (code.y - overflow.ceil()).max(0.0),
                );
                outcome.record_move(index.move_item(&mut items[code_pos], x, y));
            }
            if let Some(code) = index.get(&roles.code_text_id) {
                let (x, y) = canvas_target(
                    barcode.width,
                    barcode.height,
                    preview,
                    code.x,
                    code.bottom() + self.config.barcode_gap,
                );
                outcome.record_move(index.move_item(&mut items[barcode_pos], x, y));
            }
        }

        // Everything else clears the side column
        if let Some((pos, _)) = side {
            if let Some(side_bounds) = index.get(&items[pos].id) {
                let limit = side_bounds.right() + content_gap;
                let role_ids: Vec<&str> = roles.ids().collect();
                for item in items.iter_mut() {
                    if role_ids.contains(&item.id.as_str()) {
                        continue;
                    }
                    let Some(bounds) = index.get(&item.id) else {
                        continue;
                    };
                    if bounds.x < limit {
                        let (x, y) = canvas_target(bounds.width, bounds.height, preview, limit, bounds.y);
                        outcome.record_move(index.move_item(item, x, y));
                    }
                }
            }
        }

        outcome.moved += clamp_items(items, index, preview);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Bounds;

    fn photo() -> (Vec<Item>, BoundsIndex, BarcodePhotoRoles) {
        let items = vec![
            Item::text("side", "Regal Ost", 12.0).at(30, 10).rotated(-90.0),
            Item::text("token", "7", 24.0).at(120, 40),
            Item::text("code", "4006381333931", 14.0).at(70, 20),
            Item::barcode("bc", "4006381333931", 160.0, 50.0).at(90, 70),
            Item::text("note", "Preis", 10.0).at(10, 100),
        ];
        let sizes = [(14.0, 70.0), (14.0, 29.0), (100.0, 17.0), (160.0, 50.0), (28.0, 12.0)];
        let mut index = BoundsIndex::new();
        for (item, (w, h)) in items.iter().zip(sizes) {
            index.insert(
                &item.id,
                Bounds::new(f64::from(item.x_offset), f64::from(item.y_offset), w, h),
            );
        }
        let roles = BarcodePhotoRoles {
            barcode_id: "bc".into(),
            code_text_id: "code".into(),
            side_text_id: Some("side".into()),
            token_id: Some("token".into()),
        };
        (items, index, roles)
    }

    #[test]
    fn test_canonical_arrangement() {
        let preview = PreviewSize::new(400.0, 128.0);
        let (mut items, mut index, roles) = photo();
        let outcome = BarcodePhotoPass::new().apply(&mut items, &mut index, &roles, preview);
        assert!(outcome.mutated());

        let side = index.get("side").unwrap();
        assert_eq!(side.x, 4.0);
        assert_eq!(side.y, 29.0);

        let token = index.get("token").unwrap();
        assert_eq!((token.x, token.y), (26.0, 4.0));

        let code = index.get("code").unwrap();
        assert!(code.x >= token.right());
        let barcode = index.get("bc").unwrap();
        assert_eq!(barcode.x, code.x);
        assert_eq!(barcode.y, code.bottom() + 4.0);
        assert!(barcode.bottom() <= 128.0);

        assert!(index.get("note").unwrap().x >= side.right() + 8.0);
    }

    #[test]
    fn test_second_run_is_stable() {
        let preview = PreviewSize::new(400.0, 128.0);
        let (mut items, mut index, roles) = photo();
        let pass = BarcodePhotoPass::new();
        pass.apply(&mut items, &mut index, &roles, preview);
        let again = pass.apply(&mut items, &mut index, &roles, preview);
        assert!(!again.mutated(), "{again:?}");
    }

    #[test]
    fn test_half_dot_side_text_settles() {
        let preview = PreviewSize::new(400.0, 128.0);
        let (mut items, mut index, roles) = photo();
        index.insert("side", Bounds::new(24.5, -2.5, 14.4, 59.4));
        let pass = BarcodePhotoPass::new();

        assert!(pass.apply(&mut items, &mut index, &roles, preview).mutated());
        let side = index.get("side").unwrap();
        assert_eq!((side.x, side.y), (3.5, 34.5));

        let again = pass.apply(&mut items, &mut index, &roles, preview);
        assert!(!again.mutated(), "{again:?}");
        assert_eq!(index.get("side").unwrap(), side);
    }
}
