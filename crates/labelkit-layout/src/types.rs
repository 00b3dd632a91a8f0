/// Label item model shared by every detector and pass
///
/// Field names serialize in camelCase with an internal `type` tag so label
/// documents produced by the editor load without a translation layer.
use crate::error::{LayoutError, Result};
use crate::geometry::normalize_rotation;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// Smallest printable canvas width the solver will clamp against (dots)
pub const MIN_PREVIEW_WIDTH: f64 = 64.0;
/// Smallest printable canvas height the solver will clamp against (dots)
pub const MIN_PREVIEW_HEIGHT: f64 = 48.0;

/// Measured on-canvas rectangle in render-dot space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    /// Create bounds, flooring width and height at one dot
    #[inline]
    #[must_use = "returns new Bounds"]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width: width.max(1.0),
            height: height.max(1.0),
        }
    }

    #[inline]
    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    #[inline]
    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    #[inline]
    #[must_use]
    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    #[inline]
    #[must_use]
    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    #[inline]
    #[must_use]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Same size, new top-left
    #[inline]
    #[must_use = "returns moved Bounds"]
    pub fn moved_to(&self, x: f64, y: f64) -> Self {
        Self { x, y, ..*self }
    }
}

/// Printable canvas extent in dots
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreviewSize {
    pub width: f64,
    pub height: f64,
}

impl PreviewSize {
    #[inline]
    #[must_use = "returns new PreviewSize"]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Apply the solver floors (`width >= 64`, `height >= 48`)
    #[inline]
    #[must_use = "returns the floored PreviewSize"]
    pub fn floored(self) -> Self {
        Self {
            width: self.width.max(MIN_PREVIEW_WIDTH),
            height: self.height.max(MIN_PREVIEW_HEIGHT),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_landscape(&self) -> bool {
        self.width > self.height
    }
}

/// Flow items follow the feed axis; absolute items use explicit offsets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionMode {
    #[default]
    Flow,
    Absolute,
}

fn default_font_family() -> String {
    "sans-serif".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextItem {
    pub text: String,
    #[serde(default = "default_font_family")]
    pub font_family: String,
    pub font_size: f64,
    #[serde(default, rename = "textBold")]
    pub bold: bool,
    #[serde(default, rename = "textItalic")]
    pub italic: bool,
    #[serde(default, rename = "textUnderline")]
    pub underline: bool,
    #[serde(default, rename = "textStrikethrough")]
    pub strikethrough: bool,
}

impl TextItem {
    #[must_use]
    pub fn new(text: impl Into<String>, font_size: f64) -> Self {
        Self {
            text: text.into(),
            font_family: default_font_family(),
            font_size,
            bold: false,
            italic: false,
            underline: false,
            strikethrough: false,
        }
    }

    /// Number of style flags set, used to pick the richest style source
    #[must_use]
    pub fn style_weight(&self) -> usize {
        [self.bold, self.italic, self.underline, self.strikethrough]
            .iter()
            .filter(|flag| **flag)
            .count()
    }

    /// Estimated line height in dots: `max(8, round(fontSize * 1.15))`
    #[inline]
    #[must_use]
    pub fn line_height(&self) -> f64 {
        (self.font_size * 1.15).round().max(8.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrItem {
    pub data: String,
    pub size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarcodeItem {
    pub data: String,
    pub width: f64,
    pub height: f64,
    #[serde(default = "default_barcode_format")]
    pub barcode_format: String,
    #[serde(default = "default_module_width")]
    pub barcode_module_width: f64,
    #[serde(default)]
    pub barcode_margin: f64,
    #[serde(default = "default_true")]
    pub barcode_show_text: bool,
}

fn default_barcode_format() -> String {
    "CODE128".to_string()
}

const fn default_module_width() -> f64 {
    2.0
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageItem {
    #[serde(default)]
    pub source: String,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IconItem {
    pub icon: String,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShapeType {
    Rect,
    RoundRect,
    Oval,
    Line,
    Triangle,
    Polygon,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeItem {
    pub shape_type: ShapeType,
    pub width: f64,
    pub height: f64,
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f64,
    #[serde(default)]
    pub corner_radius: f64,
    #[serde(default)]
    pub sides: u32,
}

const fn default_stroke_width() -> f64 {
    2.0
}

impl ShapeItem {
    #[must_use]
    pub fn new(shape_type: ShapeType, width: f64, height: f64) -> Self {
        Self {
            shape_type,
            width,
            height,
            stroke_width: default_stroke_width(),
            corner_radius: 0.0,
            sides: 0,
        }
    }
}

/// Closed set of item kinds; passes match on this instead of probing fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ItemKind {
    Text(TextItem),
    Qr(QrItem),
    Barcode(BarcodeItem),
    Image(ImageItem),
    Icon(IconItem),
    Shape(ShapeItem),
}

/// One label item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    #[serde(default)]
    pub position_mode: PositionMode,
    #[serde(default)]
    pub x_offset: i32,
    #[serde(default)]
    pub y_offset: i32,
    #[serde(default)]
    pub rotation: f64,
    #[serde(flatten)]
    pub kind: ItemKind,
}

impl Item {
    /// Create a flow-positioned item at offset (0, 0)
    #[must_use]
    pub fn new(id: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            id: id.into(),
            position_mode: PositionMode::Flow,
            x_offset: 0,
            y_offset: 0,
            rotation: 0.0,
            kind,
        }
    }

    #[must_use]
    pub fn text(id: impl Into<String>, text: impl Into<String>, font_size: f64) -> Self {
        Self::new(id, ItemKind::Text(TextItem::new(text, font_size)))
    }

    #[must_use]
    pub fn qr(id: impl Into<String>, data: impl Into<String>, size: f64) -> Self {
        Self::new(
            id,
            ItemKind::Qr(QrItem {
                data: data.into(),
                size,
            }),
        )
    }

    #[must_use]
    pub fn barcode(id: impl Into<String>, data: impl Into<String>, width: f64, height: f64) -> Self {
        Self::new(
            id,
            ItemKind::Barcode(BarcodeItem {
                data: data.into(),
                width,
                height,
                barcode_format: default_barcode_format(),
                barcode_module_width: default_module_width(),
                barcode_margin: 0.0,
                barcode_show_text: true,
            }),
        )
    }

    #[must_use]
    pub fn shape(id: impl Into<String>, shape_type: ShapeType, width: f64, height: f64) -> Self {
        Self::new(id, ItemKind::Shape(ShapeItem::new(shape_type, width, height)))
    }

    /// Switch to absolute positioning at the given offsets
    #[must_use]
    pub fn at(mut self, x: i32, y: i32) -> Self {
        self.position_mode = PositionMode::Absolute;
        self.x_offset = x;
        self.y_offset = y;
        self
    }

    #[must_use]
    pub fn rotated(mut self, degrees: f64) -> Self {
        self.rotation = normalize_rotation(degrees);
        self
    }

    #[inline]
    #[must_use]
    pub fn is_absolute(&self) -> bool {
        self.position_mode == PositionMode::Absolute
    }

    #[inline]
    #[must_use]
    pub fn as_text(&self) -> Option<&TextItem> {
        match &self.kind {
            ItemKind::Text(text) => Some(text),
            _ => None,
        }
    }

    #[inline]
    pub fn as_text_mut(&mut self) -> Option<&mut TextItem> {
        match &mut self.kind {
            ItemKind::Text(text) => Some(text),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_shape(&self) -> Option<&ShapeItem> {
        match &self.kind {
            ItemKind::Shape(shape) => Some(shape),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self.kind, ItemKind::Text(_))
    }

    #[inline]
    #[must_use]
    pub fn is_qr(&self) -> bool {
        matches!(self.kind, ItemKind::Qr(_))
    }

    #[inline]
    #[must_use]
    pub fn is_barcode(&self) -> bool {
        matches!(self.kind, ItemKind::Barcode(_))
    }

    /// QR codes and barcodes must stay scannable, so passes avoid side-by-side squeezes
    #[inline]
    #[must_use]
    pub fn is_machine_readable(&self) -> bool {
        matches!(self.kind, ItemKind::Qr(_) | ItemKind::Barcode(_))
    }

    /// Font size for text items, `None` otherwise
    #[inline]
    #[must_use]
    pub fn font_size(&self) -> Option<f64> {
        self.as_text().map(|text| text.font_size)
    }

    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self.kind {
            ItemKind::Text(_) => "text",
            ItemKind::Qr(_) => "qr",
            ItemKind::Barcode(_) => "barcode",
            ItemKind::Image(_) => "image",
            ItemKind::Icon(_) => "icon",
            ItemKind::Shape(_) => "shape",
        }
    }
}

/// Label document as exchanged with the editor: canvas extent plus items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelDocument {
    pub preview_size: PreviewSize,
    pub items: Vec<Item>,
}

impl LabelDocument {
    /// Parse and validate a JSON label document
    ///
    /// Rotations are normalized into (-180, 180] on load.
    ///
    /// # Errors
    ///
    /// [`LayoutError::Json`] for malformed JSON, [`LayoutError::InvalidDocument`]
    /// when ids repeat or sizes are not positive.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut document: Self = serde_json::from_str(json)?;
        for item in &mut document.items {
            item.rotation = normalize_rotation(item.rotation);
        }
        document.validate()?;
        Ok(document)
    }

    /// Serialize as pretty-printed JSON
    ///
    /// # Errors
    ///
    /// [`LayoutError::Json`] if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check data model invariants
    ///
    /// # Errors
    ///
    /// [`LayoutError::InvalidDocument`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if !(self.preview_size.width > 0.0 && self.preview_size.height > 0.0) {
            return Err(LayoutError::InvalidDocument(format!(
                "preview size must be positive, got {}x{}",
                self.preview_size.width, self.preview_size.height
            )));
        }
        let mut seen = FxHashSet::default();
        for item in &self.items {
            if !seen.insert(item.id.as_str()) {
                return Err(LayoutError::InvalidDocument(format!(
                    "duplicate item id '{}'",
                    item.id
                )));
            }
            let positive = match &item.kind {
                ItemKind::Text(text) => text.font_size > 0.0,
                ItemKind::Qr(qr) => qr.size > 0.0,
                ItemKind::Barcode(barcode) => barcode.width > 0.0 && barcode.height > 0.0,
                ItemKind::Image(image) => image.width > 0.0 && image.height > 0.0,
                ItemKind::Icon(icon) => icon.width > 0.0 && icon.height > 0.0,
                ItemKind::Shape(shape) => shape.width >= 0.0 && shape.height >= 0.0,
            };
            if !positive {
                return Err(LayoutError::InvalidDocument(format!(
                    "{} item '{}' has a non-positive size",
                    item.kind_name(),
                    item.id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_floor_and_edges() {
        let bounds = Bounds::new(10.0, 20.0, 0.2, 30.0);
        assert_eq!(bounds.width, 1.0);
        assert_eq!(bounds.right(), 11.0);
        assert_eq!(bounds.bottom(), 50.0);
        assert_eq!(bounds.center_y(), 35.0);
    }

    #[test]
    fn test_preview_size_floors() {
        let preview = PreviewSize::new(20.0, 10.0).floored();
        assert_eq!(preview.width, 64.0);
        assert_eq!(preview.height, 48.0);
        assert!(preview.is_landscape());
    }

    #[test]
    fn test_line_height_estimate() {
        assert_eq!(TextItem::new("a", 20.0).line_height(), 23.0);
        assert_eq!(TextItem::new("a", 4.0).line_height(), 8.0);
    }

    #[test]
    fn test_item_json_uses_editor_field_names() {
        let json = r#"{
            "id": "t1",
            "type": "text",
            "positionMode": "absolute",
            "xOffset": 12,
            "yOffset": -3,
            "text": "Artikelname:",
            "fontSize": 16,
            "textUnderline": true
        }"#;
        let item: Item = serde_json::from_str(json).unwrap();
        assert!(item.is_absolute());
        assert_eq!(item.x_offset, 12);
        assert_eq!(item.y_offset, -3);
        let text = item.as_text().unwrap();
        assert!(text.underline);
        assert!(!text.bold);
        assert_eq!(text.font_family, "sans-serif");

        let back = serde_json::to_value(&item).unwrap();
        assert_eq!(back["type"], "text");
        assert_eq!(back["textUnderline"], true);
        assert_eq!(back["positionMode"], "absolute");
    }

    #[test]
    fn test_shape_type_round_trip_names() {
        let item = Item::shape("s", ShapeType::RoundRect, 20.0, 20.0);
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["shapeType"], "roundRect");
        assert_eq!(value["type"], "shape");
    }

    #[test]
    fn test_document_rejects_duplicate_ids() {
        let json = r#"{
            "previewSize": {"width": 300, "height": 100},
            "items": [
                {"id": "a", "type": "qr", "data": "x", "size": 40},
                {"id": "a", "type": "qr", "data": "y", "size": 40}
            ]
        }"#;
        let err = LabelDocument::from_json(json).unwrap_err();
        assert!(err.to_string().contains("duplicate item id 'a'"));
    }

    #[test]
    fn test_document_normalizes_rotation() {
        let json = r#"{
            "previewSize": {"width": 300, "height": 100},
            "items": [{"id": "a", "type": "text", "text": "x", "fontSize": 12, "rotation": 270}]
        }"#;
        let document = LabelDocument::from_json(json).unwrap();
        assert_eq!(document.items[0].rotation, -90.0);
    }
}
