/// Text Line Analyzer
///
/// Splits text items into per-line entries so detectors can reason about
/// headings and option rows that the model packed into one multiline item.
///
/// Per-line bounds are synthesized: the renderer only reports one rectangle per
/// item, so a cursor walks down from the item's measured top using the
/// estimated line height `max(8, round(fontSize * 1.15))`. Line widths scale
/// with character count relative to the item's longest line.
use crate::bounds::BoundsIndex;
use crate::types::{Bounds, Item};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Approximate advance of one character relative to the font size, used only
/// when an item has no measured bounds yet
const FALLBACK_CHAR_WIDTH_RATIO: f64 = 0.55;

// Checkbox glyphs may touch the following word; bullets need whitespace (or
// end of line) so "-5°C" and "*NEW*" are not read as list markers.
static MARKER_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:[☐□▢◻]\s*|\[\s?\]\s*|[-*•](?:\s+|$))")
        .expect("Invalid marker token regex")
});

/// One non-empty line of a text item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineEntry {
    pub line: String,
    pub item_id: String,
    /// Line index inside the source item (empty lines count)
    pub line_index: usize,
    /// Running index over all emitted entries
    pub global_index: usize,
    pub has_marker: bool,
    pub bounds: Bounds,
    pub font_size: f64,
}

/// Result of [`strip_leading_marker`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrippedLine {
    pub text: String,
    pub removed_marker: bool,
}

/// True when the line starts with a checkbox glyph or a bullet
#[must_use]
pub fn has_leading_marker(line: &str) -> bool {
    MARKER_TOKEN.is_match(line)
}

/// Remove exactly one leading marker token and collapse interior whitespace
#[must_use]
pub fn strip_leading_marker(line: &str) -> StrippedLine {
    let (rest, removed_marker) = match MARKER_TOKEN.find(line) {
        Some(token) => (&line[token.end()..], true),
        None => (line, false),
    };
    StrippedLine {
        text: rest.split_whitespace().collect::<Vec<_>>().join(" "),
        removed_marker,
    }
}

/// Produce ordered line entries for the text items among `items`
///
/// Non-text items are ignored. Items are processed in the order given, so
/// callers pass them in reading order.
#[must_use]
pub fn analyze_text_lines(items: &[&Item], bounds: &BoundsIndex) -> Vec<LineEntry> {
    let mut entries = Vec::new();
    for item in items {
        let Some(text) = item.as_text() else {
            continue;
        };
        let lines: Vec<&str> = text.text.split('\n').collect();
        let longest = lines
            .iter()
            .map(|line| line.trim().chars().count())
            .max()
            .unwrap_or(0)
            .max(1);
        let item_bounds = bounds.get(&item.id).unwrap_or_else(|| {
            Bounds::new(
                f64::from(item.x_offset),
                f64::from(item.y_offset),
                longest as f64 * text.font_size * FALLBACK_CHAR_WIDTH_RATIO,
                text.line_height() * lines.len() as f64,
            )
        });
        let line_height = text.line_height();

        let mut cursor = item_bounds.y;
        for (line_index, raw) in lines.iter().enumerate() {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                let chars = trimmed.chars().count() as f64;
                let width = item_bounds.width * (chars / longest as f64);
                entries.push(LineEntry {
                    line: trimmed.to_string(),
                    item_id: item.id.clone(),
                    line_index,
                    global_index: entries.len(),
                    has_marker: has_leading_marker(raw),
                    bounds: Bounds::new(item_bounds.x, cursor, width, line_height),
                    font_size: text.font_size,
                });
            }
            cursor += line_height;
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_detection() {
        assert!(has_leading_marker("☐ Yes"));
        assert!(has_leading_marker("  □Yes"));
        assert!(has_leading_marker("[ ] accept"));
        assert!(has_leading_marker("[] accept"));
        assert!(has_leading_marker("- item"));
        assert!(has_leading_marker("• item"));
        assert!(has_leading_marker("*"));
        assert!(!has_leading_marker("-5°C"));
        assert!(!has_leading_marker("*NEW*"));
        assert!(!has_leading_marker("Artikelname:"));
        assert!(!has_leading_marker("[x] done"));
    }

    #[test]
    fn test_strip_leading_marker_removes_one_token() {
        let stripped = strip_leading_marker(" ☐  Ja,   ich   stimme zu ");
        assert_eq!(stripped.text, "Ja, ich stimme zu");
        assert!(stripped.removed_marker);

        let nested = strip_leading_marker("- - nested");
        assert_eq!(nested.text, "- nested");
    }

    #[test]
    fn test_strip_without_marker_only_collapses() {
        let stripped = strip_leading_marker("Plain   text");
        assert_eq!(stripped.text, "Plain text");
        assert!(!stripped.removed_marker);
    }

    #[test]
    fn test_analyze_lines_walks_cursor() {
        let item = Item::text("t", "Heading\n\n☐ Option", 20.0).at(10, 5);
        let mut index = BoundsIndex::new();
        index.insert("t", Bounds::new(10.0, 5.0, 80.0, 70.0));

        let entries = analyze_text_lines(&[&item], &index);
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].line, "Heading");
        assert_eq!(entries[0].line_index, 0);
        assert!(!entries[0].has_marker);
        assert_eq!(entries[0].bounds.y, 5.0);
        assert_eq!(entries[0].bounds.height, 23.0);

        assert_eq!(entries[1].line, "☐ Option");
        assert_eq!(entries[1].line_index, 2);
        assert_eq!(entries[1].global_index, 1);
        assert!(entries[1].has_marker);
        // two line heights below the top, the empty line still advances
        assert_eq!(entries[1].bounds.y, 51.0);
    }

    #[test]
    fn test_analyze_lines_skips_non_text() {
        let qr = Item::qr("q", "data", 40.0);
        let text = Item::text("t", "one", 10.0);
        let entries = analyze_text_lines(&[&qr, &text], &BoundsIndex::new());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].item_id, "t");
    }
}
