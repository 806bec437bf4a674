//! Table of contents with back-patched page numbers.
//!
//! Entries are drawn before the sections they point at, so their page
//! numbers are unknown at emission time. Each entry remembers where its line
//! went; once the sections are laid out the numbers are drawn in place.

use serde::Serialize;
use tracing::warn;

use super::canvas::{DrawOp, PageCanvas};
use super::fonts::{FontStyle, TextMeasurer};
use super::layout::PageCursor;
use crate::theme::Rgb;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TocEntry {
    pub key: String,
    pub label: String,
    /// Page index the line was drawn on.
    pub source_page: usize,
    /// Baseline of the line.
    pub y: f32,
    /// 1-based page number of the target, once known.
    pub resolved_page: Option<usize>,
}

/// How TOC lines are drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TocStyle {
    pub x: f32,
    /// Right edge the page numbers are aligned to.
    pub right: f32,
    /// Width kept free for the page number.
    pub number_width: f32,
    pub font_size: f32,
    pub line_height: f32,
    pub color: Rgb,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Toc {
    entries: Vec<TocEntry>,
}

impl Toc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[TocEntry] {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&TocEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    /// Draw `label` at `cursor` without a page number and record the entry.
    /// Labels too long for the column are cut with an ellipsis.
    pub fn emit_placeholder(
        &mut self,
        canvas: &mut PageCanvas,
        measurer: &dyn TextMeasurer,
        label: &str,
        key: &str,
        cursor: PageCursor,
        style: &TocStyle,
    ) -> TocEntry {
        let room = style.right - style.number_width - style.x;
        let text = truncate_to_width(label, room, style.font_size, measurer);
        let baseline = cursor.y + style.font_size;
        canvas.draw(
            cursor.page,
            DrawOp::Text {
                x: style.x,
                y: baseline,
                text,
                style: FontStyle::Regular,
                size: style.font_size,
                color: style.color,
            },
        );

        let entry = TocEntry {
            key: key.to_string(),
            label: label.to_string(),
            source_page: cursor.page,
            y: baseline,
            resolved_page: None,
        };
        self.entries.push(entry.clone());
        entry
    }

    /// Record the page a section starts on. Returns false for an unknown key.
    pub fn resolve(&mut self, key: &str, page_number: usize) -> bool {
        match self.entries.iter_mut().find(|e| e.key == key) {
            Some(entry) => {
                entry.resolved_page = Some(page_number);
                true
            }
            None => {
                warn!(key = %key, "no table of contents entry to resolve");
                false
            }
        }
    }

    /// Draw every resolved page number right-aligned on its entry's line.
    /// Returns how many numbers were drawn; unresolved entries are skipped.
    pub fn back_patch(
        &self,
        canvas: &mut PageCanvas,
        measurer: &dyn TextMeasurer,
        style: &TocStyle,
    ) -> usize {
        let mut patched = 0;
        for entry in &self.entries {
            let Some(page) = entry.resolved_page else {
                warn!(key = %entry.key, "table of contents entry never resolved");
                continue;
            };
            let number = page.to_string();
            let width = measurer.text_width(&number, FontStyle::Regular, style.font_size);
            canvas.draw(
                entry.source_page,
                DrawOp::Text {
                    x: style.right - width,
                    y: entry.y,
                    text: number,
                    style: FontStyle::Regular,
                    size: style.font_size,
                    color: style.color,
                },
            );
            patched += 1;
        }
        patched
    }
}

/// Cut `text` so it fits `max_width`, ending with `…` when shortened.
pub fn truncate_to_width(
    text: &str,
    max_width: f32,
    size: f32,
    measurer: &dyn TextMeasurer,
) -> String {
    if measurer.text_width(text, FontStyle::Regular, size) <= max_width {
        return text.to_string();
    }
    let mut out: String = text.to_string();
    while out.pop().is_some() {
        let candidate = format!("{}\u{2026}", out.trim_end());
        if measurer.text_width(&candidate, FontStyle::Regular, size) <= max_width {
            return candidate;
        }
    }
    "\u{2026}".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::fonts::HelveticaMetrics;

    fn style() -> TocStyle {
        TocStyle {
            x: 50.0,
            right: 500.0,
            number_width: 40.0,
            font_size: 11.0,
            line_height: 18.0,
            color: Rgb::BLACK,
        }
    }

    #[test]
    fn placeholder_then_back_patch() {
        let mut canvas = PageCanvas::new(595.0, 842.0);
        canvas.new_page();
        canvas.new_page();
        let mut toc = Toc::new();
        let entry = toc.emit_placeholder(
            &mut canvas,
            &HelveticaMetrics,
            "Transports",
            "s1",
            PageCursor::new(1, 100.0),
            &style(),
        );
        assert_eq!(entry.source_page, 1);
        assert_eq!(entry.resolved_page, None);
        assert_eq!(canvas.texts(1).collect::<Vec<_>>(), vec!["Transports"]);

        assert!(toc.resolve("s1", 7));
        assert!(!toc.resolve("missing", 2));
        assert_eq!(toc.back_patch(&mut canvas, &HelveticaMetrics, &style()), 1);

        match canvas.ops(1).last() {
            Some(DrawOp::Text { x, y, text, .. }) => {
                assert_eq!(text, "7");
                assert_eq!(*y, entry.y);
                let w = HelveticaMetrics.text_width("7", FontStyle::Regular, 11.0);
                assert!((x + w - 500.0).abs() < 1e-3);
            }
            other => panic!("unexpected op {other:?}"),
        }
    }

    #[test]
    fn unresolved_entries_are_not_patched() {
        let mut canvas = PageCanvas::new(595.0, 842.0);
        canvas.new_page();
        let mut toc = Toc::new();
        toc.emit_placeholder(
            &mut canvas,
            &HelveticaMetrics,
            "A",
            "a",
            PageCursor::new(0, 10.0),
            &style(),
        );
        assert_eq!(toc.back_patch(&mut canvas, &HelveticaMetrics, &style()), 0);
        assert_eq!(canvas.ops(0).len(), 1);
    }

    #[test]
    fn long_labels_are_truncated() {
        let label = "Une politique du logement ambitieuse pour toutes les générations ".repeat(4);
        let cut = truncate_to_width(&label, 200.0, 11.0, &HelveticaMetrics);
        assert!(cut.ends_with('\u{2026}'));
        assert!(HelveticaMetrics.text_width(&cut, FontStyle::Regular, 11.0) <= 200.0);
        assert_eq!(truncate_to_width("Court", 200.0, 11.0, &HelveticaMetrics), "Court");
    }
}
