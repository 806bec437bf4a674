//! Programme document layout: cover, table of contents, sections, appendix
//! index. Footers are stamped on the finished PDF, see
//! [`super::pdf::stamp_footers`].

use std::collections::HashMap;

use campaign_state::{DocumentNode, FileAttachment, ListStyle, ProgramItem, ProgramSection};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::appendix::{collect_appendix, AppendixEntry, AttachmentKind};
use super::canvas::{DrawOp, PageCanvas};
use super::fonts::{FontStyle, TextMeasurer};
use super::layout::{
    layout_image, layout_paragraph, ImageConstraints, PageCursor, PageGeometry, TextConstraints,
};
use super::runs::{parse_inline, restyle, InlineRun};
use super::toc::{Toc, TocStyle};
use crate::cancel::CancellationToken;
use crate::obs;
use crate::theme::{Rgb, SiteTheme};
use crate::Result;

/// TOC key of the appendix index.
pub const APPENDIX_KEY: &str = "appendix";

/// Point sizes of the text roles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FontSizes {
    pub cover_title: f32,
    pub cover_subtitle: f32,
    pub section_title: f32,
    pub item_title: f32,
    pub body: f32,
    pub toc: f32,
    pub footer: f32,
}

impl Default for FontSizes {
    fn default() -> Self {
        Self {
            cover_title: 28.0,
            cover_subtitle: 16.0,
            section_title: 20.0,
            item_title: 13.0,
            body: 10.5,
            toc: 11.0,
            footer: 8.0,
        }
    }
}

impl FontSizes {
    fn header(&self, level: u8) -> f32 {
        match level {
            1 => self.body + 5.5,
            2 => self.body + 3.5,
            3 => self.body + 2.0,
            _ => self.body + 1.0,
        }
    }
}

/// Fixed wording printed in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportLabels {
    pub toc_title: String,
    pub appendix_title: String,
    pub attachments: String,
    pub generated_on: String,
    pub annex: String,
    pub merged_note: String,
    pub online_note: String,
}

impl Default for ExportLabels {
    fn default() -> Self {
        Self {
            toc_title: "Sommaire".to_string(),
            appendix_title: "Annexes".to_string(),
            attachments: "Pièces jointes".to_string(),
            generated_on: "Document généré le".to_string(),
            annex: "annexe".to_string(),
            merged_note: "jointe en fin de document".to_string(),
            online_note: "disponible en ligne".to_string(),
        }
    }
}

/// A sub-item with its body.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemContent {
    pub item: ProgramItem,
    pub body: Vec<DocumentNode>,
}

/// A section with its body and items, in display order.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionContent {
    pub section: ProgramSection,
    pub body: Vec<DocumentNode>,
    pub items: Vec<ItemContent>,
}

/// Everything the layout reads from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramContent {
    pub theme: SiteTheme,
    pub sections: Vec<SectionContent>,
}

impl ProgramContent {
    pub fn program_sections(&self) -> Vec<ProgramSection> {
        self.sections.iter().map(|s| s.section.clone()).collect()
    }

    /// Image URLs in document order, without duplicates.
    pub fn image_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = Vec::new();
        let mut push = |url: &Option<String>| {
            if let Some(url) = url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
                if !urls.iter().any(|u| u == url) {
                    urls.push(url.to_string());
                }
            }
        };
        for section in &self.sections {
            push(&section.section.image_url);
            for item in &section.items {
                push(&item.item.image_url);
            }
        }
        urls
    }
}

/// Result of laying out the primary document.
#[derive(Debug, Clone)]
pub struct ComposedDocument {
    pub canvas: PageCanvas,
    pub toc: Toc,
    /// 1-based page on which each section heading was drawn, by section id.
    pub heading_pages: Vec<(String, usize)>,
    pub appendix: Vec<AppendixEntry>,
    pub sections_rendered: usize,
    pub images_placed: usize,
    /// URLs of images that were referenced but not drawn.
    pub images_skipped: Vec<String>,
}

/// Lays the programme out on a [`PageCanvas`].
pub struct DocumentComposer<'a> {
    pub geometry: PageGeometry,
    pub sizes: FontSizes,
    pub labels: &'a ExportLabels,
    pub theme: &'a SiteTheme,
    pub measurer: &'a dyn TextMeasurer,
    pub image_max_height: f32,
    pub generated_on: NaiveDate,
}

struct Pass<'c> {
    canvas: PageCanvas,
    toc: Toc,
    images: &'c HashMap<String, Vec<u8>>,
    images_placed: usize,
    images_skipped: Vec<String>,
    next_annex: usize,
}

impl<'a> DocumentComposer<'a> {
    /// Lay out cover, TOC, sections and appendix, then back-patch the TOC
    /// page numbers. `images` maps image URLs to fetched bytes; URLs without bytes
    /// leave their image slot empty.
    #[instrument(skip_all, fields(sections = content.sections.len()))]
    pub fn compose(
        &self,
        content: &ProgramContent,
        images: &HashMap<String, Vec<u8>>,
        cancel: &CancellationToken,
    ) -> Result<ComposedDocument> {
        let appendix = collect_appendix(&content.program_sections());
        let mut pass = Pass {
            canvas: PageCanvas::new(self.geometry.page_width, self.geometry.page_height),
            toc: Toc::new(),
            images,
            images_placed: 0,
            images_skipped: Vec::new(),
            next_annex: 1,
        };

        self.draw_cover(&mut pass);
        self.draw_toc(&mut pass, content, !appendix.is_empty());

        let mut heading_pages = Vec::with_capacity(content.sections.len());
        for (index, section) in content.sections.iter().enumerate() {
            cancel.check()?;
            let page = self.draw_section(&mut pass, index, section);
            heading_pages.push((section.section.section_id.clone(), page));
        }

        if !appendix.is_empty() {
            cancel.check()?;
            self.draw_appendix(&mut pass, &appendix);
        }

        let patched = pass
            .toc
            .back_patch(&mut pass.canvas, self.measurer, &self.toc_style());
        debug!(
            pages = pass.canvas.page_count(),
            toc_entries = patched,
            "layout complete"
        );

        Ok(ComposedDocument {
            canvas: pass.canvas,
            toc: pass.toc,
            heading_pages,
            appendix,
            sections_rendered: content.sections.len(),
            images_placed: pass.images_placed,
            images_skipped: pass.images_skipped,
        })
    }

    fn text(&self, size: f32) -> TextConstraints {
        TextConstraints::new(&self.geometry, size).with_color(self.theme.text)
    }

    fn toc_style(&self) -> TocStyle {
        TocStyle {
            x: self.geometry.margin_left,
            right: self.geometry.page_width - self.geometry.margin_right,
            number_width: 36.0,
            font_size: self.sizes.toc,
            line_height: self.sizes.toc * 1.8,
            color: self.theme.text,
        }
    }

    fn fresh_page(&self, canvas: &mut PageCanvas) -> PageCursor {
        PageCursor::new(canvas.new_page(), self.geometry.margin_top)
    }

    fn draw_cover(&self, pass: &mut Pass<'_>) {
        let canvas = &mut pass.canvas;
        let page = canvas.new_page();
        let band = self.geometry.page_height * 0.36;
        canvas.draw(
            page,
            DrawOp::Rect {
                x: 0.0,
                y: 0.0,
                width: self.geometry.page_width,
                height: band,
                color: self.theme.primary,
            },
        );

        let title = restyle(parse_inline(&self.theme.document_title), true, false);
        let c = self.text(self.sizes.cover_title).with_color(Rgb::WHITE);
        let cursor = layout_paragraph(
            canvas,
            self.measurer,
            &title,
            PageCursor::new(page, band * 0.45),
            &c,
        );
        let c = self.text(self.sizes.cover_subtitle).with_color(Rgb::WHITE);
        layout_paragraph(
            canvas,
            self.measurer,
            &[InlineRun::plain(self.theme.organization_name.clone())],
            cursor.advance(6.0),
            &c,
        );

        if let Some(slogan) = &self.theme.slogan {
            let c = self
                .text(self.sizes.cover_subtitle)
                .with_color(self.theme.secondary);
            layout_paragraph(
                canvas,
                self.measurer,
                &restyle(parse_inline(slogan), false, true),
                PageCursor::new(page, band + 36.0),
                &c,
            );
        }

        let stamp = format!(
            "{} {}",
            self.labels.generated_on,
            self.generated_on.format("%d/%m/%Y")
        );
        let c = self.text(self.sizes.body).with_color(self.theme.muted);
        layout_paragraph(
            canvas,
            self.measurer,
            &[InlineRun::plain(stamp)],
            PageCursor::new(page, self.geometry.bottom_limit() - c.line_height),
            &c,
        );
    }

    fn draw_toc(&self, pass: &mut Pass<'_>, content: &ProgramContent, with_appendix: bool) {
        let style = self.toc_style();
        let mut cursor = self.fresh_page(&mut pass.canvas);
        cursor = self.heading(
            &mut pass.canvas,
            &self.labels.toc_title,
            self.sizes.section_title,
            self.theme.primary,
            cursor,
        );

        let mut lines: Vec<(String, String)> = content
            .sections
            .iter()
            .enumerate()
            .map(|(i, s)| {
                (
                    s.section.section_id.clone(),
                    format!("{}. {}", i + 1, s.section.title),
                )
            })
            .collect();
        if with_appendix {
            lines.push((APPENDIX_KEY.to_string(), self.labels.appendix_title.clone()));
        }

        for (key, label) in lines {
            if cursor.y + style.line_height > self.geometry.bottom_limit() {
                cursor = cursor.next_page(&mut pass.canvas, self.geometry.margin_top);
            }
            pass.toc.emit_placeholder(
                &mut pass.canvas,
                self.measurer,
                &label,
                &key,
                cursor,
                &style,
            );
            cursor = cursor.advance(style.line_height);
        }
    }

    /// Bold title with an accent rule underneath.
    fn heading(
        &self,
        canvas: &mut PageCanvas,
        title: &str,
        size: f32,
        color: Rgb,
        cursor: PageCursor,
    ) -> PageCursor {
        let runs = restyle(parse_inline(title), true, false);
        let cursor = layout_paragraph(
            canvas,
            self.measurer,
            &runs,
            cursor,
            &self.text(size).with_color(color),
        );
        let y = cursor.y + 2.0;
        canvas.draw(
            cursor.page,
            DrawOp::Line {
                x1: self.geometry.margin_left,
                y1: y,
                x2: self.geometry.page_width - self.geometry.margin_right,
                y2: y,
                width: 1.5,
                color: self.theme.accent,
            },
        );
        cursor.advance(14.0)
    }

    /// Returns the 1-based page of the section heading.
    fn draw_section(&self, pass: &mut Pass<'_>, index: usize, content: &SectionContent) -> usize {
        let section = &content.section;
        let cursor = self.fresh_page(&mut pass.canvas);
        let page_number = cursor.page + 1;
        pass.toc.resolve(&section.section_id, page_number);

        let title = format!("{}. {}", index + 1, section.title);
        let mut cursor = self.heading(
            &mut pass.canvas,
            &title,
            self.sizes.section_title,
            self.theme.primary,
            cursor,
        );
        cursor = self.image(pass, section.image_url.as_deref(), cursor);
        cursor = self.blocks(&mut pass.canvas, &content.body, cursor);
        cursor = self.attachment_refs(pass, &section.attachments, cursor);

        for (n, item) in content.items.iter().enumerate() {
            cursor = cursor.advance(6.0);
            let runs = restyle(
                parse_inline(&format!("{}. {}", n + 1, item.item.title)),
                true,
                false,
            );
            let c = self
                .text(self.sizes.item_title)
                .with_color(self.theme.secondary);
            cursor = layout_paragraph(&mut pass.canvas, self.measurer, &runs, cursor, &c);
            cursor = cursor.advance(4.0);
            cursor = self.image(pass, item.item.image_url.as_deref(), cursor);
            cursor = self.blocks(&mut pass.canvas, &item.body, cursor);
            cursor = self.attachment_refs(pass, &item.item.attachments, cursor);
        }

        debug!(section = %section.section_id, page = page_number, end_page = cursor.page + 1, "section laid out");
        page_number
    }

    fn image(&self, pass: &mut Pass<'_>, url: Option<&str>, cursor: PageCursor) -> PageCursor {
        let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) else {
            return cursor;
        };
        let Some(bytes) = pass.images.get(url) else {
            pass.images_skipped.push(url.to_string());
            return cursor;
        };
        let c = ImageConstraints::new(&self.geometry, self.image_max_height);
        match layout_image(&mut pass.canvas, bytes, cursor, &c) {
            Ok(next) => {
                pass.images_placed += 1;
                next
            }
            Err(e) => {
                obs::emit_asset_skipped("image", url, &e);
                pass.images_skipped.push(url.to_string());
                cursor
            }
        }
    }

    fn blocks(
        &self,
        canvas: &mut PageCanvas,
        blocks: &[DocumentNode],
        mut cursor: PageCursor,
    ) -> PageCursor {
        let body = self.text(self.sizes.body);
        let gap = self.sizes.body * 0.6;
        for block in blocks {
            let before = cursor;
            cursor = match block {
                DocumentNode::Paragraph { text } => {
                    layout_paragraph(canvas, self.measurer, &parse_inline(text), cursor, &body)
                }
                DocumentNode::Header { text, level } => {
                    let runs = restyle(parse_inline(text), true, false);
                    let c = self.text(self.sizes.header(*level)).with_color(self.theme.primary);
                    layout_paragraph(canvas, self.measurer, &runs, cursor.advance(gap), &c)
                }
                DocumentNode::List { style, items } => {
                    self.list(canvas, *style, items, cursor, &body)
                }
                DocumentNode::Quote { text, caption } => {
                    self.quote(canvas, text, caption.as_deref(), cursor, &body)
                }
                DocumentNode::Other { kind, .. } => {
                    debug!(kind = %kind, "rendering block as plain text");
                    layout_paragraph(
                        canvas,
                        self.measurer,
                        &parse_inline(&block.plain_text()),
                        cursor,
                        &body,
                    )
                }
            };
            if cursor != before {
                cursor = cursor.advance(gap);
            }
        }
        cursor
    }

    fn list(
        &self,
        canvas: &mut PageCanvas,
        style: ListStyle,
        items: &[String],
        mut cursor: PageCursor,
        body: &TextConstraints,
    ) -> PageCursor {
        let indent = 16.0;
        let item_gap = body.font_size * 0.3;
        let text = body.indented(indent);
        for (i, item) in items.iter().enumerate() {
            let runs = parse_inline(item);
            if runs.iter().any(|r| !r.text.trim().is_empty()) {
                if cursor.y + body.line_height > self.geometry.bottom_limit() {
                    cursor = cursor.next_page(canvas, self.geometry.margin_top);
                }
                let marker = match style {
                    ListStyle::Ordered => format!("{}.", i + 1),
                    ListStyle::Unordered => "\u{2022}".to_string(),
                };
                canvas.draw(
                    cursor.page,
                    DrawOp::Text {
                        x: body.x + 2.0,
                        y: cursor.y + body.font_size,
                        text: marker,
                        style: FontStyle::Regular,
                        size: body.font_size,
                        color: self.theme.accent,
                    },
                );
                cursor = layout_paragraph(canvas, self.measurer, &runs, cursor, &text);
            }
            // Empty items still get the gap.
            cursor = cursor.advance(item_gap);
        }
        cursor
    }

    fn quote(
        &self,
        canvas: &mut PageCanvas,
        text: &str,
        caption: Option<&str>,
        cursor: PageCursor,
        body: &TextConstraints,
    ) -> PageCursor {
        let c = body.indented(14.0);
        let runs = restyle(parse_inline(text), false, true);
        let mut end = layout_paragraph(canvas, self.measurer, &runs, cursor, &c);
        if let Some(caption) = caption.map(str::trim).filter(|c| !c.is_empty()) {
            let caption_runs = vec![InlineRun::plain(format!("\u{2014} {caption}"))];
            end = layout_paragraph(
                canvas,
                self.measurer,
                &caption_runs,
                end,
                &c.with_color(self.theme.muted),
            );
        }
        if end == cursor {
            return cursor;
        }

        let x = body.x + 3.0;
        for page in cursor.page..=end.page {
            let top = if page == cursor.page {
                cursor.y
            } else {
                self.geometry.margin_top
            };
            let bottom = if page == end.page {
                end.y
            } else {
                self.geometry.bottom_limit()
            };
            canvas.draw(
                page,
                DrawOp::Line {
                    x1: x,
                    y1: top,
                    x2: x,
                    y2: bottom,
                    width: 2.0,
                    color: self.theme.accent,
                },
            );
        }
        end
    }

    /// List of files under a section or item, each pointing at its annex.
    fn attachment_refs(
        &self,
        pass: &mut Pass<'_>,
        attachments: &[FileAttachment],
        mut cursor: PageCursor,
    ) -> PageCursor {
        if attachments.is_empty() {
            return cursor;
        }
        let small = self.text(self.sizes.body - 0.5);
        cursor = layout_paragraph(
            &mut pass.canvas,
            self.measurer,
            &[InlineRun::bold(format!("{} :", self.labels.attachments))],
            cursor,
            &small,
        );
        for attachment in attachments {
            let kind = AttachmentKind::classify(attachment);
            let line = format!(
                "\u{2022} {} ({}, {} {})",
                attachment.name,
                kind.label(),
                self.labels.annex,
                pass.next_annex
            );
            pass.next_annex += 1;
            cursor = layout_paragraph(
                &mut pass.canvas,
                self.measurer,
                &[InlineRun::plain(line)],
                cursor,
                &small.indented(8.0),
            );
        }
        cursor.advance(4.0)
    }

    fn draw_appendix(&self, pass: &mut Pass<'_>, appendix: &[AppendixEntry]) {
        let cursor = self.fresh_page(&mut pass.canvas);
        pass.toc.resolve(APPENDIX_KEY, cursor.page + 1);
        let mut cursor = self.heading(
            &mut pass.canvas,
            &self.labels.appendix_title,
            self.sizes.section_title,
            self.theme.primary,
            cursor,
        );

        let body = self.text(self.sizes.body);
        let note = body.indented(18.0).with_color(self.theme.muted);
        for entry in appendix {
            let runs = vec![
                InlineRun::plain(format!("{}. ", entry.number)),
                InlineRun::bold(entry.name.clone()),
                InlineRun::plain(format!(" ({})", entry.kind.label())),
            ];
            cursor = layout_paragraph(&mut pass.canvas, self.measurer, &runs, cursor, &body);
            let where_to_find = match entry.kind {
                AttachmentKind::Pdf => self.labels.merged_note.clone(),
                _ => format!("{} : {}", self.labels.online_note, entry.url),
            };
            let detail = vec![InlineRun::italic(format!(
                "{} \u{2013} {}",
                entry.owner(),
                where_to_find
            ))];
            cursor = layout_paragraph(&mut pass.canvas, self.measurer, &detail, cursor, &note);
            cursor = cursor.advance(self.sizes.body * 0.5);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::fonts::HelveticaMetrics;

    fn composer<'a>(labels: &'a ExportLabels, theme: &'a SiteTheme) -> DocumentComposer<'a> {
        DocumentComposer {
            geometry: PageGeometry::default(),
            sizes: FontSizes::default(),
            labels,
            theme,
            measurer: &HelveticaMetrics,
            image_max_height: 220.0,
            generated_on: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        }
    }

    fn section(id: &str, title: &str, body: Vec<DocumentNode>) -> SectionContent {
        SectionContent {
            section: ProgramSection {
                section_id: id.into(),
                title: title.into(),
                position: 0,
                image_url: None,
                items: vec![],
                attachments: vec![],
            },
            body,
            items: vec![],
        }
    }

    #[test]
    fn cover_toc_and_one_page_per_section() {
        let labels = ExportLabels::default();
        let theme = SiteTheme::default();
        let content = ProgramContent {
            theme: theme.clone(),
            sections: vec![
                section("a", "Mobilité", vec![DocumentNode::paragraph("Texte")]),
                section("b", "Écologie", vec![]),
            ],
        };
        let doc = composer(&labels, &theme)
            .compose(&content, &HashMap::new(), &CancellationToken::new())
            .unwrap();

        // cover, toc, a, b
        assert_eq!(doc.canvas.page_count(), 4);
        assert_eq!(
            doc.heading_pages,
            vec![("a".to_string(), 3), ("b".to_string(), 4)]
        );
        assert_eq!(doc.toc.get("a").and_then(|e| e.resolved_page), Some(3));
        assert!(doc.toc.get(APPENDIX_KEY).is_none());
        assert!(doc
            .canvas
            .texts(0)
            .any(|t| t == "Document généré le 01/03/2026"));
    }

    #[test]
    fn missing_image_is_reported_not_fatal() {
        let labels = ExportLabels::default();
        let theme = SiteTheme::default();
        let mut s = section("a", "Culture", vec![]);
        s.section.image_url = Some("https://cdn/missing.png".into());
        let content = ProgramContent {
            theme: theme.clone(),
            sections: vec![s],
        };
        let doc = composer(&labels, &theme)
            .compose(&content, &HashMap::new(), &CancellationToken::new())
            .unwrap();
        assert_eq!(doc.images_placed, 0);
        assert_eq!(doc.images_skipped, vec!["https://cdn/missing.png".to_string()]);
    }

    #[test]
    fn list_items_keep_a_gap_when_empty() {
        let labels = ExportLabels::default();
        let theme = SiteTheme::default();
        let c = composer(&labels, &theme);
        let mut canvas = PageCanvas::new(c.geometry.page_width, c.geometry.page_height);
        canvas.new_page();
        let body = c.text(c.sizes.body);
        let start = PageCursor::new(0, 100.0);
        let end = c.list(
            &mut canvas,
            ListStyle::Unordered,
            &["".to_string(), "".to_string()],
            start,
            &body,
        );
        assert!(end.y > start.y);
        assert!(canvas.ops(0).is_empty());
    }

    #[test]
    fn appendix_gets_a_toc_entry_and_annex_numbers() {
        let labels = ExportLabels::default();
        let theme = SiteTheme::default();
        let mut s = section("a", "Budget", vec![]);
        s.section.attachments = vec![FileAttachment {
            name: "budget.pdf".into(),
            url: "https://cdn/budget.pdf".into(),
        }];
        let content = ProgramContent {
            theme: theme.clone(),
            sections: vec![s],
        };
        let doc = composer(&labels, &theme)
            .compose(&content, &HashMap::new(), &CancellationToken::new())
            .unwrap();
        assert_eq!(doc.appendix.len(), 1);
        assert_eq!(doc.toc.get(APPENDIX_KEY).and_then(|e| e.resolved_page), Some(4));
        assert!(doc
            .canvas
            .texts(2)
            .any(|t| t.contains("budget.pdf (PDF, annexe 1)")));
    }

    #[test]
    fn cancelled_before_sections() {
        let labels = ExportLabels::default();
        let theme = SiteTheme::default();
        let content = ProgramContent {
            theme: theme.clone(),
            sections: vec![section("a", "A", vec![])],
        };
        let cancel = CancellationToken::new();
        cancel.cancel();
        let res = composer(&labels, &theme).compose(&content, &HashMap::new(), &cancel);
        assert!(matches!(res, Err(crate::CampaignError::Cancelled)));
    }
}
