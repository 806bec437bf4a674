//! Flow layout: word wrap over inline runs, paragraph and image placement.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::canvas::{DecodedImage, DrawOp, PageCanvas};
use super::fonts::{FontStyle, TextMeasurer};
use super::runs::InlineRun;
use crate::theme::Rgb;

/// A4 portrait, in points.
pub const A4_WIDTH: f32 = 595.28;
pub const A4_HEIGHT: f32 = 841.89;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub page_width: f32,
    pub page_height: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub margin_right: f32,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            page_width: A4_WIDTH,
            page_height: A4_HEIGHT,
            margin_top: 56.0,
            margin_bottom: 64.0,
            margin_left: 56.0,
            margin_right: 56.0,
        }
    }
}

impl PageGeometry {
    pub fn content_width(&self) -> f32 {
        self.page_width - self.margin_left - self.margin_right
    }

    pub fn content_height(&self) -> f32 {
        self.page_height - self.margin_top - self.margin_bottom
    }

    /// Lowest `y` content may reach.
    pub fn bottom_limit(&self) -> f32 {
        self.page_height - self.margin_bottom
    }
}

/// Where the next block goes: page index and distance from the top edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageCursor {
    pub page: usize,
    pub y: f32,
}

impl PageCursor {
    pub fn new(page: usize, y: f32) -> Self {
        Self { page, y }
    }

    /// Top of the following page; the page is created on the canvas.
    pub fn next_page(self, canvas: &mut PageCanvas, margin_top: f32) -> Self {
        let page = self.page + 1;
        canvas.ensure_page(page);
        Self { page, y: margin_top }
    }

    pub fn advance(self, dy: f32) -> Self {
        Self {
            page: self.page,
            y: self.y + dy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextConstraints {
    pub x: f32,
    pub max_width: f32,
    pub font_size: f32,
    /// Absolute line advance in points.
    pub line_height: f32,
    pub color: Rgb,
    pub margin_top: f32,
    pub page_height: f32,
    pub margin_bottom: f32,
}

impl TextConstraints {
    /// Full content width of `geometry`, 1.4 line spacing.
    pub fn new(geometry: &PageGeometry, font_size: f32) -> Self {
        Self {
            x: geometry.margin_left,
            max_width: geometry.content_width(),
            font_size,
            line_height: font_size * 1.4,
            color: Rgb::BLACK,
            margin_top: geometry.margin_top,
            page_height: geometry.page_height,
            margin_bottom: geometry.margin_bottom,
        }
    }

    pub fn with_color(mut self, color: Rgb) -> Self {
        self.color = color;
        self
    }

    /// Shift the left edge right by `indent`, narrowing the column.
    pub fn indented(mut self, indent: f32) -> Self {
        self.x += indent;
        self.max_width = (self.max_width - indent).max(0.0);
        self
    }

    pub fn with_line_height(mut self, line_height: f32) -> Self {
        self.line_height = line_height;
        self
    }
}

/// Uniformly styled text within a line.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub text: String,
    pub style: FontStyle,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Line {
    pub segments: Vec<Segment>,
    /// Measured width of all segments.
    pub width: f32,
    pub words: usize,
}

impl Line {
    pub fn is_empty(&self) -> bool {
        self.words == 0
    }

    pub fn text(&self) -> String {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }
}

struct LineBuilder<'a> {
    measurer: &'a dyn TextMeasurer,
    size: f32,
    max_width: f32,
    lines: Vec<Line>,
    current: Line,
    pending_space: bool,
}

impl<'a> LineBuilder<'a> {
    fn piece_width(&self, text: &str, style: FontStyle) -> f32 {
        self.measurer.text_width(text, style, self.size)
    }

    fn push_word(&mut self, word: &str, style: FontStyle) {
        let spaced = self.pending_space && !self.current.is_empty();
        let piece = if spaced {
            format!(" {word}")
        } else {
            word.to_string()
        };
        let added = self.piece_width(&piece, style);

        if !self.current.is_empty() && self.current.width + added > self.max_width {
            self.flush();
            self.append(word.to_string(), style);
        } else {
            self.append(piece, style);
        }
        self.pending_space = false;
    }

    fn append(&mut self, piece: String, style: FontStyle) {
        match self.current.segments.last_mut() {
            Some(last) if last.style == style => last.text.push_str(&piece),
            _ => self.current.segments.push(Segment { text: piece, style }),
        }
        self.current.words += 1;
        self.current.width = self
            .current
            .segments
            .iter()
            .map(|s| self.measurer.text_width(&s.text, s.style, self.size))
            .sum();
    }

    fn flush(&mut self) {
        self.lines.push(std::mem::take(&mut self.current));
        self.pending_space = false;
    }
}

/// Greedy word wrap. A line is broken before the word that would push it
/// past `max_width`; a single word wider than `max_width` gets a line of
/// its own. Line-break runs end the current line, even when it is empty.
pub fn wrap_runs(
    runs: &[InlineRun],
    max_width: f32,
    size: f32,
    measurer: &dyn TextMeasurer,
) -> Vec<Line> {
    let mut builder = LineBuilder {
        measurer,
        size,
        max_width,
        lines: Vec::new(),
        current: Line::default(),
        pending_space: false,
    };

    for run in runs {
        if run.line_break {
            builder.flush();
            continue;
        }
        let style = run.style();
        if run.text.starts_with(char::is_whitespace) {
            builder.pending_space = true;
        }
        let mut words = run.text.split_whitespace().peekable();
        while let Some(word) = words.next() {
            builder.push_word(word, style);
            if words.peek().is_some() {
                builder.pending_space = true;
            }
        }
        if run.text.ends_with(char::is_whitespace) {
            builder.pending_space = true;
        }
    }

    if !builder.current.is_empty() {
        builder.flush();
    }
    builder.lines
}

/// Lay a paragraph out from `cursor`, opening pages as needed, and return
/// the cursor below the last line. Runs without any text leave the cursor
/// where it was.
pub fn layout_paragraph(
    canvas: &mut PageCanvas,
    measurer: &dyn TextMeasurer,
    runs: &[InlineRun],
    cursor: PageCursor,
    c: &TextConstraints,
) -> PageCursor {
    let lines = wrap_runs(runs, c.max_width, c.font_size, measurer);
    if lines.is_empty() {
        return cursor;
    }

    let bottom = c.page_height - c.margin_bottom;
    let mut cursor = cursor;
    canvas.ensure_page(cursor.page);
    for line in &lines {
        if cursor.y + c.line_height > bottom && cursor.y > c.margin_top {
            cursor = cursor.next_page(canvas, c.margin_top);
            debug!(page = cursor.page, "paragraph continues on new page");
        }
        let baseline = cursor.y + c.font_size;
        let mut x = c.x;
        for segment in &line.segments {
            let width = measurer.text_width(&segment.text, segment.style, c.font_size);
            canvas.draw(
                cursor.page,
                DrawOp::Text {
                    x,
                    y: baseline,
                    text: segment.text.clone(),
                    style: segment.style,
                    size: c.font_size,
                    color: c.color,
                },
            );
            x += width;
        }
        cursor = cursor.advance(c.line_height);
    }
    cursor
}

/// Bounds for an image block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageConstraints {
    pub x: f32,
    pub max_width: f32,
    pub max_height: f32,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub preserve_aspect_ratio: bool,
    /// Centre within `max_width` instead of aligning left.
    pub center: bool,
    pub spacing_after: f32,
    pub margin_top: f32,
    pub page_height: f32,
    pub margin_bottom: f32,
}

impl ImageConstraints {
    pub fn new(geometry: &PageGeometry, max_height: f32) -> Self {
        Self {
            x: geometry.margin_left,
            max_width: geometry.content_width(),
            max_height,
            width: None,
            height: None,
            preserve_aspect_ratio: true,
            center: true,
            spacing_after: 12.0,
            margin_top: geometry.margin_top,
            page_height: geometry.page_height,
            margin_bottom: geometry.margin_bottom,
        }
    }
}

/// Display size for an image of `natural` pixels.
///
/// With aspect preservation and no explicit size, landscape images bind to
/// `max_width` first and portrait ones to `max_height` first; the result is
/// then checked against the other bound.
pub fn fit_image(
    natural_width: f32,
    natural_height: f32,
    max_width: f32,
    max_height: f32,
    width: Option<f32>,
    height: Option<f32>,
    preserve_aspect_ratio: bool,
) -> (f32, f32) {
    if natural_width <= 0.0 || natural_height <= 0.0 {
        return (0.0, 0.0);
    }
    let ratio = natural_width / natural_height;

    match (width, height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) if preserve_aspect_ratio => (w, w / ratio),
        (Some(w), None) => (w, natural_height.min(max_height)),
        (None, Some(h)) if preserve_aspect_ratio => (h * ratio, h),
        (None, Some(h)) => (natural_width.min(max_width), h),
        (None, None) if !preserve_aspect_ratio => {
            (natural_width.min(max_width), natural_height.min(max_height))
        }
        (None, None) => {
            if natural_width >= natural_height {
                let mut w = natural_width.min(max_width);
                let mut h = w / ratio;
                if h > max_height {
                    h = max_height;
                    w = h * ratio;
                }
                (w, h)
            } else {
                let mut h = natural_height.min(max_height);
                let mut w = h * ratio;
                if w > max_width {
                    w = max_width;
                    h = w / ratio;
                }
                (w, h)
            }
        }
    }
}

/// Decode `bytes` into an RGB raster.
pub fn decode_image(bytes: &[u8]) -> Result<DecodedImage, image::ImageError> {
    let rgb = image::load_from_memory(bytes)?.to_rgb8();
    Ok(DecodedImage {
        width_px: rgb.width(),
        height_px: rgb.height(),
        rgb: rgb.into_raw(),
    })
}

/// Place an image at `cursor`. Undecodable bytes are logged and returned as
/// an error; the caller keeps its cursor.
pub fn layout_image(
    canvas: &mut PageCanvas,
    bytes: &[u8],
    cursor: PageCursor,
    c: &ImageConstraints,
) -> Result<PageCursor, image::ImageError> {
    let decoded = match decode_image(bytes) {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!(error = %e, len = bytes.len(), "image could not be decoded, skipping");
            return Err(e);
        }
    };

    let page_room = c.page_height - c.margin_top - c.margin_bottom;
    let (width, height) = fit_image(
        decoded.width_px as f32,
        decoded.height_px as f32,
        c.max_width,
        c.max_height.min(page_room),
        c.width,
        c.height,
        c.preserve_aspect_ratio,
    );

    let mut cursor = cursor;
    canvas.ensure_page(cursor.page);
    if cursor.y + height > c.page_height - c.margin_bottom && cursor.y > c.margin_top {
        cursor = cursor.next_page(canvas, c.margin_top);
    }

    let x = if c.center {
        c.x + ((c.max_width - width) / 2.0).max(0.0)
    } else {
        c.x
    };
    let handle = canvas.add_image(decoded);
    canvas.draw(
        cursor.page,
        DrawOp::Image {
            x,
            y: cursor.y,
            width,
            height,
            image: handle,
        },
    );
    Ok(cursor.advance(height + c.spacing_after))
}
