//! In-memory page canvas.
//!
//! Layout appends draw operations page by page; any page stays addressable
//! until the canvas is serialized, which is what lets the table of contents
//! be patched after the sections are laid out.

use std::sync::Arc;

use super::fonts::FontStyle;
use crate::theme::Rgb;

/// Decoded raster, stored as packed 8-bit RGB.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub width_px: u32,
    pub height_px: u32,
    pub rgb: Vec<u8>,
}

/// One drawing instruction. Coordinates are in points from the top-left
/// corner of the page; `y` of a text op is its baseline.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Text {
        x: f32,
        y: f32,
        text: String,
        style: FontStyle,
        size: f32,
        color: Rgb,
    },
    /// Image placed with its top-left corner at `(x, y)`.
    Image {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        image: usize,
    },
    /// Filled rectangle, top-left corner at `(x, y)`.
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Rgb,
    },
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        width: f32,
        color: Rgb,
    },
}

#[derive(Debug, Clone)]
pub struct PageCanvas {
    pub page_width: f32,
    pub page_height: f32,
    pages: Vec<Vec<DrawOp>>,
    images: Vec<Arc<DecodedImage>>,
}

impl PageCanvas {
    pub fn new(page_width: f32, page_height: f32) -> Self {
        Self {
            page_width,
            page_height,
            pages: Vec::new(),
            images: Vec::new(),
        }
    }

    /// Open a page and return its 0-based index.
    pub fn new_page(&mut self) -> usize {
        self.pages.push(Vec::new());
        self.pages.len() - 1
    }

    /// Make sure `page` exists, opening pages as needed.
    pub fn ensure_page(&mut self, page: usize) {
        while self.pages.len() <= page {
            self.pages.push(Vec::new());
        }
    }

    pub fn draw(&mut self, page: usize, op: DrawOp) {
        self.ensure_page(page);
        self.pages[page].push(op);
    }

    pub fn ops(&self, page: usize) -> &[DrawOp] {
        self.pages.get(page).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Register a raster and return the handle used by [`DrawOp::Image`].
    pub fn add_image(&mut self, image: DecodedImage) -> usize {
        self.images.push(Arc::new(image));
        self.images.len() - 1
    }

    pub fn image(&self, handle: usize) -> Option<&DecodedImage> {
        self.images.get(handle).map(Arc::as_ref)
    }

    pub fn images(&self) -> &[Arc<DecodedImage>] {
        &self.images
    }

    /// Text drawn on a page, in emission order.
    pub fn texts(&self, page: usize) -> impl Iterator<Item = &str> {
        self.ops(page).iter().filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}
