//! PDF output with `lopdf`: canvas serialization, page-level merging and
//! footer stamping.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::{debug, instrument};

use super::canvas::{DrawOp, PageCanvas};
use super::fonts::{encode_win_ansi, FontStyle, TextMeasurer};
use super::layout::{A4_HEIGHT, A4_WIDTH};
use crate::obs;
use crate::theme::Rgb;
use crate::{CampaignError, Result};

const PDF_VERSION: &str = "1.5";

/// Page attributes a page may inherit from its `Pages` ancestors.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Font resource name the footer is set in; kept apart from `F1`..`F4` so
/// attachment pages keep their own fonts.
const FOOTER_FONT: &str = "FCampaignFooter";

fn real(v: f32) -> Object {
    Object::Real(v)
}

fn int(v: usize) -> Object {
    Object::Integer(v as i64)
}

fn fill(color: Rgb) -> Operation {
    Operation::new("rg", vec![real(color.r), real(color.g), real(color.b)])
}

fn stroke(color: Rgb) -> Operation {
    Operation::new("RG", vec![real(color.r), real(color.g), real(color.b)])
}

fn page_operations(canvas: &PageCanvas, page: usize) -> Vec<Operation> {
    let h = canvas.page_height;
    let mut ops = Vec::new();
    for op in canvas.ops(page) {
        match op {
            DrawOp::Text {
                x,
                y,
                text,
                style,
                size,
                color,
            } => {
                ops.push(Operation::new("BT", vec![]));
                ops.push(fill(*color));
                ops.push(Operation::new(
                    "Tf",
                    vec![Object::Name(style.resource_name().into()), real(*size)],
                ));
                ops.push(Operation::new("Td", vec![real(*x), real(h - y)]));
                ops.push(Operation::new(
                    "Tj",
                    vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
                ));
                ops.push(Operation::new("ET", vec![]));
            }
            DrawOp::Image {
                x,
                y,
                width,
                height,
                image,
            } => {
                ops.push(Operation::new("q", vec![]));
                ops.push(Operation::new(
                    "cm",
                    vec![
                        real(*width),
                        real(0.0),
                        real(0.0),
                        real(*height),
                        real(*x),
                        real(h - y - height),
                    ],
                ));
                ops.push(Operation::new(
                    "Do",
                    vec![Object::Name(format!("Im{image}").into_bytes())],
                ));
                ops.push(Operation::new("Q", vec![]));
            }
            DrawOp::Rect {
                x,
                y,
                width,
                height,
                color,
            } => {
                ops.push(fill(*color));
                ops.push(Operation::new(
                    "re",
                    vec![real(*x), real(h - y - height), real(*width), real(*height)],
                ));
                ops.push(Operation::new("f", vec![]));
            }
            DrawOp::Line {
                x1,
                y1,
                x2,
                y2,
                width,
                color,
            } => {
                ops.push(stroke(*color));
                ops.push(Operation::new("w", vec![real(*width)]));
                ops.push(Operation::new("m", vec![real(*x1), real(h - y1)]));
                ops.push(Operation::new("l", vec![real(*x2), real(h - y2)]));
                ops.push(Operation::new("S", vec![]));
            }
        }
    }
    ops
}

/// Serialize the canvas: Helvetica Type1 fonts, RGB image XObjects, one
/// content stream per page, all pages sharing one resource dictionary.
#[instrument(skip(canvas), fields(pages = canvas.page_count()))]
pub fn render_pdf(canvas: &PageCanvas, title: &str) -> Result<Vec<u8>> {
    if canvas.page_count() == 0 {
        return Err(CampaignError::Layout("canvas has no pages".to_string()));
    }

    let mut doc = Document::with_version(PDF_VERSION);
    let pages_id = doc.new_object_id();

    let mut fonts = Dictionary::new();
    for style in FontStyle::ALL {
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => style.base_font(),
            "Encoding" => "WinAnsiEncoding",
        });
        fonts.set(style.resource_name(), font_id);
    }

    let mut xobjects = Dictionary::new();
    for (handle, image) in canvas.images().iter().enumerate() {
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => Object::Integer(i64::from(image.width_px)),
                "Height" => Object::Integer(i64::from(image.height_px)),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => Object::Integer(8),
            },
            image.rgb.clone(),
        );
        let image_id = doc.add_object(stream);
        xobjects.set(format!("Im{handle}"), image_id);
    }

    let resources_id = doc.add_object(dictionary! {
        "Font" => fonts,
        "XObject" => xobjects,
    });

    let mut kids = Vec::with_capacity(canvas.page_count());
    for page in 0..canvas.page_count() {
        let content = Content {
            operations: page_operations(canvas, page),
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![int(0), int(0), real(canvas.page_width), real(canvas.page_height)],
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => int(kids.len()),
            "Kids" => kids,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::String(encode_win_ansi(title), StringFormat::Literal),
        "Producer" => Object::string_literal(format!("campaign-core {}", crate::VERSION)),
    });
    doc.trailer.set("Info", info_id);

    doc.compress();
    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    debug!(bytes = out.len(), "document serialized");
    Ok(out)
}

/// Result of [`merge_documents`].
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub bytes: Vec<u8>,
    pub primary_pages: usize,
    /// Attachments appended, with their page counts, in order.
    pub merged: Vec<(String, usize)>,
    /// Attachments left out, with the reason.
    pub skipped: Vec<(String, String)>,
    pub total_pages: usize,
}

/// Number of pages in a serialized PDF.
pub fn page_count(bytes: &[u8]) -> Result<usize> {
    Ok(Document::load_mem(bytes)?.get_pages().len())
}

fn type_of(object: &Object) -> Option<&[u8]> {
    let dict = match object {
        Object::Dictionary(dict) => dict,
        Object::Stream(stream) => &stream.dict,
        _ => return None,
    };
    dict.get(b"Type").and_then(Object::as_name).ok()
}

/// Walk the `Parent` chain of a page for an inherited attribute.
fn inherited(doc: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;
    while let Some(id) = parent {
        let node = doc.get_dictionary(id).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        depth += 1;
        if depth > 64 {
            return None;
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

/// Load an attachment, or say why it cannot be merged.
fn load_attachment(bytes: &[u8]) -> std::result::Result<Document, String> {
    let doc = Document::load_mem(bytes).map_err(|e| e.to_string())?;
    if doc.is_encrypted() {
        return Err("encrypted document".to_string());
    }
    if doc.get_pages().is_empty() {
        return Err("document has no pages".to_string());
    }
    Ok(doc)
}

/// Append every page of each attachment after the primary's pages.
///
/// A primary that does not load is fatal; an attachment that does not load
/// is logged and skipped.
#[instrument(skip_all, fields(attachments = attachments.len()))]
pub fn merge_documents(primary: &[u8], attachments: &[(String, Vec<u8>)]) -> Result<MergeOutcome> {
    let primary = Document::load_mem(primary)
        .map_err(|e| CampaignError::Pdf(format!("primary document does not load: {e}")))?;
    let primary_pages = primary.get_pages().len();

    let mut sources = vec![primary];
    let mut merged = Vec::new();
    let mut skipped = Vec::new();
    for (name, bytes) in attachments {
        match load_attachment(bytes) {
            Ok(doc) => {
                let pages = doc.get_pages().len();
                obs::emit_attachment_merged(name, pages);
                merged.push((name.clone(), pages));
                sources.push(doc);
            }
            Err(reason) => {
                obs::emit_asset_skipped("attachment", name, &reason);
                skipped.push((name.clone(), reason));
            }
        }
    }

    let mut out = Document::with_version(PDF_VERSION);
    let mut next_id = 1;
    let mut pages: Vec<(ObjectId, Dictionary)> = Vec::new();

    for mut doc in sources {
        doc.renumber_objects_with(next_id);
        next_id = doc.max_id + 1;

        for page_id in doc.get_pages().into_values() {
            let mut page = doc.get_dictionary(page_id)?.clone();
            for key in INHERITABLE {
                if !page.has(key) {
                    if let Some(value) = inherited(&doc, &page, key) {
                        page.set(key, value);
                    }
                }
            }
            if !page.has(b"MediaBox") {
                page.set(
                    "MediaBox",
                    vec![int(0), int(0), real(A4_WIDTH), real(A4_HEIGHT)],
                );
            }
            pages.push((page_id, page));
        }

        for (id, object) in doc.objects {
            match type_of(&object) {
                Some(b"Catalog" | b"Pages" | b"Page" | b"Outlines" | b"Outline") => {}
                _ => {
                    out.objects.insert(id, object);
                }
            }
        }
    }

    let pages_id = (next_id, 0);
    let catalog_id = (next_id + 1, 0);
    let total_pages = pages.len();
    let mut kids = Vec::with_capacity(total_pages);
    for (id, mut page) in pages {
        page.set("Parent", pages_id);
        out.objects.insert(id, Object::Dictionary(page));
        kids.push(Object::Reference(id));
    }
    out.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => int(total_pages),
            "Kids" => kids,
        }),
    );
    out.objects.insert(
        catalog_id,
        Object::Dictionary(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        }),
    );
    out.trailer.set("Root", catalog_id);
    out.max_id = next_id + 1;
    out.renumber_objects();
    out.compress();

    let mut bytes = Vec::new();
    out.save_to(&mut bytes)?;
    Ok(MergeOutcome {
        bytes,
        primary_pages,
        merged,
        skipped,
        total_pages,
    })
}

/// How [`stamp_footers`] draws its line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FooterStyle {
    pub size: f32,
    pub color: Rgb,
    /// Baseline height above the bottom of the media box.
    pub baseline: f32,
}

/// Page attribute from the page itself or its `Pages` ancestors.
fn page_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let page = doc.get_dictionary(page_id).ok()?;
    page.get(key)
        .ok()
        .cloned()
        .or_else(|| inherited(doc, page, key))
}

/// `[x0, y0, x1, y1]` of a page, A4 when absent or malformed.
fn media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    let a4 = [0.0, 0.0, A4_WIDTH, A4_HEIGHT];
    let Some(raw) = page_attribute(doc, page_id, b"MediaBox") else {
        return a4;
    };
    let corners = doc
        .dereference(&raw)
        .and_then(|(_, object)| object.as_array())
        .map(|array| {
            array
                .iter()
                .filter_map(|v| v.as_float().ok())
                .collect::<Vec<_>>()
        });
    match corners.as_deref() {
        Ok([x0, y0, x1, y1]) => [*x0, *y0, *x1, *y1],
        _ => a4,
    }
}

/// The page's resources as a direct dictionary, with the footer font added.
fn footer_resources(doc: &Document, page_id: ObjectId, font_id: ObjectId) -> Result<Dictionary> {
    let mut resources = match page_attribute(doc, page_id, b"Resources") {
        Some(raw) => doc.dereference(&raw)?.1.as_dict()?.clone(),
        None => Dictionary::new(),
    };
    let mut fonts = match resources.get(b"Font") {
        Ok(raw) => doc.dereference(raw)?.1.as_dict()?.clone(),
        Err(_) => Dictionary::new(),
    };
    fonts.set(FOOTER_FONT, font_id);
    resources.set("Font", fonts);
    Ok(resources)
}

/// Draw `text(page, total)` centred at the bottom of every page of a
/// finished document. Runs after merging, so attachment pages are stamped
/// and numbered against the merged total.
///
/// Each page's existing content is wrapped in `q`/`Q` so whatever graphics
/// state it leaves behind does not move the footer.
#[instrument(skip_all)]
pub fn stamp_footers<F>(
    bytes: &[u8],
    style: FooterStyle,
    measurer: &dyn TextMeasurer,
    text: F,
) -> Result<Vec<u8>>
where
    F: Fn(usize, usize) -> String,
{
    let mut doc = Document::load_mem(bytes)?;
    let pages = doc.get_pages();
    let total = pages.len();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => FontStyle::Regular.base_font(),
        "Encoding" => "WinAnsiEncoding",
    });
    // Streams are concatenated as-is when read back, so each one is
    // delimited by its own newlines.
    let save_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));

    for (number, page_id) in pages {
        let line = text(number as usize, total);
        let [x0, y0, x1, _] = media_box(&doc, page_id);
        let width = measurer.text_width(&line, FontStyle::Regular, style.size);
        let x = x0 + ((x1 - x0 - width) / 2.0).max(0.0);

        let footer = Content {
            operations: vec![
                Operation::new("Q", vec![]),
                Operation::new("BT", vec![]),
                fill(style.color),
                Operation::new("Tf", vec![Object::Name(FOOTER_FONT.into()), real(style.size)]),
                Operation::new("Td", vec![real(x), real(y0 + style.baseline)]),
                Operation::new(
                    "Tj",
                    vec![Object::String(encode_win_ansi(&line), StringFormat::Literal)],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let mut data = b"\n".to_vec();
        data.extend(footer.encode()?);
        let footer_id = doc.add_object(Stream::new(dictionary! {}, data));

        let mut contents = vec![Object::Reference(save_id)];
        contents.extend(
            doc.get_page_contents(page_id)
                .into_iter()
                .map(Object::Reference),
        );
        contents.push(Object::Reference(footer_id));

        let resources = footer_resources(&doc, page_id, font_id)?;
        let page = doc.get_dictionary_mut(page_id)?;
        page.set("Resources", resources);
        page.set("Contents", contents);
    }

    doc.compress();
    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    debug!(pages = total, "footers stamped");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::canvas::DecodedImage;
    use crate::compose::fonts::HelveticaMetrics;

    const FOOTER: FooterStyle = FooterStyle {
        size: 8.0,
        color: Rgb::BLACK,
        baseline: 28.0,
    };

    /// Literal strings shown on a 1-based page.
    fn shown_text(doc: &Document, page_number: u32) -> String {
        let page_id = *doc.get_pages().get(&page_number).unwrap();
        let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
        content
            .operations
            .iter()
            .filter(|op| op.operator == "Tj")
            .filter_map(|op| match op.operands.first() {
                Some(Object::String(bytes, _)) => Some(String::from_utf8_lossy(bytes).into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn canvas_with_pages(n: usize, label: &str) -> PageCanvas {
        let mut canvas = PageCanvas::new(A4_WIDTH, A4_HEIGHT);
        for i in 0..n {
            let page = canvas.new_page();
            canvas.draw(
                page,
                DrawOp::Text {
                    x: 50.0,
                    y: 80.0,
                    text: format!("{label} {i} – été"),
                    style: FontStyle::Bold,
                    size: 12.0,
                    color: Rgb::BLACK,
                },
            );
        }
        canvas
    }

    #[test]
    fn renders_pages_fonts_and_images() {
        let mut canvas = canvas_with_pages(2, "page");
        let handle = canvas.add_image(DecodedImage {
            width_px: 2,
            height_px: 1,
            rgb: vec![255, 0, 0, 0, 0, 255],
        });
        canvas.draw(
            1,
            DrawOp::Image {
                x: 10.0,
                y: 10.0,
                width: 20.0,
                height: 10.0,
                image: handle,
            },
        );
        canvas.draw(
            0,
            DrawOp::Rect {
                x: 0.0,
                y: 0.0,
                width: A4_WIDTH,
                height: 100.0,
                color: Rgb::WHITE,
            },
        );

        let bytes = render_pdf(&canvas, "Programme").unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
        let first = *doc.get_pages().values().next().unwrap();
        let text = shown_text(&doc, 1);
        assert!(text.contains("page 0"), "{text}");
        let fonts = doc.get_page_fonts(first);
        assert_eq!(fonts.len(), 4);
    }

    #[test]
    fn empty_canvas_is_an_error() {
        let canvas = PageCanvas::new(A4_WIDTH, A4_HEIGHT);
        assert!(matches!(
            render_pdf(&canvas, "x"),
            Err(CampaignError::Layout(_))
        ));
    }

    #[test]
    fn merges_in_order_and_skips_corrupt() {
        let primary = render_pdf(&canvas_with_pages(3, "main"), "main").unwrap();
        let annex_a = render_pdf(&canvas_with_pages(2, "a"), "a").unwrap();
        let annex_b = render_pdf(&canvas_with_pages(1, "b"), "b").unwrap();
        let attachments = vec![
            ("a.pdf".to_string(), annex_a),
            ("broken.pdf".to_string(), b"%PDF-1.4 garbage".to_vec()),
            ("b.pdf".to_string(), annex_b),
        ];

        let outcome = merge_documents(&primary, &attachments).unwrap();
        assert_eq!(outcome.primary_pages, 3);
        assert_eq!(outcome.total_pages, 6);
        assert_eq!(
            outcome.merged,
            vec![("a.pdf".to_string(), 2), ("b.pdf".to_string(), 1)]
        );
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].0, "broken.pdf");
        assert_eq!(page_count(&outcome.bytes).unwrap(), 6);

        let doc = Document::load_mem(&outcome.bytes).unwrap();
        assert!(shown_text(&doc, 1).contains("main 0"));
        assert!(shown_text(&doc, 4).contains("a 0"));
        assert!(shown_text(&doc, 6).contains("b 0"));
    }

    #[test]
    fn corrupt_primary_is_fatal() {
        let err = merge_documents(b"not a pdf", &[]).unwrap_err();
        assert!(matches!(err, CampaignError::Pdf(_)));
    }

    #[test]
    fn inherited_resources_are_resolved() {
        // Resources and MediaBox live on the Pages node only.
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), Object::Integer(12)]),
                Operation::new("Td", vec![Object::Integer(50), Object::Integer(700)]),
                Operation::new("Tj", vec![Object::string_literal("inherited")]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => Object::Integer(1),
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
                "MediaBox" => vec![int(0), int(0), int(300), int(400)],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut annex = Vec::new();
        doc.save_to(&mut annex).unwrap();

        let primary = render_pdf(&canvas_with_pages(1, "main"), "main").unwrap();
        let outcome = merge_documents(&primary, &[("annex.pdf".to_string(), annex)]).unwrap();
        assert_eq!(outcome.total_pages, 2);

        let merged = Document::load_mem(&outcome.bytes).unwrap();
        let second = *merged.get_pages().get(&2).unwrap();
        let page = merged.get_dictionary(second).unwrap();
        assert!(page.has(b"Resources"));
        let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
        assert_eq!(media_box.len(), 4);
        assert_eq!(merged.get_page_fonts(second).len(), 1);

        let stamped = stamp_footers(&outcome.bytes, FOOTER, &HelveticaMetrics, |n, total| {
            format!("{n}/{total}")
        })
        .unwrap();
        let stamped = Document::load_mem(&stamped).unwrap();
        let second = *stamped.get_pages().get(&2).unwrap();
        let fonts = stamped.get_page_fonts(second);
        assert_eq!(fonts.len(), 2);
        assert!(fonts.contains_key(FOOTER_FONT.as_bytes()));
        assert_eq!(shown_text(&stamped, 2), "inherited\n2/2");
    }

    #[test]
    fn footers_count_merged_pages() {
        let primary = render_pdf(&canvas_with_pages(2, "main"), "main").unwrap();
        let annex = render_pdf(&canvas_with_pages(1, "annex"), "annex").unwrap();
        let outcome = merge_documents(&primary, &[("annex.pdf".to_string(), annex)]).unwrap();

        let stamped = stamp_footers(&outcome.bytes, FOOTER, &HelveticaMetrics, |n, total| {
            format!("Programme | Liste - Page {n}/{total}")
        })
        .unwrap();
        assert_eq!(page_count(&stamped).unwrap(), 3);

        let doc = Document::load_mem(&stamped).unwrap();
        for n in 1..=3u32 {
            let text = shown_text(&doc, n);
            assert!(
                text.ends_with(&format!("Programme | Liste - Page {n}/3")),
                "{text}"
            );
        }
        assert!(shown_text(&doc, 3).starts_with("annex 0"));

        // Centred on the page, above the bottom edge.
        let last = *doc.get_pages().get(&3).unwrap();
        let content = Content::decode(&doc.get_page_content(last).unwrap()).unwrap();
        let position = content
            .operations
            .iter()
            .filter(|op| op.operator == "Td")
            .last()
            .unwrap();
        let x = position.operands[0].as_float().unwrap();
        let y = position.operands[1].as_float().unwrap();
        let width = HelveticaMetrics.text_width("Programme | Liste - Page 3/3", FontStyle::Regular, 8.0);
        assert!((x - (A4_WIDTH - width) / 2.0).abs() < 0.01);
        assert!((y - 28.0).abs() < 0.01);
    }
}
