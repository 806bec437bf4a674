//! Programme document composition
//!
//! Turns programme sections (rich-text bodies, images, numbered items, file
//! attachments) into one paginated PDF:
//!
//! 1. [`ProgramExporter::load_content`] reads settings, sections and bodies
//!    through [`campaign_state::ContentStore`].
//! 2. Images are fetched concurrently through an [`crate::assets::AssetFetcher`].
//! 3. [`DocumentComposer`] lays everything out on a [`PageCanvas`]: cover,
//!    table of contents (page numbers back-patched once sections are placed),
//!    sections and appendix index.
//! 4. [`render_pdf`] serializes the canvas with `lopdf`,
//!    [`merge_documents`] appends the PDF attachments, and
//!    [`stamp_footers`] numbers every page of the result.

pub mod appendix;
pub mod canvas;
pub mod document;
pub mod exporter;
pub mod fonts;
pub mod layout;
pub mod pdf;
pub mod runs;
pub mod toc;

pub use appendix::{collect_appendix, AppendixEntry, AttachmentKind};
pub use canvas::{DecodedImage, DrawOp, PageCanvas};
pub use document::{
    ComposedDocument, DocumentComposer, ExportLabels, FontSizes, ItemContent, ProgramContent,
    SectionContent, APPENDIX_KEY,
};
pub use exporter::{
    export_file_name, ExportArtifact, ExportOptions, ExportReport, ProgramExporter,
};
pub use fonts::{encode_win_ansi, FontStyle, HelveticaMetrics, TextMeasurer};
pub use layout::{
    fit_image, layout_image, layout_paragraph, wrap_runs, ImageConstraints, Line, PageCursor,
    PageGeometry, Segment, TextConstraints, A4_HEIGHT, A4_WIDTH,
};
pub use pdf::{
    merge_documents, page_count, render_pdf, stamp_footers, FooterStyle, MergeOutcome,
};
pub use runs::{parse_inline, InlineRun};
pub use toc::{Toc, TocEntry, TocStyle};
